// handlers/protected/docs/health.rs - GET /api/docs/health handler

use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::document_service::StorageHealth;

/// GET /api/docs/health - Probe the object store on the caller's prefix
pub async fn health_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<StorageHealth> {
    Ok(ApiResponse::success(state.documents.health(&caller).await?))
}

// handlers/protected/docs/recent.rs - GET /api/docs/recent handler

use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::document_service::RecentObject;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub subfolder: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/docs/recent?subfolder=..&limit=.. - Newest objects in a folder
///
/// Without `subfolder` the caller's default personal folder is listed.
/// `limit` is clamped to 1..50.
pub async fn recent_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Vec<RecentObject>> {
    let objects = state
        .documents
        .recent(&caller, query.subfolder.as_deref(), query.limit)
        .await?;
    Ok(ApiResponse::success(objects))
}

// handlers/protected/auth/whoami.rs - GET /api/auth/whoami handler

use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::database::models::Identity;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /api/auth/whoami - The caller's live account record
///
/// Read fresh from the identity store rather than from the token snapshot, so
/// role and activation changes show up here before the token expires.
pub async fn whoami_get(State(state): State<AppState>, Extension(caller): Extension<AuthUser>) -> ApiResult<Identity> {
    let identity = state.accounts.whoami(&caller).await?;
    Ok(ApiResponse::success(identity))
}

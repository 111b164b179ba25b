// handlers/public/auth/register.rs - POST /api/auth/register handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::account_service::{RegisterRequest, Registration};

/// POST /api/auth/register - Create an account
///
/// Accounts start inactive; an admin activates them. A live preapproval for
/// the email decides the roles, otherwise the requested roles are normalized.
///
/// Expected Input:
/// ```json
/// { "email": "ana@example.com", "password": "********", "name": "Ana", "roles": ["user"] }
/// ```
pub async fn register_post(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Registration> {
    let Json(request) = payload?;
    let registration = state.accounts.register(request).await?;
    Ok(ApiResponse::created(registration))
}

// handlers/elevated/admin/users.rs - Account administration handlers
//
// GET    /api/admin/users
// GET    /api/admin/users/:id
// PATCH  /api/admin/users/:id
// DELETE /api/admin/users/:id
// PUT    /api/admin/users/:id/{activate,deactivate,grant-admin,revoke-admin}

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Identity;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::account_service::ProfilePatch;

pub async fn list_get(State(state): State<AppState>, Extension(caller): Extension<AuthUser>) -> ApiResult<Vec<Identity>> {
    Ok(ApiResponse::success(state.accounts.list(&caller).await?))
}

pub async fn user_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Identity> {
    Ok(ApiResponse::success(state.accounts.get(&caller, id).await?))
}

/// Name, document number and phone. `null` clears the optional ones.
pub async fn profile_patch(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProfilePatch>, JsonRejection>,
) -> ApiResult<Identity> {
    let Json(patch) = payload?;
    Ok(ApiResponse::success(state.accounts.update_profile(&caller, id, patch).await?))
}

/// Admins cannot delete themselves.
pub async fn user_delete(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    state.accounts.delete(&caller, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

pub async fn activate_put(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Identity> {
    Ok(ApiResponse::success(state.accounts.set_active(&caller, id, true).await?))
}

pub async fn deactivate_put(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Identity> {
    Ok(ApiResponse::success(state.accounts.set_active(&caller, id, false).await?))
}

/// Role changes on the caller's own account are refused.
pub async fn grant_admin_put(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Identity> {
    Ok(ApiResponse::success(state.accounts.set_admin(&caller, id, true).await?))
}

pub async fn revoke_admin_put(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Identity> {
    Ok(ApiResponse::success(state.accounts.set_admin(&caller, id, false).await?))
}

// handlers/protected/clients/profile.rs - Client profile handlers
//
// GET   /api/clients/me
// GET   /api/clients/:id
// PATCH /api/clients/:id

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Client, ClientPatch};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /api/clients/me - The caller's own client profile
pub async fn me_get(State(state): State<AppState>, Extension(caller): Extension<AuthUser>) -> ApiResult<Client> {
    Ok(ApiResponse::success(state.clients.me(&caller).await?))
}

/// GET /api/clients/:id - Owner or admin; anyone else gets 404
pub async fn client_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Client> {
    Ok(ApiResponse::success(state.clients.get(&caller, id).await?))
}

/// PATCH /api/clients/:id - Owners edit contact fields, admins edit everything
///
/// `null` clears an optional field.
pub async fn client_patch(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ClientPatch>, JsonRejection>,
) -> ApiResult<Client> {
    let Json(patch) = payload?;
    Ok(ApiResponse::success(state.clients.update(&caller, id, patch).await?))
}

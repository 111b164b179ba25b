// handlers/elevated/admin/clients.rs - Client administration handlers
//
// GET    /api/admin/clients
// POST   /api/admin/clients
// PATCH  /api/admin/clients/:id/assign
// DELETE /api/admin/documents/:document_number

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Client, ClientWithOwner};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::client_service::{AssignRequest, CreateClientRequest};
use crate::services::document_service::PurgeReport;

/// Every client with its owning account.
pub async fn list_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<Vec<ClientWithOwner>> {
    Ok(ApiResponse::success(state.clients.list(&caller).await?))
}

/// POST /api/admin/clients - Create the client profile of an existing account
///
/// The document number defaults to the account's and selects the client's
/// storage key-space.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<CreateClientRequest>, JsonRejection>,
) -> ApiResult<Client> {
    let Json(request) = payload?;
    Ok(ApiResponse::created(state.clients.create(&caller, request).await?))
}

/// `{"adminId": null}` unassigns.
pub async fn assign_patch(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> ApiResult<Client> {
    let Json(request) = payload?;
    Ok(ApiResponse::success(state.clients.assign(&caller, id, request.admin_id).await?))
}

/// Deletes a client's whole key-space and its document records.
pub async fn purge_delete(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(document_number): Path<String>,
) -> ApiResult<PurgeReport> {
    Ok(ApiResponse::success(state.documents.purge_client(&caller, &document_number).await?))
}

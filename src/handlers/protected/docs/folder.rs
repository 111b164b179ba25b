// handlers/protected/docs/folder.rs - POST /api/docs/folder handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::document_service::FolderMarker;

#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    pub subfolder: Option<String>,
}

/// POST /api/docs/folder - Create an empty folder marker
pub async fn folder_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<FolderRequest>, JsonRejection>,
) -> ApiResult<FolderMarker> {
    let Json(request) = payload?;
    let marker = state
        .documents
        .create_folder(&caller, request.subfolder.as_deref())
        .await?;
    Ok(ApiResponse::created(marker))
}

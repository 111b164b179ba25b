// handlers/protected/docs/download_url.rs - GET /api/docs/download-url handler

use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::document_service::SignedUrl;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlQuery {
    pub key: String,
    /// Seconds; defaults to the configured lifetime.
    pub expires_in: Option<i64>,
}

/// GET /api/docs/download-url?key=.. - Issue a signed download link
pub async fn download_url_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Query(query): Query<DownloadUrlQuery>,
) -> ApiResult<SignedUrl> {
    let signed = state
        .documents
        .download_url(&caller, &query.key, query.expires_in)
        .await?;
    Ok(ApiResponse::success(signed))
}

// handlers/public/files.rs - GET /files/*key handler (signed links)

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// GET /files/*key?expires=<unix>&signature=<hex> - Stream an object
///
/// The link itself is the credential: signature and expiry are checked before
/// any bytes are read.
pub async fn signed_get(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let download = state
        .documents
        .fetch_signed(&key, query.expires, &query.signature)
        .await?;

    let content_type = download
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], download.bytes))
}

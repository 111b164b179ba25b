// handlers/protected/docs/upload.rs - POST /api/docs/upload handler

use axum::{
    extract::{Multipart, State},
    Extension,
};
use tracing::debug;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::document_service::{Upload, UploadedObject};

/// POST /api/docs/upload - Store one file in a logical folder
///
/// Multipart fields:
/// - `file` (required): the file part; its file name is sanitized
/// - `subfolder` (optional): logical path, e.g. `clientes/123/contratos`
///
/// The storage key is always resolved server-side and returned.
pub async fn upload_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<UploadedObject> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut subfolder: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("archivo").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                file = Some((name, content_type, bytes.to_vec()));
            }
            Some("subfolder") => subfolder = Some(field.text().await?),
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let (original_name, content_type, bytes) = file.ok_or_else(|| ApiError::bad_request("A file field is required"))?;
    let uploaded = state
        .documents
        .upload(
            &caller,
            Upload {
                original_name,
                content_type,
                bytes,
                subfolder,
            },
        )
        .await?;
    Ok(ApiResponse::created(uploaded))
}

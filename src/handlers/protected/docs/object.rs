// handlers/protected/docs/object.rs - DELETE /api/docs/object handler

use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
    pub key: String,
}

/// DELETE /api/docs/object?key=.. - Remove one object and its metadata
pub async fn object_delete(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Query(query): Query<ObjectQuery>,
) -> ApiResult<Value> {
    state.documents.delete(&caller, &query.key).await?;
    Ok(ApiResponse::success(json!({ "key": query.key, "deleted": true })))
}

// handlers/protected/tasks/item.rs - Single-task handlers
//
// GET    /api/tasks/:id
// PATCH  /api/tasks/:id
// DELETE /api/tasks/:id
// POST   /api/tasks/:id/comments

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::TaskView;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::task_service::UpdateTaskRequest;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

pub async fn task_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<TaskView> {
    Ok(ApiResponse::success(state.tasks.get(&caller, id).await?))
}

/// Assignee and client changes additionally require the admin role.
pub async fn task_patch(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<TaskView> {
    let Json(request) = payload?;
    Ok(ApiResponse::success(state.tasks.update(&caller, id, request).await?))
}

pub async fn task_delete(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    state.tasks.delete(&caller, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

pub async fn comment_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult<TaskView> {
    let Json(request) = payload?;
    Ok(ApiResponse::created(state.tasks.comment(&caller, id, &request.text).await?))
}

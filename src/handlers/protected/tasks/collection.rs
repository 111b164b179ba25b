// handlers/protected/tasks/collection.rs - Task collection handlers
//
// GET  /api/tasks
// POST /api/tasks
// GET  /api/tasks/dashboard

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::database::models::TaskView;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::task_service::{CreateTaskRequest, Dashboard, TaskList, TaskListParams};

/// GET /api/tasks - Filtered, paginated task list
///
/// Query parameters: `status` (comma-separated), `priority`, `clientId`,
/// `search`, `assignedTo` (`mine` or an id, admins only), `overdue`,
/// `upcoming`, `page`, `limit`.
pub async fn list_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Query(params): Query<TaskListParams>,
) -> ApiResult<TaskList> {
    Ok(ApiResponse::success(state.tasks.list(&caller, params).await?))
}

/// POST /api/tasks - Create and assign a task (admin)
pub async fn create_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<TaskView> {
    let Json(request) = payload?;
    Ok(ApiResponse::created(state.tasks.create(&caller, request).await?))
}

/// GET /api/tasks/dashboard - Counters and the next tasks due
pub async fn dashboard_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<Dashboard> {
    Ok(ApiResponse::success(state.tasks.dashboard(&caller).await?))
}

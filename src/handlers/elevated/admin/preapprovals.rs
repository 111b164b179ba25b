// handlers/elevated/admin/preapprovals.rs - Preapproval handlers
//
// GET  /api/admin/preapprovals
// POST /api/admin/preapprovals

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::database::models::PreapprovalEntry;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::preapproval_service::PreapprovalRequest;

/// Unexpired entries, used or not.
pub async fn list_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<Vec<PreapprovalEntry>> {
    Ok(ApiResponse::success(state.preapprovals.list(&caller).await?))
}

/// POST /api/admin/preapprovals - Pre-assign roles to an email
///
/// Expected Input:
/// ```json
/// { "email": "socio@example.com", "roles": ["admin"], "daysValid": 30, "notes": "..." }
/// ```
///
/// Re-posting the same email re-issues the entry and resets `used`.
pub async fn upsert_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<PreapprovalRequest>, JsonRejection>,
) -> ApiResult<PreapprovalEntry> {
    let Json(request) = payload?;
    Ok(ApiResponse::created(state.preapprovals.upsert(&caller, request).await?))
}

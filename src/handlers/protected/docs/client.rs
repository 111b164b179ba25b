// handlers/protected/docs/client.rs - GET /api/docs/client/:document_number handler

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::{Page, Paginated, StoredDocument};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// GET /api/docs/client/:document_number - A client's document records
///
/// Non-admins may only list their own document number.
pub async fn client_documents_get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(document_number): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Paginated<StoredDocument>> {
    let page = Page::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let documents = state
        .documents
        .list_client_documents(&caller, &document_number, page)
        .await?;
    Ok(ApiResponse::success(documents))
}

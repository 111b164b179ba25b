// handlers/public/auth/logout.rs - POST /api/auth/logout handler

use axum::{extract::State, http::header, response::IntoResponse};
use serde_json::json;

use super::cookie::clear_refresh_cookie;
use crate::app::AppState;
use crate::middleware::ApiResponse;

/// POST /api/auth/logout - Clear the refresh cookie
///
/// Tokens are stateless; outstanding access tokens simply run out.
pub async fn logout_post(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_refresh_cookie(state.config.security.secure_cookies))],
        ApiResponse::success(json!({ "loggedOut": true })),
    )
}

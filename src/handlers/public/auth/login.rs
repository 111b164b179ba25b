// handlers/public/auth/login.rs - POST /api/auth/login handler

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    Json,
};

use super::cookie::refresh_cookie;
use super::session_body;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::account_service::LoginRequest;

/// POST /api/auth/login - Authenticate and receive an access token
///
/// The refresh token is only ever delivered as an HTTP-only cookie.
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": { "user": { "id": "...", "roles": ["user"] }, "accessToken": "eyJ...", "expiresIn": 900 }
/// }
/// ```
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let session = state.accounts.login(request).await?;

    let cookie = refresh_cookie(
        &session.tokens.refresh_token,
        state.tokens.refresh_ttl_secs(),
        state.config.security.secure_cookies,
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        ApiResponse::success(session_body(&session)),
    ))
}

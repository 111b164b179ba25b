// handlers/public/auth/refresh.rs - POST /api/auth/refresh handler

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
};

use super::cookie::{read_refresh_cookie, refresh_cookie};
use super::session_body;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::ApiResponse;

/// POST /api/auth/refresh - Exchange the refresh cookie for a new pair
///
/// Account state is looked up again, so deactivated accounts stop refreshing
/// immediately. The cookie is rotated on success.
pub async fn refresh_post(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    let token = read_refresh_cookie(&headers);
    let session = state.accounts.refresh(token.as_deref()).await?;

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

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{AccessClaims, TokenError};
use crate::error::ApiError;
use crate::roles::Roles;

/// Authenticated caller decoded from the access token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub roles: Roles,
    pub active: bool,
}

impl From<AccessClaims> for AuthUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            roles: claims.roles,
            active: claims.active,
        }
    }
}

/// Access-token middleware: verifies the bearer credential and injects `AuthUser`
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;

    let claims = state.tokens.verify_access(&token).map_err(|e| {
        warn!("Rejected access token: {}", e);
        match e {
            TokenError::Expired => ApiError::unauthorized("Access token expired"),
            _ => ApiError::unauthorized("Invalid access token"),
        }
    })?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
pub fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, &'static str> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty bearer token"),
        None => Err("Authorization header must use Bearer token format"),
    }
}

// handlers/public/auth/mod.rs - Public authentication handlers
//
// Token acquisition endpoints. Nothing here requires a bearer credential.

use serde_json::{json, Value};

use crate::services::account_service::Session;

pub mod cookie;
pub mod login; // POST /api/auth/login
pub mod logout; // POST /api/auth/logout
pub mod refresh; // POST /api/auth/refresh
pub mod register; // POST /api/auth/register

pub use login::login_post;
pub use logout::logout_post;
pub use refresh::refresh_post;
pub use register::register_post;

/// Response body shared by login and refresh. The refresh token stays out of it.
fn session_body(session: &Session) -> Value {
    json!({
        "user": session.user,
        "accessToken": session.tokens.access_token,
        "expiresIn": session.tokens.expires_in,
    })
}

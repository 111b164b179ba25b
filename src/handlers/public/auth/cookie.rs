// handlers/public/auth/cookie.rs - Refresh-token cookie helpers

use axum::http::{header, HeaderMap};

pub const REFRESH_COOKIE: &str = "refreshToken";

/// `Set-Cookie` value carrying a refresh token. Cross-site deployments need
/// `SameSite=None`, which browsers only accept together with `Secure`.
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; {}",
        REFRESH_COOKIE,
        token,
        max_age_secs.max(0),
        same_site(secure)
    )
}

pub fn clear_refresh_cookie(secure: bool) -> String {
    format!("{}=; HttpOnly; Path=/; Max-Age=0; {}", REFRESH_COOKIE, same_site(secure))
}

fn same_site(secure: bool) -> &'static str {
    if secure {
        "SameSite=None; Secure"
    } else {
        "SameSite=Lax"
    }
}

/// First `refreshToken` value across all `Cookie` headers.
pub fn read_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == REFRESH_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_attributes_follow_secure_flag() {
        let lax = refresh_cookie("abc", 60, false);
        assert!(lax.starts_with("refreshToken=abc; HttpOnly; Path=/; Max-Age=60"));
        assert!(lax.ends_with("SameSite=Lax"));

        let secure = refresh_cookie("abc", 60, true);
        assert!(secure.ends_with("SameSite=None; Secure"));

        assert!(clear_refresh_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn reads_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; refreshToken=tok.en; b=2"));
        assert_eq!(read_refresh_cookie(&headers).as_deref(), Some("tok.en"));

        let mut empty = HeaderMap::new();
        empty.insert(header::COOKIE, HeaderValue::from_static("refreshToken="));
        assert_eq!(read_refresh_cookie(&empty), None);
    }
}

mod common;

use anyhow::Result;
use reqwest::{header, StatusCode};
use serde_json::json;

use common::{read, refresh_cookie, TestServer, ADMIN_EMAIL, PASSWORD};

#[tokio::test]
async fn register_requires_activation_before_login() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server
        .http
        .post(server.url("/api/auth/register"))
        .json(&json!({
            "email": "  Nueva@Koop.Test ",
            "password": PASSWORD,
            "name": "Nueva",
        }))
        .send()
        .await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["pendingActivation"], true);
    assert_eq!(body["data"]["user"]["email"], "nueva@koop.test");
    assert_eq!(body["data"]["user"]["roles"], json!(["user"]));
    assert!(body["data"]["user"].get("passwordHash").is_none());
    let id = body["data"]["user"]["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = read(server.login_response("nueva@koop.test", PASSWORD).await?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let admin = server.admin_token().await?;
    let res = server.put(&format!("/api/admin/users/{}/activate", id), &admin).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.login_response("NUEVA@koop.test", PASSWORD).await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn duplicate_email_conflicts() -> Result<()> {
    let server = TestServer::spawn().await?;
    let res = server
        .http
        .post(server.url("/api/auth/register"))
        .json(&json!({ "email": ADMIN_EMAIL.to_uppercase(), "password": PASSWORD, "name": "Otra" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn bad_credentials_share_one_message() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, wrong_password) = read(server.login_response(ADMIN_EMAIL, "incorrecta1").await?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, unknown) = read(server.login_response("nadie@koop.test", PASSWORD).await?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password["error"], unknown["error"]);
    assert_eq!(wrong_password["success"], false);
    Ok(())
}

#[tokio::test]
async fn login_sets_http_only_refresh_cookie() -> Result<()> {
    let server = TestServer::spawn().await?;
    let res = server.login_response(ADMIN_EMAIL, PASSWORD).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let set_cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(refresh_cookie(&res).is_some());

    let body: serde_json::Value = res.json().await?;
    assert!(body["data"]["accessToken"].is_string());
    assert!(body["data"].get("refreshToken").is_none());
    assert_eq!(body["data"]["user"]["roles"], json!(["admin"]));
    Ok(())
}

#[tokio::test]
async fn whoami_requires_bearer_and_returns_live_record() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server.http.get(server.url("/api/auth/whoami")).send().await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let res = server.get("/api/auth/whoami", "not-a-token").await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let token = server.admin_token().await?;
    let (status, body) = read(server.get("/api/auth/whoami", &token).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], ADMIN_EMAIL);
    assert_eq!(body["data"]["roles"], json!(["admin"]));
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_token_types_do_not_mix() -> Result<()> {
    let server = TestServer::spawn().await?;
    let res = server.login_response(ADMIN_EMAIL, PASSWORD).await?;
    let refresh = refresh_cookie(&res).unwrap_or_default();
    let body: serde_json::Value = res.json().await?;
    let access = body["data"]["accessToken"].as_str().unwrap_or_default().to_string();

    let res = server
        .http
        .post(server.url("/api/auth/refresh"))
        .header(header::COOKIE, format!("refreshToken={}", refresh))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(refresh_cookie(&res).is_some());
    let body: serde_json::Value = res.json().await?;
    assert!(body["data"]["accessToken"].is_string());

    // Refresh token as bearer
    let res = server.get("/api/auth/whoami", &refresh).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Access token as refresh cookie
    let res = server
        .http
        .post(server.url("/api/auth/refresh"))
        .header(header::COOKIE, format!("refreshToken={}", access))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // No cookie at all
    let res = server.http.post(server.url("/api/auth/refresh")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn deactivated_account_cannot_refresh() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (user, _) = server.user_with_token("ana@koop.test").await?;
    let res = server.login_response("ana@koop.test", PASSWORD).await?;
    let refresh = refresh_cookie(&res).unwrap_or_default();

    let admin = server.admin_token().await?;
    let res = server.put(&format!("/api/admin/users/{}/deactivate", user.id), &admin).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .http
        .post(server.url("/api/auth/refresh"))
        .header(header::COOKIE, format!("refreshToken={}", refresh))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn logout_clears_cookie() -> Result<()> {
    let server = TestServer::spawn().await?;
    let res = server.http.post(server.url("/api/auth/logout")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let set_cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.starts_with("refreshToken=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_bad_request() -> Result<()> {
    let server = TestServer::spawn().await?;
    let res = server
        .http
        .post(server.url("/api/auth/login"))
        .header(header::CONTENT_TYPE, "application/json")
        .body("{not json")
        .send()
        .await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_JSON");
    Ok(())
}

#![allow(dead_code)]

use anyhow::{Context, Result};
use reqwest::{header, Client, Response, StatusCode};
use serde_json::{json, Value};

use koop_api_rust::app::{router, AppState, Backends};
use koop_api_rust::auth::CredentialHasher;
use koop_api_rust::config::AppConfig;
use koop_api_rust::database::models::Identity;
use koop_api_rust::database::Stores;
use koop_api_rust::roles::Roles;

pub const ADMIN_EMAIL: &str = "admin@koop.test";
pub const PASSWORD: &str = "Secreta123";

/// One in-process server per test, on its own port and in-memory backends.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub stores: Stores,
    pub http: Client,
    hasher: CredentialHasher,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::development();
        config.server.port = port;
        config.storage.public_base_url = base_url.clone();
        config.api.enable_request_logging = false;
        // Cheap hashing keeps the suite fast
        config.security.password_memory_kib = 1024;
        config.security.password_iterations = 1;

        let backends = Backends::memory();
        let stores = backends.stores.clone();
        let hasher = CredentialHasher::from_config(&config.security)?;
        let app = router(AppState::build(config, backends)?);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url,
            stores,
            http: Client::new(),
            hasher,
        };
        server.seed_user(ADMIN_EMAIL, Roles::ADMIN, true).await?;
        Ok(server)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Writes an identity straight into the store, bypassing registration.
    pub async fn seed_user(&self, email: &str, roles: Roles, active: bool) -> Result<Identity> {
        let mut identity = Identity::new(email, "Usuario Prueba", self.hasher.hash(PASSWORD)?, roles);
        identity.active = active;
        Ok(self.stores.identities.create(identity).await?)
    }

    pub async fn login_response(&self, email: &str, password: &str) -> Result<Response> {
        Ok(self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?)
    }

    /// Access token for an active account seeded with `PASSWORD`.
    pub async fn token(&self, email: &str) -> Result<String> {
        let res = self.login_response(email, PASSWORD).await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        let body: Value = res.json().await?;
        body["data"]["accessToken"]
            .as_str()
            .map(str::to_string)
            .context("no access token in login response")
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.token(ADMIN_EMAIL).await
    }

    /// Seeds an active account and logs it in.
    pub async fn user_with_token(&self, email: &str) -> Result<(Identity, String)> {
        let identity = self.seed_user(email, Roles::USER, true).await?;
        let token = self.token(email).await?;
        Ok((identity, token))
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self.http.get(self.url(path)).bearer_auth(token).send().await?)
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self.http.delete(self.url(path)).bearer_auth(token).send().await?)
    }

    pub async fn post_json(&self, path: &str, token: &str, body: &Value) -> Result<Response> {
        Ok(self.http.post(self.url(path)).bearer_auth(token).json(body).send().await?)
    }

    pub async fn patch_json(&self, path: &str, token: &str, body: &Value) -> Result<Response> {
        Ok(self.http.patch(self.url(path)).bearer_auth(token).json(body).send().await?)
    }

    pub async fn put(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self.http.put(self.url(path)).bearer_auth(token).send().await?)
    }

    /// Multipart upload of one small text file.
    pub async fn upload(&self, token: &str, subfolder: Option<&str>, name: &str, content: &str) -> Result<Response> {
        let part = reqwest::multipart::Part::bytes(content.as_bytes().to_vec())
            .file_name(name.to_string())
            .mime_str("text/plain")?;
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(folder) = subfolder {
            form = form.text("subfolder", folder.to_string());
        }
        Ok(self
            .http
            .post(self.url("/api/docs/upload"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?)
    }
}

/// Status plus parsed JSON body.
pub async fn read(res: Response) -> Result<(StatusCode, Value)> {
    let status = res.status();
    let body = res.json::<Value>().await?;
    Ok((status, body))
}

/// The `refreshToken` value from a response's `Set-Cookie`, if any.
pub fn refresh_cookie(res: &Response) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("refreshToken="))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
}

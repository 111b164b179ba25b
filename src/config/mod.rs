use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Empty means "run on in-memory stores".
    pub url: String,
    pub database_name: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub password_memory_kib: u32,
    pub password_iterations: u32,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_root: String,
    pub base_prefix: String,
    pub personal_folders: Vec<String>,
    pub client_root: String,
    /// Client-regime uploads keep their exact sanitized name (last write wins).
    pub exact_client_names: bool,
    pub max_file_mb: u64,
    pub signing_secret: String,
    pub public_base_url: String,
    pub signed_url_ttl_secs: u64,
}

impl StorageConfig {
    pub fn max_file_bytes(&self) -> usize {
        (self.max_file_mb as usize).saturating_mul(1024 * 1024)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("KOOP_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_NAME") {
            self.database.database_name = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("ACCESS_TOKEN_SECRET") {
            self.security.access_token_secret = v;
        }
        if let Ok(v) = env::var("REFRESH_TOKEN_SECRET") {
            self.security.refresh_token_secret = v;
        }
        if let Some(secs) = env::var("ACCESS_TOKEN_EXPIRES_IN").ok().and_then(|v| parse_duration_secs(&v)) {
            self.security.access_token_ttl_secs = secs;
        }
        if let Some(secs) = env::var("REFRESH_TOKEN_EXPIRES_IN").ok().and_then(|v| parse_duration_secs(&v)) {
            self.security.refresh_token_ttl_secs = secs;
        }
        if let Ok(v) = env::var("PASSWORD_MEMORY_KIB") {
            self.security.password_memory_kib = v.parse().unwrap_or(self.security.password_memory_kib);
        }
        if let Ok(v) = env::var("PASSWORD_ITERATIONS") {
            self.security.password_iterations = v.parse().unwrap_or(self.security.password_iterations);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_BACKEND") {
            match v.trim().to_ascii_lowercase().as_str() {
                "memory" => self.storage.backend = StorageBackend::Memory,
                "local" => self.storage.backend = StorageBackend::Local,
                other => tracing::warn!("Ignoring unknown STORAGE_BACKEND '{}'", other),
            }
        }
        if let Ok(v) = env::var("STORAGE_LOCAL_ROOT") {
            self.storage.local_root = v;
        }
        if let Ok(v) = env::var("S3_BASE_PREFIX") {
            self.storage.base_prefix = v.trim().trim_matches('/').to_string();
        }
        if let Ok(v) = env::var("DOCS_ALLOWED_SUBFOLDERS") {
            let folders = split_list(&v);
            if !folders.is_empty() {
                self.storage.personal_folders = folders;
            }
        }
        if let Ok(v) = env::var("DOCS_EXACT_CLIENT_NAMES") {
            self.storage.exact_client_names = v.parse().unwrap_or(self.storage.exact_client_names);
        }
        if let Ok(v) = env::var("DOCS_MAX_FILE_MB") {
            self.storage.max_file_mb = v.parse().unwrap_or(self.storage.max_file_mb);
        }
        if let Ok(v) = env::var("STORAGE_SIGNING_SECRET") {
            self.storage.signing_secret = v;
        }
        if let Ok(v) = env::var("STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("STORAGE_SIGNED_URL_TTL_SECS") {
            self.storage.signed_url_ttl_secs = v.parse().unwrap_or(self.storage.signed_url_ttl_secs);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 4000 },
            database: DatabaseConfig {
                url: String::new(),
                database_name: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 30 * 1024 * 1024, // 30MB, above the upload cap
            },
            security: SecurityConfig {
                access_token_secret: "dev-access-secret".to_string(),
                refresh_token_secret: "dev-refresh-secret".to_string(),
                access_token_ttl_secs: 15 * 60,
                refresh_token_ttl_secs: 7 * 24 * 60 * 60,
                password_memory_kib: 19 * 1024,
                password_iterations: 2,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                secure_cookies: false,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                local_root: "./data/objects".to_string(),
                base_prefix: "koop".to_string(),
                personal_folders: vec!["documentos_iniciales".to_string()],
                client_root: "clientes".to_string(),
                exact_client_names: false,
                max_file_mb: 25,
                signing_secret: "dev-signing-secret".to_string(),
                public_base_url: "http://localhost:4000".to_string(),
                signed_url_ttl_secs: 600,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::production();
        config.environment = Environment::Staging;
        config.api.enable_request_logging = true;
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 4000 },
            database: DatabaseConfig {
                url: String::new(),
                database_name: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 30 * 1024 * 1024,
            },
            // No secret defaults: startup fails until they are provided
            security: SecurityConfig {
                access_token_secret: String::new(),
                refresh_token_secret: String::new(),
                access_token_ttl_secs: 15 * 60,
                refresh_token_ttl_secs: 7 * 24 * 60 * 60,
                password_memory_kib: 19 * 1024,
                password_iterations: 2,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                secure_cookies: true,
            },
            storage: StorageConfig {
                backend: StorageBackend::Local,
                local_root: "/var/lib/koop/objects".to_string(),
                base_prefix: "koop".to_string(),
                personal_folders: vec!["documentos_iniciales".to_string()],
                client_root: "clientes".to_string(),
                exact_client_names: false,
                max_file_mb: 25,
                signing_secret: String::new(),
                public_base_url: "https://api.example.com".to_string(),
                signed_url_ttl_secs: 600,
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Parses `900`, `45s`, `15m`, `12h` or `7d` into seconds.
pub fn parse_duration_secs(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c.to_ascii_lowercase()),
        _ => (raw, 's'),
    };
    let value: i64 = digits.trim().parse().ok()?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };
    value.checked_mul(multiplier).filter(|secs| *secs > 0)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Process-wide snapshot used by the binaries; the application itself receives
// its config by value through AppState.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

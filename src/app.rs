// app.rs - Application state and router assembly
//
// Shared by the server binary and the integration tests so both serve the
// exact same route table.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::auth::{CredentialHasher, TokenService};
use crate::config::{AppConfig, StorageBackend};
use crate::database::{DatabaseManager, MemoryStore, PgStore, Stores};
use crate::handlers::{elevated, protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::{AccountService, ClientService, DocumentService, PreapprovalService, TaskService};
use crate::storage::{KeyNamespace, LocalObjectStore, MemoryObjectStore, ObjectStore, UrlSigner};

/// Everything handlers need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub accounts: Arc<AccountService>,
    pub preapprovals: Arc<PreapprovalService>,
    pub clients: Arc<ClientService>,
    pub documents: Arc<DocumentService>,
    pub tasks: Arc<TaskService>,
    pub database: Option<DatabaseManager>,
}

/// Persistence and object storage, chosen from config.
pub struct Backends {
    pub stores: Stores,
    pub objects: Arc<dyn ObjectStore>,
    pub database: Option<DatabaseManager>,
}

impl Backends {
    pub fn memory() -> Self {
        Self {
            stores: Stores::from_backend(Arc::new(MemoryStore::new())),
            objects: Arc::new(MemoryObjectStore::new()),
            database: None,
        }
    }

    /// PostgreSQL when `DATABASE_URL` is set, in-memory stores otherwise.
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let (stores, database) = if config.database.url.trim().is_empty() {
            warn!("DATABASE_URL not set; using in-memory stores");
            (Stores::from_backend(Arc::new(MemoryStore::new())), None)
        } else {
            let manager = DatabaseManager::connect(&config.database)
                .await
                .context("connecting to PostgreSQL")?;
            manager.migrate().await.context("applying migrations")?;
            (Stores::from_backend(Arc::new(PgStore::new(&manager))), Some(manager))
        };

        let objects: Arc<dyn ObjectStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryObjectStore::new()),
            StorageBackend::Local => {
                let store = LocalObjectStore::open(&config.storage.local_root)
                    .await
                    .with_context(|| format!("opening object store at {}", config.storage.local_root))?;
                info!("Object store rooted at {}", store.root().display());
                Arc::new(store)
            }
        };

        Ok(Self {
            stores,
            objects,
            database,
        })
    }
}

impl AppState {
    /// Fails closed on missing secrets or bad hashing parameters.
    pub fn build(config: AppConfig, backends: Backends) -> anyhow::Result<Self> {
        if config.storage.signing_secret.is_empty() {
            anyhow::bail!("STORAGE_SIGNING_SECRET is required");
        }

        let tokens = Arc::new(TokenService::new(&config.security)?);
        let hasher = CredentialHasher::from_config(&config.security)?;
        let namespace = Arc::new(KeyNamespace::from_config(&config.storage));
        let signer = Arc::new(UrlSigner::new(
            &config.storage.signing_secret,
            &config.storage.public_base_url,
        ));
        let stores = backends.stores;

        let documents = DocumentService::new(
            stores.clone(),
            backends.objects,
            namespace,
            signer,
            config.storage.max_file_bytes(),
            config.storage.signed_url_ttl_secs as i64,
        );

        Ok(Self {
            accounts: Arc::new(AccountService::new(stores.clone(), tokens.clone(), hasher)),
            preapprovals: Arc::new(PreapprovalService::new(stores.clone())),
            clients: Arc::new(ClientService::new(stores.clone())),
            documents: Arc::new(documents),
            tasks: Arc::new(TaskService::new(stores)),
            tokens,
            database: backends.database,
            config: Arc::new(config),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth_protected_routes())
        .merge(docs_routes())
        .merge(client_routes())
        .merge(task_routes())
        .merge(admin_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    let mut app = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        .route("/files/*key", get(public::files::signed_get))
        // JWT required
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes));

    if state.config.security.enable_cors {
        app = app.layer(cors_layer(&state.config));
    }
    if state.config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app.with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/auth/register", post(auth::register_post))
        .route("/api/auth/login", post(auth::login_post))
        .route("/api/auth/refresh", post(auth::refresh_post))
        .route("/api/auth/logout", post(auth::logout_post))
}

fn auth_protected_routes() -> Router<AppState> {
    Router::new().route("/api/auth/whoami", get(protected::auth::whoami_get))
}

fn docs_routes() -> Router<AppState> {
    use protected::docs;

    Router::new()
        .route("/api/docs/upload", post(docs::upload_post))
        .route("/api/docs/folder", post(docs::folder_post))
        .route("/api/docs/recent", get(docs::recent_get))
        .route("/api/docs/download-url", get(docs::download_url_get))
        .route("/api/docs/object", delete(docs::object_delete))
        .route("/api/docs/health", get(docs::health_get))
        .route("/api/docs/client/:document_number", get(docs::client_documents_get))
}

fn client_routes() -> Router<AppState> {
    use protected::clients;

    Router::new()
        .route("/api/clients/me", get(clients::me_get))
        .route("/api/clients/:id", get(clients::client_get).patch(clients::client_patch))
}

fn task_routes() -> Router<AppState> {
    use protected::tasks;

    Router::new()
        .route("/api/tasks", get(tasks::list_get).post(tasks::create_post))
        .route("/api/tasks/dashboard", get(tasks::dashboard_get))
        .route(
            "/api/tasks/:id",
            get(tasks::task_get).patch(tasks::task_patch).delete(tasks::task_delete),
        )
        .route("/api/tasks/:id/comments", post(tasks::comment_post))
}

fn admin_routes() -> Router<AppState> {
    use elevated::admin;

    Router::new()
        // Accounts
        .route("/api/admin/users", get(admin::users::list_get))
        .route(
            "/api/admin/users/:id",
            get(admin::users::user_get)
                .patch(admin::users::profile_patch)
                .delete(admin::users::user_delete),
        )
        .route("/api/admin/users/:id/activate", put(admin::users::activate_put))
        .route("/api/admin/users/:id/deactivate", put(admin::users::deactivate_put))
        .route("/api/admin/users/:id/grant-admin", put(admin::users::grant_admin_put))
        .route("/api/admin/users/:id/revoke-admin", put(admin::users::revoke_admin_put))
        // Preapprovals
        .route(
            "/api/admin/preapprovals",
            get(admin::preapprovals::list_get).post(admin::preapprovals::upsert_post),
        )
        // Clients and their key-spaces
        .route("/api/admin/clients", get(admin::clients::list_get).post(admin::clients::create_post))
        .route("/api/admin/clients/:id/assign", patch(admin::clients::assign_patch))
        .route("/api/admin/documents/:document_number", delete(admin::clients::purge_delete))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Koop API (Rust)",
            "version": version,
            "description": "Legal-practice back office: accounts, clients, tasks and documents",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/api/auth/register, /api/auth/login, /api/auth/refresh, /api/auth/logout (public)",
                "files": "/files/*key?expires&signature (signed link)",
                "auth": "/api/auth/whoami (protected)",
                "docs": "/api/docs/* (protected)",
                "clients": "/api/clients/* (protected)",
                "tasks": "/api/tasks/* (protected)",
                "admin": "/api/admin/* (protected, admin role)"
            }
        }
    }))
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> Json<Value> {
    let database = match &state.database {
        None => "memory",
        Some(db) => match db.health_check().await {
            Ok(()) => "ok",
            Err(e) => {
                warn!("Database health check failed: {}", e);
                "unavailable"
            }
        },
    };

    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "database": database,
            "environment": state.config.environment,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        let state = AppState::build(AppConfig::development(), Backends::memory()).unwrap();
        router(state)
    }

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_memory_backend() {
        let res = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["data"]["database"], "memory");
    }

    #[tokio::test]
    async fn protected_routes_need_bearer() {
        for path in ["/api/auth/whoami", "/api/tasks", "/api/admin/users"] {
            let res = app()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{}", path);
            assert_eq!(body_json(res).await["code"], "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn unsigned_file_links_are_refused() {
        let res = app()
            .oneshot(Request::get("/files/koop/x/a.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_ne!(res.status(), StatusCode::OK);
    }

    #[test]
    fn build_requires_signing_secret() {
        let mut config = AppConfig::development();
        config.storage.signing_secret.clear();
        assert!(AppState::build(config, Backends::memory()).is_err());
    }
}

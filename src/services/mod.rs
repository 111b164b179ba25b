// Service layer: one struct per area, each holding the collaborators it needs.
// Handlers and the CLI call these; nothing below talks HTTP.

pub mod account_service;
pub mod client_service;
pub mod document_service;
pub mod preapproval_service;
pub mod task_service;

use thiserror::Error;
use tracing::error;

use crate::auth::{PasswordError, TokenError};
use crate::database::DatabaseError;
use crate::policy::PolicyError;
use crate::storage::{NamespaceError, StorageError};

pub use account_service::AccountService;
pub use client_service::ClientService;
pub use document_service::DocumentService;
pub use preapproval_service::PreapprovalService;
pub use task_service::TaskService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    TooLarge(String),

    /// Database or object store failure. The detail stays server-side.
    #[error("Upstream failure: {0}")]
    Upstream(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ServiceError::NotFound(msg),
            DatabaseError::Conflict(msg) => ServiceError::Conflict(msg),
            other => {
                error!("Database error: {}", other);
                ServiceError::Upstream(other.to_string())
            }
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ServiceError::NotFound("File not found".to_string()),
            StorageError::InvalidKey(key) => ServiceError::InvalidInput(format!("Invalid key: {}", key)),
            other => {
                error!("Object store error: {}", other);
                ServiceError::Upstream(other.to_string())
            }
        }
    }
}

impl From<NamespaceError> for ServiceError {
    fn from(err: NamespaceError) -> Self {
        match err {
            NamespaceError::ClientNotFound => ServiceError::NotFound(err.to_string()),
            other => ServiceError::InvalidInput(other.to_string()),
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ServiceError::Unauthenticated("Token expired".to_string()),
            TokenError::Invalid | TokenError::WrongType(_) => {
                ServiceError::Unauthenticated("Invalid token".to_string())
            }
            other => {
                error!("Token service error: {}", other);
                ServiceError::Upstream(other.to_string())
            }
        }
    }
}

impl From<PolicyError> for ServiceError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Unauthenticated => ServiceError::Unauthenticated(err.to_string()),
            PolicyError::Forbidden(msg) => ServiceError::Forbidden(msg.to_string()),
            PolicyError::NotFound(msg) => ServiceError::NotFound(msg.to_string()),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        error!("Password hashing error: {}", err);
        ServiceError::Upstream(err.to_string())
    }
}

/// Minimal shape check; the unique index does the rest.
pub(crate) fn validate_email(email: &str) -> ServiceResult<()> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if valid && !email.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ServiceError::invalid("A valid email is required"))
    }
}

// Object storage: key namespace, sanitization, signed URLs and backends.

pub mod local;
pub mod memory;
pub mod namespace;
pub mod sanitize;
pub mod signing;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use namespace::{Actor, ClientScope, KeyNamespace, KeyOwner, LogicalFolder, NamespaceError, ResolvedKey};
pub use signing::UrlSigner;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
}

impl ObjectInfo {
    /// Zero-byte keys ending in `/` mark folders.
    pub fn is_folder_marker(&self) -> bool {
        self.key.ends_with('/') && self.size == 0
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub info: ObjectInfo,
    pub metadata: HashMap<String, String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `bytes` at `key`, replacing whatever was there.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> StorageResult<ObjectInfo>;

    async fn get(&self, key: &str) -> StorageResult<StoredObject>;

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectInfo>>;

    /// Objects under `prefix`, in key order, at most `max_keys`.
    async fn list(&self, prefix: &str, max_keys: usize) -> StorageResult<Vec<ObjectInfo>>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Returns how many objects were removed.
    async fn delete_prefix(&self, prefix: &str) -> StorageResult<u64>;
}

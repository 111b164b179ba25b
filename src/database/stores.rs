// Store interfaces consumed by the services. Two implementations live next
// to this file: `memory` (tests, database-less dev runs) and `postgres`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    Client, ClientWithOwner, Identity, Page, PreapprovalEntry, PreapprovalUpsert, StoredDocument, Task,
    TaskQuery,
};

pub type StoreResult<T> = Result<T, DatabaseError>;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>>;
    /// `Conflict` when the email is taken.
    async fn create(&self, identity: Identity) -> StoreResult<Identity>;
    /// Full-record write. `NotFound` when the id is unknown.
    async fn update(&self, identity: &Identity) -> StoreResult<Identity>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
    async fn list(&self) -> StoreResult<Vec<Identity>>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn find_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Client>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Client>>;
    async fn find_by_document_number(&self, document_number: &str) -> StoreResult<Option<Client>>;
    /// `Conflict` when the owner already has a client or the document number is taken.
    async fn create(&self, client: Client) -> StoreResult<Client>;
    async fn update(&self, client: &Client) -> StoreResult<Client>;
    async fn list_with_owner(&self) -> StoreResult<Vec<ClientWithOwner>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert, or replace the record already holding the same storage key.
    async fn upsert(&self, document: StoredDocument) -> StoreResult<StoredDocument>;
    async fn find_by_key(&self, storage_key: &str) -> StoreResult<Option<StoredDocument>>;
    /// Active records, newest upload first.
    async fn list_by_document_number(
        &self,
        document_number: &str,
        page: Page,
    ) -> StoreResult<(Vec<StoredDocument>, u64)>;
    /// Bumps the download counter and last-accessed time.
    async fn record_download(&self, storage_key: &str, at: DateTime<Utc>) -> StoreResult<Option<StoredDocument>>;
    async fn delete_by_key(&self, storage_key: &str) -> StoreResult<bool>;
    async fn delete_by_document_number(&self, document_number: &str) -> StoreResult<u64>;
    async fn list_all(&self) -> StoreResult<Vec<StoredDocument>>;
}

#[async_trait]
pub trait PreapprovalStore: Send + Sync {
    async fn upsert(&self, entry: PreapprovalUpsert) -> StoreResult<PreapprovalEntry>;
    /// Unused and unexpired entry for `email`, if any.
    async fn find_live(&self, email: &str, now: DateTime<Utc>) -> StoreResult<Option<PreapprovalEntry>>;
    async fn mark_used(&self, email: &str) -> StoreResult<()>;
    /// Expired entries are left out.
    async fn list(&self, now: DateTime<Utc>) -> StoreResult<Vec<PreapprovalEntry>>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: Task) -> StoreResult<Task>;
    /// Includes soft-deleted tasks; callers check `is_active`.
    async fn find(&self, id: Uuid) -> StoreResult<Option<Task>>;
    async fn save(&self, task: &Task) -> StoreResult<Task>;
    /// Sorted by priority rank descending then due date.
    async fn list(&self, query: &TaskQuery, page: Page) -> StoreResult<(Vec<Task>, u64)>;
    /// Sorted by due date ascending.
    async fn list_by_due(&self, query: &TaskQuery, limit: u32) -> StoreResult<Vec<Task>>;
    async fn count(&self, query: &TaskQuery) -> StoreResult<u64>;
}

/// The full set of collaborators, shared behind `Arc`s.
#[derive(Clone)]
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub clients: Arc<dyn ClientStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub preapprovals: Arc<dyn PreapprovalStore>,
    pub tasks: Arc<dyn TaskStore>,
}

impl Stores {
    /// Wires every interface to one backing implementation.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: IdentityStore + ClientStore + DocumentStore + PreapprovalStore + TaskStore + 'static,
    {
        Self {
            identities: backend.clone(),
            clients: backend.clone(),
            documents: backend.clone(),
            preapprovals: backend.clone(),
            tasks: backend,
        }
    }
}

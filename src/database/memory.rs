use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    normalize_email, task::list_order, Client, ClientWithOwner, Identity, IdentitySummary, Page,
    PreapprovalEntry, PreapprovalUpsert, StoredDocument, Task, TaskQuery,
};
use super::stores::{ClientStore, DocumentStore, IdentityStore, PreapprovalStore, StoreResult, TaskStore};

#[derive(Default)]
struct State {
    identities: HashMap<Uuid, Identity>,
    clients: HashMap<Uuid, Client>,
    documents: HashMap<String, StoredDocument>,
    preapprovals: HashMap<String, PreapprovalEntry>,
    tasks: HashMap<Uuid, Task>,
}

/// In-process implementation of every store interface.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let email = normalize_email(email);
        let state = self.state.read().await;
        Ok(state.identities.values().find(|i| i.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        Ok(self.state.read().await.identities.get(&id).cloned())
    }

    async fn create(&self, identity: Identity) -> StoreResult<Identity> {
        let mut state = self.state.write().await;
        if state.identities.values().any(|i| i.email == identity.email) {
            return Err(DatabaseError::Conflict("email already exists".into()));
        }
        state.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn update(&self, identity: &Identity) -> StoreResult<Identity> {
        let mut state = self.state.write().await;
        if state
            .identities
            .values()
            .any(|i| i.id != identity.id && i.email == identity.email)
        {
            return Err(DatabaseError::Conflict("email already exists".into()));
        }
        match state.identities.get_mut(&identity.id) {
            Some(slot) => {
                *slot = identity.clone();
                Ok(identity.clone())
            }
            None => Err(DatabaseError::NotFound(format!("identity {}", identity.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.state.write().await.identities.remove(&id).is_some())
    }

    async fn list(&self) -> StoreResult<Vec<Identity>> {
        let state = self.state.read().await;
        let mut all: Vec<Identity> = state.identities.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn find_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Client>> {
        let state = self.state.read().await;
        Ok(state.clients.values().find(|c| c.user_id == user_id).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Client>> {
        Ok(self.state.read().await.clients.get(&id).cloned())
    }

    async fn find_by_document_number(&self, document_number: &str) -> StoreResult<Option<Client>> {
        let state = self.state.read().await;
        Ok(state
            .clients
            .values()
            .find(|c| c.document_number == document_number)
            .cloned())
    }

    async fn create(&self, client: Client) -> StoreResult<Client> {
        let mut state = self.state.write().await;
        if state.clients.values().any(|c| c.user_id == client.user_id) {
            return Err(DatabaseError::Conflict("client for this user already exists".into()));
        }
        if state
            .clients
            .values()
            .any(|c| c.document_number == client.document_number)
        {
            return Err(DatabaseError::Conflict("document number already exists".into()));
        }
        state.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn update(&self, client: &Client) -> StoreResult<Client> {
        let mut state = self.state.write().await;
        if state
            .clients
            .values()
            .any(|c| c.id != client.id && c.document_number == client.document_number)
        {
            return Err(DatabaseError::Conflict("document number already exists".into()));
        }
        match state.clients.get_mut(&client.id) {
            Some(slot) => {
                *slot = client.clone();
                Ok(client.clone())
            }
            None => Err(DatabaseError::NotFound(format!("client {}", client.id))),
        }
    }

    async fn list_with_owner(&self) -> StoreResult<Vec<ClientWithOwner>> {
        let state = self.state.read().await;
        let summary = |id: Option<Uuid>| {
            id.and_then(|id| state.identities.get(&id))
                .map(IdentitySummary::from)
        };
        let mut rows: Vec<ClientWithOwner> = state
            .clients
            .values()
            .map(|c| ClientWithOwner {
                owner: summary(Some(c.user_id)),
                assigned_admin_info: summary(c.assigned_admin),
                client: c.clone(),
            })
            .collect();
        rows.sort_by(|a, b| b.client.created_at.cmp(&a.client.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(&self, document: StoredDocument) -> StoreResult<StoredDocument> {
        let mut state = self.state.write().await;
        let stored = match state.documents.get(&document.storage_key) {
            Some(existing) => StoredDocument {
                id: existing.id,
                created_at: existing.created_at,
                download_count: existing.download_count,
                ..document
            },
            None => document,
        };
        state.documents.insert(stored.storage_key.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_by_key(&self, storage_key: &str) -> StoreResult<Option<StoredDocument>> {
        Ok(self.state.read().await.documents.get(storage_key).cloned())
    }

    async fn list_by_document_number(
        &self,
        document_number: &str,
        page: Page,
    ) -> StoreResult<(Vec<StoredDocument>, u64)> {
        let state = self.state.read().await;
        let mut matching: Vec<StoredDocument> = state
            .documents
            .values()
            .filter(|d| d.is_active && d.document_number == document_number)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn record_download(&self, storage_key: &str, at: DateTime<Utc>) -> StoreResult<Option<StoredDocument>> {
        let mut state = self.state.write().await;
        Ok(state.documents.get_mut(storage_key).map(|doc| {
            doc.download_count += 1;
            doc.last_accessed = at;
            doc.updated_at = at;
            doc.clone()
        }))
    }

    async fn delete_by_key(&self, storage_key: &str) -> StoreResult<bool> {
        Ok(self.state.write().await.documents.remove(storage_key).is_some())
    }

    async fn delete_by_document_number(&self, document_number: &str) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.documents.len();
        state.documents.retain(|_, d| d.document_number != document_number);
        Ok((before - state.documents.len()) as u64)
    }

    async fn list_all(&self) -> StoreResult<Vec<StoredDocument>> {
        Ok(self.state.read().await.documents.values().cloned().collect())
    }
}

#[async_trait]
impl PreapprovalStore for MemoryStore {
    async fn upsert(&self, entry: PreapprovalUpsert) -> StoreResult<PreapprovalEntry> {
        let email = normalize_email(&entry.email);
        let now = Utc::now();
        let mut state = self.state.write().await;
        let created_at = state
            .preapprovals
            .get(&email)
            .map(|e| e.created_at)
            .unwrap_or(now);
        let stored = PreapprovalEntry {
            email: email.clone(),
            roles: entry.roles,
            expires_at: entry.expires_at,
            used: false,
            invited_by: entry.invited_by,
            notes: entry.notes,
            created_at,
            updated_at: now,
        };
        state.preapprovals.insert(email, stored.clone());
        Ok(stored)
    }

    async fn find_live(&self, email: &str, now: DateTime<Utc>) -> StoreResult<Option<PreapprovalEntry>> {
        let state = self.state.read().await;
        Ok(state
            .preapprovals
            .get(&normalize_email(email))
            .filter(|e| e.is_live(now))
            .cloned())
    }

    async fn mark_used(&self, email: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(entry) = state.preapprovals.get_mut(&normalize_email(email)) {
            entry.used = true;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list(&self, now: DateTime<Utc>) -> StoreResult<Vec<PreapprovalEntry>> {
        let state = self.state.read().await;
        let mut all: Vec<PreapprovalEntry> = state
            .preapprovals
            .values()
            .filter(|e| !e.is_expired(now))
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.preapprovals.len();
        state.preapprovals.retain(|_, e| !e.is_expired(now));
        Ok((before - state.preapprovals.len()) as u64)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create(&self, task: Task) -> StoreResult<Task> {
        self.state.write().await.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }

    async fn save(&self, task: &Task) -> StoreResult<Task> {
        let mut state = self.state.write().await;
        match state.tasks.get_mut(&task.id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(task.clone())
            }
            None => Err(DatabaseError::NotFound(format!("task {}", task.id))),
        }
    }

    async fn list(&self, query: &TaskQuery, page: Page) -> StoreResult<(Vec<Task>, u64)> {
        let state = self.state.read().await;
        let mut matching: Vec<Task> = state.tasks.values().filter(|t| query.matches(t)).cloned().collect();
        matching.sort_by(list_order);
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn list_by_due(&self, query: &TaskQuery, limit: u32) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;
        let mut matching: Vec<Task> = state.tasks.values().filter(|t| query.matches(t)).cloned().collect();
        matching.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn count(&self, query: &TaskQuery) -> StoreResult<u64> {
        let state = self.state.read().await;
        Ok(state.tasks.values().filter(|t| query.matches(t)).count() as u64)
    }
}

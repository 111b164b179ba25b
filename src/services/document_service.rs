use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::models::{Page, Paginated, StoredDocument};
use crate::database::Stores;
use crate::middleware::AuthUser;
use crate::policy::{authorize, client_scope, Action, Target};
use crate::storage::sanitize::sanitize_segment;
use crate::storage::{
    Actor, ClientScope, KeyNamespace, KeyOwner, LogicalFolder, ObjectInfo, ObjectStore, ResolvedKey, UrlSigner,
};

pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const MAX_RECENT_LIMIT: usize = 50;
const RECENT_SCAN_FACTOR: usize = 5;
const MIN_URL_TTL_SECS: i64 = 60;
const MAX_URL_TTL_SECS: i64 = 24 * 60 * 60;
const SYNC_CONCURRENCY: usize = 8;

/// A file received from the caller.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub subfolder: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedObject {
    pub key: String,
    pub file_name: String,
    pub original_name: String,
    pub folder: String,
    pub size: u64,
    pub content_type: String,
    pub document_number: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMarker {
    pub key: String,
    pub folder: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentObject {
    pub key: String,
    pub name: String,
    pub size: u64,
    pub last_modified: chrono::DateTime<Utc>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrl {
    pub key: String,
    pub url: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageHealth {
    pub status: &'static str,
    pub prefix: String,
    pub objects_visible: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub document_number: String,
    pub objects_removed: u64,
    pub records_removed: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub checked: usize,
    pub stale_keys: Vec<String>,
    pub removed: usize,
}

/// The bytes behind a signed link.
#[derive(Debug, Clone)]
pub struct Download {
    pub key: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct DocumentService {
    stores: Stores,
    objects: Arc<dyn ObjectStore>,
    namespace: Arc<KeyNamespace>,
    signer: Arc<UrlSigner>,
    max_file_bytes: usize,
    url_ttl_secs: i64,
}

impl DocumentService {
    pub fn new(
        stores: Stores,
        objects: Arc<dyn ObjectStore>,
        namespace: Arc<KeyNamespace>,
        signer: Arc<UrlSigner>,
        max_file_bytes: usize,
        url_ttl_secs: i64,
    ) -> Self {
        Self {
            stores,
            objects,
            namespace,
            signer,
            max_file_bytes,
            url_ttl_secs,
        }
    }

    /// Resolves the caller's client scope with a fresh lookup.
    async fn actor(&self, caller: &AuthUser) -> ServiceResult<Actor> {
        let own_client = if caller.roles.is_admin() {
            None
        } else {
            self.stores.clients.find_by_user_id(caller.id).await?
        };
        let scope = client_scope(caller, own_client.as_ref());
        Ok(self.namespace.actor(&caller.id.to_string(), scope)?)
    }

    /// Prefix check for a caller-supplied key.
    async fn authorize_key(&self, caller: &AuthUser, action: Action, key: &str) -> ServiceResult<()> {
        let owner = self.namespace.classify_key(key)?;
        let actor = self.actor(caller).await?;
        authorize(
            Some(caller),
            action,
            Target::StoredObject {
                owner: &owner,
                scope: actor.scope(),
            },
        )?;
        Ok(())
    }

    fn sign(&self, key: &str, ttl_secs: i64) -> String {
        self.signer.url(key, (Utc::now() + Duration::seconds(ttl_secs)).timestamp())
    }

    pub async fn upload(&self, caller: &AuthUser, upload: Upload) -> ServiceResult<UploadedObject> {
        if upload.bytes.is_empty() {
            return Err(ServiceError::invalid("No file provided"));
        }
        if upload.bytes.len() > self.max_file_bytes {
            return Err(ServiceError::TooLarge(format!(
                "File exceeds the {} MB limit",
                self.max_file_bytes / (1024 * 1024)
            )));
        }

        let folder = self.namespace.parse_folder(upload.subfolder.as_deref())?;
        let actor = self.actor(caller).await?;
        let now = Utc::now();
        let resolved = self
            .namespace
            .resolve_key(&actor, &folder, &upload.original_name, now.timestamp_millis())?;

        // Same prefix check as reads and deletes.
        let owner = self.namespace.classify_key(&resolved.key)?;
        authorize(
            Some(caller),
            Action::WriteObject,
            Target::StoredObject {
                owner: &owner,
                scope: actor.scope(),
            },
        )?;

        let content_type = upload
            .content_type
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let mut metadata = HashMap::new();
        metadata.insert("user-id".to_string(), caller.id.to_string());
        metadata.insert("folder".to_string(), resolved.folder.clone());
        metadata.insert("original-name".to_string(), upload.original_name.clone());

        let size = upload.bytes.len() as u64;
        self.objects
            .put(&resolved.key, upload.bytes, Some(&content_type), metadata)
            .await?;

        if let Some(number) = &resolved.document_number {
            self.record_client_document(caller, number, &resolved, &upload.original_name, size, &content_type)
                .await?;
        }

        info!("User {} uploaded {} ({} bytes)", caller.id, resolved.key, size);
        Ok(UploadedObject {
            url: self.sign(&resolved.key, self.url_ttl_secs),
            key: resolved.key,
            file_name: resolved.file_name,
            original_name: upload.original_name,
            folder: resolved.folder,
            size,
            content_type,
            document_number: resolved.document_number,
        })
    }

    async fn record_client_document(
        &self,
        caller: &AuthUser,
        document_number: &str,
        resolved: &ResolvedKey,
        original_name: &str,
        size: u64,
        content_type: &str,
    ) -> ServiceResult<()> {
        let Some(client) = self.stores.clients.find_by_document_number(document_number).await? else {
            warn!("No client with document number {}; skipping metadata for {}", document_number, resolved.key);
            return Ok(());
        };
        let now = Utc::now();
        self.stores
            .documents
            .upsert(StoredDocument {
                id: Uuid::new_v4(),
                client_id: client.id,
                document_number: document_number.to_string(),
                file_name: resolved.file_name.clone(),
                original_name: original_name.to_string(),
                file_size: size as i64,
                mime_type: content_type.to_string(),
                storage_key: resolved.key.clone(),
                folder: resolved.folder.clone(),
                uploaded_by: caller.id,
                uploaded_at: now,
                last_accessed: now,
                download_count: 0,
                is_active: true,
                metadata: json!({ "userId": caller.id }),
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok(())
    }

    /// Writes a zero-byte marker so an empty folder shows up in listings.
    pub async fn create_folder(&self, caller: &AuthUser, subfolder: Option<&str>) -> ServiceResult<FolderMarker> {
        let folder = self.namespace.parse_folder(subfolder)?;
        let actor = self.actor(caller).await?;
        let resolved = self.namespace.resolve_prefix(&actor, &folder)?;
        if resolved.folder == self.namespace.client_root() {
            return Err(ServiceError::invalid("A client document number is required"));
        }

        let mut metadata = HashMap::new();
        metadata.insert("user-id".to_string(), caller.id.to_string());
        metadata.insert("folder".to_string(), resolved.folder.clone());
        self.objects.put(&resolved.prefix, Vec::new(), None, metadata).await?;

        Ok(FolderMarker {
            key: resolved.prefix,
            folder: resolved.folder,
        })
    }

    /// Newest objects first. Folder markers are left out.
    pub async fn recent(
        &self,
        caller: &AuthUser,
        subfolder: Option<&str>,
        limit: Option<usize>,
    ) -> ServiceResult<Vec<RecentObject>> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT);
        let actor = self.actor(caller).await?;
        let prefix = match subfolder.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let folder = self.namespace.parse_folder(Some(raw))?;
                self.namespace.resolve_prefix(&actor, &folder)?.prefix
            }
            None => self.namespace.personal_prefix(&actor),
        };

        let mut objects: Vec<ObjectInfo> = self
            .objects
            .list(&prefix, limit * RECENT_SCAN_FACTOR)
            .await?
            .into_iter()
            .filter(|o| !o.is_folder_marker())
            .collect();
        objects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        objects.truncate(limit);

        Ok(objects
            .into_iter()
            .map(|o| RecentObject {
                name: o.key.rsplit('/').next().unwrap_or_default().to_string(),
                key: o.key,
                size: o.size,
                last_modified: o.last_modified,
                content_type: o.content_type,
            })
            .collect())
    }

    /// Signed link for a key the caller may read. Bumps the download counter.
    pub async fn download_url(&self, caller: &AuthUser, key: &str, ttl_secs: Option<i64>) -> ServiceResult<SignedUrl> {
        self.authorize_key(caller, Action::ReadObject, key).await?;
        if self.objects.head(key).await?.is_none() {
            return Err(ServiceError::not_found("File not found"));
        }

        let ttl = ttl_secs.unwrap_or(self.url_ttl_secs).clamp(MIN_URL_TTL_SECS, MAX_URL_TTL_SECS);
        self.stores.documents.record_download(key, Utc::now()).await?;
        Ok(SignedUrl {
            key: key.to_string(),
            url: self.sign(key, ttl),
            expires_in: ttl,
        })
    }

    pub async fn delete(&self, caller: &AuthUser, key: &str) -> ServiceResult<()> {
        self.authorize_key(caller, Action::DeleteObject, key).await?;
        if self.objects.head(key).await?.is_none() {
            return Err(ServiceError::not_found("File not found"));
        }
        self.objects.delete(key).await?;
        self.stores.documents.delete_by_key(key).await?;
        info!("User {} deleted {}", caller.id, key);
        Ok(())
    }

    /// Probes the object store under the caller's personal prefix.
    pub async fn health(&self, caller: &AuthUser) -> ServiceResult<StorageHealth> {
        let actor = self.actor(caller).await?;
        let prefix = self.namespace.personal_prefix(&actor);
        let visible = self.objects.list(&prefix, 1).await?.len();
        Ok(StorageHealth {
            status: "ok",
            prefix,
            objects_visible: visible,
        })
    }

    pub async fn list_client_documents(
        &self,
        caller: &AuthUser,
        document_number: &str,
        page: Page,
    ) -> ServiceResult<Paginated<StoredDocument>> {
        let number = sanitize_segment(document_number).ok_or_else(|| ServiceError::invalid("Invalid document number"))?;
        let actor = self.actor(caller).await?;
        authorize(
            Some(caller),
            Action::ListClientDocuments,
            Target::StoredObject {
                owner: &KeyOwner::Client(number.clone()),
                scope: actor.scope(),
            },
        )?;
        let (items, total) = self.stores.documents.list_by_document_number(&number, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Removes a client's whole key-space and its metadata.
    pub async fn purge_client(&self, caller: &AuthUser, document_number: &str) -> ServiceResult<PurgeReport> {
        authorize(Some(caller), Action::PurgeClientDocuments, Target::None)?;
        let number = sanitize_segment(document_number).ok_or_else(|| ServiceError::invalid("Invalid document number"))?;

        let admin = self.namespace.actor(&caller.id.to_string(), ClientScope::Any)?;
        let folder = LogicalFolder::Client {
            document_number: Some(number.clone()),
            segments: Vec::new(),
        };
        let prefix = self.namespace.resolve_prefix(&admin, &folder)?.prefix;

        let objects_removed = self.objects.delete_prefix(&prefix).await?;
        let records_removed = self.stores.documents.delete_by_document_number(&number).await?;
        info!(
            "User {} purged {} ({} objects, {} records)",
            caller.id, prefix, objects_removed, records_removed
        );
        Ok(PurgeReport {
            document_number: number,
            objects_removed,
            records_removed,
        })
    }

    /// Operator path: drops metadata whose object is gone.
    pub async fn sync(&self, dry_run: bool) -> ServiceResult<SyncReport> {
        let documents = self.stores.documents.list_all().await?;
        let checked = documents.len();

        let probes: Vec<(String, bool)> = stream::iter(documents)
            .map(|document| async move {
                let present = self.objects.head(&document.storage_key).await?.is_some();
                Ok::<_, ServiceError>((document.storage_key, present))
            })
            .buffered(SYNC_CONCURRENCY)
            .try_collect()
            .await?;

        let mut report = SyncReport {
            checked,
            ..Default::default()
        };
        for (key, present) in probes {
            if present {
                continue;
            }
            if !dry_run && self.stores.documents.delete_by_key(&key).await? {
                report.removed += 1;
            }
            report.stale_keys.push(key);
        }
        info!(
            "Document sync checked {} records, {} stale, {} removed",
            report.checked,
            report.stale_keys.len(),
            report.removed
        );
        Ok(report)
    }

    /// Serves a signed link. No bearer credential involved.
    pub async fn fetch_signed(&self, key: &str, expires: i64, signature: &str) -> ServiceResult<Download> {
        if !self.signer.verify(key, expires, signature, Utc::now().timestamp()) {
            warn!("Rejected signed link for {}", key);
            return Err(ServiceError::Forbidden("Invalid or expired link".to_string()));
        }
        let object = self.objects.get(key).await?;
        Ok(Download {
            key: object.info.key,
            content_type: object.info.content_type,
            bytes: object.bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Client;
    use crate::database::MemoryStore;
    use crate::roles::Roles;
    use crate::storage::MemoryObjectStore;

    struct Fixture {
        svc: DocumentService,
        stores: Stores,
        objects: Arc<MemoryObjectStore>,
    }

    fn fixture() -> Fixture {
        let stores = Stores::from_backend(Arc::new(MemoryStore::new()));
        let objects = Arc::new(MemoryObjectStore::new());
        let namespace = Arc::new(KeyNamespace::new(
            "koop",
            vec!["documentos_iniciales".into()],
            "clientes",
            false,
        ));
        let signer = Arc::new(UrlSigner::new("secret", "http://localhost:4000"));
        Fixture {
            svc: DocumentService::new(stores.clone(), objects.clone(), namespace, signer, 1024, 600),
            stores,
            objects,
        }
    }

    fn caller(roles: Roles) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "u@koop.co".into(),
            name: "U".into(),
            roles,
            active: true,
        }
    }

    async fn give_client(stores: &Stores, user: &AuthUser, number: &str) -> Client {
        let now = Utc::now();
        stores
            .clients
            .create(Client {
                id: Uuid::new_v4(),
                user_id: user.id,
                assigned_admin: None,
                full_name: "Cliente".into(),
                document_type: None,
                document_number: number.into(),
                birth_date: None,
                phone: None,
                email: None,
                address: None,
                contact_info: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    fn upload(name: &str, subfolder: Option<&str>) -> Upload {
        Upload {
            original_name: name.into(),
            content_type: Some("application/pdf".into()),
            bytes: b"%PDF-1.4".to_vec(),
            subfolder: subfolder.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn personal_upload_lands_under_actor() {
        let f = fixture();
        let user = caller(Roles::USER);
        let out = f.svc.upload(&user, upload("Cédula.pdf", None)).await.unwrap();
        assert!(out.key.starts_with(&format!("koop/{}/documentos_iniciales/", user.id)));
        assert!(out.key.ends_with("_Cedula.pdf"));
        assert!(out.url.contains("signature="));
        assert!(out.document_number.is_none());
    }

    #[tokio::test]
    async fn client_upload_is_rewritten_and_recorded() {
        let f = fixture();
        let user = caller(Roles::USER);
        give_client(&f.stores, &user, "123").await;

        let out = f.svc.upload(&user, upload("acta.pdf", Some("clientes/999/actas"))).await.unwrap();
        assert!(out.key.starts_with("koop/clientes/123/actas/"));
        assert_eq!(out.document_number.as_deref(), Some("123"));

        let page = Page::new(None, None, 20);
        let listed = f.svc.list_client_documents(&user, "123", page).await.unwrap();
        assert_eq!(listed.pagination.total, 1);
        assert!(matches!(
            f.svc.list_client_documents(&user, "999", page).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn no_profile_means_not_found_for_client_space() {
        let f = fixture();
        let user = caller(Roles::USER);
        assert!(matches!(
            f.svc.upload(&user, upload("a.pdf", Some("clientes/123"))).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.svc.download_url(&user, "koop/clientes/123/a.pdf", None).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn traversal_rejected_before_storage() {
        let f = fixture();
        let user = caller(Roles::USER);
        assert!(matches!(
            f.svc.upload(&user, upload("a.pdf", Some("documentos_iniciales/../../x"))).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(f.objects.list("", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_client_key_is_forbidden() {
        let f = fixture();
        let admin = caller(Roles::ADMIN);
        let user = caller(Roles::USER);
        give_client(&f.stores, &user, "123").await;
        let other = caller(Roles::USER);
        give_client(&f.stores, &other, "999").await;

        let theirs = f.svc.upload(&admin, upload("x.pdf", Some("clientes/999"))).await.unwrap();
        assert!(matches!(
            f.svc.download_url(&user, &theirs.key, None).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            f.svc.delete(&user, &theirs.key).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(f.svc.download_url(&other, &theirs.key, None).await.is_ok());
    }

    #[tokio::test]
    async fn download_bumps_counter_and_delete_removes_metadata() {
        let f = fixture();
        let user = caller(Roles::USER);
        give_client(&f.stores, &user, "123").await;
        let out = f.svc.upload(&user, upload("a.pdf", Some("clientes"))).await.unwrap();

        f.svc.download_url(&user, &out.key, Some(5)).await.unwrap();
        let record = f.stores.documents.find_by_key(&out.key).await.unwrap().unwrap();
        assert_eq!(record.download_count, 1);

        f.svc.delete(&user, &out.key).await.unwrap();
        assert!(f.stores.documents.find_by_key(&out.key).await.unwrap().is_none());
        assert!(matches!(f.svc.delete(&user, &out.key).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn recent_skips_markers_and_limits() {
        let f = fixture();
        let user = caller(Roles::USER);
        f.svc.create_folder(&user, Some("documentos_iniciales/vacía")).await.unwrap();
        for i in 0..3 {
            f.svc.upload(&user, upload(&format!("f{}.pdf", i), None)).await.unwrap();
        }
        let recent = f.svc.recent(&user, None, Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|o| !o.key.ends_with('/')));
    }

    #[tokio::test]
    async fn oversize_upload_rejected() {
        let f = fixture();
        let user = caller(Roles::USER);
        let mut big = upload("big.bin", None);
        big.bytes = vec![0; 2048];
        assert!(matches!(f.svc.upload(&user, big).await, Err(ServiceError::TooLarge(_))));
    }

    #[tokio::test]
    async fn purge_and_sync() {
        let f = fixture();
        let admin = caller(Roles::ADMIN);
        let user = caller(Roles::USER);
        give_client(&f.stores, &user, "123").await;
        let a = f.svc.upload(&admin, upload("a.pdf", Some("clientes/123"))).await.unwrap();
        f.svc.upload(&admin, upload("b.pdf", Some("clientes/123/sub"))).await.unwrap();

        // Object vanishes behind the metadata's back.
        f.objects.delete(&a.key).await.unwrap();
        let dry = f.svc.sync(true).await.unwrap();
        assert_eq!(dry.stale_keys, vec![a.key.clone()]);
        assert_eq!(dry.removed, 0);
        assert_eq!(f.svc.sync(false).await.unwrap().removed, 1);

        assert!(matches!(
            f.svc.purge_client(&user, "123").await,
            Err(ServiceError::Forbidden(_))
        ));
        let report = f.svc.purge_client(&admin, "123").await.unwrap();
        assert_eq!(report.objects_removed, 1);
        assert_eq!(report.records_removed, 1);
    }

    #[tokio::test]
    async fn signed_fetch_checks_signature() {
        let f = fixture();
        let user = caller(Roles::USER);
        let out = f.svc.upload(&user, upload("a.pdf", None)).await.unwrap();
        let link = f.svc.download_url(&user, &out.key, None).await.unwrap();
        let query = link.url.split_once('?').unwrap().1;
        let params: HashMap<&str, &str> = query.split('&').filter_map(|p| p.split_once('=')).collect();
        let expires: i64 = params["expires"].parse().unwrap();

        let download = f.svc.fetch_signed(&out.key, expires, params["signature"]).await.unwrap();
        assert_eq!(download.bytes, b"%PDF-1.4");
        assert!(matches!(
            f.svc.fetch_signed(&out.key, expires + 1, params["signature"]).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::{ObjectInfo, ObjectStore, StorageError, StorageResult, StoredObject};

const DATA_EXT: &str = "obj";
const META_EXT: &str = "json";

#[derive(Serialize, Deserialize)]
struct Sidecar {
    info: ObjectInfo,
    metadata: HashMap<String, String>,
}

/// Filesystem-backed object store for single-node deployments.
///
/// Every object is a flat pair of files named by the SHA-256 of its key, so
/// no key can address anything outside `root`. The sidecar carries the key.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!("Local object store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str, ext: &str) -> PathBuf {
        self.root.join(format!("{}.{}", hex::encode(Sha256::digest(key.as_bytes())), ext))
    }

    async fn read_sidecar(&self, key: &str) -> StorageResult<Option<Sidecar>> {
        match fs::read(self.path(key, META_EXT)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        for ext in [DATA_EXT, META_EXT] {
            match fs::remove_file(self.path(key, ext)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Every sidecar on disk, sorted by key.
    async fn sidecars(&self) -> StorageResult<Vec<Sidecar>> {
        let mut out = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            match fs::read(&path).await.map(|raw| serde_json::from_slice::<Sidecar>(&raw)) {
                Ok(Ok(sidecar)) => out.push(sidecar),
                Ok(Err(e)) => warn!("Skipping unreadable sidecar {}: {}", path.display(), e),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        out.sort_by(|a, b| a.info.key.cmp(&b.info.key));
        Ok(out)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> StorageResult<ObjectInfo> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        let info = ObjectInfo {
            key: key.to_string(),
            size: bytes.len() as u64,
            last_modified: Utc::now(),
            content_type: content_type.map(str::to_string),
        };
        fs::write(self.path(key, DATA_EXT), &bytes).await?;
        let sidecar = Sidecar {
            info: info.clone(),
            metadata,
        };
        fs::write(self.path(key, META_EXT), serde_json::to_vec(&sidecar)?).await?;
        Ok(info)
    }

    async fn get(&self, key: &str) -> StorageResult<StoredObject> {
        let sidecar = self
            .read_sidecar(key)
            .await?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        let bytes = match fs::read(self.path(key, DATA_EXT)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound(key.to_string())),
            Err(e) => return Err(e.into()),
        };
        Ok(StoredObject {
            info: sidecar.info,
            metadata: sidecar.metadata,
            bytes,
        })
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectInfo>> {
        Ok(self.read_sidecar(key).await?.map(|s| s.info))
    }

    async fn list(&self, prefix: &str, max_keys: usize) -> StorageResult<Vec<ObjectInfo>> {
        Ok(self
            .sidecars()
            .await?
            .into_iter()
            .filter(|s| s.info.key.starts_with(prefix))
            .take(max_keys)
            .map(|s| s.info)
            .collect())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.remove(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<u64> {
        let mut removed = 0;
        for sidecar in self.sidecars().await?.into_iter().filter(|s| s.info.key.starts_with(prefix)) {
            self.remove(&sidecar.info.key).await?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::open(dir.path()).await.unwrap();

        let mut meta = HashMap::new();
        meta.insert("user-id".to_string(), "u1".to_string());
        store
            .put("koop/u1/documentos_iniciales/1_a.pdf", b"%PDF".to_vec(), Some("application/pdf"), meta)
            .await
            .unwrap();

        let object = store.get("koop/u1/documentos_iniciales/1_a.pdf").await.unwrap();
        assert_eq!(object.bytes, b"%PDF");
        assert_eq!(object.info.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(object.metadata.get("user-id").map(String::as_str), Some("u1"));
    }

    #[tokio::test]
    async fn keys_never_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::open(dir.path().join("objects")).await.unwrap();
        store.put("../../escape", b"x".to_vec(), None, HashMap::new()).await.unwrap();

        assert!(!dir.path().join("escape").exists());
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn lists_and_deletes_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::open(dir.path()).await.unwrap();
        for key in ["koop/clientes/123/", "koop/clientes/123/a.pdf", "koop/clientes/999/b.pdf"] {
            store.put(key, Vec::new(), None, HashMap::new()).await.unwrap();
        }

        let listed = store.list("koop/clientes/123/", 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].is_folder_marker());

        assert_eq!(store.delete_prefix("koop/clientes/123/").await.unwrap(), 2);
        assert!(store.head("koop/clientes/999/b.pdf").await.unwrap().is_some());
        assert!(matches!(
            store.get("koop/clientes/123/a.pdf").await,
            Err(StorageError::NotFound(_))
        ));
    }
}

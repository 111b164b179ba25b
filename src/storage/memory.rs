use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{ObjectInfo, ObjectStore, StorageError, StorageResult, StoredObject};

/// Object store held in a sorted map, so listings come back in key order.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
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
        let object = StoredObject {
            info: info.clone(),
            metadata,
            bytes,
        };
        self.objects.write().await.insert(key.to_string(), object);
        Ok(info)
    }

    async fn get(&self, key: &str) -> StorageResult<StoredObject> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectInfo>> {
        Ok(self.objects.read().await.get(key).map(|o| o.info.clone()))
    }

    async fn list(&self, prefix: &str, max_keys: usize) -> StorageResult<Vec<ObjectInfo>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(max_keys)
            .map(|(_, o)| o.info.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<u64> {
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|key, _| !key.starts_with(prefix));
        Ok((before - objects.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> MemoryObjectStore {
        let store = MemoryObjectStore::new();
        for key in ["koop/u1/a.pdf", "koop/u1/b.pdf", "koop/u10/c.pdf", "koop/u2/d.pdf"] {
            store
                .put(key, b"data".to_vec(), Some("application/pdf"), HashMap::new())
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn list_is_prefix_scoped_and_bounded() {
        let store = seeded().await;
        let keys: Vec<String> = store.list("koop/u1/", 10).await.unwrap().into_iter().map(|o| o.key).collect();
        assert_eq!(keys, vec!["koop/u1/a.pdf", "koop/u1/b.pdf"]);
        assert_eq!(store.list("koop/", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn put_overwrites_and_get_returns_bytes() {
        let store = seeded().await;
        store
            .put("koop/u1/a.pdf", b"v2".to_vec(), None, HashMap::new())
            .await
            .unwrap();
        let object = store.get("koop/u1/a.pdf").await.unwrap();
        assert_eq!(object.bytes, b"v2");
        assert_eq!(object.info.size, 2);
        assert!(matches!(store.get("koop/none").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_prefix_counts() {
        let store = seeded().await;
        assert_eq!(store.delete_prefix("koop/u1/").await.unwrap(), 2);
        assert!(store.head("koop/u10/c.pdf").await.unwrap().is_some());
        store.delete("koop/u2/d.pdf").await.unwrap();
        store.delete("koop/u2/d.pdf").await.unwrap();
        assert_eq!(store.list("koop/", 10).await.unwrap().len(), 1);
    }
}

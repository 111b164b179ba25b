use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{Page, StoredDocument};
use crate::database::stores::{DocumentStore, StoreResult};

const COLUMNS: &str = "id, client_id, document_number, file_name, original_name, file_size, mime_type, \
                       storage_key, folder, uploaded_by, uploaded_at, last_accessed, download_count, \
                       is_active, metadata, created_at, updated_at";

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    client_id: Uuid,
    document_number: String,
    file_name: String,
    original_name: String,
    file_size: i64,
    mime_type: String,
    storage_key: String,
    folder: String,
    uploaded_by: Uuid,
    uploaded_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
    download_count: i64,
    is_active: bool,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for StoredDocument {
    fn from(row: DocumentRow) -> Self {
        StoredDocument {
            id: row.id,
            client_id: row.client_id,
            document_number: row.document_number,
            file_name: row.file_name,
            original_name: row.original_name,
            file_size: row.file_size,
            mime_type: row.mime_type,
            storage_key: row.storage_key,
            folder: row.folder,
            uploaded_by: row.uploaded_by,
            uploaded_at: row.uploaded_at,
            last_accessed: row.last_accessed,
            download_count: row.download_count,
            is_active: row.is_active,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn upsert(&self, document: StoredDocument) -> StoreResult<StoredDocument> {
        // Replacement keeps id, created_at and the download counter of the existing row
        let sql = format!(
            "INSERT INTO stored_documents ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             ON CONFLICT (storage_key) DO UPDATE SET \
               client_id = EXCLUDED.client_id, document_number = EXCLUDED.document_number, \
               file_name = EXCLUDED.file_name, original_name = EXCLUDED.original_name, \
               file_size = EXCLUDED.file_size, mime_type = EXCLUDED.mime_type, folder = EXCLUDED.folder, \
               uploaded_by = EXCLUDED.uploaded_by, uploaded_at = EXCLUDED.uploaded_at, \
               last_accessed = EXCLUDED.last_accessed, is_active = EXCLUDED.is_active, \
               metadata = EXCLUDED.metadata, updated_at = EXCLUDED.updated_at \
             RETURNING {}",
            COLUMNS, COLUMNS
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(document.id)
            .bind(document.client_id)
            .bind(&document.document_number)
            .bind(&document.file_name)
            .bind(&document.original_name)
            .bind(document.file_size)
            .bind(&document.mime_type)
            .bind(&document.storage_key)
            .bind(&document.folder)
            .bind(document.uploaded_by)
            .bind(document.uploaded_at)
            .bind(document.last_accessed)
            .bind(document.download_count)
            .bind(document.is_active)
            .bind(&document.metadata)
            .bind(document.created_at)
            .bind(document.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, "document"))?;
        Ok(row.into())
    }

    async fn find_by_key(&self, storage_key: &str) -> StoreResult<Option<StoredDocument>> {
        let sql = format!("SELECT {} FROM stored_documents WHERE storage_key = $1", COLUMNS);
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(storage_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(StoredDocument::from))
    }

    async fn list_by_document_number(
        &self,
        document_number: &str,
        page: Page,
    ) -> StoreResult<(Vec<StoredDocument>, u64)> {
        let sql = format!(
            "SELECT {} FROM stored_documents WHERE document_number = $1 AND is_active \
             ORDER BY uploaded_at DESC LIMIT $2 OFFSET $3",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(document_number)
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stored_documents WHERE document_number = $1 AND is_active",
        )
        .bind(document_number)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(StoredDocument::from).collect(), total.max(0) as u64))
    }

    async fn record_download(&self, storage_key: &str, at: DateTime<Utc>) -> StoreResult<Option<StoredDocument>> {
        let sql = format!(
            "UPDATE stored_documents SET download_count = download_count + 1, last_accessed = $2, updated_at = $2 \
             WHERE storage_key = $1 RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(storage_key)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(StoredDocument::from))
    }

    async fn delete_by_key(&self, storage_key: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM stored_documents WHERE storage_key = $1")
            .bind(storage_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_document_number(&self, document_number: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM stored_documents WHERE document_number = $1")
            .bind(document_number)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_all(&self) -> StoreResult<Vec<StoredDocument>> {
        let sql = format!("SELECT {} FROM stored_documents ORDER BY uploaded_at DESC", COLUMNS);
        let rows = sqlx::query_as::<_, DocumentRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(StoredDocument::from).collect())
    }
}

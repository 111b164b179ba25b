use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Metadata record for an object uploaded into a client key-space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: Uuid,
    pub client_id: Uuid,
    pub document_number: String,
    pub file_name: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    /// Unique storage key.
    pub storage_key: String,
    pub folder: String,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub download_count: i64,
    pub is_active: bool,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    pub fn pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit as u64)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, page: Page) -> Self {
        Self {
            items,
            pagination: Pagination {
                total,
                page: page.page,
                limit: page.limit,
                pages: page.pages(total),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps() {
        let page = Page::new(Some(0), Some(1000), 20);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, Page::MAX_LIMIT);

        let page = Page::new(Some(3), None, 20);
        assert_eq!(page.offset(), 40);
        assert_eq!(page.pages(41), 3);
        assert_eq!(page.pages(0), 0);
    }
}

pub mod client;
pub mod document;
pub mod identity;
pub mod preapproval;
pub mod task;

pub use client::{Client, ClientPatch, ClientWithOwner};
pub use document::{Page, Paginated, Pagination, StoredDocument};
pub use identity::{clean_optional, normalize_email, Identity, IdentitySummary};
pub use preapproval::{PreapprovalEntry, PreapprovalUpsert};
pub use task::{Task, TaskQuery, TaskStatus, TaskView};

use serde::{Deserialize, Deserializer};

/// Keeps an explicit `null` apart from a missing field: absent stays `None`,
/// `null` becomes `Some(None)`. Pair with `#[serde(default)]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

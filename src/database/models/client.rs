use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::IdentitySummary;
use super::nullable;

/// Profile container for a served customer. At most one per identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub assigned_admin: Option<Uuid>,
    pub full_name: String,
    pub document_type: Option<String>,
    /// Selects the client key-space in object storage.
    pub document_number: String,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub contact_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientWithOwner {
    #[serde(flatten)]
    pub client: Client,
    pub owner: Option<IdentitySummary>,
    pub assigned_admin_info: Option<IdentitySummary>,
}

/// Field-level patch. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPatch {
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub document_type: Option<Option<String>>,
    pub document_number: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub birth_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub contact_info: Option<Option<String>>,
}

impl ClientPatch {
    /// True when the patch only touches fields an owner may edit.
    pub fn is_contact_only(&self) -> bool {
        self.full_name.is_none()
            && self.document_type.is_none()
            && self.document_number.is_none()
            && self.birth_date.is_none()
    }

    pub fn apply(self, client: &mut Client) {
        if let Some(v) = self.full_name {
            client.full_name = v.trim().to_string();
        }
        if let Some(v) = self.document_type {
            client.document_type = trimmed(v);
        }
        if let Some(v) = self.document_number {
            client.document_number = v.trim().to_string();
        }
        if let Some(v) = self.birth_date {
            client.birth_date = v;
        }
        if let Some(v) = self.phone {
            client.phone = trimmed(v);
        }
        if let Some(v) = self.email {
            client.email = trimmed(v).map(|e| e.to_lowercase());
        }
        if let Some(v) = self.address {
            client.address = trimmed(v);
        }
        if let Some(v) = self.contact_info {
            client.contact_info = trimmed(v);
        }
        client.updated_at = Utc::now();
    }
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

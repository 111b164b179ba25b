use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{validate_email, ServiceResult};
use crate::database::models::preapproval::{expiry_from_days, DEFAULT_DAYS_VALID};
use crate::database::models::{clean_optional, normalize_email, PreapprovalEntry, PreapprovalUpsert};
use crate::database::Stores;
use crate::middleware::AuthUser;
use crate::policy::{authorize, Action, Target};
use crate::roles::normalize_role_value;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreapprovalRequest {
    pub email: String,
    #[serde(default)]
    pub roles: Value,
    /// Defaults to 30. Zero or negative means no expiry.
    pub days_valid: Option<i64>,
    pub notes: Option<String>,
}

pub struct PreapprovalService {
    stores: Stores,
}

impl PreapprovalService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Creates or re-issues the entry for an email, resetting `used`.
    pub async fn upsert(&self, caller: &AuthUser, req: PreapprovalRequest) -> ServiceResult<PreapprovalEntry> {
        authorize(Some(caller), Action::ManagePreapprovals, Target::None)?;
        let email = normalize_email(&req.email);
        validate_email(&email)?;

        let now = Utc::now();
        let entry = self
            .stores
            .preapprovals
            .upsert(PreapprovalUpsert {
                email,
                roles: normalize_role_value(&req.roles, "user"),
                expires_at: expiry_from_days(Some(req.days_valid.unwrap_or(DEFAULT_DAYS_VALID)), now),
                invited_by: Some(caller.email.clone()),
                notes: clean_optional(req.notes),
            })
            .await?;
        info!("Preapproved {} as {} by {}", entry.email, entry.roles.role(), caller.id);
        Ok(entry)
    }

    /// Unexpired entries only.
    pub async fn list(&self, caller: &AuthUser) -> ServiceResult<Vec<PreapprovalEntry>> {
        authorize(Some(caller), Action::ManagePreapprovals, Target::None)?;
        Ok(self.stores.preapprovals.list(Utc::now()).await?)
    }

    /// Operator path: drops expired entries.
    pub async fn purge_expired(&self) -> ServiceResult<u64> {
        let removed = self.stores.preapprovals.purge_expired(Utc::now()).await?;
        info!("Purged {} expired preapprovals", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::roles::Roles;
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    fn caller(roles: Roles) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "admin@koop.co".into(),
            name: "Admin".into(),
            roles,
            active: true,
        }
    }

    fn request(email: &str, roles: Value, days_valid: Option<i64>) -> PreapprovalRequest {
        PreapprovalRequest {
            email: email.into(),
            roles,
            days_valid,
            notes: None,
        }
    }

    #[tokio::test]
    async fn upsert_normalizes_and_defaults_expiry() {
        let svc = PreapprovalService::new(Stores::from_backend(Arc::new(MemoryStore::new())));
        let admin = caller(Roles::ADMIN);

        let entry = svc
            .upsert(&admin, request(" New@Koop.CO ", json!(["User", "ADMIN"]), None))
            .await
            .unwrap();
        assert_eq!(entry.email, "new@koop.co");
        assert!(entry.roles.is_admin());
        assert!(entry.expires_at.is_some());
        assert_eq!(entry.invited_by.as_deref(), Some("admin@koop.co"));

        let forever = svc.upsert(&admin, request("x@koop.co", Value::Null, Some(0))).await.unwrap();
        assert!(forever.expires_at.is_none());
        assert!(!forever.roles.is_admin());

        assert_eq!(svc.list(&admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_admin_is_forbidden() {
        let svc = PreapprovalService::new(Stores::from_backend(Arc::new(MemoryStore::new())));
        let user = caller(Roles::USER);
        assert!(matches!(
            svc.list(&user).await,
            Err(crate::services::ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let stores = Stores::from_backend(Arc::new(MemoryStore::new()));
        let svc = PreapprovalService::new(stores.clone());
        let admin = caller(Roles::ADMIN);
        svc.upsert(&admin, request("live@koop.co", json!("user"), None)).await.unwrap();
        stores
            .preapprovals
            .upsert(PreapprovalUpsert {
                email: "old@koop.co".into(),
                roles: Roles::USER,
                expires_at: Some(Utc::now() - chrono::Duration::days(1)),
                invited_by: None,
                notes: None,
            })
            .await
            .unwrap();

        assert_eq!(svc.purge_expired().await.unwrap(), 1);
        assert_eq!(svc.list(&admin).await.unwrap().len(), 1);
    }
}

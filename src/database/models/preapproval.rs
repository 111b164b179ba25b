use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::Roles;

pub const DEFAULT_DAYS_VALID: i64 = 30;

/// An email pre-authorized for a role set before the account exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreapprovalEntry {
    pub email: String,
    pub roles: Roles,
    pub expires_at: Option<DateTime<Utc>>,
    pub used: bool,
    pub invited_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PreapprovalEntry {
    /// Expired entries are inert and treated as absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired(now)
    }
}

/// Upsert payload. Re-issuing for an email resets `used`.
#[derive(Debug, Clone)]
pub struct PreapprovalUpsert {
    pub email: String,
    pub roles: Roles,
    pub expires_at: Option<DateTime<Utc>>,
    pub invited_by: Option<String>,
    pub notes: Option<String>,
}

/// `None` or a non-positive value means "never expires".
pub fn expiry_from_days(days_valid: Option<i64>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match days_valid {
        Some(days) if days > 0 => Some(now + Duration::days(days)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(expires_at: Option<DateTime<Utc>>, used: bool) -> PreapprovalEntry {
        let now = Utc::now();
        PreapprovalEntry {
            email: "x@y.co".into(),
            roles: Roles::USER,
            expires_at,
            used,
            invited_by: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn liveness() {
        let now = Utc::now();
        assert!(entry(None, false).is_live(now));
        assert!(!entry(None, true).is_live(now));
        assert!(!entry(Some(now - Duration::seconds(1)), false).is_live(now));
        assert!(entry(Some(now + Duration::days(1)), false).is_live(now));
    }

    #[test]
    fn expiry_days() {
        let now = Utc::now();
        assert_eq!(expiry_from_days(Some(30), now), Some(now + Duration::days(30)));
        assert_eq!(expiry_from_days(Some(0), now), None);
        assert_eq!(expiry_from_days(None, now), None);
    }
}

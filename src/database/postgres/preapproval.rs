use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::PgStore;
use crate::database::models::{normalize_email, PreapprovalEntry, PreapprovalUpsert};
use crate::database::stores::{PreapprovalStore, StoreResult};
use crate::roles::{normalize_roles, Role};

const COLUMNS: &str = "email, roles, expires_at, used, invited_by, notes, created_at, updated_at";

#[derive(Debug, FromRow)]
struct PreapprovalRow {
    email: String,
    roles: Vec<String>,
    expires_at: Option<DateTime<Utc>>,
    used: bool,
    invited_by: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PreapprovalRow> for PreapprovalEntry {
    fn from(row: PreapprovalRow) -> Self {
        PreapprovalEntry {
            email: row.email,
            roles: normalize_roles(&row.roles, Role::User.as_str()),
            expires_at: row.expires_at,
            used: row.used,
            invited_by: row.invited_by,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl PreapprovalStore for PgStore {
    async fn upsert(&self, entry: PreapprovalUpsert) -> StoreResult<PreapprovalEntry> {
        let sql = format!(
            "INSERT INTO preapprovals (email, roles, expires_at, used, invited_by, notes) \
             VALUES ($1, $2, $3, FALSE, $4, $5) \
             ON CONFLICT (email) DO UPDATE SET roles = EXCLUDED.roles, expires_at = EXCLUDED.expires_at, \
               used = FALSE, invited_by = EXCLUDED.invited_by, notes = EXCLUDED.notes, updated_at = now() \
             RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, PreapprovalRow>(&sql)
            .bind(normalize_email(&entry.email))
            .bind(entry.roles.to_vec())
            .bind(entry.expires_at)
            .bind(&entry.invited_by)
            .bind(&entry.notes)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn find_live(&self, email: &str, now: DateTime<Utc>) -> StoreResult<Option<PreapprovalEntry>> {
        let sql = format!(
            "SELECT {} FROM preapprovals WHERE email = $1 AND NOT used \
             AND (expires_at IS NULL OR expires_at > $2)",
            COLUMNS
        );
        let row = sqlx::query_as::<_, PreapprovalRow>(&sql)
            .bind(normalize_email(email))
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PreapprovalEntry::from))
    }

    async fn mark_used(&self, email: &str) -> StoreResult<()> {
        sqlx::query("UPDATE preapprovals SET used = TRUE, updated_at = now() WHERE email = $1")
            .bind(normalize_email(email))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, now: DateTime<Utc>) -> StoreResult<Vec<PreapprovalEntry>> {
        let sql = format!(
            "SELECT {} FROM preapprovals WHERE expires_at IS NULL OR expires_at > $1 ORDER BY created_at DESC",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, PreapprovalRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PreapprovalEntry::from).collect())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM preapprovals WHERE expires_at IS NOT NULL AND expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

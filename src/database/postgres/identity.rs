use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{normalize_email, Identity};
use crate::database::stores::{IdentityStore, StoreResult};
use crate::roles::{normalize_roles, Role};

const COLUMNS: &str =
    "id, email, name, password_hash, roles, active, document_number, phone, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(super) struct IdentityRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    roles: Vec<String>,
    active: bool,
    document_number: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Identity {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            roles: normalize_roles(&row.roles, Role::User.as_str()),
            active: row.active,
            document_number: row.document_number,
            phone: row.phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let sql = format!("SELECT {} FROM identities WHERE lower(email) = $1", COLUMNS);
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Identity::from))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        let sql = format!("SELECT {} FROM identities WHERE id = $1", COLUMNS);
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Identity::from))
    }

    async fn create(&self, identity: Identity) -> StoreResult<Identity> {
        let sql = format!(
            "INSERT INTO identities ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            COLUMNS, COLUMNS
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.name)
            .bind(&identity.password_hash)
            .bind(identity.roles.to_vec())
            .bind(identity.active)
            .bind(&identity.document_number)
            .bind(&identity.phone)
            .bind(identity.created_at)
            .bind(identity.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, "email"))?;
        Ok(row.into())
    }

    async fn update(&self, identity: &Identity) -> StoreResult<Identity> {
        let sql = format!(
            "UPDATE identities SET email = $2, name = $3, password_hash = $4, roles = $5, active = $6, \
             document_number = $7, phone = $8, updated_at = $9 WHERE id = $1 RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.name)
            .bind(&identity.password_hash)
            .bind(identity.roles.to_vec())
            .bind(identity.active)
            .bind(&identity.document_number)
            .bind(&identity.phone)
            .bind(identity.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, "email"))?;
        row.map(Identity::from)
            .ok_or_else(|| DatabaseError::NotFound(format!("identity {}", identity.id)))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> StoreResult<Vec<Identity>> {
        let sql = format!("SELECT {} FROM identities ORDER BY created_at DESC", COLUMNS);
        let rows = sqlx::query_as::<_, IdentityRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Identity::from).collect())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{Client, ClientWithOwner, IdentitySummary};
use crate::database::stores::{ClientStore, StoreResult};

const COLUMNS: &str = "id, user_id, assigned_admin, full_name, document_type, document_number, birth_date, \
                       phone, email, address, contact_info, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ClientRow {
    id: Uuid,
    user_id: Uuid,
    assigned_admin: Option<Uuid>,
    full_name: String,
    document_type: Option<String>,
    document_number: String,
    birth_date: Option<NaiveDate>,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    contact_info: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            id: row.id,
            user_id: row.user_id,
            assigned_admin: row.assigned_admin,
            full_name: row.full_name,
            document_type: row.document_type,
            document_number: row.document_number,
            birth_date: row.birth_date,
            phone: row.phone,
            email: row.email,
            address: row.address,
            contact_info: row.contact_info,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ClientOwnerRow {
    #[sqlx(flatten)]
    client: ClientRow,
    owner_name: Option<String>,
    owner_email: Option<String>,
    admin_name: Option<String>,
    admin_email: Option<String>,
}

impl From<ClientOwnerRow> for ClientWithOwner {
    fn from(row: ClientOwnerRow) -> Self {
        let owner = match (row.owner_name, row.owner_email) {
            (Some(name), Some(email)) => Some(IdentitySummary { id: row.client.user_id, name, email }),
            _ => None,
        };
        let assigned_admin_info = match (row.client.assigned_admin, row.admin_name, row.admin_email) {
            (Some(id), Some(name), Some(email)) => Some(IdentitySummary { id, name, email }),
            _ => None,
        };
        ClientWithOwner {
            client: row.client.into(),
            owner,
            assigned_admin_info,
        }
    }
}

#[derive(Clone, Copy)]
enum ClientKey<'a> {
    Id(Uuid),
    UserId(Uuid),
    DocumentNumber(&'a str),
}

impl PgStore {
    async fn find_client(&self, key: ClientKey<'_>) -> StoreResult<Option<Client>> {
        let column = match key {
            ClientKey::Id(_) => "id",
            ClientKey::UserId(_) => "user_id",
            ClientKey::DocumentNumber(_) => "document_number",
        };
        let sql = format!("SELECT {} FROM clients WHERE {} = $1", COLUMNS, column);
        let query = sqlx::query_as::<_, ClientRow>(&sql);
        let query = match key {
            ClientKey::Id(id) | ClientKey::UserId(id) => query.bind(id),
            ClientKey::DocumentNumber(number) => query.bind(number.to_string()),
        };
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(Client::from))
    }
}

#[async_trait]
impl ClientStore for PgStore {
    async fn find_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Client>> {
        self.find_client(ClientKey::UserId(user_id)).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Client>> {
        self.find_client(ClientKey::Id(id)).await
    }

    async fn find_by_document_number(&self, document_number: &str) -> StoreResult<Option<Client>> {
        self.find_client(ClientKey::DocumentNumber(document_number)).await
    }

    async fn create(&self, client: Client) -> StoreResult<Client> {
        let sql = format!(
            "INSERT INTO clients ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING {}",
            COLUMNS, COLUMNS
        );
        let row = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(client.id)
            .bind(client.user_id)
            .bind(client.assigned_admin)
            .bind(&client.full_name)
            .bind(&client.document_type)
            .bind(&client.document_number)
            .bind(client.birth_date)
            .bind(&client.phone)
            .bind(&client.email)
            .bind(&client.address)
            .bind(&client.contact_info)
            .bind(client.created_at)
            .bind(client.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, "client"))?;
        Ok(row.into())
    }

    async fn update(&self, client: &Client) -> StoreResult<Client> {
        let sql = format!(
            "UPDATE clients SET assigned_admin = $2, full_name = $3, document_type = $4, document_number = $5, \
             birth_date = $6, phone = $7, email = $8, address = $9, contact_info = $10, updated_at = $11 \
             WHERE id = $1 RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(client.id)
            .bind(client.assigned_admin)
            .bind(&client.full_name)
            .bind(&client.document_type)
            .bind(&client.document_number)
            .bind(client.birth_date)
            .bind(&client.phone)
            .bind(&client.email)
            .bind(&client.address)
            .bind(&client.contact_info)
            .bind(client.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, "document number"))?;
        row.map(Client::from)
            .ok_or_else(|| DatabaseError::NotFound(format!("client {}", client.id)))
    }

    async fn list_with_owner(&self) -> StoreResult<Vec<ClientWithOwner>> {
        let sql = "SELECT c.id, c.user_id, c.assigned_admin, c.full_name, c.document_type, c.document_number, \
                   c.birth_date, c.phone, c.email, c.address, c.contact_info, c.created_at, c.updated_at, \
                   o.name AS owner_name, o.email AS owner_email, a.name AS admin_name, a.email AS admin_email \
                   FROM clients c \
                   LEFT JOIN identities o ON o.id = c.user_id \
                   LEFT JOIN identities a ON a.id = c.assigned_admin \
                   ORDER BY c.created_at DESC";
        let rows = sqlx::query_as::<_, ClientOwnerRow>(sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ClientWithOwner::from).collect())
    }
}

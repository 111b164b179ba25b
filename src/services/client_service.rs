use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::models::{clean_optional, Client, ClientPatch, ClientWithOwner};
use crate::database::Stores;
use crate::middleware::AuthUser;
use crate::policy::{authorize, Action, Target};
use crate::storage::sanitize::sanitize_segment;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub document_type: Option<String>,
    /// Falls back to the identity's document number.
    pub document_number: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub contact_info: Option<String>,
    pub assigned_admin: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// `null` unassigns.
    pub admin_id: Option<Uuid>,
}

pub struct ClientService {
    stores: Stores,
}

impl ClientService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn create(&self, caller: &AuthUser, req: CreateClientRequest) -> ServiceResult<Client> {
        authorize(Some(caller), Action::CreateClient, Target::None)?;

        let owner = self
            .stores
            .identities
            .find_by_id(req.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        if self.stores.clients.find_by_user_id(owner.id).await?.is_some() {
            return Err(ServiceError::Conflict("A client already exists for this user".to_string()));
        }

        let document_number = clean_optional(req.document_number)
            .or_else(|| owner.document_number.clone())
            .ok_or_else(|| ServiceError::invalid("Document number is required"))?;
        let document_number = canonical_document_number(&document_number)?;
        if self.stores.clients.find_by_document_number(&document_number).await?.is_some() {
            return Err(ServiceError::Conflict("Document number is already registered".to_string()));
        }

        if let Some(admin_id) = req.assigned_admin {
            self.ensure_admin(admin_id).await?;
        }

        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            user_id: owner.id,
            assigned_admin: req.assigned_admin,
            full_name: clean_optional(req.full_name).unwrap_or_else(|| owner.name.clone()),
            document_type: clean_optional(req.document_type),
            document_number,
            birth_date: req.birth_date,
            phone: clean_optional(req.phone).or_else(|| owner.phone.clone()),
            email: clean_optional(req.email)
                .map(|e| e.to_lowercase())
                .or_else(|| Some(owner.email.clone())),
            address: clean_optional(req.address),
            contact_info: clean_optional(req.contact_info),
            created_at: now,
            updated_at: now,
        };

        let client = self.stores.clients.create(client).await?;
        info!("Client {} created for user {} by {}", client.id, owner.id, caller.id);
        Ok(client)
    }

    pub async fn assign(&self, caller: &AuthUser, client_id: Uuid, admin_id: Option<Uuid>) -> ServiceResult<Client> {
        authorize(Some(caller), Action::AssignClient, Target::None)?;
        let mut client = self.find(client_id).await?;
        if let Some(admin_id) = admin_id {
            self.ensure_admin(admin_id).await?;
        }
        client.assigned_admin = admin_id;
        client.updated_at = Utc::now();
        Ok(self.stores.clients.update(&client).await?)
    }

    pub async fn get(&self, caller: &AuthUser, client_id: Uuid) -> ServiceResult<Client> {
        let client = self.find(client_id).await?;
        authorize(Some(caller), Action::ReadClient, Target::Client(&client))?;
        Ok(client)
    }

    /// The caller's own profile.
    pub async fn me(&self, caller: &AuthUser) -> ServiceResult<Client> {
        let client = self
            .stores
            .clients
            .find_by_user_id(caller.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client profile not found"))?;
        authorize(Some(caller), Action::ReadClient, Target::Client(&client))?;
        Ok(client)
    }

    /// Owners may only touch contact fields.
    pub async fn update(&self, caller: &AuthUser, client_id: Uuid, patch: ClientPatch) -> ServiceResult<Client> {
        let mut client = self.find(client_id).await?;
        authorize(Some(caller), Action::UpdateClientContact, Target::Client(&client))?;
        if !patch.is_contact_only() {
            authorize(Some(caller), Action::EditClientIdentity, Target::Client(&client))?;
        }

        if let Some(number) = patch.document_number.as_deref().map(str::trim) {
            if number.is_empty() {
                return Err(ServiceError::invalid("Document number cannot be empty"));
            }
            canonical_document_number(number)?;
            if let Some(other) = self.stores.clients.find_by_document_number(number).await? {
                if other.id != client.id {
                    return Err(ServiceError::Conflict("Document number is already registered".to_string()));
                }
            }
        }
        if matches!(patch.full_name.as_deref().map(str::trim), Some("")) {
            return Err(ServiceError::invalid("Full name cannot be empty"));
        }

        patch.apply(&mut client);
        client.updated_at = Utc::now();
        Ok(self.stores.clients.update(&client).await?)
    }

    pub async fn list(&self, caller: &AuthUser) -> ServiceResult<Vec<ClientWithOwner>> {
        authorize(Some(caller), Action::ListClients, Target::None)?;
        Ok(self.stores.clients.list_with_owner().await?)
    }

    async fn find(&self, client_id: Uuid) -> ServiceResult<Client> {
        self.stores
            .clients
            .find_by_id(client_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client not found"))
    }

    /// Assignment targets must hold the admin role right now.
    async fn ensure_admin(&self, admin_id: Uuid) -> ServiceResult<()> {
        match self.stores.identities.find_by_id(admin_id).await? {
            Some(identity) if identity.is_admin() => Ok(()),
            _ => Err(ServiceError::invalid("Assigned user must be an admin")),
        }
    }
}

/// Names the client's storage folder: must already be a sanitized key segment.
fn canonical_document_number(raw: &str) -> ServiceResult<String> {
    let number = raw.trim();
    match sanitize_segment(number) {
        Some(clean) if clean == number && !clean.contains(char::is_whitespace) => Ok(clean),
        _ => Err(ServiceError::invalid(
            "Document number may only contain letters, digits, '.', '_' and '-'",
        )),
    }
}

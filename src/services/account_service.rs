use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{validate_email, ServiceError, ServiceResult};
use crate::auth::{validate_password_strength, CredentialHasher, TokenPair, TokenService};
use crate::database::models::{clean_optional, normalize_email, nullable, Identity, PreapprovalUpsert};
use crate::database::Stores;
use crate::middleware::AuthUser;
use crate::policy::{authorize, Action, Target};
use crate::roles::{normalize_role_value, normalize_roles, Role, Roles};

/// Same text for unknown email and wrong password.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";
pub const ACCOUNT_DEACTIVATED: &str = "Account is deactivated. Contact an administrator.";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub roles: Value,
    pub document_number: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub user: Identity,
    pub pending_activation: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Credential pair plus the identity it was issued for.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: Identity,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub document_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Provisioned {
    /// An existing identity now holds the admin role.
    Granted { user: Identity },
    /// No identity yet; a preapproval will apply at registration.
    Preapproved { email: String },
}

/// Registration, login, refresh and admin-driven lifecycle transitions.
pub struct AccountService {
    stores: Stores,
    tokens: Arc<TokenService>,
    hasher: CredentialHasher,
}

impl AccountService {
    pub fn new(stores: Stores, tokens: Arc<TokenService>, hasher: CredentialHasher) -> Self {
        Self { stores, tokens, hasher }
    }

    /// Creates an inactive identity. No session is issued.
    pub async fn register(&self, req: RegisterRequest) -> ServiceResult<Registration> {
        let email = normalize_email(&req.email);
        validate_email(&email)?;
        let name = req.name.trim();
        if name.is_empty() {
            return Err(ServiceError::invalid("Name is required"));
        }
        validate_password_strength(&req.password).map_err(ServiceError::InvalidInput)?;

        if self.stores.identities.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("Email is already registered".to_string()));
        }

        let now = Utc::now();
        let preapproval = self.stores.preapprovals.find_live(&email, now).await?;
        let roles = match &preapproval {
            Some(entry) => entry.roles,
            None => normalize_role_value(&req.roles, Role::User.as_str()),
        };

        let hash = self.hasher.hash_async(&req.password).await?;
        let mut identity = Identity::new(&email, name, hash, roles);
        identity.document_number = clean_optional(req.document_number);
        identity.phone = clean_optional(req.phone);

        let identity = self.stores.identities.create(identity).await?;
        if preapproval.is_some() {
            self.stores.preapprovals.mark_used(&email).await?;
            info!("Consumed preapproval for {}", email);
        }

        info!("Registered {} as {} (pending activation)", identity.email, identity.roles.role());
        Ok(Registration {
            user: identity,
            pending_activation: true,
        })
    }

    pub async fn login(&self, req: LoginRequest) -> ServiceResult<Session> {
        let email = normalize_email(&req.email);
        let found = self.stores.identities.find_by_email(&email).await?;

        // Unknown emails still pay for one verification.
        let matched = self
            .hasher
            .verify_async(&req.password, found.as_ref().map(|i| i.password_hash.as_str()))
            .await?;
        let identity = match found {
            Some(identity) if matched => identity,
            Some(identity) => {
                warn!("Login failed for user {}: bad password", identity.id);
                return Err(ServiceError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
            }
            None => {
                warn!("Login failed: unknown email");
                return Err(ServiceError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !identity.active {
            warn!("Login refused for deactivated user {}", identity.id);
            return Err(ServiceError::Forbidden(ACCOUNT_DEACTIVATED.to_string()));
        }

        let tokens = self.tokens.issue_pair(&identity)?;
        info!("User {} logged in", identity.id);
        Ok(Session { user: identity, tokens })
    }

    /// Exchanges a refresh token for a new pair. Live account state is re-checked.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> ServiceResult<Session> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::Unauthenticated("Missing refresh token".to_string()))?;

        let claims = self.tokens.verify_refresh(token).map_err(|e| {
            warn!("Rejected refresh token: {}", e);
            ServiceError::from(e)
        })?;

        let identity = self
            .stores
            .identities
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated("Account no longer exists".to_string()))?;

        if !identity.active {
            warn!("Refresh refused for deactivated user {}", identity.id);
            return Err(ServiceError::Forbidden(ACCOUNT_DEACTIVATED.to_string()));
        }

        let tokens = self.tokens.issue_pair(&identity)?;
        Ok(Session { user: identity, tokens })
    }

    /// The caller's live record.
    pub async fn whoami(&self, caller: &AuthUser) -> ServiceResult<Identity> {
        authorize(Some(caller), Action::ReadOwnAccount, Target::Identity(caller.id))?;
        self.stores
            .identities
            .find_by_id(caller.id)
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated("Account no longer exists".to_string()))
    }

    pub async fn list(&self, caller: &AuthUser) -> ServiceResult<Vec<Identity>> {
        authorize(Some(caller), Action::ListUsers, Target::None)?;
        Ok(self.stores.identities.list().await?)
    }

    pub async fn get(&self, caller: &AuthUser, id: Uuid) -> ServiceResult<Identity> {
        authorize(Some(caller), Action::ListUsers, Target::Identity(id))?;
        self.find(id).await
    }

    pub async fn set_active(&self, caller: &AuthUser, id: Uuid, active: bool) -> ServiceResult<Identity> {
        authorize(Some(caller), Action::ManageUsers, Target::Identity(id))?;
        let mut identity = self.find(id).await?;
        if identity.active == active {
            return Ok(identity);
        }
        identity.active = active;
        identity.touch();
        let identity = self.stores.identities.update(&identity).await?;
        info!("User {} {} by {}", id, if active { "activated" } else { "deactivated" }, caller.id);
        Ok(identity)
    }

    /// Grants (`true`) or revokes (`false`) admin. Idempotent.
    pub async fn set_admin(&self, caller: &AuthUser, id: Uuid, admin: bool) -> ServiceResult<Identity> {
        authorize(Some(caller), Action::ChangeRole, Target::Identity(id))?;
        let mut identity = self.find(id).await?;
        let roles = if admin { Roles::ADMIN } else { Roles::USER };
        if identity.roles == roles {
            return Ok(identity);
        }
        identity.roles = roles;
        identity.touch();
        let identity = self.stores.identities.update(&identity).await?;
        info!("User {} role set to {} by {}", id, roles.role(), caller.id);
        Ok(identity)
    }

    pub async fn update_profile(&self, caller: &AuthUser, id: Uuid, patch: ProfilePatch) -> ServiceResult<Identity> {
        authorize(Some(caller), Action::ManageUsers, Target::Identity(id))?;
        let mut identity = self.find(id).await?;
        if let Some(name) = patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServiceError::invalid("Name cannot be empty"));
            }
            identity.name = name.to_string();
        }
        if let Some(number) = patch.document_number {
            identity.document_number = clean_optional(number);
        }
        if let Some(phone) = patch.phone {
            identity.phone = clean_optional(phone);
        }
        identity.touch();
        Ok(self.stores.identities.update(&identity).await?)
    }

    pub async fn delete(&self, caller: &AuthUser, id: Uuid) -> ServiceResult<()> {
        authorize(Some(caller), Action::DeleteUser, Target::Identity(id))?;
        if !self.stores.identities.delete(id).await? {
            return Err(ServiceError::not_found("User not found"));
        }
        info!("User {} deleted by {}", id, caller.id);
        Ok(())
    }

    /// Operator path: promote an existing identity, or preapprove the email.
    pub async fn provision_admin(&self, email: &str) -> ServiceResult<Provisioned> {
        let email = normalize_email(email);
        validate_email(&email)?;

        if let Some(mut identity) = self.stores.identities.find_by_email(&email).await? {
            if !identity.is_admin() {
                identity.roles = Roles::ADMIN;
                identity.touch();
                identity = self.stores.identities.update(&identity).await?;
            }
            info!("Provisioned admin role for existing user {}", identity.id);
            return Ok(Provisioned::Granted { user: identity });
        }

        self.stores
            .preapprovals
            .upsert(PreapprovalUpsert {
                email: email.clone(),
                roles: normalize_roles(["admin"], "admin"),
                expires_at: None,
                invited_by: Some("provision-admin".to_string()),
                notes: None,
            })
            .await?;
        info!("Preapproved {} as admin", email);
        Ok(Provisioned::Preapproved { email })
    }

    async fn find(&self, id: Uuid) -> ServiceResult<Identity> {
        self.stores
            .identities
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }
}

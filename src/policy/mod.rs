// The single authorization decision point. Every protected operation calls
// `authorize` before touching a store. Rules short-circuit in order:
// authentication, admin gate, self-protection, ownership.

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::database::models::{Client, Task};
use crate::middleware::AuthUser;
use crate::storage::{ClientScope, KeyOwner};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Admin-only
    ManagePreapprovals,
    ListUsers,
    ManageUsers,
    ChangeRole,
    DeleteUser,
    CreateClient,
    AssignClient,
    ListClients,
    EditClientIdentity,
    PurgeClientDocuments,
    CreateTask,
    DeleteTask,
    ReassignTask,

    // Ownership-checked
    ReadClient,
    UpdateClientContact,
    ReadObject,
    WriteObject,
    DeleteObject,
    ListClientDocuments,
    ReadTask,
    EditTask,

    // Any authenticated caller
    ReadOwnAccount,
}

impl Action {
    pub fn is_admin_only(self) -> bool {
        matches!(
            self,
            Action::ManagePreapprovals
                | Action::ListUsers
                | Action::ManageUsers
                | Action::ChangeRole
                | Action::DeleteUser
                | Action::CreateClient
                | Action::AssignClient
                | Action::ListClients
                | Action::EditClientIdentity
                | Action::PurgeClientDocuments
                | Action::CreateTask
                | Action::DeleteTask
                | Action::ReassignTask
        )
    }

    /// Mutations an admin may never apply to their own identity.
    fn is_self_protected(self) -> bool {
        matches!(self, Action::ChangeRole | Action::DeleteUser)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    None,
    Identity(Uuid),
    Client(&'a Client),
    /// A storage key (or client key-space) classified by prefix, with the
    /// caller's client scope.
    StoredObject {
        owner: &'a KeyOwner,
        scope: &'a ClientScope,
    },
    Task(&'a Task),
}

/// Decides whether `caller` may perform `action` on `target`.
pub fn authorize(caller: Option<&AuthUser>, action: Action, target: Target<'_>) -> Result<(), PolicyError> {
    let Some(caller) = caller else {
        return Err(PolicyError::Unauthenticated);
    };

    let decision = decide(caller, action, target);
    if let Err(err) = &decision {
        warn!("Policy denied {:?} for user {}: {}", action, caller.id, err);
    }
    decision
}

fn decide(caller: &AuthUser, action: Action, target: Target<'_>) -> Result<(), PolicyError> {
    let is_admin = caller.roles.is_admin();

    if action.is_admin_only() && !is_admin {
        return Err(PolicyError::Forbidden("Admin role required"));
    }

    if action.is_self_protected() {
        if let Target::Identity(id) = target {
            if id == caller.id {
                return Err(PolicyError::Forbidden("This action cannot target your own account"));
            }
        }
    }

    if is_admin {
        return Ok(());
    }

    match target {
        Target::None | Target::Identity(_) => Ok(()),
        Target::Client(client) => {
            if client.user_id == caller.id {
                Ok(())
            } else {
                Err(PolicyError::NotFound("Client not found"))
            }
        }
        Target::StoredObject { owner, scope } => match owner {
            KeyOwner::Personal(id) if *id == caller.id.to_string() => Ok(()),
            KeyOwner::Personal(_) => Err(PolicyError::Forbidden("Access denied for this key")),
            KeyOwner::Client(number) => match scope {
                ClientScope::Any => Ok(()),
                ClientScope::Own(own) if own == number => Ok(()),
                ClientScope::Own(_) => Err(PolicyError::Forbidden("Access denied for this key")),
                ClientScope::Missing => Err(PolicyError::NotFound("Client profile not found")),
            },
            KeyOwner::Foreign => Err(PolicyError::Forbidden("Access denied for this key")),
        },
        Target::Task(task) => {
            let allowed = match action {
                Action::ReadTask => task.assigned_to == caller.id,
                _ => task.assigned_to == caller.id || task.created_by == caller.id,
            };
            if allowed {
                Ok(())
            } else {
                Err(PolicyError::Forbidden("Access denied for this task"))
            }
        }
    }
}

/// Client scope for a caller, given the live client lookup result.
pub fn client_scope(caller: &AuthUser, own_client: Option<&Client>) -> ClientScope {
    if caller.roles.is_admin() {
        ClientScope::Any
    } else {
        match own_client {
            Some(client) => ClientScope::Own(client.document_number.clone()),
            None => ClientScope::Missing,
        }
    }
}

// storage/namespace.rs - Logical folder to storage key resolution
//
// Two regimes share one base prefix:
//   personal: {base}/{actor_id}/{root}/{segments...}/{ms}_{name}
//   client:   {base}/{client_root}/{document_number}/{segments...}/[{ms}_]{name}
//
// Every key issued here is prefixed by something the caller is authorized for,
// so prefix classification of a caller-supplied key is enough to gate reads
// and deletes.

use thiserror::Error;

use super::sanitize::{sanitize_file_name, sanitize_segment};
use crate::config::StorageConfig;

const DEFAULT_PERSONAL_ROOT: &str = "documentos_iniciales";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Folder not allowed: {0}")]
    FolderNotAllowed(String),
    #[error("Invalid actor identifier")]
    InvalidActor,
    #[error("A client document number is required")]
    DocumentNumberRequired,
    #[error("Client profile not found")]
    ClientNotFound,
}

/// Which client key-space the caller may address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientScope {
    /// Admins: any document number.
    Any,
    /// Non-admins with a client profile: only this number.
    Own(String),
    /// Non-admins without a client profile.
    Missing,
}

/// The caller as the namespace sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    id: String,
    scope: ClientScope,
}

impl Actor {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope(&self) -> &ClientScope {
        &self.scope
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalFolder {
    Personal {
        root: String,
        segments: Vec<String>,
    },
    Client {
        document_number: Option<String>,
        segments: Vec<String>,
    },
}

/// Who a storage key belongs to, judged from its prefix alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOwner {
    Personal(String),
    Client(String),
    Foreign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrefix {
    /// Always ends with `/`.
    pub prefix: String,
    /// Logical folder after any rewrite, e.g. `clientes/123/contratos`.
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub key: String,
    pub folder: String,
    pub file_name: String,
    /// Set for client-regime keys.
    pub document_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KeyNamespace {
    base_prefix: String,
    personal_roots: Vec<String>,
    client_root: String,
    exact_client_names: bool,
}

impl KeyNamespace {
    pub fn new(
        base_prefix: &str,
        personal_roots: Vec<String>,
        client_root: &str,
        exact_client_names: bool,
    ) -> Self {
        let client_root = client_root.trim().trim_matches('/').to_string();
        let mut roots: Vec<String> = personal_roots
            .into_iter()
            .map(|r| r.trim().trim_matches('/').to_string())
            .filter(|r| !r.is_empty() && !r.eq_ignore_ascii_case(&client_root))
            .collect();
        if roots.is_empty() {
            roots.push(DEFAULT_PERSONAL_ROOT.to_string());
        }
        Self {
            base_prefix: base_prefix.trim().trim_matches('/').to_string(),
            personal_roots: roots,
            client_root,
            exact_client_names,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            &config.base_prefix,
            config.personal_folders.clone(),
            &config.client_root,
            config.exact_client_names,
        )
    }

    pub fn base_prefix(&self) -> &str {
        &self.base_prefix
    }

    pub fn default_folder(&self) -> &str {
        &self.personal_roots[0]
    }

    pub fn personal_roots(&self) -> &[String] {
        &self.personal_roots
    }

    pub fn client_root(&self) -> &str {
        &self.client_root
    }

    /// Builds an actor, failing closed on ids that could escape their prefix.
    pub fn actor(&self, id: &str, scope: ClientScope) -> Result<Actor, NamespaceError> {
        let id = id.trim();
        if id.is_empty()
            || id.contains('/')
            || id.contains('\\')
            || id.contains("..")
            || id.eq_ignore_ascii_case(&self.client_root)
        {
            return Err(NamespaceError::InvalidActor);
        }
        Ok(Actor {
            id: id.to_string(),
            scope,
        })
    }

    /// Parses a caller-supplied folder path. Blank means the default folder.
    pub fn parse_folder(&self, raw: Option<&str>) -> Result<LogicalFolder, NamespaceError> {
        let raw = raw.unwrap_or("").trim();
        let parts: Vec<&str> = raw.split('/').map(str::trim).filter(|p| !p.is_empty()).collect();

        if parts.iter().any(|p| p.contains("..")) {
            return Err(NamespaceError::InvalidPath(raw.to_string()));
        }

        let Some((root, rest)) = parts.split_first() else {
            return Ok(LogicalFolder::Personal {
                root: self.default_folder().to_string(),
                segments: Vec::new(),
            });
        };

        if root.eq_ignore_ascii_case(&self.client_root) {
            let (document_number, rest) = match rest.split_first() {
                Some((number, rest)) => {
                    let number = sanitize_segment(number)
                        .ok_or_else(|| NamespaceError::InvalidPath(raw.to_string()))?;
                    (Some(number), rest)
                }
                None => (None, rest),
            };
            return Ok(LogicalFolder::Client {
                document_number,
                segments: sanitize_all(rest),
            });
        }

        let canonical = self
            .personal_roots
            .iter()
            .find(|r| r.eq_ignore_ascii_case(root))
            .ok_or_else(|| NamespaceError::FolderNotAllowed(root.to_string()))?;

        Ok(LogicalFolder::Personal {
            root: canonical.clone(),
            segments: sanitize_all(rest),
        })
    }

    /// Prefix under which `actor` may list or create within `folder`.
    ///
    /// A non-admin's client folder is rewritten to their own document number.
    /// An admin's bare client root resolves to the whole client key-space.
    pub fn resolve_prefix(&self, actor: &Actor, folder: &LogicalFolder) -> Result<ResolvedPrefix, NamespaceError> {
        match folder {
            LogicalFolder::Personal { root, segments } => {
                let folder = join_folder(root, None, segments);
                Ok(ResolvedPrefix {
                    prefix: format!("{}/{}/{}/", self.base_prefix, actor.id, folder),
                    folder,
                })
            }
            LogicalFolder::Client {
                document_number,
                segments,
            } => match self.effective_document_number(actor, document_number.as_deref())? {
                Some(number) => {
                    let folder = join_folder(&self.client_root, Some(&number), segments);
                    Ok(ResolvedPrefix {
                        prefix: format!("{}/{}/", self.base_prefix, folder),
                        folder,
                    })
                }
                None => Ok(ResolvedPrefix {
                    prefix: format!("{}/{}/", self.base_prefix, self.client_root),
                    folder: self.client_root.clone(),
                }),
            },
        }
    }

    /// The actor's own personal prefix, `{base}/{id}/`.
    pub fn personal_prefix(&self, actor: &Actor) -> String {
        format!("{}/{}/", self.base_prefix, actor.id)
    }

    /// Storage key for a new upload.
    pub fn resolve_key(
        &self,
        actor: &Actor,
        folder: &LogicalFolder,
        original_name: &str,
        timestamp_ms: i64,
    ) -> Result<ResolvedKey, NamespaceError> {
        let file_name = sanitize_file_name(original_name);
        let resolved = self.resolve_prefix(actor, folder)?;

        match folder {
            LogicalFolder::Personal { .. } => Ok(ResolvedKey {
                key: format!("{}{}_{}", resolved.prefix, timestamp_ms, file_name),
                folder: resolved.folder,
                file_name,
                document_number: None,
            }),
            LogicalFolder::Client { document_number, .. } => {
                let number = self
                    .effective_document_number(actor, document_number.as_deref())?
                    .ok_or(NamespaceError::DocumentNumberRequired)?;
                let key = if self.exact_client_names {
                    format!("{}{}", resolved.prefix, file_name)
                } else {
                    format!("{}{}_{}", resolved.prefix, timestamp_ms, file_name)
                };
                Ok(ResolvedKey {
                    key,
                    folder: resolved.folder,
                    file_name,
                    document_number: Some(number),
                })
            }
        }
    }

    /// Classifies a caller-supplied key by prefix. Malformed keys are rejected.
    pub fn classify_key(&self, key: &str) -> Result<KeyOwner, NamespaceError> {
        if key.is_empty()
            || key.starts_with('/')
            || key.contains("//")
            || key.contains('\\')
            || key.split('/').any(|part| part == ".." || part == "." || part.contains(".."))
        {
            return Err(NamespaceError::InvalidPath(key.to_string()));
        }

        let Some(rest) = key
            .strip_prefix(self.base_prefix.as_str())
            .and_then(|r| r.strip_prefix('/'))
        else {
            return Ok(KeyOwner::Foreign);
        };

        let mut parts = rest.split('/');
        match parts.next() {
            Some(first) if first == self.client_root => match parts.next() {
                Some(number) if !number.is_empty() => Ok(KeyOwner::Client(number.to_string())),
                _ => Ok(KeyOwner::Foreign),
            },
            Some(first) if !first.is_empty() => Ok(KeyOwner::Personal(first.to_string())),
            _ => Ok(KeyOwner::Foreign),
        }
    }

    /// `None` only for an admin addressing the bare client root.
    fn effective_document_number(
        &self,
        actor: &Actor,
        requested: Option<&str>,
    ) -> Result<Option<String>, NamespaceError> {
        match &actor.scope {
            ClientScope::Any => Ok(requested.map(str::to_string)),
            ClientScope::Own(own) => Ok(Some(own.clone())),
            ClientScope::Missing => Err(NamespaceError::ClientNotFound),
        }
    }
}

fn sanitize_all(parts: &[&str]) -> Vec<String> {
    parts.iter().filter_map(|p| sanitize_segment(p)).collect()
}

fn join_folder(root: &str, document_number: Option<&str>, segments: &[String]) -> String {
    let mut folder = root.to_string();
    if let Some(number) = document_number {
        folder.push('/');
        folder.push_str(number);
    }
    for segment in segments {
        folder.push('/');
        folder.push_str(segment);
    }
    folder
}

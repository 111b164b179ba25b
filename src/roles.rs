// roles.rs - Canonical two-role model
//
// Every privilege decision funnels through `normalize_roles`. Raw role data
// (request bodies, legacy rows, token claims) never reaches a branch directly.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Case-insensitive, whitespace-tolerant parse into the closed set.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized role set. Always exactly one role.
///
/// Serializes as a one-element array (`["admin"]`) and deserializes from any
/// JSON shape by running it through normalization with the `user` default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Roles(Role);

impl Roles {
    pub const ADMIN: Roles = Roles(Role::Admin);
    pub const USER: Roles = Roles(Role::User);

    pub fn role(&self) -> Role {
        self.0
    }

    pub fn is_admin(&self) -> bool {
        self.0 == Role::Admin
    }

    pub fn to_vec(&self) -> Vec<String> {
        vec![self.0.as_str().to_string()]
    }
}

impl Default for Roles {
    fn default() -> Self {
        Roles::USER
    }
}

impl From<Role> for Roles {
    fn from(role: Role) -> Self {
        Roles(role)
    }
}

impl Serialize for Roles {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.0.as_str()].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Roles {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(normalize_role_value(&raw, Role::User.as_str()))
    }
}

/// Normalize arbitrary role strings into a single-role set.
///
/// `admin` dominates `user`; unrecognized values are dropped; an empty result
/// falls back to `default_role`, itself falling back to `user` when invalid.
pub fn normalize_roles<I, S>(input: I, default_role: &str) -> Roles
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut saw_user = false;
    for raw in input {
        match Role::parse(raw.as_ref()) {
            Some(Role::Admin) => return Roles::ADMIN,
            Some(Role::User) => saw_user = true,
            None => {}
        }
    }

    if saw_user {
        return Roles::USER;
    }

    Roles(Role::parse(default_role).unwrap_or(Role::User))
}

/// Normalize a loosely-typed JSON value: a string, an array of strings, or
/// anything else (treated as empty). Non-string array elements are ignored.
pub fn normalize_role_value(raw: &Value, default_role: &str) -> Roles {
    match raw {
        Value::String(s) => normalize_roles([s.as_str()], default_role),
        Value::Array(items) => normalize_roles(items.iter().filter_map(Value::as_str), default_role),
        _ => normalize_roles(std::iter::empty::<&str>(), default_role),
    }
}

pub fn has_admin_role<I, S>(input: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    normalize_roles(input, Role::User.as_str()).is_admin()
}

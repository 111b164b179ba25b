// Session credentials: a short-lived access token carrying the role snapshot,
// and a long-lived refresh token carrying only the subject. Each is signed
// with its own secret and stamped with a `type` discriminant.

pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::database::models::Identity;
use crate::roles::Roles;

pub use password::{validate_password_strength, CredentialHasher, PasswordError, MIN_PASSWORD_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub roles: Roles,
    pub active: bool,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Wrong token type: expected {0}")]
    WrongType(&'static str),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Token secret not configured: {0}")]
    MissingSecret(&'static str),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str, name: &'static str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret(name));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }
}

/// Signs and verifies both credential kinds.
pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &SecurityConfig) -> Result<Self, TokenError> {
        Self::with_ttls(
            &config.access_token_secret,
            &config.refresh_token_secret,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    pub fn with_ttls(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Result<Self, TokenError> {
        Ok(Self {
            access: KeyPair::from_secret(access_secret, "ACCESS_TOKEN_SECRET")?,
            refresh: KeyPair::from_secret(refresh_secret, "REFRESH_TOKEN_SECRET")?,
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        })
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl.num_seconds()
    }

    pub fn issue_access(&self, identity: &Identity) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: identity.id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            roles: identity.roles,
            active: identity.active,
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        sign(&claims, &self.access.encoding)
    }

    pub fn issue_refresh(&self, subject: Uuid) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: subject,
            token_type: TokenType::Refresh,
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };
        sign(&claims, &self.refresh.encoding)
    }

    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(identity)?,
            refresh_token: self.issue_refresh(identity.id)?,
            expires_in: self.access_ttl_secs(),
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode_typed(token, &self.access.decoding, TokenType::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        decode_typed(token, &self.refresh.decoding, TokenType::Refresh)
    }
}

fn sign<T: Serialize>(claims: &T, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, key).map_err(|e| TokenError::Signing(e.to_string()))
}

/// Verifies signature and expiry, then checks the `type` discriminant before
/// deserializing into the expected claim shape.
fn decode_typed<T: DeserializeOwned>(token: &str, key: &DecodingKey, expected: TokenType) -> Result<T, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<Map<String, Value>>(token, key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })?;

    if data.claims.get("type").and_then(Value::as_str) != Some(expected.as_str()) {
        return Err(TokenError::WrongType(expected.as_str()));
    }

    serde_json::from_value(Value::Object(data.claims)).map_err(|_| TokenError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;

    fn service() -> TokenService {
        TokenService::with_ttls("access-secret", "refresh-secret", 900, 604_800).unwrap()
    }

    fn identity() -> Identity {
        let mut identity = Identity::new("Ana@Example.com", "Ana", "hash".into(), Roles::from(Role::Admin));
        identity.active = true;
        identity
    }

    #[test]
    fn access_token_round_trip_carries_role_snapshot() {
        let svc = service();
        let identity = identity();
        let claims = svc.verify_access(&svc.issue_access(&identity).unwrap()).unwrap();
        assert_eq!(claims.sub, identity.id);
        assert_eq!(claims.email, "ana@example.com");
        assert!(claims.roles.is_admin());
        assert!(claims.active);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let svc = service();
        let identity = identity();
        let pair = svc.issue_pair(&identity).unwrap();

        // Different secrets: a refresh token fails signature verification as access.
        assert_eq!(svc.verify_access(&pair.refresh_token).unwrap_err(), TokenError::Invalid);
        assert_eq!(svc.verify_refresh(&pair.access_token).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn type_discriminant_checked_even_with_shared_secret() {
        let svc = TokenService::with_ttls("same", "same", 900, 900).unwrap();
        let identity = identity();
        let refresh = svc.issue_refresh(identity.id).unwrap();
        let access = svc.issue_access(&identity).unwrap();
        assert_eq!(svc.verify_access(&refresh).unwrap_err(), TokenError::WrongType("access"));
        assert_eq!(svc.verify_refresh(&access).unwrap_err(), TokenError::WrongType("refresh"));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let svc = TokenService::with_ttls("a", "b", -10, -10).unwrap();
        let token = svc.issue_refresh(Uuid::new_v4()).unwrap();
        assert_eq!(svc.verify_refresh(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn garbage_is_invalid() {
        assert_eq!(service().verify_access("not.a.jwt").unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn empty_secret_fails_closed() {
        assert_eq!(
            TokenService::with_ttls("", "x", 1, 1).unwrap_err(),
            TokenError::MissingSecret("ACCESS_TOKEN_SECRET")
        );
    }
}

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Issues and checks time-limited download URLs for the `/files/*key` route.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    public_base_url: String,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: &str, public_base_url: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn mac(&self, key: &str, expires: i64) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.secret).unwrap_or_else(|_| unreachable!());
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    pub fn signature(&self, key: &str, expires: i64) -> String {
        hex::encode(self.mac(key, expires).finalize().into_bytes())
    }

    /// `{base}/files/{key}?expires=..&signature=..`
    pub fn url(&self, key: &str, expires: i64) -> String {
        format!(
            "{}/files/{}?expires={}&signature={}",
            self.public_base_url,
            encode_key(key),
            expires,
            self.signature(key, expires)
        )
    }

    /// Constant-time signature check plus expiry.
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let Ok(bytes) = hex::decode(signature) else {
            return false;
        };
        self.mac(key, expires).verify_slice(&bytes).is_ok()
    }
}

/// Percent-encodes everything but unreserved characters and `/`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

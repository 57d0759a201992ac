//! Time-limited download URLs
//!
//! A URL carries `expires` (unix seconds) and `signature`, the hex HMAC-SHA256
//! of `"{path}\n{expires}"` under the server's signing key.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use super::{validate_path, StorageError};

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a download URL
pub const DOWNLOAD_URL_TTL_SECS: i64 = 3600;

/// A pre-authorized download link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks signed storage URLs.
#[derive(Clone)]
pub struct UrlSigner {
    key: Vec<u8>,
    base_url: String,
}

impl UrlSigner {
    /// `base_url` is the public origin of this server, e.g. `https://portal.example.com`.
    pub fn new(key: impl Into<Vec<u8>>, base_url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    /// Sign `path` for `ttl` starting at `now`.
    pub fn sign(
        &self,
        path: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<SignedUrl, StorageError> {
        validate_path(path)?;

        let expires = (now + ttl).timestamp();
        let signature = hex::encode(self.mac(path, expires).finalize().into_bytes());
        let encoded_path = path
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let expires_at = Utc
            .timestamp_opt(expires, 0)
            .single()
            .unwrap_or(now + ttl);

        Ok(SignedUrl {
            url: format!(
                "{}/storage/{}?expires={}&signature={}",
                self.base_url, encoded_path, expires, signature
            ),
            expires_at,
        })
    }

    /// Sign with the standard one-hour lifetime.
    pub fn sign_download(&self, path: &str) -> Result<SignedUrl, StorageError> {
        self.sign(path, Duration::seconds(DOWNLOAD_URL_TTL_SECS), Utc::now())
    }

    /// Check a presented `(path, expires, signature)` triple at `now`.
    pub fn verify(
        &self,
        path: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        validate_path(path)?;

        let provided = hex::decode(signature).map_err(|_| StorageError::BadSignature)?;
        self.mac(path, expires)
            .verify_slice(&provided)
            .map_err(|_| StorageError::BadSignature)?;

        if now.timestamp() > expires {
            return Err(StorageError::Expired);
        }
        Ok(())
    }

    fn mac(&self, path: &str, expires: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new(b"test-key".to_vec(), "http://localhost:3030/")
    }

    fn query_value<'a>(url: &'a str, name: &str) -> &'a str {
        url.split(['?', '&'])
            .find_map(|kv| kv.strip_prefix(&format!("{}=", name)))
            .unwrap()
    }

    #[test]
    fn signed_url_verifies_within_ttl() {
        let now = Utc::now();
        let signed = signer().sign("case/1-a.pdf", Duration::hours(1), now).unwrap();

        assert!(signed.url.starts_with("http://localhost:3030/storage/case/1-a.pdf?expires="));
        let expires: i64 = query_value(&signed.url, "expires").parse().unwrap();
        let sig = query_value(&signed.url, "signature");

        assert_eq!(expires, now.timestamp() + 3600);
        assert!(signer()
            .verify("case/1-a.pdf", expires, sig, now + Duration::minutes(59))
            .is_ok());
    }

    #[test]
    fn expired_url_is_rejected() {
        let now = Utc::now();
        let signed = signer().sign("c/x.png", Duration::hours(1), now).unwrap();
        let expires: i64 = query_value(&signed.url, "expires").parse().unwrap();
        let sig = query_value(&signed.url, "signature");

        let err = signer()
            .verify("c/x.png", expires, sig, now + Duration::hours(2))
            .unwrap_err();
        assert!(matches!(err, StorageError::Expired));
    }

    #[test]
    fn tampering_is_detected() {
        let now = Utc::now();
        let signed = signer().sign("c/x.png", Duration::hours(1), now).unwrap();
        let expires: i64 = query_value(&signed.url, "expires").parse().unwrap();
        let sig = query_value(&signed.url, "signature");

        assert!(matches!(
            signer().verify("c/y.png", expires, sig, now),
            Err(StorageError::BadSignature)
        ));
        assert!(matches!(
            signer().verify("c/x.png", expires + 3600, sig, now),
            Err(StorageError::BadSignature)
        ));
        assert!(matches!(
            UrlSigner::new(b"other".to_vec(), "http://x").verify("c/x.png", expires, sig, now),
            Err(StorageError::BadSignature)
        ));
        assert!(matches!(
            signer().verify("c/x.png", expires, "zz", now),
            Err(StorageError::BadSignature)
        ));
    }

    #[test]
    fn encodes_path_segments() {
        let signed = signer()
            .sign("case/1-my file.pdf", Duration::hours(1), Utc::now())
            .unwrap();
        assert!(signed.url.contains("/storage/case/1-my%20file.pdf?"));
    }
}

//! Signed, time-bounded linking tokens.
//!
//! Token layout: `base64url(json(params + issued_at)) "." base64url(hmac_sha256(payload))`.
//! Both halves use the URL-safe alphabet without padding so the token can be
//! embedded directly as a path segment.

use super::{LinkingParams, LinkingUrlBuilder};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Linking token configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkingConfig {
    /// Absolute URL prefix of the product, e.g. `https://monitor.example.com`
    pub base_url: String,

    /// Route prefix of the link-identity page
    pub link_identity_path: String,

    /// HMAC key used to sign linking tokens
    pub signing_secret: String,

    /// Maximum token age accepted when completing a link
    pub max_age_seconds: u64,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            link_identity_path: "/extensions/msteams/link-identity".to_string(),
            signing_secret: String::new(),
            max_age_seconds: 600,
        }
    }
}

impl fmt::Debug for LinkingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkingConfig")
            .field("base_url", &self.base_url)
            .field("link_identity_path", &self.link_identity_path)
            .field("signing_secret", &"<REDACTED>")
            .field("max_age_seconds", &self.max_age_seconds)
            .finish()
    }
}

/// Linking token failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkingTokenError {
    #[error("Linking token is malformed: {message}")]
    Malformed { message: String },

    #[error("Linking token signature does not match")]
    BadSignature,

    #[error("Linking token expired {age_seconds}s after issue (max {max_age_seconds}s)")]
    Expired { age_seconds: i64, max_age_seconds: u64 },

    #[error("Invalid linking configuration: {message}")]
    InvalidConfiguration { message: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct SignedPayload {
    #[serde(flatten)]
    params: LinkingParams,
    issued_at: i64,
}

/// HMAC-SHA256 signer for linking tokens
pub struct LinkingSigner {
    secret: Vec<u8>,
}

impl LinkingSigner {
    /// # Errors
    ///
    /// Returns [`LinkingTokenError::InvalidConfiguration`] for an empty secret.
    pub fn new(secret: &str) -> Result<Self, LinkingTokenError> {
        if secret.is_empty() {
            return Err(LinkingTokenError::InvalidConfiguration {
                message: "signing secret must not be empty".to_string(),
            });
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
        })
    }

    fn mac(&self) -> Result<HmacSha256, LinkingTokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| {
            LinkingTokenError::InvalidConfiguration {
                message: "secret cannot be used as HMAC key".to_string(),
            }
        })
    }

    /// Sign `params` as issued now
    pub fn sign(&self, params: &LinkingParams) -> Result<String, LinkingTokenError> {
        self.sign_at(params, Utc::now())
    }

    pub fn sign_at(
        &self,
        params: &LinkingParams,
        issued_at: DateTime<Utc>,
    ) -> Result<String, LinkingTokenError> {
        let payload = SignedPayload {
            params: params.clone(),
            issued_at: issued_at.timestamp(),
        };
        let json = serde_json::to_vec(&payload).map_err(|e| LinkingTokenError::Malformed {
            message: e.to_string(),
        })?;
        let encoded_payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(encoded_payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", encoded_payload, signature))
    }

    /// Verify a token and return its parameters if it is younger than `max_age_seconds`
    pub fn unsign(
        &self,
        token: &str,
        max_age_seconds: u64,
    ) -> Result<LinkingParams, LinkingTokenError> {
        self.unsign_at(token, max_age_seconds, Utc::now())
    }

    pub fn unsign_at(
        &self,
        token: &str,
        max_age_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<LinkingParams, LinkingTokenError> {
        let (encoded_payload, encoded_signature) =
            token
                .split_once('.')
                .ok_or_else(|| LinkingTokenError::Malformed {
                    message: "missing signature separator".to_string(),
                })?;

        let signature =
            URL_SAFE_NO_PAD
                .decode(encoded_signature)
                .map_err(|_| LinkingTokenError::Malformed {
                    message: "signature is not valid base64".to_string(),
                })?;

        // verify_slice compares in constant time
        let mut mac = self.mac()?;
        mac.update(encoded_payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| LinkingTokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(encoded_payload)
            .map_err(|_| LinkingTokenError::Malformed {
                message: "payload is not valid base64".to_string(),
            })?;
        let payload: SignedPayload =
            serde_json::from_slice(&json).map_err(|e| LinkingTokenError::Malformed {
                message: e.to_string(),
            })?;

        let age_seconds = now.timestamp() - payload.issued_at;
        if age_seconds > i64::try_from(max_age_seconds).unwrap_or(i64::MAX) {
            return Err(LinkingTokenError::Expired {
                age_seconds,
                max_age_seconds,
            });
        }

        Ok(payload.params)
    }
}

impl fmt::Debug for LinkingSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkingSigner")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// [`LinkingUrlBuilder`] producing `{base_url}{link_identity_path}/{token}/`
#[derive(Debug)]
pub struct HmacLinkingUrlBuilder {
    base_url: Url,
    link_identity_path: String,
    signer: LinkingSigner,
}

impl HmacLinkingUrlBuilder {
    /// # Errors
    ///
    /// Returns [`LinkingTokenError::InvalidConfiguration`] when `base_url` is
    /// not an absolute URL or the signing secret is empty.
    pub fn new(config: &LinkingConfig) -> Result<Self, LinkingTokenError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|e| LinkingTokenError::InvalidConfiguration {
                message: format!("base_url '{}' is not absolute: {}", config.base_url, e),
            })?;

        Ok(Self {
            base_url,
            link_identity_path: config.link_identity_path.trim_end_matches('/').to_string(),
            signer: LinkingSigner::new(&config.signing_secret)?,
        })
    }
}

impl LinkingUrlBuilder for HmacLinkingUrlBuilder {
    fn build_linking_url(&self, params: &LinkingParams) -> Result<String, LinkingTokenError> {
        let token = self.signer.sign(params)?;
        Ok(format!(
            "{}{}/{}/",
            self.base_url.as_str().trim_end_matches('/'),
            self.link_identity_path,
            token
        ))
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;

//! Bot Framework request authentication.
//!
//! The Bot Framework connector signs every webhook with a bearer JWT in the
//! `Authorization` header. [`JwtSignatureVerifier`] validates that token
//! against the configured bot registration: signature, audience (the bot's
//! app id), issuer, and expiry. When the token carries a `serviceurl` claim
//! it must match the `serviceUrl` of the activity body.

use super::WebhookRequest;
use crate::ValidationError;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, instrument};

/// Issuer of tokens minted by the Bot Framework connector
pub const BOT_FRAMEWORK_ISSUER: &str = "https://api.botframework.com";

/// Verifies that an inbound webhook request is authentic
///
/// Implementations never fail: any malformed or unverifiable input yields
/// `false`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, request: &WebhookRequest) -> bool;
}

/// Bot registration used to authenticate the connector
#[derive(Clone, Deserialize, serde::Serialize)]
#[serde(default)]
pub struct BotAuthConfig {
    /// Bot app id; the expected `aud` claim
    pub app_id: String,

    pub issuer: String,

    /// HS256 shared secret
    pub signing_secret: Option<String>,

    /// RS256 public key in PEM format
    pub public_key_pem: Option<String>,

    /// Clock skew tolerated on `exp`/`nbf`
    pub leeway_seconds: u64,

    /// Timeout for outbound Bot Framework REST calls
    pub request_timeout_seconds: u64,
}

impl Default for BotAuthConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            issuer: BOT_FRAMEWORK_ISSUER.to_string(),
            signing_secret: None,
            public_key_pem: None,
            leeway_seconds: 60,
            request_timeout_seconds: 10,
        }
    }
}

impl fmt::Debug for BotAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotAuthConfig")
            .field("app_id", &self.app_id)
            .field("issuer", &self.issuer)
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .field("public_key_pem", &self.public_key_pem.is_some())
            .field("leeway_seconds", &self.leeway_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ConnectorClaims {
    #[serde(default, rename = "serviceurl")]
    service_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivityServiceUrl {
    #[serde(default, rename = "serviceUrl")]
    service_url: Option<String>,
}

/// [`SignatureVerifier`] validating the connector's bearer JWT
pub struct JwtSignatureVerifier {
    keys: Vec<(DecodingKey, Validation)>,
}

impl JwtSignatureVerifier {
    /// Build a verifier from the bot registration
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `app_id` is empty, no key is configured,
    /// or the public key is not valid PEM.
    pub fn new(config: &BotAuthConfig) -> Result<Self, ValidationError> {
        if config.app_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "bot.app_id".to_string(),
            });
        }

        let mut keys = Vec::new();

        if let Some(pem) = config.public_key_pem.as_deref().filter(|p| !p.is_empty()) {
            let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                ValidationError::InvalidFormat {
                    field: "bot.public_key_pem".to_string(),
                    message: e.to_string(),
                }
            })?;
            keys.push((key, Self::validation(config, Algorithm::RS256)));
        }

        if let Some(secret) = config.signing_secret.as_deref().filter(|s| !s.is_empty()) {
            keys.push((
                DecodingKey::from_secret(secret.as_bytes()),
                Self::validation(config, Algorithm::HS256),
            ));
        }

        if keys.is_empty() {
            return Err(ValidationError::Required {
                field: "bot.signing_secret or bot.public_key_pem".to_string(),
            });
        }

        Ok(Self { keys })
    }

    fn validation(config: &BotAuthConfig, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[config.app_id.as_str()]);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.leeway = config.leeway_seconds;
        validation
    }

    fn decode_claims(&self, token: &str) -> Option<ConnectorClaims> {
        self.keys.iter().find_map(|(key, validation)| {
            match decode::<ConnectorClaims>(token, key, validation) {
                Ok(data) => Some(data.claims),
                Err(e) => {
                    debug!(algorithm = ?validation.algorithms, error = %e, "Token rejected");
                    None
                }
            }
        })
    }
}

impl fmt::Debug for JwtSignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSignatureVerifier")
            .field("keys", &self.keys.len())
            .finish()
    }
}

#[async_trait]
impl SignatureVerifier for JwtSignatureVerifier {
    #[instrument(skip(self, request), fields(body_len = request.body.len()))]
    async fn verify(&self, request: &WebhookRequest) -> bool {
        let Some(token) = request
            .authorization()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
        else {
            debug!("Missing bearer token");
            return false;
        };

        let Some(claims) = self.decode_claims(token) else {
            return false;
        };

        if let Some(claimed) = claims.service_url {
            let body_url = serde_json::from_slice::<ActivityServiceUrl>(&request.body)
                .ok()
                .and_then(|activity| activity.service_url);
            let matches = body_url.is_some_and(|url| {
                url.trim_end_matches('/') == claimed.trim_end_matches('/')
            });
            if !matches {
                debug!("Token serviceurl claim does not match activity");
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;

//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use msteams_bridge_core::linking::LinkingConfig;
use msteams_bridge_core::webhook::BotAuthConfig;
use serde::{Deserialize, Serialize};
use url::Url;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook endpoint settings
    pub webhook: WebhookConfig,

    /// Bot registration used to authenticate the connector
    pub bot: BotAuthConfig,

    /// Linking token and URL settings
    pub linking: LinkingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check the settings that cannot be defaulted
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero port, a missing bot app id or key,
    /// an empty linking secret, or a relative linking base URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }

        if !self.webhook.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: "webhook.endpoint_path must start with '/'".to_string(),
            });
        }

        if self.bot.app_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "bot.app_id".to_string(),
            });
        }

        let has_secret = self.bot.signing_secret.as_deref().is_some_and(|s| !s.is_empty());
        let has_key = self.bot.public_key_pem.as_deref().is_some_and(|k| !k.is_empty());
        if !has_secret && !has_key {
            return Err(ConfigError::Missing {
                key: "bot.signing_secret or bot.public_key_pem".to_string(),
            });
        }

        if self.bot.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "bot.request_timeout_seconds must be non-zero".to_string(),
            });
        }

        if self.linking.signing_secret.is_empty() {
            return Err(ConfigError::Missing {
                key: "linking.signing_secret".to_string(),
            });
        }

        if Url::parse(&self.linking.base_url).is_err() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "linking.base_url must be an absolute URL, got '{}'",
                    self.linking.base_url
                ),
            });
        }

        if !self.linking.link_identity_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: "linking.link_identity_path must start with '/'".to_string(),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Webhook processing timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 15,
            shutdown_timeout_seconds: 30,
            max_body_size: 256 * 1024,
        }
    }
}

/// Webhook endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path; also served with a trailing slash
    pub endpoint_path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/extensions/msteams/webhook".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

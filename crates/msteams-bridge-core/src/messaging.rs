//! # Bot Framework Messaging
//!
//! Outbound calls to the Teams Bot Framework REST API: opening a personal
//! conversation with a user and posting an activity into it.
//!
//! Endpoints used:
//! - `POST {service_url}/v3/conversations`
//! - `POST {service_url}/v3/conversations/{conversation_id}/activities`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Content type of an Adaptive Card attachment
pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

// ============================================================================
// Wire Types
// ============================================================================

/// Identifier of a Bot Framework conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMember {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationChannelData {
    pub tenant: TenantRef,
}

/// Body of a create-conversation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    pub members: Vec<ConversationMember>,
    pub channel_data: ConversationChannelData,
}

impl ConversationRequest {
    /// One-on-one conversation with a user in the given tenant
    pub fn personal(user_id: &str, tenant_id: &str) -> Self {
        Self {
            members: vec![ConversationMember {
                id: user_id.to_string(),
            }],
            channel_data: ConversationChannelData {
                tenant: TenantRef {
                    id: tenant_id.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ConversationResourceResponse {
    id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    pub content: serde_json::Value,
}

/// An outbound message activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundActivity {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub attachments: Vec<Attachment>,
}

impl OutboundActivity {
    /// Message activity carrying a single Adaptive Card
    pub fn card(content: serde_json::Value) -> Self {
        Self {
            activity_type: "message".to_string(),
            attachments: vec![Attachment {
                content_type: ADAPTIVE_CARD_CONTENT_TYPE.to_string(),
                content,
            }],
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Bot Framework call failures
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("HTTP request failed: {message}")]
    Transport { message: String },

    #[error("Bot Framework API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse Bot Framework response: {message}")]
    InvalidResponse { message: String },
}

impl MessagingError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse { .. } => false,
        }
    }
}

// ============================================================================
// Client Interface
// ============================================================================

/// Interface to the Bot Framework conversation API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Create (or look up) a conversation and return its id
    async fn create_conversation(
        &self,
        service_url: &str,
        access_token: &str,
        request: &ConversationRequest,
    ) -> Result<ConversationId, MessagingError>;

    /// Post an activity into an existing conversation
    async fn send_activity(
        &self,
        service_url: &str,
        access_token: &str,
        conversation_id: &ConversationId,
        activity: &OutboundActivity,
    ) -> Result<(), MessagingError>;
}

// ============================================================================
// reqwest Implementation
// ============================================================================

/// Configuration for the Bot Framework client
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    /// User agent string for API requests
    pub user_agent: String,
    /// Request timeout duration
    pub timeout: Duration,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("msteams-bridge/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl MessagingConfig {
    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`MessagingClient`] backed by `reqwest`
#[derive(Clone)]
pub struct BotFrameworkClient {
    http_client: reqwest::Client,
}

impl BotFrameworkClient {
    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if the underlying HTTP client
    /// cannot be constructed (e.g. TLS backend initialisation failure).
    pub fn new(config: MessagingConfig) -> Result<Self, MessagingError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MessagingError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { http_client })
    }

    fn endpoint(service_url: &str, path: &str) -> String {
        format!("{}/{}", service_url.trim_end_matches('/'), path)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        access_token: &str,
        body: &T,
    ) -> Result<reqwest::Response, MessagingError> {
        let response = self
            .http_client
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| MessagingError::Transport {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(MessagingError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl MessagingClient for BotFrameworkClient {
    #[instrument(skip(self, access_token, request))]
    async fn create_conversation(
        &self,
        service_url: &str,
        access_token: &str,
        request: &ConversationRequest,
    ) -> Result<ConversationId, MessagingError> {
        let url = Self::endpoint(service_url, "v3/conversations");
        let response = self.post_json(&url, access_token, request).await?;

        let resource = response
            .json::<ConversationResourceResponse>()
            .await
            .map_err(|e| MessagingError::InvalidResponse {
                message: e.to_string(),
            })?;

        debug!(conversation_id = %resource.id, "Created Bot Framework conversation");
        Ok(ConversationId::new(resource.id))
    }

    #[instrument(skip(self, access_token, activity), fields(conversation_id = %conversation_id))]
    async fn send_activity(
        &self,
        service_url: &str,
        access_token: &str,
        conversation_id: &ConversationId,
        activity: &OutboundActivity,
    ) -> Result<(), MessagingError> {
        let url = Self::endpoint(
            service_url,
            &format!("v3/conversations/{}/activities", conversation_id),
        );
        self.post_json(&url, access_token, activity).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "messaging_tests.rs"]
mod tests;

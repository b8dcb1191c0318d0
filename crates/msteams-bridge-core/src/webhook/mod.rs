//! # Webhook Processing Module
//!
//! Orchestrates a Bot Framework card action from the raw HTTP request to its
//! effect:
//!
//! ```text
//! verify -> parse activity -> resolve identity -> link prompt | dispatch action
//! ```
//!
//! Only a failed signature, an uninstalled team, an unparseable body, and
//! infrastructure failures surface as [`WebhookError`]. Everything else is a
//! [`WebhookOutcome`].

use crate::actions::{ActionDispatcher, DispatchOutcome};
use crate::identity::{IdentityResolution, IdentityResolver};
use crate::linking::{LinkingError, LinkingFlow, LinkingTokenError};
use crate::messaging::{ConversationId, MessagingError};
use crate::models::Integration;
use crate::store::{IntegrationStore, StoreError};
use crate::{IntegrationId, OrganizationId};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub mod payload;
pub mod signature;

pub use payload::{
    ActionType, ActionValue, Activity, AssignTarget, ChannelAccount, ChannelData, ChannelRef,
    IgnoreInput, ResolveInput,
};
pub use signature::{BotAuthConfig, JwtSignatureVerifier, SignatureVerifier, BOT_FRAMEWORK_ISSUER};

// ============================================================================
// Core Types
// ============================================================================

/// Raw HTTP request data from the Bot Framework connector
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub received_at: DateTime<Utc>,
}

impl WebhookRequest {
    pub fn new(headers: HashMap<String, String>, body: Bytes) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Self {
            headers,
            body,
            received_at: Utc::now(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn authorization(&self) -> Option<&str> {
        self.header("authorization")
    }
}

/// Result of a successfully processed webhook
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The user had no linked identity and was sent a linking prompt
    LinkingRequested {
        integration_id: IntegrationId,
        organization_id: OrganizationId,
        conversation_id: ConversationId,
        linking_url: String,
    },

    /// The user was resolved and the action dispatched (possibly as a no-op)
    ActionProcessed(DispatchOutcome),

    /// Not a card submission
    ActivityIgnored { activity_type: String },

    /// The user is unlinked but the integration has no organization to link into
    NoLinkingContext { integration_id: IntegrationId },
}

/// Webhook failures surfaced to the HTTP layer
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Request authentication failed")]
    Authentication,

    #[error("No integration installed for team {team_id}")]
    IntegrationNotFound { team_id: String },

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("Bot Framework call failed: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Linking token could not be built: {0}")]
    LinkingToken(#[from] LinkingTokenError),
}

impl From<LinkingError> for WebhookError {
    fn from(error: LinkingError) -> Self {
        match error {
            LinkingError::Token(e) => Self::LinkingToken(e),
            LinkingError::Messaging(e) => Self::Messaging(e),
        }
    }
}

impl WebhookError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Messaging(e) => e.is_transient(),
            Self::Authentication => false,
            Self::IntegrationNotFound { .. } => false,
            Self::MalformedPayload { .. } => false,
            Self::JsonParsing(_) => false,
            Self::LinkingToken(_) => false,
        }
    }
}

// ============================================================================
// Core Operations (Traits)
// ============================================================================

/// Main interface for the webhook pipeline
#[async_trait]
pub trait WebhookProcessor: Send + Sync {
    async fn process_webhook(&self, request: WebhookRequest)
        -> Result<WebhookOutcome, WebhookError>;
}

/// Default [`WebhookProcessor`] wiring the verifier, resolver, linking flow
/// and dispatcher together
#[derive(Clone)]
pub struct ActionWebhookProcessor {
    verifier: Arc<dyn SignatureVerifier>,
    integrations: Arc<dyn IntegrationStore>,
    resolver: IdentityResolver,
    linking: LinkingFlow,
    dispatcher: ActionDispatcher,
}

impl ActionWebhookProcessor {
    pub fn new(
        verifier: Arc<dyn SignatureVerifier>,
        integrations: Arc<dyn IntegrationStore>,
        resolver: IdentityResolver,
        linking: LinkingFlow,
        dispatcher: ActionDispatcher,
    ) -> Self {
        Self {
            verifier,
            integrations,
            resolver,
            linking,
            dispatcher,
        }
    }

    fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, WebhookError> {
        value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| WebhookError::MalformedPayload {
                message: format!("missing {}", field),
            })
    }

    async fn request_link(
        &self,
        activity: &Activity,
        integrations: &[Integration],
        team_id: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(integration) = integrations.first() else {
            return Err(WebhookError::IntegrationNotFound {
                team_id: team_id.to_string(),
            });
        };

        let organization_id = self
            .integrations
            .organizations_for_integration(integration.id)
            .await?
            .into_iter()
            .next();
        let Some(organization_id) = organization_id else {
            warn!(integration_id = %integration.id, "Integration has no organization to link into");
            return Ok(WebhookOutcome::NoLinkingContext {
                integration_id: integration.id,
            });
        };

        let tenant_id = Self::required(activity.tenant_id(), "channelData.tenant.id")?;

        let prompt = self
            .linking
            .request_link(
                integration,
                organization_id,
                &activity.from.id,
                team_id,
                tenant_id,
            )
            .await?;

        info!(
            integration_id = %integration.id,
            organization_id = %organization_id,
            "Sent linking prompt"
        );

        Ok(WebhookOutcome::LinkingRequested {
            integration_id: integration.id,
            organization_id,
            conversation_id: prompt.conversation_id,
            linking_url: prompt.linking_url,
        })
    }
}

#[async_trait]
impl WebhookProcessor for ActionWebhookProcessor {
    #[instrument(skip(self, request), fields(team_id, action_type))]
    async fn process_webhook(
        &self,
        request: WebhookRequest,
    ) -> Result<WebhookOutcome, WebhookError> {
        if !self.verifier.verify(&request).await {
            warn!("Webhook failed authentication");
            return Err(WebhookError::Authentication);
        }

        let activity: Activity = serde_json::from_slice(&request.body)?;

        let Some(action) = activity.value.as_ref().filter(|_| activity.is_message()) else {
            info!(activity_type = %activity.activity_type, "Ignoring activity without card action");
            return Ok(WebhookOutcome::ActivityIgnored {
                activity_type: activity.activity_type.clone(),
            });
        };

        let team_id = Self::required(activity.team_id(), "channelData.team.id")?;
        let span = tracing::Span::current();
        span.record("team_id", team_id);
        span.record("action_type", action.action_type().as_str());

        match self.resolver.resolve(&activity.from.id, team_id).await? {
            IdentityResolution::IntegrationNotFound => {
                info!("No integration for team");
                Err(WebhookError::IntegrationNotFound {
                    team_id: team_id.to_string(),
                })
            }
            IdentityResolution::Unlinked {
                integrations,
                reason,
            } => {
                info!(reason = ?reason, "Teams user is not linked");
                self.request_link(&activity, &integrations, team_id).await
            }
            IdentityResolution::Linked { candidates, .. } => {
                let outcome = self.dispatcher.dispatch(action, &candidates).await?;
                Ok(WebhookOutcome::ActionProcessed(outcome))
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

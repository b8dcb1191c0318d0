//! # Account Linking
//!
//! When a Teams user without a linked identity acts on a card, the bridge
//! opens a personal conversation with them and sends a card containing a
//! signed, time-bounded linking URL. Visiting that URL while signed in to the
//! product completes the link (see [`LinkIdentityService`]).

pub mod cards;
mod complete;
pub mod token;

pub use cards::{build_linked_card, build_linking_card};
pub use complete::{LinkError, LinkIdentityService, LinkedIdentity};
pub use token::{HmacLinkingUrlBuilder, LinkingConfig, LinkingSigner, LinkingTokenError};

use crate::messaging::{
    ConversationId, ConversationRequest, MessagingClient, MessagingError, OutboundActivity,
};
use crate::models::Integration;
use crate::{IntegrationId, OrganizationId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Values encoded into a linking URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkingParams {
    pub integration_id: IntegrationId,
    pub organization_id: OrganizationId,
    pub teams_user_id: String,
    pub team_id: String,
    pub tenant_id: String,
}

impl LinkingParams {
    pub fn new(
        integration: &Integration,
        organization_id: OrganizationId,
        teams_user_id: &str,
        team_id: &str,
        tenant_id: &str,
    ) -> Self {
        Self {
            integration_id: integration.id,
            organization_id,
            teams_user_id: teams_user_id.to_string(),
            team_id: team_id.to_string(),
            tenant_id: tenant_id.to_string(),
        }
    }
}

/// Builds the signed URL a user visits to complete linking
pub trait LinkingUrlBuilder: Send + Sync {
    fn build_linking_url(&self, params: &LinkingParams) -> Result<String, LinkingTokenError>;
}

/// Linking prompt failures
#[derive(Debug, thiserror::Error)]
pub enum LinkingError {
    #[error("Failed to build linking URL: {0}")]
    Token(#[from] LinkingTokenError),

    #[error("Failed to deliver linking card: {0}")]
    Messaging(#[from] MessagingError),
}

/// Result of a delivered linking prompt
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPrompt {
    pub linking_url: String,
    pub card: serde_json::Value,
    pub conversation_id: ConversationId,
}

/// Sends "please link your account" cards
#[derive(Clone)]
pub struct LinkingFlow {
    messaging: Arc<dyn MessagingClient>,
    url_builder: Arc<dyn LinkingUrlBuilder>,
}

impl LinkingFlow {
    pub fn new(messaging: Arc<dyn MessagingClient>, url_builder: Arc<dyn LinkingUrlBuilder>) -> Self {
        Self {
            messaging,
            url_builder,
        }
    }

    /// Build the linking URL and send the linking card to the user's personal conversation
    ///
    /// Makes exactly one create-conversation call and one send-activity call.
    /// Re-invoking sends another prompt.
    ///
    /// # Errors
    ///
    /// Returns [`LinkingError`] if the URL cannot be signed or either Bot
    /// Framework call fails. No activity is sent if conversation creation fails.
    #[instrument(skip(self, integration), fields(integration_id = %integration.id, organization_id = %organization_id))]
    pub async fn request_link(
        &self,
        integration: &Integration,
        organization_id: OrganizationId,
        teams_user_id: &str,
        team_id: &str,
        tenant_id: &str,
    ) -> Result<LinkPrompt, LinkingError> {
        let params =
            LinkingParams::new(integration, organization_id, teams_user_id, team_id, tenant_id);
        let linking_url = self.url_builder.build_linking_url(&params)?;
        let card = build_linking_card(&linking_url);

        let metadata = &integration.metadata;
        if metadata.is_token_expired(Utc::now()) {
            warn!(
                expires_at = ?metadata.expires_at,
                "Integration access token has expired; Bot Framework may reject the linking prompt"
            );
        }

        let conversation_id = self
            .messaging
            .create_conversation(
                &metadata.service_url,
                &metadata.access_token,
                &ConversationRequest::personal(teams_user_id, tenant_id),
            )
            .await?;

        self.messaging
            .send_activity(
                &metadata.service_url,
                &metadata.access_token,
                &conversation_id,
                &OutboundActivity::card(card.clone()),
            )
            .await?;

        info!(conversation_id = %conversation_id, "Sent account linking prompt");

        Ok(LinkPrompt {
            linking_url,
            card,
            conversation_id,
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

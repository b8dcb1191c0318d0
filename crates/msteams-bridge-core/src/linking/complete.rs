//! Completion of a link once the user visits the signed URL.

use super::cards::build_linked_card;
use super::token::{LinkingSigner, LinkingTokenError};
use crate::messaging::{ConversationRequest, MessagingClient, OutboundActivity};
use crate::models::Identity;
use crate::store::{IdentityStore, IntegrationStore, StoreError};
use crate::{IntegrationId, OrganizationId, UserId, MSTEAMS_PROVIDER};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Link completion failures
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Invalid linking token: {0}")]
    InvalidToken(#[from] LinkingTokenError),

    #[error("Integration {integration_id} not found")]
    IntegrationNotFound { integration_id: IntegrationId },

    #[error("Organization {organization_id} is not bound to integration {integration_id}")]
    OrganizationNotBound {
        organization_id: OrganizationId,
        integration_id: IntegrationId,
    },

    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of a completed link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedIdentity {
    pub identity: Identity,
    pub organization_id: OrganizationId,
    /// Whether the confirmation card reached the user
    pub confirmation_sent: bool,
}

/// Creates the identity encoded in a linking token
pub struct LinkIdentityService {
    integrations: Arc<dyn IntegrationStore>,
    identities: Arc<dyn IdentityStore>,
    messaging: Arc<dyn MessagingClient>,
    signer: Arc<LinkingSigner>,
    max_age_seconds: u64,
}

impl LinkIdentityService {
    pub fn new(
        integrations: Arc<dyn IntegrationStore>,
        identities: Arc<dyn IdentityStore>,
        messaging: Arc<dyn MessagingClient>,
        signer: Arc<LinkingSigner>,
        max_age_seconds: u64,
    ) -> Self {
        Self {
            integrations,
            identities,
            messaging,
            signer,
            max_age_seconds,
        }
    }

    /// Link the Teams user named in `token` to `user_id`
    ///
    /// The identity provider for the token's team is created on first use.
    /// An existing identity for the same Teams user is re-pointed and marked
    /// valid. The confirmation card is best effort: a delivery failure is
    /// logged and does not undo the link.
    ///
    /// # Errors
    ///
    /// - [`LinkError::InvalidToken`] for malformed, forged or expired tokens
    /// - [`LinkError::IntegrationNotFound`] when the integration was uninstalled
    /// - [`LinkError::OrganizationNotBound`] when the organization lost the integration
    /// - [`LinkError::Store`] when persistence fails
    #[instrument(skip(self, token))]
    pub async fn complete_link(
        &self,
        token: &str,
        user_id: UserId,
    ) -> Result<LinkedIdentity, LinkError> {
        let params = self.signer.unsign(token, self.max_age_seconds)?;

        let integration = self
            .integrations
            .get_integration(params.integration_id)
            .await?
            .ok_or(LinkError::IntegrationNotFound {
                integration_id: params.integration_id,
            })?;

        let organizations = self
            .integrations
            .organizations_for_integration(integration.id)
            .await?;
        if !organizations.contains(&params.organization_id) {
            return Err(LinkError::OrganizationNotBound {
                organization_id: params.organization_id,
                integration_id: integration.id,
            });
        }

        let idp = self
            .identities
            .get_or_create_identity_provider(MSTEAMS_PROVIDER, &params.team_id)
            .await?;
        let identity = self
            .identities
            .upsert_identity(idp.id, &params.teams_user_id, user_id)
            .await?;

        info!(
            identity_id = %identity.id,
            organization_id = %params.organization_id,
            team_id = %params.team_id,
            "Linked Teams identity"
        );

        let metadata = &integration.metadata;
        let confirmation = async {
            let conversation_id = self
                .messaging
                .create_conversation(
                    &metadata.service_url,
                    &metadata.access_token,
                    &ConversationRequest::personal(&params.teams_user_id, &params.tenant_id),
                )
                .await?;
            self.messaging
                .send_activity(
                    &metadata.service_url,
                    &metadata.access_token,
                    &conversation_id,
                    &OutboundActivity::card(build_linked_card()),
                )
                .await
        };

        let confirmation_sent = match confirmation.await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to send link confirmation card");
                false
            }
        };

        Ok(LinkedIdentity {
            identity,
            organization_id: params.organization_id,
            confirmation_sent,
        })
    }
}

#[cfg(test)]
#[path = "complete_tests.rs"]
mod tests;

//! # Identity Resolution
//!
//! Maps an acting Teams user `(user id, team id)` to the internal user(s) and
//! organization(s) they may act for.
//!
//! Resolution steps:
//! 1. Integrations with provider `msteams` and external id = team id. None
//!    means the bridge is not installed for this team.
//! 2. The identity provider `(msteams, team id)`.
//! 3. The VALID identity `(provider, user id)`.
//! 4. One [`ActorCandidate`] per organization bound to each integration.
//!
//! A missing identity provider or identity is not an error: it means the
//! user has to link their account first.

use crate::models::{IdentityStatus, Integration};
use crate::store::{IdentityStore, IntegrationStore, StoreError};
use crate::{IdentityId, IntegrationId, OrganizationId, UserId, MSTEAMS_PROVIDER};
use std::sync::Arc;
use tracing::{debug, instrument};

/// One `(organization, user)` pair the acting Teams user may act as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorCandidate {
    pub integration_id: IntegrationId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub identity_id: IdentityId,
}

/// Why an installed integration has no linked identity for the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkedReason {
    NoIdentityProvider,
    NoValidIdentity,
}

/// Tagged outcome of identity resolution
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityResolution {
    /// No integration is installed for the team
    IntegrationNotFound,

    /// Integrations exist but the user has not linked an identity
    Unlinked {
        integrations: Vec<Integration>,
        reason: UnlinkedReason,
    },

    /// The user is linked; candidates are ordered by integration id then organization id
    Linked {
        integrations: Vec<Integration>,
        candidates: Vec<ActorCandidate>,
    },
}

/// Resolves acting Teams users to internal users
#[derive(Clone)]
pub struct IdentityResolver {
    integrations: Arc<dyn IntegrationStore>,
    identities: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    pub fn new(integrations: Arc<dyn IntegrationStore>, identities: Arc<dyn IdentityStore>) -> Self {
        Self {
            integrations,
            identities,
        }
    }

    /// Resolve `(teams_user_id, team_id)` to candidate actors
    ///
    /// # Errors
    ///
    /// Only [`StoreError`]s are returned; every empty lookup is reported as an
    /// [`IdentityResolution`] variant.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        teams_user_id: &str,
        team_id: &str,
    ) -> Result<IdentityResolution, StoreError> {
        let integrations = self
            .integrations
            .find_integrations(MSTEAMS_PROVIDER, team_id)
            .await?;
        if integrations.is_empty() {
            return Ok(IdentityResolution::IntegrationNotFound);
        }

        let idp = match self
            .identities
            .find_identity_provider(MSTEAMS_PROVIDER, team_id)
            .await?
        {
            Some(idp) => idp,
            None => {
                debug!("No identity provider registered for team");
                return Ok(IdentityResolution::Unlinked {
                    integrations,
                    reason: UnlinkedReason::NoIdentityProvider,
                });
            }
        };

        let identity = match self
            .identities
            .find_identity(idp.id, teams_user_id, IdentityStatus::Valid)
            .await?
        {
            Some(identity) => identity,
            None => {
                debug!(idp_id = %idp.id, "No valid identity for Teams user");
                return Ok(IdentityResolution::Unlinked {
                    integrations,
                    reason: UnlinkedReason::NoValidIdentity,
                });
            }
        };

        let mut candidates = Vec::new();
        for integration in &integrations {
            let organizations = self
                .integrations
                .organizations_for_integration(integration.id)
                .await?;
            candidates.extend(organizations.into_iter().map(|organization_id| ActorCandidate {
                integration_id: integration.id,
                organization_id,
                user_id: identity.user_id,
                identity_id: identity.id,
            }));
        }

        debug!(
            user_id = %identity.user_id,
            candidate_count = candidates.len(),
            "Resolved Teams user"
        );

        Ok(IdentityResolution::Linked {
            integrations,
            candidates,
        })
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;

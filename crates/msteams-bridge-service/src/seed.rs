//! Development seeding of the in-memory store.
//!
//! The optional `seed` configuration section installs organizations, users,
//! projects and Teams integrations at startup so the webhook can be exercised
//! without a product database:
//!
//! ```yaml
//! seed:
//!   organizations:
//!     - slug: shire
//!       members: [frodo, samwise]
//!       projects: [ring-bearer]
//!       integrations:
//!         - name: Fellowship
//!           team_id: f3ll0wsh1p
//!           service_url: https://smba.trafficmanager.net/amer
//!           access_token: y0u_5h4ll_n07_p455
//! ```

use msteams_bridge_core::adapters::InMemoryStore;
use msteams_bridge_core::models::IntegrationMetadata;
use msteams_bridge_core::MSTEAMS_PROVIDER;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub organizations: Vec<SeedOrganization>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedOrganization {
    pub slug: String,
    /// Usernames; each becomes a user and an organization member
    pub members: Vec<String>,
    /// Project slugs; each project gets one unresolved group
    pub projects: Vec<String>,
    pub integrations: Vec<SeedIntegration>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedIntegration {
    pub name: String,
    pub team_id: String,
    pub service_url: String,
    pub access_token: String,
}

impl std::fmt::Debug for SeedIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedIntegration")
            .field("name", &self.name)
            .field("team_id", &self.team_id)
            .field("service_url", &self.service_url)
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

/// Populate `store` from `seed`
pub fn apply_seed(store: &InMemoryStore, seed: &SeedConfig) {
    for organization in &seed.organizations {
        let org = store.create_organization(&organization.slug);

        for username in &organization.members {
            let user = store.create_user(username);
            store.add_member(org.id, user.id);
            info!(organization = %org.slug, user_id = %user.id, username = %username, "Seeded member");
        }

        for slug in &organization.projects {
            let project = store.create_project(org.id, slug);
            let group = store.create_group(project.id);
            info!(project = %slug, group_id = %group.id, "Seeded project");
        }

        for integration in &organization.integrations {
            let created = store.create_integration(
                MSTEAMS_PROVIDER,
                &integration.name,
                &integration.team_id,
                IntegrationMetadata {
                    service_url: integration.service_url.clone(),
                    access_token: integration.access_token.clone(),
                    expires_at: None,
                },
            );
            store.bind_organization(org.id, created.id);
            info!(
                organization = %org.slug,
                integration_id = %created.id,
                team_id = %integration.team_id,
                "Seeded Teams integration"
            );
        }
    }
}

#[cfg(test)]
#[path = "seed_tests.rs"]
mod tests;

//! # Domain Model
//!
//! Records the bridge reads and writes. Persistence is abstracted behind the
//! traits in [`crate::store`]; these types carry no storage concerns.

use crate::{
    GroupId, IdentityId, IdentityProviderId, IntegrationId, OrganizationId, ProjectId, TeamId,
    UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Integrations
// ============================================================================

/// An installed instance of the Teams connection
///
/// `external_id` is the Teams team id the bot was installed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub id: IntegrationId,
    pub provider: String,
    pub name: String,
    pub external_id: String,
    pub metadata: IntegrationMetadata,
}

/// Connection details for the Bot Framework REST API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationMetadata {
    pub service_url: String,
    pub access_token: String,
    /// Unix timestamp (seconds) at which `access_token` stops being accepted
    pub expires_at: Option<i64>,
}

impl IntegrationMetadata {
    /// Whether the stored access token has passed its expiry time
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now.timestamp(),
            None => false,
        }
    }
}

impl fmt::Debug for IntegrationMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationMetadata")
            .field("service_url", &self.service_url)
            .field("access_token", &"<REDACTED>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Binding between an integration and an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationIntegration {
    pub organization_id: OrganizationId,
    pub integration_id: IntegrationId,
}

// ============================================================================
// Organizations, teams, projects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub organization_id: OrganizationId,
    pub slug: String,
    pub members: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub organization_id: OrganizationId,
    pub slug: String,
}

/// An internal user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

// ============================================================================
// Platform identities
// ============================================================================

/// Identity namespace of one platform tenant, keyed by `(provider_type, external_id)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProvider {
    pub id: IdentityProviderId,
    pub provider_type: String,
    pub external_id: String,
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStatus {
    Unknown,
    Valid,
    Invalid,
}

/// Link between one platform user and one internal user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub idp_id: IdentityProviderId,
    pub external_id: String,
    pub user_id: UserId,
    pub status: IdentityStatus,
    pub scopes: Vec<String>,
    pub date_verified: DateTime<Utc>,
}

impl Identity {
    pub fn is_valid(&self) -> bool {
        self.status == IdentityStatus::Valid
    }
}

/// Organization SSO provider. Unrelated to Teams identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProvider {
    pub id: u64,
    pub organization_id: OrganizationId,
    pub provider: String,
}

/// A user's identity under an organization SSO provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub auth_provider_id: u64,
    pub user_id: UserId,
    pub ident: String,
}

// ============================================================================
// Issues
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Unresolved,
    Resolved,
    Ignored,
    PendingDeletion,
}

impl GroupStatus {
    /// Whether resolve/ignore transitions may still be applied
    pub fn is_mutable(&self) -> bool {
        !matches!(self, Self::PendingDeletion)
    }
}

/// An issue aggregate tracked by the monitoring product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub project_id: ProjectId,
    pub status: GroupStatus,
}

/// Owner of a group: either a user or a team, never both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Assignee {
    User(UserId),
    Team(TeamId),
}

impl fmt::Display for Assignee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{}", id),
            Self::Team(id) => write!(f, "team:{}", id),
        }
    }
}

/// Current assignment of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAssignee {
    pub group_id: GroupId,
    pub project_id: ProjectId,
    pub assignee: Assignee,
    pub date_added: DateTime<Utc>,
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

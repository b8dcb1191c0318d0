//! # Persistence Interfaces
//!
//! Read/write access the core needs from the product database. Every lookup
//! that may legitimately find nothing returns `Option`/empty collections;
//! [`StoreError`] is reserved for the store itself failing.

use crate::models::{
    Assignee, Group, GroupAssignee, GroupStatus, Identity, IdentityProvider, IdentityStatus,
    Integration, Project, Team,
};
use crate::{GroupId, IdentityProviderId, IntegrationId, OrganizationId, ProjectId, TeamId, UserId};
use async_trait::async_trait;

/// Persistence failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Write conflict on {entity}: {message}")]
    Conflict { entity: String, message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },
}

impl StoreError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Conflict { .. } => true,
            Self::NotFound { .. } => false,
        }
    }
}

/// Access to installed integrations and their organization bindings
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// All integrations with the given provider tag and external id, ordered by id
    async fn find_integrations(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Vec<Integration>, StoreError>;

    async fn get_integration(&self, id: IntegrationId) -> Result<Option<Integration>, StoreError>;

    /// Organizations bound to an integration, ordered by id
    async fn organizations_for_integration(
        &self,
        id: IntegrationId,
    ) -> Result<Vec<OrganizationId>, StoreError>;
}

/// Access to identity providers and linked identities
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity_provider(
        &self,
        provider_type: &str,
        external_id: &str,
    ) -> Result<Option<IdentityProvider>, StoreError>;

    async fn get_or_create_identity_provider(
        &self,
        provider_type: &str,
        external_id: &str,
    ) -> Result<IdentityProvider, StoreError>;

    /// The identity for `(idp_id, external_id)` if it exists with the given status
    async fn find_identity(
        &self,
        idp_id: IdentityProviderId,
        external_id: &str,
        status: IdentityStatus,
    ) -> Result<Option<Identity>, StoreError>;

    /// Create or re-point the identity for `(idp_id, external_id)` at `user_id`,
    /// marking it valid
    async fn upsert_identity(
        &self,
        idp_id: IdentityProviderId,
        external_id: &str,
        user_id: UserId,
    ) -> Result<Identity, StoreError>;
}

/// Access to issues, their assignment, and organization membership
#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StoreError>;

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    async fn get_team(&self, id: TeamId) -> Result<Option<Team>, StoreError>;

    async fn is_organization_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<bool, StoreError>;

    async fn set_group_status(&self, id: GroupId, status: GroupStatus) -> Result<(), StoreError>;

    /// Upsert the group's assignee. The latest write replaces any prior assignee.
    async fn assign_group(
        &self,
        group: &Group,
        assignee: Assignee,
    ) -> Result<GroupAssignee, StoreError>;

    async fn get_assignee(&self, group_id: GroupId) -> Result<Option<GroupAssignee>, StoreError>;
}

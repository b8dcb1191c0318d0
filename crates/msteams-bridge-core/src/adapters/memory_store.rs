//! # In-Memory Store Implementation
//!
//! Thread-safe in-memory implementation of every persistence trait, used for
//! testing and development. Provides seeding helpers for fixtures.

use crate::models::{
    Assignee, AuthIdentity, AuthProvider, Group, GroupAssignee, GroupStatus, Identity,
    IdentityProvider, IdentityStatus, Integration, IntegrationMetadata, Organization,
    OrganizationIntegration, Project, Team, User,
};
use crate::store::{IdentityStore, IntegrationStore, IssueStore, StoreError};
use crate::{
    GroupId, IdentityId, IdentityProviderId, IntegrationId, OrganizationId, ProjectId, TeamId,
    UserId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

#[derive(Debug, Default)]
struct Tables {
    integrations: BTreeMap<IntegrationId, Integration>,
    organization_integrations: Vec<OrganizationIntegration>,
    organizations: BTreeMap<OrganizationId, Organization>,
    members: HashSet<(OrganizationId, UserId)>,
    users: BTreeMap<UserId, User>,
    teams: BTreeMap<TeamId, Team>,
    projects: BTreeMap<ProjectId, Project>,
    groups: BTreeMap<GroupId, Group>,
    assignees: HashMap<GroupId, GroupAssignee>,
    identity_providers: BTreeMap<IdentityProviderId, IdentityProvider>,
    identities: BTreeMap<IdentityId, Identity>,
    auth_providers: Vec<AuthProvider>,
    auth_identities: Vec<AuthIdentity>,
}

/// In-memory implementation of [`IntegrationStore`], [`IdentityStore`] and [`IssueStore`]
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    // A poisoned lock only means another writer panicked mid-test; the maps
    // themselves are still consistent for our single-statement writes.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------------
    // Seeding helpers
    // ------------------------------------------------------------------------

    pub fn create_user(&self, username: &str) -> User {
        let user = User {
            id: UserId::new(self.allocate_id()),
            username: username.to_string(),
        };
        self.write().users.insert(user.id, user.clone());
        user
    }

    pub fn create_organization(&self, slug: &str) -> Organization {
        let organization = Organization {
            id: OrganizationId::new(self.allocate_id()),
            slug: slug.to_string(),
            name: slug.to_string(),
        };
        self.write()
            .organizations
            .insert(organization.id, organization.clone());
        organization
    }

    pub fn add_member(&self, organization_id: OrganizationId, user_id: UserId) {
        self.write().members.insert((organization_id, user_id));
    }

    /// Create a team; its members also become organization members
    pub fn create_team(&self, organization_id: OrganizationId, slug: &str, members: &[UserId]) -> Team {
        let team = Team {
            id: TeamId::new(self.allocate_id()),
            organization_id,
            slug: slug.to_string(),
            members: members.to_vec(),
        };
        let mut tables = self.write();
        for user_id in members {
            tables.members.insert((organization_id, *user_id));
        }
        tables.teams.insert(team.id, team.clone());
        team
    }

    pub fn create_project(&self, organization_id: OrganizationId, slug: &str) -> Project {
        let project = Project {
            id: ProjectId::new(self.allocate_id()),
            organization_id,
            slug: slug.to_string(),
        };
        self.write().projects.insert(project.id, project.clone());
        project
    }

    pub fn create_group(&self, project_id: ProjectId) -> Group {
        let group = Group {
            id: GroupId::new(self.allocate_id()),
            project_id,
            status: GroupStatus::Unresolved,
        };
        self.write().groups.insert(group.id, group.clone());
        group
    }

    pub fn create_integration(
        &self,
        provider: &str,
        name: &str,
        external_id: &str,
        metadata: IntegrationMetadata,
    ) -> Integration {
        let integration = Integration {
            id: IntegrationId::new(self.allocate_id()),
            provider: provider.to_string(),
            name: name.to_string(),
            external_id: external_id.to_string(),
            metadata,
        };
        self.write()
            .integrations
            .insert(integration.id, integration.clone());
        integration
    }

    /// Uninstall an integration, removing its organization bindings
    pub fn delete_integration(&self, id: IntegrationId) -> bool {
        let mut tables = self.write();
        tables
            .organization_integrations
            .retain(|binding| binding.integration_id != id);
        tables.integrations.remove(&id).is_some()
    }

    pub fn bind_organization(&self, organization_id: OrganizationId, integration_id: IntegrationId) {
        self.write()
            .organization_integrations
            .push(OrganizationIntegration {
                organization_id,
                integration_id,
            });
    }

    pub fn create_identity_provider(&self, provider_type: &str, external_id: &str) -> IdentityProvider {
        let idp = IdentityProvider {
            id: IdentityProviderId::new(self.allocate_id()),
            provider_type: provider_type.to_string(),
            external_id: external_id.to_string(),
            config: serde_json::json!({}),
        };
        self.write().identity_providers.insert(idp.id, idp.clone());
        idp
    }

    pub fn create_identity(
        &self,
        idp_id: IdentityProviderId,
        external_id: &str,
        user_id: UserId,
        status: IdentityStatus,
    ) -> Identity {
        let identity = Identity {
            id: IdentityId::new(self.allocate_id()),
            idp_id,
            external_id: external_id.to_string(),
            user_id,
            status,
            scopes: Vec::new(),
            date_verified: Utc::now(),
        };
        self.write().identities.insert(identity.id, identity.clone());
        identity
    }

    pub fn create_auth_provider(&self, organization_id: OrganizationId, provider: &str) -> AuthProvider {
        let auth_provider = AuthProvider {
            id: self.allocate_id(),
            organization_id,
            provider: provider.to_string(),
        };
        self.write().auth_providers.push(auth_provider.clone());
        auth_provider
    }

    pub fn create_auth_identity(&self, auth_provider_id: u64, user_id: UserId, ident: &str) -> AuthIdentity {
        let auth_identity = AuthIdentity {
            auth_provider_id,
            user_id,
            ident: ident.to_string(),
        };
        self.write().auth_identities.push(auth_identity.clone());
        auth_identity
    }

    // ------------------------------------------------------------------------
    // Snapshot accessors
    // ------------------------------------------------------------------------

    pub fn group(&self, id: GroupId) -> Option<Group> {
        self.read().groups.get(&id).cloned()
    }

    pub fn assignee(&self, group_id: GroupId) -> Option<GroupAssignee> {
        self.read().assignees.get(&group_id).cloned()
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.read().identities.values().cloned().collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntegrationStore for InMemoryStore {
    async fn find_integrations(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Vec<Integration>, StoreError> {
        Ok(self
            .read()
            .integrations
            .values()
            .filter(|i| i.provider == provider && i.external_id == external_id)
            .cloned()
            .collect())
    }

    async fn get_integration(&self, id: IntegrationId) -> Result<Option<Integration>, StoreError> {
        Ok(self.read().integrations.get(&id).cloned())
    }

    async fn organizations_for_integration(
        &self,
        id: IntegrationId,
    ) -> Result<Vec<OrganizationId>, StoreError> {
        let mut organizations: Vec<OrganizationId> = self
            .read()
            .organization_integrations
            .iter()
            .filter(|binding| binding.integration_id == id)
            .map(|binding| binding.organization_id)
            .collect();
        organizations.sort();
        organizations.dedup();
        Ok(organizations)
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_identity_provider(
        &self,
        provider_type: &str,
        external_id: &str,
    ) -> Result<Option<IdentityProvider>, StoreError> {
        Ok(self
            .read()
            .identity_providers
            .values()
            .find(|idp| idp.provider_type == provider_type && idp.external_id == external_id)
            .cloned())
    }

    async fn get_or_create_identity_provider(
        &self,
        provider_type: &str,
        external_id: &str,
    ) -> Result<IdentityProvider, StoreError> {
        let new_id = IdentityProviderId::new(self.allocate_id());
        let mut tables = self.write();

        if let Some(existing) = tables
            .identity_providers
            .values()
            .find(|idp| idp.provider_type == provider_type && idp.external_id == external_id)
        {
            return Ok(existing.clone());
        }

        let idp = IdentityProvider {
            id: new_id,
            provider_type: provider_type.to_string(),
            external_id: external_id.to_string(),
            config: serde_json::json!({}),
        };
        tables.identity_providers.insert(idp.id, idp.clone());
        Ok(idp)
    }

    async fn find_identity(
        &self,
        idp_id: IdentityProviderId,
        external_id: &str,
        status: IdentityStatus,
    ) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .read()
            .identities
            .values()
            .find(|identity| {
                identity.idp_id == idp_id
                    && identity.external_id == external_id
                    && identity.status == status
            })
            .cloned())
    }

    async fn upsert_identity(
        &self,
        idp_id: IdentityProviderId,
        external_id: &str,
        user_id: UserId,
    ) -> Result<Identity, StoreError> {
        let new_id = IdentityId::new(self.allocate_id());
        let mut tables = self.write();

        let existing = tables
            .identities
            .values_mut()
            .find(|identity| identity.idp_id == idp_id && identity.external_id == external_id);

        if let Some(identity) = existing {
            identity.user_id = user_id;
            identity.status = IdentityStatus::Valid;
            identity.date_verified = Utc::now();
            return Ok(identity.clone());
        }

        let identity = Identity {
            id: new_id,
            idp_id,
            external_id: external_id.to_string(),
            user_id,
            status: IdentityStatus::Valid,
            scopes: Vec::new(),
            date_verified: Utc::now(),
        };
        tables.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }
}

#[async_trait]
impl IssueStore for InMemoryStore {
    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StoreError> {
        Ok(self.group(id))
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.read().projects.get(&id).cloned())
    }

    async fn get_team(&self, id: TeamId) -> Result<Option<Team>, StoreError> {
        Ok(self.read().teams.get(&id).cloned())
    }

    async fn is_organization_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        Ok(self.read().members.contains(&(organization_id, user_id)))
    }

    async fn set_group_status(&self, id: GroupId, status: GroupStatus) -> Result<(), StoreError> {
        let mut tables = self.write();
        let group = tables.groups.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "group".to_string(),
            id: id.to_string(),
        })?;
        group.status = status;
        Ok(())
    }

    async fn assign_group(
        &self,
        group: &Group,
        assignee: Assignee,
    ) -> Result<GroupAssignee, StoreError> {
        let record = GroupAssignee {
            group_id: group.id,
            project_id: group.project_id,
            assignee,
            date_added: Utc::now(),
        };
        self.write().assignees.insert(group.id, record.clone());
        Ok(record)
    }

    async fn get_assignee(&self, group_id: GroupId) -> Result<Option<GroupAssignee>, StoreError> {
        Ok(self.assignee(group_id))
    }
}

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;

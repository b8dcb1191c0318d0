//! # Action Dispatch
//!
//! Applies a card action (`resolve`, `ignore`, `assign`) to a group on behalf
//! of a resolved actor.
//!
//! Dispatch runs three stages:
//! 1. **Locate group** by the submitted `groupId`.
//! 2. **Select organization context**: keep only the candidates whose
//!    organization owns the group's project. No match means the actor may not
//!    act on this group.
//! 3. **Dispatch** on the action type.
//!
//! Every empty lookup and unrecognised input ends in a [`DispatchOutcome`]
//! rather than an error. Only store failures are returned as errors.

use crate::identity::ActorCandidate;
use crate::models::{Assignee, Group, GroupStatus, Project};
use crate::store::{IssueStore, StoreError};
use crate::webhook::payload::{ActionType, ActionValue, AssignTarget, IgnoreInput, ResolveInput};
use crate::GroupId;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Why an action was accepted without a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnrecognizedActionType(String),
    UnrecognizedAssignTarget(String),
    ReservedResolveInput(String),
    GroupPendingDeletion,
    TeamNotInOrganization,
    UserNotInOrganization,
}

/// Tagged result of dispatching one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// `groupId` missing, unparseable, or unknown
    GroupNotFound,

    /// No candidate belongs to the organization owning the group
    NoAuthorizedActor { group_id: GroupId },

    Resolved { group_id: GroupId },

    Ignored { group_id: GroupId },

    Assigned { group_id: GroupId, assignee: Assignee },

    Skipped { group_id: GroupId, reason: SkipReason },
}

impl DispatchOutcome {
    /// Whether the group was mutated
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Resolved { .. } | Self::Ignored { .. } | Self::Assigned { .. }
        )
    }
}

/// Applies card actions to groups
#[derive(Clone)]
pub struct ActionDispatcher {
    issues: Arc<dyn IssueStore>,
}

impl ActionDispatcher {
    pub fn new(issues: Arc<dyn IssueStore>) -> Self {
        Self { issues }
    }

    /// Apply `action` to its group as the first candidate authorized for it
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the store fails.
    #[instrument(skip(self, action, candidates), fields(action_type = ?action.action_type, candidate_count = candidates.len()))]
    pub async fn dispatch(
        &self,
        action: &ActionValue,
        candidates: &[ActorCandidate],
    ) -> Result<DispatchOutcome, StoreError> {
        let Some(group) = self.locate_group(action).await? else {
            info!(group_id = ?action.group_id, "Group not found, ignoring action");
            return Ok(DispatchOutcome::GroupNotFound);
        };

        let Some((project, actor)) = self.select_organization_context(&group, candidates).await?
        else {
            info!(group_id = %group.id, "No candidate is authorized for the group's organization");
            return Ok(DispatchOutcome::NoAuthorizedActor { group_id: group.id });
        };

        let outcome = match action.action_type() {
            ActionType::Resolve => self.resolve(&group, action).await?,
            ActionType::Ignore => self.ignore(&group, action).await?,
            ActionType::Assign => self.assign(&group, &project, actor, action).await?,
            ActionType::Unrecognized(raw) => {
                info!(group_id = %group.id, action_type = %raw, "Unrecognized action type");
                DispatchOutcome::Skipped {
                    group_id: group.id,
                    reason: SkipReason::UnrecognizedActionType(raw),
                }
            }
        };

        info!(
            group_id = %group.id,
            organization_id = %project.organization_id,
            user_id = %actor.user_id,
            outcome = ?outcome,
            "Action dispatched"
        );

        Ok(outcome)
    }

    async fn locate_group(&self, action: &ActionValue) -> Result<Option<Group>, StoreError> {
        match action.group_id() {
            Some(group_id) => self.issues.get_group(group_id).await,
            None => Ok(None),
        }
    }

    async fn select_organization_context(
        &self,
        group: &Group,
        candidates: &[ActorCandidate],
    ) -> Result<Option<(Project, ActorCandidate)>, StoreError> {
        let Some(project) = self.issues.get_project(group.project_id).await? else {
            warn!(group_id = %group.id, project_id = %group.project_id, "Group references a missing project");
            return Ok(None);
        };

        let actor = candidates
            .iter()
            .find(|candidate| candidate.organization_id == project.organization_id)
            .copied();

        Ok(actor.map(|actor| (project, actor)))
    }

    async fn resolve(
        &self,
        group: &Group,
        action: &ActionValue,
    ) -> Result<DispatchOutcome, StoreError> {
        if let ResolveInput::Reserved(raw) = ResolveInput::parse(action.resolve_input.as_deref()) {
            info!(group_id = %group.id, resolve_input = %raw, "Reserved resolve input, not resolving");
            return Ok(DispatchOutcome::Skipped {
                group_id: group.id,
                reason: SkipReason::ReservedResolveInput(raw),
            });
        }

        if !group.status.is_mutable() {
            return Ok(pending_deletion(group));
        }

        self.issues
            .set_group_status(group.id, GroupStatus::Resolved)
            .await?;
        Ok(DispatchOutcome::Resolved { group_id: group.id })
    }

    async fn ignore(
        &self,
        group: &Group,
        action: &ActionValue,
    ) -> Result<DispatchOutcome, StoreError> {
        if let IgnoreInput::Reserved(raw) = IgnoreInput::parse(action.ignore_input.as_deref()) {
            info!(group_id = %group.id, ignore_input = %raw, "Reserved ignore input, ignoring indefinitely");
        }

        if !group.status.is_mutable() {
            return Ok(pending_deletion(group));
        }

        self.issues
            .set_group_status(group.id, GroupStatus::Ignored)
            .await?;
        Ok(DispatchOutcome::Ignored { group_id: group.id })
    }

    async fn assign(
        &self,
        group: &Group,
        project: &Project,
        actor: ActorCandidate,
        action: &ActionValue,
    ) -> Result<DispatchOutcome, StoreError> {
        let assignee = match AssignTarget::parse(action.assign_input.as_deref()) {
            AssignTarget::Me => Assignee::User(actor.user_id),
            AssignTarget::Team(team_id) => {
                let owned = self
                    .issues
                    .get_team(team_id)
                    .await?
                    .is_some_and(|team| team.organization_id == project.organization_id);
                if !owned {
                    info!(group_id = %group.id, team_id = %team_id, "Team does not belong to the group's organization");
                    return Ok(DispatchOutcome::Skipped {
                        group_id: group.id,
                        reason: SkipReason::TeamNotInOrganization,
                    });
                }
                Assignee::Team(team_id)
            }
            AssignTarget::User(user_id) => {
                if !self
                    .issues
                    .is_organization_member(project.organization_id, user_id)
                    .await?
                {
                    info!(group_id = %group.id, user_id = %user_id, "User is not a member of the group's organization");
                    return Ok(DispatchOutcome::Skipped {
                        group_id: group.id,
                        reason: SkipReason::UserNotInOrganization,
                    });
                }
                Assignee::User(user_id)
            }
            AssignTarget::Unrecognized(raw) => {
                info!(group_id = %group.id, assign_input = %raw, "Unrecognized assign target");
                return Ok(DispatchOutcome::Skipped {
                    group_id: group.id,
                    reason: SkipReason::UnrecognizedAssignTarget(raw),
                });
            }
        };

        self.issues.assign_group(group, assignee).await?;
        Ok(DispatchOutcome::Assigned {
            group_id: group.id,
            assignee,
        })
    }
}

fn pending_deletion(group: &Group) -> DispatchOutcome {
    info!(group_id = %group.id, "Group is pending deletion");
    DispatchOutcome::Skipped {
        group_id: group.id,
        reason: SkipReason::GroupPendingDeletion,
    }
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;

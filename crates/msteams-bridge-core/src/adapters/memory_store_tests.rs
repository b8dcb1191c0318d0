//! Tests for the in-memory store.

use super::*;

fn metadata() -> IntegrationMetadata {
    IntegrationMetadata {
        service_url: "https://smba.trafficmanager.net/amer".to_string(),
        access_token: "token".to_string(),
        expires_at: None,
    }
}

#[tokio::test]
async fn test_find_integrations_filters_by_provider_and_external_id() {
    let store = InMemoryStore::new();
    let teams = store.create_integration("msteams", "Fellowship", "f3ll0wsh1p", metadata());
    store.create_integration("slack", "Fellowship", "f3ll0wsh1p", metadata());
    store.create_integration("msteams", "Mordor", "54rum4n", metadata());

    let found = store.find_integrations("msteams", "f3ll0wsh1p").await.unwrap();

    assert_eq!(found, vec![teams]);
}

#[tokio::test]
async fn test_delete_integration_removes_bindings() {
    let store = InMemoryStore::new();
    let org = store.create_organization("shire");
    let integration = store.create_integration("msteams", "Fellowship", "f3ll0wsh1p", metadata());
    store.bind_organization(org.id, integration.id);

    assert!(store.delete_integration(integration.id));

    assert!(store.find_integrations("msteams", "f3ll0wsh1p").await.unwrap().is_empty());
    assert!(store
        .organizations_for_integration(integration.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_organizations_for_integration_are_sorted_and_unique() {
    let store = InMemoryStore::new();
    let first = store.create_organization("first");
    let second = store.create_organization("second");
    let integration = store.create_integration("msteams", "Shared", "team", metadata());
    store.bind_organization(second.id, integration.id);
    store.bind_organization(first.id, integration.id);
    store.bind_organization(second.id, integration.id);

    let organizations = store.organizations_for_integration(integration.id).await.unwrap();

    assert_eq!(organizations, vec![first.id, second.id]);
}

#[tokio::test]
async fn test_find_identity_respects_status() {
    let store = InMemoryStore::new();
    let user = store.create_user("frodo");
    let idp = store.create_identity_provider("msteams", "f3ll0wsh1p");
    store.create_identity(idp.id, "g4nd4lf", user.id, IdentityStatus::Invalid);

    let valid = store
        .find_identity(idp.id, "g4nd4lf", IdentityStatus::Valid)
        .await
        .unwrap();
    let invalid = store
        .find_identity(idp.id, "g4nd4lf", IdentityStatus::Invalid)
        .await
        .unwrap();

    assert!(valid.is_none());
    assert!(invalid.is_some());
}

#[tokio::test]
async fn test_upsert_identity_repoints_and_revalidates_existing_row() {
    let store = InMemoryStore::new();
    let old_user = store.create_user("old");
    let new_user = store.create_user("new");
    let idp = store.create_identity_provider("msteams", "f3ll0wsh1p");
    let existing = store.create_identity(idp.id, "g4nd4lf", old_user.id, IdentityStatus::Invalid);

    let identity = store.upsert_identity(idp.id, "g4nd4lf", new_user.id).await.unwrap();

    assert_eq!(identity.id, existing.id);
    assert_eq!(identity.user_id, new_user.id);
    assert_eq!(identity.status, IdentityStatus::Valid);
    assert_eq!(store.identities().len(), 1);
}

#[tokio::test]
async fn test_get_or_create_identity_provider_is_idempotent() {
    let store = InMemoryStore::new();

    let first = store
        .get_or_create_identity_provider("msteams", "f3ll0wsh1p")
        .await
        .unwrap();
    let second = store
        .get_or_create_identity_provider("msteams", "f3ll0wsh1p")
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_assign_group_replaces_prior_assignee() {
    let store = InMemoryStore::new();
    let org = store.create_organization("shire");
    let user = store.create_user("sam");
    let team = store.create_team(org.id, "fellowship", &[user.id]);
    let project = store.create_project(org.id, "ring");
    let group = store.create_group(project.id);

    store.assign_group(&group, Assignee::User(user.id)).await.unwrap();
    store.assign_group(&group, Assignee::Team(team.id)).await.unwrap();

    let assignee = store.get_assignee(group.id).await.unwrap().unwrap();
    assert_eq!(assignee.assignee, Assignee::Team(team.id));
    assert_eq!(assignee.project_id, project.id);
}

#[tokio::test]
async fn test_set_group_status_on_missing_group_is_not_found() {
    let store = InMemoryStore::new();

    let result = store
        .set_group_status(GroupId::new(999), GroupStatus::Resolved)
        .await;

    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_team_members_become_organization_members() {
    let store = InMemoryStore::new();
    let org = store.create_organization("shire");
    let user = store.create_user("pippin");
    store.create_team(org.id, "hobbits", &[user.id]);

    assert!(store.is_organization_member(org.id, user.id).await.unwrap());
}

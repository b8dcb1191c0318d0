//! Tests for development seeding.

use super::*;
use msteams_bridge_core::store::{IntegrationStore, IssueStore};
use msteams_bridge_core::{GroupId, UserId};

fn seed() -> SeedConfig {
    serde_json::from_value(serde_json::json!({
        "organizations": [{
            "slug": "shire",
            "members": ["frodo"],
            "projects": ["ring-bearer"],
            "integrations": [{
                "name": "Fellowship",
                "team_id": "f3ll0wsh1p",
                "service_url": "https://smba.trafficmanager.net/amer",
                "access_token": "y0u_5h4ll_n07_p455"
            }]
        }]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_seed_installs_integration_bound_to_organization() {
    let store = InMemoryStore::new();

    apply_seed(&store, &seed());

    let integrations = store
        .find_integrations(MSTEAMS_PROVIDER, "f3ll0wsh1p")
        .await
        .unwrap();
    assert_eq!(integrations.len(), 1);
    assert_eq!(integrations[0].metadata.access_token, "y0u_5h4ll_n07_p455");

    let organizations = store
        .organizations_for_integration(integrations[0].id)
        .await
        .unwrap();
    assert_eq!(organizations.len(), 1);
}

#[tokio::test]
async fn test_seed_creates_members_and_groups() {
    let store = InMemoryStore::new();

    apply_seed(&store, &seed());

    let groups: Vec<_> = (1..=10)
        .filter_map(|id| store.group(GroupId::new(id)))
        .collect();
    assert_eq!(groups.len(), 1);

    let project = store.get_project(groups[0].project_id).await.unwrap().unwrap();
    let mut members = 0;
    for id in 1..=10 {
        if store
            .is_organization_member(project.organization_id, UserId::new(id))
            .await
            .unwrap()
        {
            members += 1;
        }
    }
    assert_eq!(members, 1);
}

#[test]
fn test_empty_seed_is_default() {
    let seed: SeedConfig = serde_json::from_value(serde_json::json!({})).unwrap();

    assert!(seed.organizations.is_empty());
}

#[test]
fn test_debug_redacts_access_token() {
    let debug = format!("{:?}", seed());

    assert!(!debug.contains("y0u_5h4ll_n07_p455"));
}

//! Tests for link completion.

use super::*;
use crate::adapters::InMemoryStore;
use crate::linking::LinkingParams;
use crate::messaging::{ConversationId, MessagingError, MockMessagingClient};
use crate::models::{IdentityStatus, IntegrationMetadata};
use chrono::{Duration, Utc};

struct Fixture {
    store: InMemoryStore,
    signer: Arc<LinkingSigner>,
    params: LinkingParams,
}

fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    let org = store.create_organization("shire");
    let integration = store.create_integration(
        "msteams",
        "Fellowship of the Ring",
        "f3ll0wsh1p",
        IntegrationMetadata {
            service_url: "https://smba.trafficmanager.net/amer".to_string(),
            access_token: "y0u_5h4ll_n07_p455".to_string(),
            expires_at: None,
        },
    );
    store.bind_organization(org.id, integration.id);

    Fixture {
        store,
        signer: Arc::new(LinkingSigner::new("secret").unwrap()),
        params: LinkingParams {
            integration_id: integration.id,
            organization_id: org.id,
            teams_user_id: "s4ur0n".to_string(),
            team_id: "f3ll0wsh1p".to_string(),
            tenant_id: "7h3_gr347".to_string(),
        },
    }
}

fn delivering_messaging() -> MockMessagingClient {
    let mut messaging = MockMessagingClient::new();
    messaging
        .expect_create_conversation()
        .withf(|_, _, request| *request == ConversationRequest::personal("s4ur0n", "7h3_gr347"))
        .times(1)
        .returning(|_, _, _| Ok(ConversationId::new("d4rk_l0rd")));
    messaging
        .expect_send_activity()
        .withf(|_, _, _, activity| *activity == OutboundActivity::card(build_linked_card()))
        .times(1)
        .returning(|_, _, _, _| Ok(()));
    messaging
}

fn service(fixture: &Fixture, messaging: MockMessagingClient) -> LinkIdentityService {
    let store = Arc::new(fixture.store.clone());
    LinkIdentityService::new(
        store.clone(),
        store,
        Arc::new(messaging),
        fixture.signer.clone(),
        600,
    )
}

#[tokio::test]
async fn test_complete_link_creates_valid_identity_and_confirms() {
    let fixture = fixture();
    let user = fixture.store.create_user("frodo");
    let token = fixture.signer.sign(&fixture.params).unwrap();

    let linked = service(&fixture, delivering_messaging())
        .complete_link(&token, user.id)
        .await
        .unwrap();

    assert_eq!(linked.identity.user_id, user.id);
    assert_eq!(linked.identity.external_id, "s4ur0n");
    assert_eq!(linked.identity.status, IdentityStatus::Valid);
    assert_eq!(linked.organization_id, fixture.params.organization_id);
    assert!(linked.confirmation_sent);

    let idp = fixture
        .store
        .find_identity_provider("msteams", "f3ll0wsh1p")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(linked.identity.idp_id, idp.id);
}

#[tokio::test]
async fn test_complete_link_survives_confirmation_failure() {
    let fixture = fixture();
    let user = fixture.store.create_user("frodo");
    let token = fixture.signer.sign(&fixture.params).unwrap();

    let mut messaging = MockMessagingClient::new();
    messaging
        .expect_create_conversation()
        .returning(|_, _, _| {
            Err(MessagingError::Transport {
                message: "connection reset".to_string(),
            })
        });
    messaging.expect_send_activity().times(0);

    let linked = service(&fixture, messaging)
        .complete_link(&token, user.id)
        .await
        .unwrap();

    assert!(!linked.confirmation_sent);
    assert_eq!(fixture.store.identities().len(), 1);
}

#[tokio::test]
async fn test_complete_link_rejects_expired_token() {
    let fixture = fixture();
    let user = fixture.store.create_user("frodo");
    let token = fixture
        .signer
        .sign_at(&fixture.params, Utc::now() - Duration::seconds(3600))
        .unwrap();

    let mut messaging = MockMessagingClient::new();
    messaging.expect_create_conversation().times(0);

    let result = service(&fixture, messaging).complete_link(&token, user.id).await;

    assert!(matches!(
        result,
        Err(LinkError::InvalidToken(LinkingTokenError::Expired { .. }))
    ));
    assert!(fixture.store.identities().is_empty());
}

#[tokio::test]
async fn test_complete_link_after_uninstall_is_integration_not_found() {
    let fixture = fixture();
    let user = fixture.store.create_user("frodo");
    let token = fixture.signer.sign(&fixture.params).unwrap();
    fixture.store.delete_integration(fixture.params.integration_id);

    let result = service(&fixture, MockMessagingClient::new())
        .complete_link(&token, user.id)
        .await;

    assert!(matches!(result, Err(LinkError::IntegrationNotFound { .. })));
    assert!(fixture.store.identities().is_empty());
}

#[tokio::test]
async fn test_complete_link_requires_organization_binding() {
    let fixture = fixture();
    let user = fixture.store.create_user("frodo");
    let other_org = fixture.store.create_organization("mordor");
    let mut params = fixture.params.clone();
    params.organization_id = other_org.id;
    let token = fixture.signer.sign(&params).unwrap();

    let result = service(&fixture, MockMessagingClient::new())
        .complete_link(&token, user.id)
        .await;

    assert!(matches!(result, Err(LinkError::OrganizationNotBound { .. })));
}

#[tokio::test]
async fn test_complete_link_repoints_existing_identity() {
    let fixture = fixture();
    let previous = fixture.store.create_user("gollum");
    let user = fixture.store.create_user("frodo");
    let idp = fixture.store.create_identity_provider("msteams", "f3ll0wsh1p");
    let existing =
        fixture
            .store
            .create_identity(idp.id, "s4ur0n", previous.id, IdentityStatus::Invalid);
    let token = fixture.signer.sign(&fixture.params).unwrap();

    let linked = service(&fixture, delivering_messaging())
        .complete_link(&token, user.id)
        .await
        .unwrap();

    assert_eq!(linked.identity.id, existing.id);
    assert_eq!(linked.identity.user_id, user.id);
    assert_eq!(linked.identity.status, IdentityStatus::Valid);
}

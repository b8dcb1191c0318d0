//! Common test utilities for msteams-bridge integration tests
//!
//! This module provides:
//! - A fully wired router over an in-memory store, using the real JWT
//!   verifier, linking flow and Bot Framework client
//! - A wiremock server standing in for the Teams service URL
//! - Builders for connector tokens and card action activities

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use msteams_bridge_api::{create_router, AppState, ServiceConfig, ServiceMetrics};
use msteams_bridge_core::actions::ActionDispatcher;
use msteams_bridge_core::adapters::InMemoryStore;
use msteams_bridge_core::identity::IdentityResolver;
use msteams_bridge_core::linking::{
    HmacLinkingUrlBuilder, LinkIdentityService, LinkingFlow, LinkingSigner,
};
use msteams_bridge_core::messaging::{BotFrameworkClient, MessagingConfig};
use msteams_bridge_core::models::{
    Group, GroupStatus, Identity, IdentityStatus, Integration, IntegrationMetadata, Organization,
    Team, User,
};
use msteams_bridge_core::store::IdentityStore;
use msteams_bridge_core::webhook::{ActionWebhookProcessor, JwtSignatureVerifier, BOT_FRAMEWORK_ISSUER};
use msteams_bridge_core::{UserId, MSTEAMS_PROVIDER};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Fixture constants
// ============================================================================

pub const BOT_APP_ID: &str = "m17hr4nd1r-b07";
pub const BOT_SECRET: &str = "speak friend and enter";
pub const LINKING_SECRET: &str = "one ring to bind them";
pub const LINKING_BASE_URL: &str = "https://monitor.example.com";

pub const TEAM_ID: &str = "f3ll0wsh1p";
pub const TENANT_ID: &str = "m17hr4nd1r";
pub const TEAMS_USER_ID: &str = "g4nd4lf";
pub const OTHER_TEAMS_USER_ID: &str = "4r460rn";

/// Second Teams team, installed for an unrelated organization
pub const SECOND_TEAM_ID: &str = "54rum4n";
pub const SECOND_TEAMS_USER_ID: &str = "7h3_gr3y";

pub const ACCESS_TOKEN: &str = "y0u_5h4ll_n07_p455";
pub const CONVERSATION_ID: &str = "r1v3nd3ll";

// ============================================================================
// Test application
// ============================================================================

/// Router plus the store and Teams mock behind it
pub struct TestApp {
    pub router: Router,
    pub store: InMemoryStore,
    pub teams: MockServer,
    pub config: ServiceConfig,
    pub organization: Organization,
    pub user: User,
    pub team: Team,
    pub group: Group,
    pub integration: Integration,
}

impl TestApp {
    /// One organization with one member, one team, one unresolved group, and
    /// a Teams integration for [`TEAM_ID`]. No Teams user is linked yet.
    pub async fn new() -> Self {
        let teams = MockServer::start().await;
        mount_bot_framework(&teams).await;

        let store = InMemoryStore::new();
        let organization = store.create_organization("shire");
        let user = store.create_user("frodo");
        store.add_member(organization.id, user.id);
        let team = store.create_team(organization.id, "fellowship", &[user.id]);
        let project = store.create_project(organization.id, "ring-bearer");
        let group = store.create_group(project.id);

        let integration = store.create_integration(
            MSTEAMS_PROVIDER,
            "Fellowship",
            TEAM_ID,
            IntegrationMetadata {
                service_url: teams.uri(),
                access_token: ACCESS_TOKEN.to_string(),
                expires_at: None,
            },
        );
        store.bind_organization(organization.id, integration.id);

        let config = test_config();
        let router = build_router(&config, &store);

        Self {
            router,
            store,
            teams,
            config,
            organization,
            user,
            team,
            group,
            integration,
        }
    }

    /// Link a Teams user of [`TEAM_ID`] to `user_id`
    pub async fn link(&self, teams_user_id: &str, user_id: UserId) -> Identity {
        let idp = self
            .store
            .get_or_create_identity_provider(MSTEAMS_PROVIDER, TEAM_ID)
            .await
            .unwrap();
        self.store
            .create_identity(idp.id, teams_user_id, user_id, IdentityStatus::Valid)
    }

    /// Card action activity from `teams_user_id` in [`TEAM_ID`]
    pub fn action(&self, teams_user_id: &str, value: Value) -> Value {
        json!({
            "type": "message",
            "from": { "id": teams_user_id },
            "channelData": {
                "team": { "id": TEAM_ID },
                "tenant": { "id": TENANT_ID }
            },
            "serviceUrl": self.teams.uri(),
            "value": value
        })
    }

    /// POST an activity with a valid connector token
    pub async fn post_activity(&self, activity: &Value) -> (StatusCode, Value) {
        let authorization = connector_token(BOT_SECRET, &self.teams.uri());
        self.post_activity_with_authorization(activity, Some(&authorization))
            .await
    }

    pub async fn post_activity_with_authorization(
        &self,
        activity: &Value,
        authorization: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(&self.config.webhook.endpoint_path)
            .header("content-type", "application/json");
        if let Some(authorization) = authorization {
            builder = builder.header("authorization", authorization);
        }
        let request = builder.body(Body::from(activity.to_string())).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        read_json(response).await
    }

    /// POST to the link-identity route for `token` as the signed-in `user_id`
    pub async fn complete_link(&self, token: &str, user_id: UserId) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(format!(
                "{}/{}/",
                self.config.linking.link_identity_path, token
            ))
            .header("content-type", "application/json")
            .body(Body::from(json!({ "userId": user_id }).to_string()))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        read_json(response).await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub fn group_status(&self) -> GroupStatus {
        self.store.group(self.group.id).unwrap().status
    }

    /// Bodies of Bot Framework requests received at `request_path`
    pub async fn bot_framework_requests(&self, request_path: &str) -> Vec<Value> {
        self.teams
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == request_path)
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.bot.app_id = BOT_APP_ID.to_string();
    config.bot.signing_secret = Some(BOT_SECRET.to_string());
    config.linking.signing_secret = LINKING_SECRET.to_string();
    config.linking.base_url = LINKING_BASE_URL.to_string();
    config
}

/// Wire the production collaborators over `store`
pub fn build_router(config: &ServiceConfig, store: &InMemoryStore) -> Router {
    let store = Arc::new(store.clone());
    let verifier = Arc::new(JwtSignatureVerifier::new(&config.bot).unwrap());
    let messaging = Arc::new(BotFrameworkClient::new(MessagingConfig::default()).unwrap());
    let url_builder = Arc::new(HmacLinkingUrlBuilder::new(&config.linking).unwrap());
    let signer = Arc::new(LinkingSigner::new(&config.linking.signing_secret).unwrap());

    let processor = ActionWebhookProcessor::new(
        verifier,
        store.clone(),
        IdentityResolver::new(store.clone(), store.clone()),
        LinkingFlow::new(messaging.clone(), url_builder),
        ActionDispatcher::new(store.clone()),
    );
    let link_service = LinkIdentityService::new(
        store.clone(),
        store,
        messaging,
        signer,
        config.linking.max_age_seconds,
    );

    let state = AppState::new(
        config.clone(),
        Arc::new(processor),
        Arc::new(link_service),
        ServiceMetrics::new().unwrap(),
    );
    create_router(state)
}

/// `Authorization` header value carrying an HS256 connector token
pub fn connector_token(secret: &str, service_url: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "aud": BOT_APP_ID,
        "iss": BOT_FRAMEWORK_ISSUER,
        "nbf": now - 10,
        "exp": now + 300,
        "serviceurl": service_url
    });
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}

async fn mount_bot_framework(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v3/conversations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": CONVERSATION_ID })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v3/conversations/{}/activities", CONVERSATION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "4c71v17y" })))
        .mount(server)
        .await;
}

pub async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub fn activities_path() -> String {
    format!("/v3/conversations/{}/activities", CONVERSATION_ID)
}

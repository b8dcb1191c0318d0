//! Construction of the concrete collaborators from configuration.

use msteams_bridge_api::ServiceConfig;
use msteams_bridge_core::actions::ActionDispatcher;
use msteams_bridge_core::adapters::InMemoryStore;
use msteams_bridge_core::identity::IdentityResolver;
use msteams_bridge_core::linking::{
    HmacLinkingUrlBuilder, LinkIdentityService, LinkingFlow, LinkingSigner, LinkingTokenError,
};
use msteams_bridge_core::messaging::{BotFrameworkClient, MessagingConfig, MessagingError};
use msteams_bridge_core::webhook::{ActionWebhookProcessor, JwtSignatureVerifier, WebhookProcessor};
use msteams_bridge_core::ValidationError;
use std::sync::Arc;
use std::time::Duration;

/// Failures while wiring the application
#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    #[error("Bot authentication is misconfigured: {0}")]
    BotAuth(#[from] ValidationError),

    #[error("Linking is misconfigured: {0}")]
    Linking(#[from] LinkingTokenError),

    #[error("Bot Framework client could not be created: {0}")]
    Messaging(#[from] MessagingError),
}

/// Collaborators handed to the HTTP server
pub struct Application {
    pub webhook_processor: Arc<dyn WebhookProcessor>,
    pub link_service: Arc<LinkIdentityService>,
}

/// Wire the webhook pipeline and link service over `store`
pub fn build_application(
    config: &ServiceConfig,
    store: InMemoryStore,
) -> Result<Application, WiringError> {
    let store = Arc::new(store);

    let verifier = Arc::new(JwtSignatureVerifier::new(&config.bot)?);
    let messaging_config = MessagingConfig::default()
        .with_timeout(Duration::from_secs(config.bot.request_timeout_seconds));
    let messaging = Arc::new(BotFrameworkClient::new(messaging_config)?);
    let url_builder = Arc::new(HmacLinkingUrlBuilder::new(&config.linking)?);
    let signer = Arc::new(LinkingSigner::new(&config.linking.signing_secret)?);

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

    Ok(Application {
        webhook_processor: Arc::new(processor),
        link_service: Arc::new(link_service),
    })
}

#[cfg(test)]
#[path = "wiring_tests.rs"]
mod tests;

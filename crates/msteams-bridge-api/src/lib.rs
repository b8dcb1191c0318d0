//! # MS Teams Bridge HTTP Service
//!
//! HTTP surface of the Microsoft Teams bridge.
//!
//! This service provides:
//! - The Bot Framework webhook endpoint for card actions
//! - The link-identity route completing account linking
//! - Health, readiness and Prometheus metrics endpoints

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;

pub use config::{LoggingConfig, ServerConfig, ServiceConfig, WebhookConfig};
pub use errors::{ConfigError, LinkHandlerError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;
pub use responses::{
    HealthResponse, LinkIdentityRequest, LinkIdentityResponse, ReadinessResponse, WebhookResponse,
};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use msteams_bridge_core::linking::LinkIdentityService;
use msteams_bridge_core::webhook::{WebhookError, WebhookOutcome, WebhookProcessor, WebhookRequest};
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Webhook pipeline
    pub webhook_processor: Arc<dyn WebhookProcessor>,

    /// Completes account links
    pub link_service: Arc<LinkIdentityService>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        webhook_processor: Arc<dyn WebhookProcessor>,
        link_service: Arc<LinkIdentityService>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config,
            webhook_processor,
            link_service,
            metrics,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the application router
///
/// Webhook and link routes are served both with and without a trailing slash.
pub fn create_router(state: AppState) -> Router {
    let webhook_path = state.config.webhook.endpoint_path.trim_end_matches('/').to_string();
    let link_path = state
        .config
        .linking
        .link_identity_path
        .trim_end_matches('/')
        .to_string();

    let webhook_routes = Router::new()
        .route(&webhook_path, post(handle_webhook))
        .route(&format!("{}/", webhook_path), post(handle_webhook));

    let link_routes = Router::new()
        .route(&format!("{}/{{token}}", link_path), post(handle_link_identity))
        .route(&format!("{}/{{token}}/", link_path), post(handle_link_identity));

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check))
        .route("/metrics", get(metrics_endpoint));

    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .merge(webhook_routes)
        .merge(link_routes)
        .merge(health_routes)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start HTTP server
pub async fn start_server(
    config: ServiceConfig,
    webhook_processor: Arc<dyn WebhookProcessor>,
    link_service: Arc<LinkIdentityService>,
) -> Result<(), ServiceError> {
    let metrics = ServiceMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e: std::net::AddrParseError| ServiceError::BindFailed {
            address: format!("{}:{}", config.server.host, config.server.port),
            message: e.to_string(),
        })?;

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    let state = AppState::new(config, webhook_processor, link_service, metrics);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.to_string(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_signal = async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
        }
    };

    // In-flight requests complete; new connections are refused once the signal fires.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Handle Bot Framework card actions
///
/// - `201 Created` when a linking prompt was sent instead of running the action
/// - `200 OK` for every processed action, including no-ops and non-action activities
/// - error statuses per [`WebhookHandlerError`]
#[instrument(skip(state, headers, body))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), WebhookHandlerError> {
    info!("Received webhook request");
    state.metrics.webhook_requests_total.inc();
    let _timer = state.metrics.webhook_duration_seconds.start_timer();

    let header_map: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_lowercase(),
                v.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    let request = WebhookRequest::new(header_map, body);

    let timeout_seconds = state.config.server.timeout_seconds;
    let result = tokio::time::timeout(
        Duration::from_secs(timeout_seconds),
        state.webhook_processor.process_webhook(request),
    )
    .await
    .map_err(|_| {
        state.metrics.record_outcome(metrics::outcome::ERROR);
        WebhookHandlerError::Timeout {
            seconds: timeout_seconds,
        }
    })?;

    match result {
        Ok(outcome) => Ok(respond(&state.metrics, outcome)),
        Err(e) => {
            match &e {
                WebhookError::Authentication => {
                    state.metrics.webhook_authentication_failures_total.inc();
                    state.metrics.record_outcome(metrics::outcome::ERROR);
                }
                WebhookError::IntegrationNotFound { .. } => {
                    state
                        .metrics
                        .record_outcome(metrics::outcome::INTEGRATION_NOT_FOUND);
                }
                _ => state.metrics.record_outcome(metrics::outcome::ERROR),
            }
            Err(WebhookHandlerError::ProcessingFailed(e))
        }
    }
}

fn respond(
    service_metrics: &ServiceMetrics,
    outcome: WebhookOutcome,
) -> (StatusCode, Json<WebhookResponse>) {
    match outcome {
        WebhookOutcome::LinkingRequested {
            integration_id,
            organization_id,
            ..
        } => {
            service_metrics.record_outcome(metrics::outcome::LINKING_REQUESTED);
            info!(
                integration_id = %integration_id,
                organization_id = %organization_id,
                "Linking prompt sent"
            );
            (
                StatusCode::CREATED,
                Json(WebhookResponse::new(
                    metrics::outcome::LINKING_REQUESTED,
                    "Account linking prompt sent",
                )),
            )
        }
        WebhookOutcome::ActionProcessed(dispatch) => {
            service_metrics.record_outcome(metrics::outcome::ACTION_PROCESSED);
            info!(outcome = ?dispatch, "Action processed");
            (
                StatusCode::OK,
                Json(WebhookResponse::new(
                    metrics::outcome::ACTION_PROCESSED,
                    "Action processed",
                )),
            )
        }
        WebhookOutcome::ActivityIgnored { activity_type } => {
            service_metrics.record_outcome(metrics::outcome::IGNORED_ACTIVITY);
            (
                StatusCode::OK,
                Json(WebhookResponse::new(
                    metrics::outcome::IGNORED_ACTIVITY,
                    format!("Activity type '{}' acknowledged", activity_type),
                )),
            )
        }
        WebhookOutcome::NoLinkingContext { integration_id } => {
            service_metrics.record_outcome(metrics::outcome::NO_LINKING_CONTEXT);
            warn!(integration_id = %integration_id, "Unlinked user on integration without organization");
            (
                StatusCode::OK,
                Json(WebhookResponse::new(
                    metrics::outcome::NO_LINKING_CONTEXT,
                    "Nothing to do",
                )),
            )
        }
    }
}

/// Complete account linking for the signed-in product user
///
/// The route is expected to sit behind the product's session authentication,
/// which supplies `userId`.
#[instrument(skip(state, token, request), fields(user_id = %request.user_id))]
pub async fn handle_link_identity(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<LinkIdentityRequest>,
) -> Result<Json<LinkIdentityResponse>, LinkHandlerError> {
    let linked = state
        .link_service
        .complete_link(&token, request.user_id)
        .await?;

    state.metrics.identity_links_completed_total.inc();
    info!(
        identity_id = %linked.identity.id,
        organization_id = %linked.organization_id,
        confirmation_sent = linked.confirmation_sent,
        "Identity linked"
    );

    Ok(Json(LinkIdentityResponse {
        status: "linked".to_string(),
        identity_id: linked.identity.id,
    }))
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Basic health check endpoint
#[instrument(skip_all)]
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check for Kubernetes
#[instrument(skip_all)]
async fn handle_readiness_check() -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        ready: true,
        timestamp: chrono::Utc::now(),
    })
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

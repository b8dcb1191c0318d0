//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use msteams_bridge_core::linking::LinkError;
use msteams_bridge_core::webhook::WebhookError;
use tracing::{error, warn};

const GENERIC_INTERNAL_MESSAGE: &str = "Internal server error occurred. Please try again later.";

/// Webhook handler errors with HTTP status code mapping
///
/// - `401 Unauthorized`: the connector token did not verify
/// - `404 Not Found`: no integration is installed for the team
/// - `400 Bad Request`: the activity could not be parsed
/// - `408 Request Timeout`: processing exceeded the configured timeout
/// - `502 Bad Gateway`: the Bot Framework rejected the linking prompt
/// - `503 Service Unavailable`: transient store failure, retry later
/// - `500 Internal Server Error`: anything else; details are only logged
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    #[error("Processing failed: {0}")]
    ProcessingFailed(#[from] WebhookError),

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },
}

impl WebhookHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProcessingFailed(e) => match e {
                WebhookError::Authentication => StatusCode::UNAUTHORIZED,
                WebhookError::IntegrationNotFound { .. } => StatusCode::NOT_FOUND,
                WebhookError::MalformedPayload { .. } | WebhookError::JsonParsing(_) => {
                    StatusCode::BAD_REQUEST
                }
                WebhookError::Messaging(_) => StatusCode::BAD_GATEWAY,
                WebhookError::Store(store) if store.is_transient() => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                WebhookError::Store(_) | WebhookError::LinkingToken(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = match &self {
            Self::ProcessingFailed(e) if e.is_transient() => Some(60),
            Self::Timeout { .. } => Some(5),
            _ => None,
        };

        let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            error!(error = %self, "Webhook processing failed");
            GENERIC_INTERNAL_MESSAGE.to_string()
        } else {
            warn!(error = %self, status = status.as_u16(), "Webhook rejected");
            self.to_string()
        };

        error_response(status, message, retry_after)
    }
}

/// Link completion errors with HTTP status code mapping
///
/// - `400 Bad Request`: malformed, forged or expired token
/// - `404 Not Found`: the integration or its organization binding is gone
/// - `503`/`500`: store failure
#[derive(Debug, thiserror::Error)]
pub enum LinkHandlerError {
    #[error("Link failed: {0}")]
    LinkFailed(#[from] LinkError),
}

impl LinkHandlerError {
    pub fn status_code(&self) -> StatusCode {
        let Self::LinkFailed(e) = self;
        match e {
            LinkError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            LinkError::IntegrationNotFound { .. } | LinkError::OrganizationNotBound { .. } => {
                StatusCode::NOT_FOUND
            }
            LinkError::Store(store) if store.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            LinkError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LinkHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(error = %self, "Link completion failed");
            GENERIC_INTERNAL_MESSAGE.to_string()
        } else {
            warn!(error = %self, status = status.as_u16(), "Link completion rejected");
            self.to_string()
        };

        let retry_after = (status == StatusCode::SERVICE_UNAVAILABLE).then_some(60);
        error_response(status, message, retry_after)
    }
}

fn error_response(status: StatusCode, message: String, retry_after: Option<u64>) -> Response {
    let body = serde_json::json!({
        "error": message,
        "status": status.as_u16(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    let mut response = (status, Json(body)).into_response();

    if let Some(retry_seconds) = retry_after {
        if let Ok(header_value) = retry_seconds.to_string().parse() {
            response.headers_mut().insert("Retry-After", header_value);
        }
    }

    response
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

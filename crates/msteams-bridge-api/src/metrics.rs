//! Metrics collection for the API service.
//!
//! Each [`ServiceMetrics`] owns its own [`Registry`] so several routers (for
//! example in tests) can coexist in one process.

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// `outcome` label values of `webhook_outcomes_total`
pub mod outcome {
    pub const LINKING_REQUESTED: &str = "linking_requested";
    pub const ACTION_PROCESSED: &str = "action_processed";
    pub const INTEGRATION_NOT_FOUND: &str = "integration_not_found";
    pub const IGNORED_ACTIVITY: &str = "ignored_activity";
    pub const NO_LINKING_CONTEXT: &str = "no_linking_context";
    pub const ERROR: &str = "error";
}

/// Service metrics for observability
pub struct ServiceMetrics {
    registry: Registry,

    pub webhook_requests_total: IntCounter,
    pub webhook_authentication_failures_total: IntCounter,
    pub webhook_outcomes_total: IntCounterVec,
    pub webhook_duration_seconds: Histogram,
    pub identity_links_completed_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhook_requests_total = IntCounter::with_opts(Opts::new(
            "webhook_requests_total",
            "Total webhook requests received",
        ))?;
        let webhook_authentication_failures_total = IntCounter::with_opts(Opts::new(
            "webhook_authentication_failures_total",
            "Webhook requests rejected by signature verification",
        ))?;
        let webhook_outcomes_total = IntCounterVec::new(
            Opts::new("webhook_outcomes_total", "Webhook results by outcome"),
            &["outcome"],
        )?;
        let webhook_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "webhook_duration_seconds",
                "Webhook processing time distribution",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;
        let identity_links_completed_total = IntCounter::with_opts(Opts::new(
            "identity_links_completed_total",
            "Teams identities linked through the link-identity route",
        ))?;

        registry.register(Box::new(webhook_requests_total.clone()))?;
        registry.register(Box::new(webhook_authentication_failures_total.clone()))?;
        registry.register(Box::new(webhook_outcomes_total.clone()))?;
        registry.register(Box::new(webhook_duration_seconds.clone()))?;
        registry.register(Box::new(identity_links_completed_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            webhook_requests_total,
            webhook_authentication_failures_total,
            webhook_outcomes_total,
            webhook_duration_seconds,
            identity_links_completed_total,
        }))
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.webhook_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

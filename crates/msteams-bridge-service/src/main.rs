//! # MS Teams Bridge Service
//!
//! Binary entry point for the Microsoft Teams bridge HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Wires the webhook pipeline over the in-memory store
//! - Starts the HTTP server from msteams-bridge-api

mod seed;
mod wiring;

use msteams_bridge_api::{start_server, LoggingConfig, ServiceConfig, ServiceError};
use msteams_bridge_core::adapters::InMemoryStore;
use seed::{apply_seed, SeedConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str =
    "msteams_bridge_service=info,msteams_bridge_api=info,msteams_bridge_core=info,tower_http=debug";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/msteams-bridge/service.yaml
    //  2. ./config/service.yaml
    //  3. Path given by MSTB_CONFIG_FILE
    //  4. Environment variables prefixed MSTB__ (double-underscore separator)
    //     e.g. MSTB__SERVER__PORT=9090 sets server.port = 9090
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/msteams-bridge/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    let explicit_path = std::env::var("MSTB_CONFIG_FILE")
        .ok()
        .filter(|path| !path.is_empty());
    if let Some(path) = &explicit_path {
        config_builder = config_builder.add_source(
            config::File::with_name(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("MSTB").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            init_logging(&LoggingConfig::default());
            error!(error = %e, "Failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.clone().try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            init_logging(&LoggingConfig::default());
            error!(
                error = %e,
                "Could not deserialize service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    init_logging(&service_config.logging);
    info!("Starting MS Teams Bridge Service");
    if let Some(path) = &explicit_path {
        info!(path = %path, "Loaded configuration from explicit path");
    }

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Wire collaborators
    // -------------------------------------------------------------------------
    warn!(
        "Using the in-memory store; identities and group changes are lost on restart. \
         Do not use in production."
    );
    let store = InMemoryStore::new();

    match config.get::<SeedConfig>("seed") {
        Ok(seed) => apply_seed(&store, &seed),
        Err(config::ConfigError::NotFound(_)) => {}
        Err(e) => {
            error!(error = %e, "Invalid seed configuration; aborting");
            std::process::exit(3);
        }
    }

    let application = match wiring::build_application(&service_config, store) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Failed to wire application; aborting");
            std::process::exit(3);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        webhook_path = %service_config.webhook.endpoint_path,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(
        service_config,
        application.webhook_processor,
        application.link_service,
    )
    .await
    {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if logging.level.is_empty() || logging.level == "info" {
            DEFAULT_LOG_FILTER.into()
        } else {
            EnvFilter::new(&logging.level)
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

//! Tests for [`ServiceConfig`].

use super::*;

fn valid_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.bot.app_id = "m17hr4nd1r-app".to_string();
    config.bot.signing_secret = Some("speak friend and enter".to_string());
    config.linking.signing_secret = "one ring".to_string();
    config.linking.base_url = "https://monitor.example.com".to_string();
    config
}

#[test]
fn test_defaults() {
    let config = ServiceConfig::default();

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.webhook.endpoint_path, "/extensions/msteams/webhook");
    assert_eq!(
        config.linking.link_identity_path,
        "/extensions/msteams/link-identity"
    );
    assert_eq!(config.linking.max_age_seconds, 600);
    assert_eq!(config.bot.issuer, "https://api.botframework.com");
    assert_eq!(config.bot.leeway_seconds, 60);
    assert_eq!(config.bot.request_timeout_seconds, 10);
    assert!(!config.logging.json_format);
}

#[test]
fn test_valid_config_passes() {
    assert!(valid_config().validate().is_ok());
}

#[test]
fn test_default_config_is_incomplete() {
    assert!(matches!(
        ServiceConfig::default().validate(),
        Err(ConfigError::Missing { .. })
    ));
}

#[test]
fn test_zero_port_is_rejected() {
    let mut config = valid_config();
    config.server.port = 0;

    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_zero_bot_framework_timeout_is_rejected() {
    let mut config = valid_config();
    config.bot.request_timeout_seconds = 0;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid { ref message }) if message.contains("request_timeout_seconds")
    ));
}

#[test]
fn test_bot_key_is_required() {
    let mut config = valid_config();
    config.bot.signing_secret = None;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Missing { ref key }) if key.contains("bot.signing_secret")
    ));

    config.bot.public_key_pem = Some("-----BEGIN PUBLIC KEY-----".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_linking_secret_is_required() {
    let mut config = valid_config();
    config.linking.signing_secret = String::new();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::Missing { ref key }) if key == "linking.signing_secret"
    ));
}

#[test]
fn test_relative_linking_base_url_is_rejected() {
    let mut config = valid_config();
    config.linking.base_url = "monitor.example.com".to_string();

    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_partial_json_uses_defaults() {
    let config: ServiceConfig = serde_json::from_value(serde_json::json!({
        "server": {"port": 9090},
        "bot": {"app_id": "m17hr4nd1r-app", "signing_secret": "s3cr3t"}
    }))
    .unwrap();

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.bot.app_id, "m17hr4nd1r-app");
    assert_eq!(config.bot.issuer, "https://api.botframework.com");
}

#[test]
fn test_debug_redacts_secrets() {
    let debug = format!("{:?}", valid_config());

    assert!(!debug.contains("speak friend and enter"));
    assert!(!debug.contains("one ring"));
}

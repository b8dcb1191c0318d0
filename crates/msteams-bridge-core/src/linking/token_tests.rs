//! Tests for linking token signing.

use super::*;
use crate::{IntegrationId, OrganizationId};
use chrono::{Duration, TimeZone};

fn params() -> LinkingParams {
    LinkingParams {
        integration_id: IntegrationId::new(1),
        organization_id: OrganizationId::new(2),
        teams_user_id: "s4ur0n".to_string(),
        team_id: "f3ll0wsh1p".to_string(),
        tenant_id: "7h3_gr347".to_string(),
    }
}

fn issued_at() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

#[test]
fn test_signed_token_verifies_within_max_age() {
    let signer = LinkingSigner::new("secret").unwrap();
    let token = signer.sign_at(&params(), issued_at()).unwrap();

    let unsigned = signer
        .unsign_at(&token, 600, issued_at() + Duration::seconds(599))
        .unwrap();

    assert_eq!(unsigned, params());
}

#[test]
fn test_token_is_url_path_safe() {
    let signer = LinkingSigner::new("secret").unwrap();
    let token = signer.sign_at(&params(), issued_at()).unwrap();

    assert!(token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
}

#[test]
fn test_expired_token_is_rejected() {
    let signer = LinkingSigner::new("secret").unwrap();
    let token = signer.sign_at(&params(), issued_at()).unwrap();

    let result = signer.unsign_at(&token, 600, issued_at() + Duration::seconds(601));

    assert_eq!(
        result,
        Err(LinkingTokenError::Expired {
            age_seconds: 601,
            max_age_seconds: 600
        })
    );
}

#[test]
fn test_unbounded_max_age_accepts_old_token() {
    let signer = LinkingSigner::new("secret").unwrap();
    let token = signer.sign_at(&params(), issued_at()).unwrap();

    let result = signer.unsign_at(&token, u64::MAX, issued_at() + Duration::days(3650));

    assert_eq!(result, Ok(params()));
}

#[test]
fn test_token_signed_with_other_secret_is_rejected() {
    let token = LinkingSigner::new("other")
        .unwrap()
        .sign_at(&params(), issued_at())
        .unwrap();

    let result = LinkingSigner::new("secret")
        .unwrap()
        .unsign_at(&token, 600, issued_at());

    assert_eq!(result, Err(LinkingTokenError::BadSignature));
}

#[test]
fn test_tampered_payload_is_rejected() {
    let signer = LinkingSigner::new("secret").unwrap();
    let token = signer.sign_at(&params(), issued_at()).unwrap();
    let (_, signature) = token.split_once('.').unwrap();

    let mut other = params();
    other.teams_user_id = "g4nd4lf".to_string();
    let other_token = signer.sign_at(&other, issued_at()).unwrap();
    let (other_payload, _) = other_token.split_once('.').unwrap();

    let forged = format!("{}.{}", other_payload, signature);
    let result = signer.unsign_at(&forged, 600, issued_at());

    assert_eq!(result, Err(LinkingTokenError::BadSignature));
}

#[test]
fn test_malformed_tokens_are_rejected() {
    let signer = LinkingSigner::new("secret").unwrap();

    assert!(matches!(
        signer.unsign_at("no-separator", 600, issued_at()),
        Err(LinkingTokenError::Malformed { .. })
    ));
    assert!(matches!(
        signer.unsign_at("abc.!!!", 600, issued_at()),
        Err(LinkingTokenError::Malformed { .. })
    ));
}

#[test]
fn test_empty_secret_is_rejected() {
    assert!(matches!(
        LinkingSigner::new(""),
        Err(LinkingTokenError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_url_builder_embeds_token_under_link_identity_path() {
    let config = LinkingConfig {
        base_url: "https://monitor.example.com/".to_string(),
        signing_secret: "secret".to_string(),
        ..LinkingConfig::default()
    };
    let builder = HmacLinkingUrlBuilder::new(&config).unwrap();

    let url = builder.build_linking_url(&params()).unwrap();

    let prefix = "https://monitor.example.com/extensions/msteams/link-identity/";
    assert!(url.starts_with(prefix), "unexpected url {}", url);
    assert!(url.ends_with('/'));

    let token = url[prefix.len()..].trim_end_matches('/');
    let unsigned = LinkingSigner::new("secret").unwrap().unsign(token, 600).unwrap();
    assert_eq!(unsigned, params());
}

#[test]
fn test_url_builder_rejects_relative_base_url() {
    let config = LinkingConfig {
        base_url: "monitor.example.com".to_string(),
        signing_secret: "secret".to_string(),
        ..LinkingConfig::default()
    };

    assert!(matches!(
        HmacLinkingUrlBuilder::new(&config),
        Err(LinkingTokenError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_config_debug_redacts_secret() {
    let config = LinkingConfig {
        signing_secret: "hunter2".to_string(),
        ..LinkingConfig::default()
    };

    assert!(!format!("{:?}", config).contains("hunter2"));
}

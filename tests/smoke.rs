use std::collections::HashMap;

use axum::http::StatusCode;
use ici_chat::config::Environment;
use ici_chat::error::IciError;
use ici_chat::identity;
use ici_chat::secrets::{EmailProvider, SecretsManager};

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

// ===========================================================================
// Identity
// ===========================================================================

#[test]
fn env_id_is_stable_sha256_hex() {
    let a = identity::env_id();
    let b = identity::env_id();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert!(is_hex(a));
}

#[test]
fn env_id_elements_describe_this_build() {
    let elements = identity::env_id_elements();
    assert_eq!(elements.implementation, "rust");
    assert_eq!(elements.version, env!("CARGO_PKG_VERSION"));
    assert!(elements.platform.contains(std::env::consts::OS));
}

#[test]
fn private_id_depends_on_every_input() {
    let base = identity::private_id("env", "1.2.3.4", "Firefox");
    assert_eq!(base, identity::private_id("env", "1.2.3.4", "Firefox"));
    assert_ne!(base, identity::private_id("env2", "1.2.3.4", "Firefox"));
    assert_ne!(base, identity::private_id("env", "1.2.3.5", "Firefox"));
    assert_ne!(base, identity::private_id("env", "1.2.3.4", "Chrome"));
    assert_eq!(base.len(), 64);
}

#[test]
fn secure_keys_are_fresh_256_bit_hex() {
    let a = identity::generate_secure_key();
    let b = identity::generate_secure_key();
    assert_eq!(a.len(), 64);
    assert!(is_hex(&a));
    assert_ne!(a, b);
}

#[test]
fn build_version_is_ten_hex_chars() {
    let v = identity::build_version();
    assert_eq!(v.len(), 10);
    assert!(is_hex(v));
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn client_errors_map_to_4xx_with_readable_messages() {
    let e = IciError::MissingField("url".to_string());
    assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    assert_eq!(e.user_message(), "Missing required field: url");

    let e = IciError::MissingParameter("public_ip".to_string());
    assert_eq!(e.user_message(), "Missing required parameter: public_ip");

    let e = IciError::MalformedJson("expected value at line 1".to_string());
    assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    assert_eq!(e.user_message(), "No data provided");

    let e = IciError::NotFound("Client".to_string());
    assert_eq!(e.status(), StatusCode::NOT_FOUND);
    assert_eq!(e.user_message(), "Client not found");
}

#[test]
fn internal_errors_hide_details() {
    let e = IciError::Io(std::io::Error::other("/secret/path unreadable"));
    assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!e.user_message().contains("/secret/path"));

    let e = IciError::Embedding("onnx runtime exploded".to_string());
    assert!(!e.user_message().contains("onnx"));
}

// ===========================================================================
// Secrets
// ===========================================================================

fn secrets(env: Environment, pairs: &[(&str, &str)]) -> SecretsManager {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    SecretsManager::from_map(env, map)
}

#[test]
fn empty_secrets_report_unhealthy_without_email() {
    let s = secrets(Environment::Development, &[]);
    assert!(s.list_available_secrets().is_empty());
    assert!(!s.is_email_enabled());
    assert_eq!(s.email_provider(), None);

    let health = s.check_configuration_health();
    assert!(!health.healthy);
    assert_eq!(health.total_secrets, 0);
    assert!(health.issues.iter().any(|i| i.contains("No email provider")));
}

#[test]
fn email_provider_follows_priority_order() {
    let s = secrets(
        Environment::Development,
        &[("TUTANOTA_USERNAME", "me"), ("MAILGUN_API_KEY", "key")],
    );
    assert_eq!(s.email_provider(), Some(EmailProvider::Mailgun));

    let s = secrets(
        Environment::Development,
        &[("SENDGRID_API_KEY", "sg"), ("MAILGUN_API_KEY", "mg")],
    );
    assert_eq!(s.email_provider(), Some(EmailProvider::Sendgrid));
}

#[test]
fn available_secrets_list_names_only() {
    let s = secrets(Environment::Development, &[("JWT_SECRET_KEY", "hunter2"), ("UNRELATED", "x")]);
    let listed = s.list_available_secrets();
    assert_eq!(listed, vec!["env:JWT_SECRET_KEY".to_string()]);
    assert!(!listed.iter().any(|n| n.contains("hunter2")));
}

#[test]
fn empty_values_count_as_missing() {
    let s = secrets(Environment::Development, &[("SENDGRID_API_KEY", "")]);
    assert!(!s.is_email_enabled());
}

#[test]
fn configuration_report_totals_configured_areas() {
    let s = secrets(
        Environment::Development,
        &[("SENDGRID_API_KEY", "sg"), ("DATABASE_URL", "postgres://x")],
    );
    let report = s.configuration_report();
    assert_eq!(report.environment, "development");
    assert_eq!(report.secrets_source, "Environment Variables");
    assert!(report.configuration_status.email_configured);
    assert!(report.configuration_status.database_configured);
    assert!(!report.configuration_status.auth_configured);
    assert_eq!(report.total_configured, 2);
    assert_eq!(report.available_secrets, 2);
    assert!(report.email_enabled);
}

#[test]
fn production_validation_flags_missing_admin() {
    let dev = secrets(Environment::Development, &[]).validate_configuration();
    let prod = secrets(Environment::Production, &[]).validate_configuration();
    assert!(dev.valid);
    assert!(prod.valid);
    assert!(!dev.warnings.iter().any(|w| w.contains("Admin")));
    assert!(prod.warnings.iter().any(|w| w.contains("Admin")));
}

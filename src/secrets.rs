//! Secret lookup and configuration reporting.
//!
//! Secrets resolve from an explicit override map first, then from the
//! process environment. Lookups are logged by name; values never are.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::config::Environment;

/// Every secret name the service knows how to use.
pub const KNOWN_SECRETS: &[&str] = &[
    "SENDGRID_API_KEY",
    "MAILGUN_API_KEY",
    "MAILGUN_DOMAIN",
    "TUTANOTA_USERNAME",
    "TUTANOTA_PASSWORD",
    "JWT_SECRET_KEY",
    "DATABASE_URL",
    "ADMIN_EMAIL",
    "ADMIN_PASSWORD",
];

/// Email provider secrets, in priority order.
const EMAIL_PROVIDER_SECRETS: &[(&str, EmailProvider)] = &[
    ("SENDGRID_API_KEY", EmailProvider::Sendgrid),
    ("MAILGUN_API_KEY", EmailProvider::Mailgun),
    ("TUTANOTA_USERNAME", EmailProvider::Tutanota),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Sendgrid,
    Mailgun,
    Tutanota,
}

impl EmailProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sendgrid => "sendgrid",
            Self::Mailgun => "mailgun",
            Self::Tutanota => "tutanota",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretsHealth {
    pub environment: &'static str,
    pub secrets_found: BTreeMap<String, bool>,
    pub total_secrets: usize,
    pub healthy: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConfigurationStatus {
    pub email_configured: bool,
    pub database_configured: bool,
    pub auth_configured: bool,
    pub admin_configured: bool,
}

impl ConfigurationStatus {
    pub fn total_configured(&self) -> usize {
        [
            self.email_configured,
            self.database_configured,
            self.auth_configured,
            self.admin_configured,
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationReport {
    pub environment: &'static str,
    pub secrets_source: &'static str,
    pub configuration_status: ConfigurationStatus,
    pub email_provider: Option<EmailProvider>,
    pub secrets_health: SecretsHealth,
    pub available_secrets: usize,
    pub email_enabled: bool,
    pub last_check: String,
    pub total_configured: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigurationValidation {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub recommendations: Vec<String>,
}

pub struct SecretsManager {
    environment: Environment,
    overrides: HashMap<String, String>,
    use_process_env: bool,
}

impl SecretsManager {
    pub fn new(environment: Environment) -> Self {
        tracing::info!("secrets: resolving from environment variables ({})", environment.as_str());
        Self {
            environment,
            overrides: HashMap::new(),
            use_process_env: true,
        }
    }

    /// A manager that only sees the given values. Used by tests so the
    /// host environment can't leak in.
    pub fn from_map(environment: Environment, values: HashMap<String, String>) -> Self {
        Self {
            environment,
            overrides: values,
            use_process_env: false,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn get_secret(&self, name: &str) -> Option<String> {
        let value = self.lookup(name);
        if value.is_some() {
            tracing::debug!("secrets: resolved {name}");
        } else {
            tracing::debug!("secrets: {name} not set");
        }
        value
    }

    fn lookup(&self, name: &str) -> Option<String> {
        if let Some(v) = self.overrides.get(name) {
            return Some(v.clone()).filter(|v| !v.is_empty());
        }
        if self.use_process_env {
            return std::env::var(name).ok().filter(|v| !v.is_empty());
        }
        None
    }

    fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Names (never values) of the known secrets that are present.
    pub fn list_available_secrets(&self) -> Vec<String> {
        KNOWN_SECRETS
            .iter()
            .filter(|name| self.has(name))
            .map(|name| format!("env:{name}"))
            .collect()
    }

    pub fn check_configuration_health(&self) -> SecretsHealth {
        let mut secrets_found = BTreeMap::new();
        for (name, _) in EMAIL_PROVIDER_SECRETS {
            secrets_found.insert((*name).to_string(), self.has(name));
        }
        let email_configured = secrets_found.values().any(|v| *v);

        let mut issues = Vec::new();
        if !email_configured {
            issues.push("No email provider configured".to_string());
        }
        if !self.has("JWT_SECRET_KEY") {
            issues.push("JWT secret not configured (optional)".to_string());
        }

        SecretsHealth {
            environment: self.environment.as_str(),
            total_secrets: secrets_found.values().filter(|v| **v).count(),
            secrets_found,
            healthy: email_configured,
            issues,
        }
    }

    pub fn configuration_status(&self) -> ConfigurationStatus {
        ConfigurationStatus {
            email_configured: self.email_provider().is_some(),
            database_configured: self.has("DATABASE_URL"),
            auth_configured: self.has("JWT_SECRET_KEY"),
            admin_configured: self.has("ADMIN_EMAIL") || self.has("ADMIN_PASSWORD"),
        }
    }

    /// First configured provider in priority order.
    pub fn email_provider(&self) -> Option<EmailProvider> {
        EMAIL_PROVIDER_SECRETS
            .iter()
            .find(|(name, _)| self.has(name))
            .map(|(_, provider)| *provider)
    }

    pub fn is_email_enabled(&self) -> bool {
        self.email_provider().is_some()
    }

    pub fn admin_email(&self) -> Option<String> {
        self.get_secret("ADMIN_EMAIL")
    }

    pub fn configuration_report(&self) -> ConfigurationReport {
        let status = self.configuration_status();
        ConfigurationReport {
            environment: self.environment.as_str(),
            secrets_source: "Environment Variables",
            configuration_status: status,
            email_provider: self.email_provider(),
            secrets_health: self.check_configuration_health(),
            available_secrets: self.list_available_secrets().len(),
            email_enabled: status.email_configured,
            last_check: crate::clock::iso_now(),
            total_configured: status.total_configured(),
        }
    }

    pub fn validate_configuration(&self) -> ConfigurationValidation {
        let status = self.configuration_status();
        let mut v = ConfigurationValidation::default();

        if !status.email_configured {
            v.warnings
                .push("No email provider configured - email notifications disabled".to_string());
            v.recommendations.push(
                "Configure at least one email provider (SendGrid, Mailgun, or Tutanota)".to_string(),
            );
        }
        if !status.auth_configured {
            v.warnings
                .push("JWT secret not configured - authentication may be insecure".to_string());
            v.recommendations
                .push("Generate and configure JWT_SECRET_KEY".to_string());
        }
        if self.environment == Environment::Production && !status.admin_configured {
            v.warnings
                .push("Admin access not properly configured".to_string());
            v.recommendations
                .push("Configure ADMIN_EMAIL and ADMIN_PASSWORD".to_string());
        }

        v.valid = v.errors.is_empty();
        v
    }
}

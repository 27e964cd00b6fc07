//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and addresses
//! - Reject a cookie secret that cannot seal
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;
use crate::cookies::{check_secret, SealError};

/// One semantic problem, located by its config key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        issues.push(ConfigIssue::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if config.limits.max_body_size == 0 {
        issues.push(ConfigIssue::new("limits.max_body_size", "must be greater than 0"));
    }

    if config.cookies.is_encrypted() {
        let result = match config.cookies.secret.as_deref() {
            Some(secret) => check_secret(secret),
            None => Err(SealError::MissingSecret),
        };
        if let Err(e) = result {
            issues.push(ConfigIssue::new("cookies.secret", e.to_string()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issues.push(ConfigIssue::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, TTLs > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ForumConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{ForumConfig, PLACEHOLDER_SECRET};

/// Shortest token secret accepted in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ForumConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    let token = &config.auth.token;
    if token.secret.is_empty() {
        errors.push(ValidationError::new("auth.token.secret", "must not be empty"));
    }
    if token.host.is_empty() {
        errors.push(ValidationError::new("auth.token.host", "must not be empty"));
    }
    if token.ttl_secs == 0 {
        errors.push(ValidationError::new("auth.token.ttl_secs", "must be > 0"));
    }

    let password = &config.auth.password;
    if password.iterations == 0 {
        errors.push(ValidationError::new("auth.password.iterations", "must be > 0"));
    }
    if password.parallelism == 0 {
        errors.push(ValidationError::new("auth.password.parallelism", "must be > 0"));
    }
    if password.memory_kib < password.parallelism.saturating_mul(8) {
        errors.push(ValidationError::new(
            "auth.password.memory_kib",
            "must be at least 8 KiB per lane of parallelism",
        ));
    }

    if config.mail.activation_ttl_secs == 0 {
        errors.push(ValidationError::new("mail.activation_ttl_secs", "must be > 0"));
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        if rl.window_secs == 0 {
            errors.push(ValidationError::new("rate_limit.window_secs", "must be > 0"));
        }
        if rl.requests_per_window == 0 {
            errors.push(ValidationError::new("rate_limit.requests_per_window", "must be > 0"));
        }
        if rl.max_keys == 0 {
            errors.push(ValidationError::new("rate_limit.max_keys", "must be > 0"));
        }
        if rl.sweep_interval_secs == 0 {
            errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be > 0"));
        }
    }

    if config.cache.enabled {
        if config.cache.ttl_secs == 0 {
            errors.push(ValidationError::new("cache.ttl_secs", "must be > 0"));
        }
        if config.cache.purge_interval_secs == 0 {
            errors.push(ValidationError::new("cache.purge_interval_secs", "must be > 0"));
        }
    }

    if config.store.timeout_ms == 0 {
        errors.push(ValidationError::new("store.timeout_ms", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {}", config.observability.metrics_address),
        ));
    }

    if config.is_production() && !token.secret.is_empty() {
        if token.secret == PLACEHOLDER_SECRET {
            errors.push(ValidationError::new(
                "auth.token.secret",
                "placeholder secret is not allowed in production",
            ));
        } else if token.secret.len() < MIN_PRODUCTION_SECRET_LEN {
            errors.push(ValidationError::new(
                "auth.token.secret",
                format!("must be at least {} bytes in production", MIN_PRODUCTION_SECRET_LEN),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

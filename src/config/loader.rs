//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ForumConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ForumConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ForumConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load from `path` if given, otherwise start from defaults; then apply
/// environment overrides and validate the result.
pub fn load(path: Option<&Path>) -> Result<ForumConfig, ConfigError> {
    let mut config = match path {
        Some(p) => toml::from_str(&fs::read_to_string(p)?)?,
        None => ForumConfig::default(),
    };
    apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the environment variables understood by the service.
///
/// `lookup` abstracts `std::env::var` so the mapping can be tested.
pub fn apply_overrides<F>(config: &mut ForumConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup("ADDR") {
        config.listener.bind_address = addr;
    } else if let Some(port) = lookup("PORT") {
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(env) = lookup("ENV") {
        config.env.0 = env;
    }
    if let Some(secret) = lookup("AUTH_TOKEN_SECRET") {
        config.auth.token.secret = secret;
    }
    if let Some(host) = lookup("AUTH_TOKEN_HOST") {
        config.auth.token.host = host;
    }
    if let Some(v) = lookup("RATE_LIMITER_ENABLED") {
        config.rate_limit.enabled = parse_bool("RATE_LIMITER_ENABLED", v)?;
    }
    if let Some(v) = lookup("RATELIMITER_REQUESTS_COUNT") {
        config.rate_limit.requests_per_window = v
            .parse()
            .map_err(|_| ConfigError::Env { var: "RATELIMITER_REQUESTS_COUNT", value: v })?;
    }
    if let Some(v) = lookup("REDIS_ENABLED") {
        config.cache.enabled = parse_bool("REDIS_ENABLED", v)?;
    }
    if let Some(url) = lookup("FRONTEND_URL") {
        config.mail.frontend_url = url;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    Ok(())
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env { var, value }),
    }
}

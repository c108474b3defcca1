//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the social API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ForumConfig {
    /// Deployment environment name ("development", "production").
    pub env: EnvName,

    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Token authentication settings.
    pub auth: AuthConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Identity cache settings.
    pub cache: CacheConfig,

    /// Authorization settings.
    pub authz: AuthzConfig,

    /// Store collaborator settings.
    pub store: StoreConfig,

    /// Activation mail settings.
    pub mail: MailConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ForumConfig {
    pub fn is_production(&self) -> bool {
        self.env.0 == "production"
    }
}

/// Name of the deployment environment.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct EnvName(pub String);

impl EnvName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EnvName {
    fn default() -> Self {
        Self("development".to_string())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub token: TokenConfig,
    pub password: PasswordConfig,
}

/// Default token secret. Accepted outside production only.
pub const PLACEHOLDER_SECRET: &str = "example";

/// Signed token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Shared secret for the MAC signer.
    #[serde(skip_serializing)]
    pub secret: String,

    /// Issuer and audience of every token.
    pub host: String,

    /// Token lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: PLACEHOLDER_SECRET.to_string(),
            host: "example".to_string(),
            ttl_secs: 2 * 24 * 3600, // 2 days
        }
    }
}

/// Argon2id cost parameters for stored passwords.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,

    /// Number of passes.
    pub iterations: u32,

    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per client key in one window.
    pub requests_per_window: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Upper bound on tracked client keys.
    pub max_keys: usize,

    /// Interval between sweeps of stale windows, in seconds.
    pub sweep_interval_secs: u64,

    /// Key clients by X-Forwarded-For / X-Real-IP instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 20,
            window_secs: 5,
            max_keys: 100_000,
            sweep_interval_secs: 30,
            trust_forwarded_for: false,
        }
    }
}

/// Identity cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the read-through identity cache.
    pub enabled: bool,

    /// Entry lifetime in seconds.
    pub ttl_secs: u64,

    /// Interval between purges of expired entries, in seconds.
    pub purge_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 60,
            purge_interval_secs: 60,
        }
    }
}

/// Authorization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Cache role lookups process-wide.
    pub cache_roles: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self { cache_roles: true }
    }
}

/// Store collaborator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Deadline for a single store call in milliseconds.
    pub timeout_ms: u64,

    /// Users seeded into the in-memory store at startup.
    pub seed: Vec<SeedUser>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            seed: Vec::new(),
        }
    }
}

/// Registration mail configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailConfig {
    /// Lifetime of an activation token in seconds.
    pub activation_ttl_secs: u64,

    /// Base URL of the frontend; activation links point at `<url>/confirm/<token>`.
    pub frontend_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            activation_ttl_secs: 3 * 24 * 3600, // 3 days
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

/// A user seeded at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

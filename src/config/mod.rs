//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, apply env overrides)
//!     → validation.rs (semantic checks)
//!     → ForumConfig (validated, immutable)
//!     → consumed once by lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no hot reload, since the cache and
//!   rate limiter policies are fixed at construction time
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_config, ConfigError};
pub use schema::{
    AuthzConfig, CacheConfig, ForumConfig, ListenerConfig, MailConfig, ObservabilityConfig,
    PasswordConfig, RateLimitConfig, SeedUser, StoreConfig, TokenConfig,
};

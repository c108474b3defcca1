//! Composition root.
//!
//! # Responsibilities
//! - Construct every component from a validated `ForumConfig`
//! - Install the metrics exporter
//! - Start background tasks (limiter sweeper, cache purger, metrics)
//! - Stop them again on `close`
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and happens before binding
//! - No globals: everything the server needs hangs off `Components`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::auth::{PasswordError, PasswordHasher, SignerError, TokenAuthenticator};
use crate::config::ForumConfig;
use crate::gate::RequestGate;
use crate::http::AppState;
use crate::identity::{resolver_from_config, InMemoryCacheBackend};
use crate::lifecycle::Shutdown;
use crate::mail::{LogMailer, Mailer};
use crate::observability::metrics;
use crate::security::{AuthorizationGate, RateLimiter};
use crate::store::{InMemoryStore, Store, StoreError};

/// Grace period for background tasks on `close`.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Error raised while building components.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("token secret rejected by signer: {0}")]
    Secret(#[from] SignerError),
    #[error("invalid password hashing parameters: {0}")]
    Password(#[from] PasswordError),
    #[error("failed to seed store: {0}")]
    Seed(#[from] StoreError),
    #[error("invalid metrics address: {0}")]
    MetricsAddress(String),
    #[error("failed to start metrics exporter: {0}")]
    Metrics(String),
}

/// Every long-lived component of the service.
pub struct Components {
    pub config: ForumConfig,
    pub store: Arc<dyn Store>,
    pub gate: RequestGate,
    pub limiter: Arc<RateLimiter>,
    pub cache_backend: InMemoryCacheBackend,
    pub passwords: PasswordHasher,
    pub mailer: Arc<dyn Mailer>,
    shutdown: Shutdown,
}

impl Components {
    /// Build with an in-memory store seeded from `config.store.seed`.
    pub fn build(config: ForumConfig) -> Result<Self, StartupError> {
        let passwords = PasswordHasher::from_config(&config.auth.password)?;
        let store = InMemoryStore::from_seed(&config.store.seed, passwords)?;
        tracing::info!(seeded_users = config.store.seed.len(), "In-memory store ready");
        Self::with_store(config, Arc::new(store))
    }

    /// Build around an existing store, logging activation mails.
    pub fn with_store(config: ForumConfig, store: Arc<dyn Store>) -> Result<Self, StartupError> {
        Self::with_collaborators(config, store, Arc::new(LogMailer))
    }

    /// Build around an existing store and mailer.
    pub fn with_collaborators(
        config: ForumConfig,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, StartupError> {
        let deadline = Duration::from_millis(config.store.timeout_ms);
        let passwords = PasswordHasher::from_config(&config.auth.password)?;

        let authenticator = TokenAuthenticator::from_config(&config.auth.token)?;

        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let cache_backend = InMemoryCacheBackend::new();
        let identities = resolver_from_config(
            &config.cache,
            store.clone(),
            Arc::new(cache_backend.clone()),
            deadline,
        );

        let mut authz = AuthorizationGate::new(store.clone(), deadline);
        if config.authz.cache_roles {
            authz = authz.with_role_catalog();
        }

        let gate = RequestGate::new(
            limiter.clone(),
            Arc::new(authenticator),
            identities,
            Arc::new(authz),
        );

        if config.observability.metrics_enabled {
            let addr: SocketAddr = config
                .observability
                .metrics_address
                .parse()
                .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
            metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
        }

        let mut shutdown = Shutdown::new();

        if config.rate_limit.enabled {
            let interval = Duration::from_secs(config.rate_limit.sweep_interval_secs);
            let sweeper = limiter.clone();
            shutdown.spawn("rate-limit-sweeper", move |rx| sweeper.run_sweeper(interval, rx));
        }

        if config.cache.enabled {
            let interval = Duration::from_secs(config.cache.purge_interval_secs);
            let purger = cache_backend.clone();
            shutdown.spawn("cache-purger", move |rx| purger.run_purger(interval, rx));
        }

        tracing::info!(
            env = %config.env.as_str(),
            rate_limit = config.rate_limit.enabled,
            identity_cache = config.cache.enabled,
            role_catalog = config.authz.cache_roles,
            "Components built"
        );

        Ok(Self {
            config,
            store,
            gate,
            limiter,
            cache_backend,
            passwords,
            mailer,
            shutdown,
        })
    }

    /// State handed to the HTTP layer.
    pub fn app_state(&self) -> AppState {
        AppState {
            gate: self.gate.clone(),
            store: self.store.clone(),
            store_timeout: Duration::from_millis(self.config.store.timeout_ms),
            trust_forwarded_for: self.config.rate_limit.trust_forwarded_for,
            env: self.config.env.as_str().to_string(),
            passwords: self.passwords.clone(),
            mailer: self.mailer.clone(),
            activation_ttl: Duration::from_secs(self.config.mail.activation_ttl_secs),
            frontend_url: self.config.mail.frontend_url.clone(),
        }
    }

    /// A receiver that fires when `close` is called.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Number of running background tasks.
    pub fn background_tasks(&self) -> usize {
        self.shutdown.task_count()
    }

    /// Signal shutdown and wait for background tasks to stop.
    pub async fn close(self) {
        tracing::info!("Closing components");
        self.shutdown.complete(CLOSE_GRACE).await;
        tracing::info!("Components closed");
    }
}

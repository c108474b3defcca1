//! Identity subsystem.
//!
//! # Data Flow
//! ```text
//! validated subject id
//!     → IdentityResolver::resolve
//!         ├─ StoreResolver:  store (under deadline)
//!         └─ IdentityCache:  backend get
//!                              ├─ hit  → decode snapshot
//!                              └─ miss → store → best-effort backend set
//!     → UserRecord → Principal (request extension)
//!
//! mutation committed (follow, unfollow, role change)
//!     → IdentityResolver::invalidate(id) → backend delete
//! ```
//!
//! # Design Decisions
//! - Direct vs cached resolution is chosen once, at the composition root
//! - Backend transport failures fail closed; only a true miss reads the store
//! - Store `NotFound` is never cached
//! - Invalidation has no error channel; failures are logged

pub mod backend;
pub mod cache;
pub mod principal;

use std::sync::Arc;
use std::time::Duration;

pub use backend::{CacheBackend, CacheError, InMemoryCacheBackend};
pub use cache::{IdentityCache, IdentityError, IdentityResolver, StoreResolver};
pub use principal::{Principal, Role, UserRecord};

use crate::config::CacheConfig;
use crate::store::Store;

/// Pick the resolver for the configured cache policy.
pub fn resolver_from_config(
    config: &CacheConfig,
    store: Arc<dyn Store>,
    backend: Arc<dyn CacheBackend>,
    deadline: Duration,
) -> Arc<dyn IdentityResolver> {
    if config.enabled {
        tracing::info!(ttl_secs = config.ttl_secs, "Identity cache enabled");
        Arc::new(IdentityCache::new(
            backend,
            store,
            Duration::from_secs(config.ttl_secs),
            deadline,
        ))
    } else {
        tracing::info!("Identity cache disabled, resolving from store");
        Arc::new(StoreResolver::new(store, deadline))
    }
}

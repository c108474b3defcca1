//! Identity resolution: direct store reads or a read-through cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{CacheBackend, CacheError};
use super::principal::UserRecord;
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::store::{Store, StoreError};

/// Why an identity could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("principal not found")]
    NotFound,
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => IdentityError::NotFound,
            other => IdentityError::Store(other),
        }
    }
}

/// Resolves a principal id to its identity record.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, id: i64) -> Result<UserRecord, IdentityError>;

    /// Drop any cached copy of `id`. Never fails.
    async fn invalidate(&self, id: i64);
}

/// Reads straight from the store. Used when the cache is disabled.
pub struct StoreResolver {
    store: Arc<dyn Store>,
    deadline: Duration,
}

impl StoreResolver {
    pub fn new(store: Arc<dyn Store>, deadline: Duration) -> Self {
        Self { store, deadline }
    }
}

#[async_trait]
impl IdentityResolver for StoreResolver {
    async fn resolve(&self, id: i64) -> Result<UserRecord, IdentityError> {
        Ok(with_deadline(self.deadline, self.store.get_user_by_id(id)).await?)
    }

    async fn invalidate(&self, _id: i64) {}
}

/// Read-through cache in front of the store.
///
/// Entries are JSON snapshots written only after a successful store read.
/// Concurrent misses for one id may both populate; the snapshots are
/// equivalent and the last write wins.
pub struct IdentityCache {
    backend: Arc<dyn CacheBackend>,
    store: Arc<dyn Store>,
    ttl: Duration,
    deadline: Duration,
}

impl IdentityCache {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        store: Arc<dyn Store>,
        ttl: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            ttl,
            deadline,
        }
    }

    pub fn key(id: i64) -> String {
        format!("principal:{}", id)
    }

    /// Cached record for `id`, `Ok(None)` on a miss.
    ///
    /// Backend failures are errors; they are never downgraded to a miss.
    pub async fn get(&self, id: i64) -> Result<Option<UserRecord>, CacheError> {
        let key = Self::key(id);
        let Some(bytes) = self.backend.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Dropping undecodable cache entry");
                self.invalidate(id).await;
                Ok(None)
            }
        }
    }

    pub async fn set(&self, record: &UserRecord) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| CacheError::Unavailable(format!("encode failed: {}", e)))?;
        self.backend.set(&Self::key(record.id), bytes, self.ttl).await
    }
}

#[async_trait]
impl IdentityResolver for IdentityCache {
    async fn resolve(&self, id: i64) -> Result<UserRecord, IdentityError> {
        if let Some(record) = self.get(id).await? {
            metrics::record_cache_lookup("hit");
            return Ok(record);
        }
        metrics::record_cache_lookup("miss");

        let record = with_deadline(self.deadline, self.store.get_user_by_id(id)).await?;

        if let Err(e) = self.set(&record).await {
            tracing::warn!(user_id = id, error = %e, "Failed to populate identity cache");
        }
        Ok(record)
    }

    async fn invalidate(&self, id: i64) {
        if let Err(e) = self.backend.delete(&Self::key(id)).await {
            tracing::warn!(user_id = id, error = %e, "Failed to invalidate identity cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::backend::InMemoryCacheBackend;
    use crate::identity::principal::Role;
    use crate::store::InMemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    const DEADLINE: Duration = Duration::from_secs(1);

    /// Backend whose reads and/or writes can be switched off.
    #[derive(Default)]
    struct FlakyBackend {
        inner: InMemoryCacheBackend,
        reads_down: AtomicBool,
        writes_down: AtomicBool,
    }

    #[async_trait]
    impl CacheBackend for FlakyBackend {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            if self.reads_down.load(Ordering::SeqCst) {
                return Err(CacheError::Unavailable("connection refused".into()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
            if self.writes_down.load(Ordering::SeqCst) {
                return Err(CacheError::Unavailable("connection refused".into()));
            }
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.inner.delete(key).await
        }
    }

    fn store_with_user(id: i64) -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store.insert_user(id, "user42", "u42@example.com", "pw", "user").unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_resolve_populates_then_hits() {
        let store = store_with_user(42);
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = IdentityCache::new(backend.clone(), store.clone(), Duration::from_secs(60), DEADLINE);

        assert_eq!(cache.get(42).await.unwrap(), None);

        let first = cache.resolve(42).await.unwrap();
        assert_eq!(store.user_lookups(), 1);
        assert_eq!(cache.get(42).await.unwrap(), Some(first.clone()));

        let second = cache.resolve(42).await.unwrap();
        assert_eq!(store.user_lookups(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = IdentityCache::new(backend.clone(), store.clone(), Duration::from_secs(60), DEADLINE);

        assert_eq!(cache.resolve(7).await, Err(IdentityError::NotFound));
        assert!(backend.is_empty());
        assert_eq!(cache.resolve(7).await, Err(IdentityError::NotFound));
        assert_eq!(store.user_lookups(), 2);
    }

    #[tokio::test]
    async fn test_backend_read_failure_fails_closed() {
        let store = store_with_user(1);
        let backend = Arc::new(FlakyBackend::default());
        backend.reads_down.store(true, Ordering::SeqCst);
        let cache = IdentityCache::new(backend, store.clone(), Duration::from_secs(60), DEADLINE);

        assert!(matches!(cache.resolve(1).await, Err(IdentityError::Cache(_))));
        assert_eq!(store.user_lookups(), 0);
    }

    #[tokio::test]
    async fn test_population_failure_is_best_effort() {
        let store = store_with_user(1);
        let backend = Arc::new(FlakyBackend::default());
        backend.writes_down.store(true, Ordering::SeqCst);
        let cache = IdentityCache::new(backend, store.clone(), Duration::from_secs(60), DEADLINE);

        assert_eq!(cache.resolve(1).await.unwrap().id, 1);
        assert_eq!(cache.resolve(1).await.unwrap().id, 1);
        assert_eq!(store.user_lookups(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_store_read() {
        let store = store_with_user(5);
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = IdentityCache::new(backend, store.clone(), Duration::from_secs(60), DEADLINE);

        cache.resolve(5).await.unwrap();
        store.set_user_role(5, "admin").unwrap();
        assert_eq!(cache.resolve(5).await.unwrap().role.name, "user");

        cache.invalidate(5).await;
        assert_eq!(cache.resolve(5).await.unwrap().role.name, "admin");
        assert_eq!(store.user_lookups(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = store_with_user(3);
        let backend = Arc::new(InMemoryCacheBackend::new());
        backend
            .set("principal:3", b"not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = IdentityCache::new(backend.clone(), store.clone(), Duration::from_secs(60), DEADLINE);

        assert_eq!(cache.resolve(3).await.unwrap().id, 3);
        assert_eq!(store.user_lookups(), 1);
        assert!(cache.get(3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_outage_surfaces() {
        let store = store_with_user(1);
        store.set_available(false);
        let resolver = StoreResolver::new(store, DEADLINE);
        assert!(matches!(
            resolver.resolve(1).await,
            Err(IdentityError::Store(StoreError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_store_resolver_never_caches() {
        let store = store_with_user(1);
        let resolver = StoreResolver::new(store.clone(), DEADLINE);
        resolver.resolve(1).await.unwrap();
        resolver.resolve(1).await.unwrap();
        resolver.invalidate(1).await;
        assert_eq!(store.user_lookups(), 2);
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = IdentityCache::new(
            backend.clone(),
            Arc::new(InMemoryStore::empty()),
            Duration::from_secs(60),
            DEADLINE,
        );
        let record = UserRecord {
            id: 9,
            username: "carol".into(),
            email: "carol@example.com".into(),
            role: Role::new("moderator", 2),
            activated: true,
            followers: 3,
            following: 1,
        };

        cache.set(&record).await.unwrap();
        assert_eq!(cache.get(9).await.unwrap(), Some(record));
        assert_eq!(backend.len(), 1);
        assert_eq!(cache.get(10).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolves_agree() {
        let store = store_with_user(42);
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = Arc::new(IdentityCache::new(backend, store.clone(), Duration::from_secs(60), DEADLINE));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.resolve(42).await })
            })
            .collect();
        let mut snapshots = Vec::new();
        for handle in handles {
            snapshots.push(handle.await.unwrap().unwrap());
        }

        let first = snapshots[0].clone();
        assert!(snapshots.iter().all(|s| *s == first));
        assert_eq!(first.id, 42);
        assert!(store.user_lookups() >= 1);
        assert!(store.user_lookups() <= 16);
        assert_eq!(cache.resolve(42).await.unwrap(), first);
    }
}

//! Fixed-window rate limiting keyed by client identity.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Keys inspected when the limiter is full and a new key arrives.
const EVICTION_SAMPLE: usize = 32;

/// Outcome of a single `allow` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Time until the current window closes; zero when allowed.
    pub retry_after: Duration,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    /// `retry_after` as whole seconds for the `Retry-After` header.
    ///
    /// Rounded up, and never below one second on a denial.
    pub fn retry_after_secs(&self) -> u64 {
        if self.allowed {
            return 0;
        }
        let secs = self.retry_after.as_secs();
        let secs = if self.retry_after.subsec_nanos() > 0 { secs + 1 } else { secs };
        secs.max(1)
    }
}

/// Per-key counter for one window.
#[derive(Debug, Clone, Copy)]
struct Window {
    /// `floor(now / window)` at the time the counter was reset.
    bucket: u64,
    count: u32,
}

/// Fixed-window request counter.
///
/// Each key gets `limit` requests per wall-clock aligned window. A burst of
/// up to `2 * limit` can pass across a window boundary.
///
/// Keys are held in a sharded map: increments for one key are serialized
/// by its shard lock and unrelated keys rarely contend. Growth is bounded
/// by the sweeper and by `max_keys`.
pub struct RateLimiter {
    enabled: bool,
    limit: u32,
    window: Duration,
    max_keys: usize,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, max_keys: usize) -> Self {
        Self {
            enabled: true,
            limit,
            window,
            max_keys,
            windows: DashMap::new(),
        }
    }

    /// A limiter that admits everything and keeps no state.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            limit: 0,
            window: Duration::from_secs(1),
            max_keys: 0,
            windows: DashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(
            config.requests_per_window,
            Duration::from_secs(config.window_secs),
            config.max_keys,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Count one request for `key` against the current window.
    pub fn allow(&self, key: &str) -> RateDecision {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.allow_at(key, now)
    }

    /// `allow` at an explicit time since the Unix epoch.
    pub fn allow_at(&self, key: &str, now: Duration) -> RateDecision {
        if !self.enabled {
            return RateDecision::allow();
        }

        let bucket = self.bucket_of(now);

        if self.max_keys > 0 && !self.windows.contains_key(key) && self.windows.len() >= self.max_keys {
            self.make_room(bucket);
        }

        let count = {
            let mut entry = self
                .windows
                .entry(key.to_string())
                .or_insert(Window { bucket, count: 0 });
            if entry.bucket != bucket {
                *entry = Window { bucket, count: 0 };
            }
            entry.count = entry.count.saturating_add(1);
            entry.count
        };

        if count > self.limit {
            let window_end = self.window_nanos() * (u128::from(bucket) + 1);
            let remaining = window_end.saturating_sub(now.as_nanos());
            RateDecision {
                allowed: false,
                retry_after: Duration::from_nanos(u64::try_from(remaining).unwrap_or(u64::MAX)),
            }
        } else {
            RateDecision::allow()
        }
    }

    /// Drop every window older than the one containing `now`.
    pub fn sweep_stale_at(&self, now: Duration) -> usize {
        let bucket = self.bucket_of(now);
        let before = self.windows.len();
        self.windows.retain(|_, w| w.bucket >= bucket);
        before.saturating_sub(self.windows.len())
    }

    pub fn sweep_stale(&self) -> usize {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.sweep_stale_at(now)
    }

    /// Sweep stale windows every `interval` until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let swept = self.sweep_stale();
                    metrics::record_rate_limit_keys(self.windows.len());
                    if swept > 0 {
                        tracing::debug!(swept, remaining = self.windows.len(), "Swept stale rate windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn window_nanos(&self) -> u128 {
        self.window.as_nanos().max(1)
    }

    fn bucket_of(&self, now: Duration) -> u64 {
        u64::try_from(now.as_nanos() / self.window_nanos()).unwrap_or(u64::MAX)
    }

    /// Free one slot by evicting from a bounded sample of keys: the first
    /// stale window found, otherwise the least-used live one in the sample.
    ///
    /// Full sweeps are left to `run_sweeper`. Concurrent inserts may
    /// overshoot `max_keys` by a few entries.
    fn make_room(&self, bucket: u64) {
        if let Some(victim) = self.pick_victim(bucket) {
            tracing::debug!(key = %victim, "Rate limiter full, evicting key");
            self.windows.remove(&victim);
        }
    }

    fn pick_victim(&self, bucket: u64) -> Option<String> {
        let mut least: Option<(u32, String)> = None;
        for entry in self.windows.iter().take(EVICTION_SAMPLE) {
            let window = entry.value();
            if window.bucket < bucket {
                return Some(entry.key().clone());
            }
            if least.as_ref().map_or(true, |(count, _)| window.count < *count) {
                least = Some((window.count, entry.key().clone()));
            }
        }
        least.map(|(_, key)| key)
    }
}

//! Time-to-live cache for upstream responses.
//!
//! Every aggregator keeps its upstream payloads here so that repeated requests
//! inside the TTL window never reach the network. Entries expire `ttl` after
//! their last `set`; an expired entry is a miss even before it is swept.
//!
//! A background task owned by the cache runs maintenance every `ttl`,
//! physically removing expired entries. It stops when [`TtlCache::stop`] is
//! called or when the cache is dropped.

use std::sync::Mutex;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use tokio::sync::oneshot;
use tracing::trace;

/// Configuration for a [`TtlCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry stays fresh after it is written.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl CacheConfig {
    /// Create a config with the given TTL and the default capacity.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    /// Set the maximum number of entries.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(120),
            max_capacity: 10_000,
        }
    }
}

/// String-keyed cache with per-entry expiration and a periodic sweep.
///
/// Reads run concurrently; writes to the same key are serialized by the
/// underlying store. `set` always overwrites.
pub struct TtlCache<V> {
    entries: MokaCache<String, V>,
    ttl: Duration,
    sweeper: Mutex<Option<oneshot::Sender<()>>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration.
    ///
    /// The sweep task is only started when called inside a tokio runtime and
    /// the TTL is non-zero. Without it, expired entries are still never
    /// returned; they are just removed lazily.
    pub fn new(config: &CacheConfig) -> Self {
        let entries = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        let sweeper = spawn_sweeper(entries.clone(), config.ttl);

        Self {
            entries,
            ttl: config.ttl,
            sweeper: Mutex::new(sweeper),
        }
    }

    /// Create a cache with the given TTL and default capacity.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(&CacheConfig::new(ttl))
    }

    /// Look up a fresh value.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).await
    }

    /// Store a value, replacing any previous entry and resetting its expiry.
    pub async fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value).await;
    }

    /// Remove a single entry.
    pub async fn delete(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Approximate number of entries, including expired ones not yet swept.
    ///
    /// The count is updated by maintenance, so recent inserts may not show up
    /// until the next sweep. Call [`TtlCache::sync`] first for an exact count.
    pub fn size(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Run pending maintenance now instead of waiting for the next sweep.
    pub async fn sync(&self) {
        self.entries.run_pending_tasks().await;
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stop the background sweep.
    ///
    /// Returns `true` if this call stopped a running sweep. Stopping twice,
    /// or stopping a cache that never started one, is a no-op returning
    /// `false`.
    pub fn stop(&self) -> bool {
        let sender = match self.sweeper.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => {
                // The task may already have exited if the runtime shut down.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

/// Spawn the periodic sweep, returning its shutdown handle.
///
/// Dropping the handle also ends the task, so a dropped cache never leaks it.
fn spawn_sweeper<V>(entries: MokaCache<String, V>, ttl: Duration) -> Option<oneshot::Sender<()>>
where
    V: Clone + Send + Sync + 'static,
{
    if ttl.is_zero() {
        return None;
    }
    let runtime = tokio::runtime::Handle::try_current().ok()?;
    let (tx, mut rx) = oneshot::channel::<()>();

    runtime.spawn(async move {
        let mut interval = tokio::time::interval(ttl);
        interval.tick().await; // First tick is immediate, skip it
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    entries.run_pending_tasks().await;
                    trace!(entries = entries.entry_count(), "cache sweep");
                }
                _ = &mut rx => break,
            }
        }
    });

    Some(tx)
}

//! Lazily refreshed TTL cache.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use eager_core::constants::{MAX_REFRESH_WORKERS, REFRESH_THREAD_NAME};
use eager_core::error::{EagerError, Result};
use eager_core::traits::{Loader, Sweep};
use eager_core::types::SweepReport;

use crate::config::CacheConfig;
use crate::entry::Entry;
use crate::registry::Registry;

/// Everything guarded by the cache lock.
struct CacheState<V> {
    entries: HashMap<String, Entry<V>>,
    /// `None` once the cache is closed
    loader: Option<Arc<dyn Loader<V>>>,
    /// Slot held in the registry, taken on close
    registry_index: Option<usize>,
}

impl<V> CacheState<V> {
    fn is_closed(&self) -> bool {
        self.loader.is_none()
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    loads: AtomicU64,
    refreshes: AtomicU64,
    evictions: AtomicU64,
    load_failures: AtomicU64,
}

/// Shared part of a cache. The registry holds it weakly.
pub(crate) struct CacheCore<V> {
    name: String,
    ttl: Duration,
    state: RwLock<CacheState<V>>,
    counters: Counters,
}

impl<V> CacheCore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Result<V> {
        {
            let state = self.state.read();
            if state.is_closed() {
                return Err(EagerError::CacheClosed);
            }
            if let Some(entry) = state.entries.get(key) {
                if entry.accessed {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.value.clone());
                }
            }
        }

        self.refresh_or_load(key)
    }

    /// Slow path of `get`, runs under the write lock.
    ///
    /// Loads when the key is missing, or when it was never read since its last
    /// load and has gone stale before the sweeper got to it. Otherwise the
    /// current value is marked accessed and returned without a loader call.
    fn refresh_or_load(&self, key: &str) -> Result<V> {
        let mut state = self.state.write();
        let loader = state.loader.clone().ok_or(EagerError::CacheClosed)?;
        let now = Instant::now();

        if let Some(entry) = state.entries.get_mut(key) {
            if entry.accessed || !entry.is_expired(now) {
                entry.accessed = true;
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.value.clone());
            }
        }

        let value = loader.load(key).map_err(|err| {
            self.counters.load_failures.fetch_add(1, Ordering::Relaxed);
            warn!(cache = %self.name, key, error = %err, "Load failed");
            err
        })?;
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        debug!(cache = %self.name, key, "Loaded entry");

        state
            .entries
            .insert(key.to_owned(), Entry::loaded(value.clone(), now, self.ttl));
        Ok(value)
    }
}

impl<V> Sweep for CacheCore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    /// Holds the write lock for the whole pass, refreshes included.
    #[instrument(skip(self, now), fields(cache = %self.name))]
    fn sweep_expired(&self, now: Instant) -> SweepReport {
        let mut state = self.state.write();
        let Some(loader) = state.loader.clone() else {
            return SweepReport::default();
        };

        let mut report = SweepReport::default();
        let mut stale = Vec::new();
        state.entries.retain(|key, entry| {
            if !entry.is_expired(now) {
                return true;
            }
            if !entry.accessed {
                report.evicted += 1;
                return false;
            }
            stale.push(key.clone());
            true
        });

        for (key, result) in load_concurrently(loader.as_ref(), stale) {
            match result {
                Ok(value) => {
                    state.entries.insert(key, Entry::loaded(value, now, self.ttl));
                    report.refreshed += 1;
                }
                // The stale entry stays expired and accessed, so the next pass retries it.
                Err(err) => {
                    warn!(key = %key, error = %err, "Refresh failed, keeping previous value");
                    report.failed += 1;
                }
            }
        }

        self.counters
            .evictions
            .fetch_add(report.evicted as u64, Ordering::Relaxed);
        self.counters
            .refreshes
            .fetch_add(report.refreshed as u64, Ordering::Relaxed);
        self.counters
            .load_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);

        if !report.is_empty() {
            debug!(
                evicted = report.evicted,
                refreshed = report.refreshed,
                failed = report.failed,
                remaining = state.entries.len(),
                "Sweep finished"
            );
        }
        report
    }
}

/// Reloads `keys` on at most `MAX_REFRESH_WORKERS` scoped threads and waits
/// for all of them. Keys whose worker cannot be spawned are loaded inline.
fn load_concurrently<V: Send>(
    loader: &dyn Loader<V>,
    keys: Vec<String>,
) -> Vec<(String, Result<V>)> {
    if keys.is_empty() {
        return Vec::new();
    }

    let workers = keys.len().min(MAX_REFRESH_WORKERS);
    let chunk_size = keys.len().div_ceil(workers);

    thread::scope(|scope| {
        let mut results = Vec::with_capacity(keys.len());
        let mut handles = Vec::with_capacity(workers);

        for chunk in keys.chunks(chunk_size) {
            let spawned = thread::Builder::new()
                .name(REFRESH_THREAD_NAME.into())
                .spawn_scoped(scope, move || load_each(loader, chunk));
            match spawned {
                Ok(handle) => handles.push((chunk, handle)),
                Err(err) => {
                    warn!(keys = chunk.len(), error = %err, "Refresh worker not spawned, loading inline");
                    results.extend(load_each(loader, chunk));
                }
            }
        }

        for (chunk, handle) in handles {
            match handle.join() {
                Ok(loaded) => results.extend(loaded),
                Err(_) => results.extend(
                    chunk
                        .iter()
                        .map(|key| (key.clone(), Err(EagerError::loader(key, "refresh worker panicked")))),
                ),
            }
        }
        results
    })
}

/// Loads every key in turn. A panicking loader fails only its own key.
fn load_each<V>(loader: &dyn Loader<V>, keys: &[String]) -> Vec<(String, Result<V>)> {
    keys.iter()
        .map(|key| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| loader.load(key)))
                .unwrap_or_else(|_| Err(EagerError::loader(key, "loader panicked")));
            (key.clone(), result)
        })
        .collect()
}

/// Thread-safe cache that fills itself through a loader.
///
/// Reads of an entry that was already read since its last load take a shared
/// lock only. Everything else (misses, first reads after a load, sweeps,
/// close) is serialized through one exclusive lock per cache, so a slow
/// loader call blocks every other reader of the same cache while it runs.
///
/// The background sweeper of the owning [`Registry`] evicts expired entries
/// nobody read and reloads expired entries somebody did.
///
/// Dropping the handle closes the cache.
pub struct EagerCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    core: Arc<CacheCore<V>>,
    registry: Weak<Registry>,
}

impl<V> EagerCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Starts building a cache.
    pub fn builder() -> CacheBuilder<V> {
        CacheBuilder::new()
    }

    pub(crate) fn register(
        config: CacheConfig,
        loader: Arc<dyn Loader<V>>,
        registry: &Arc<Registry>,
    ) -> Result<Self> {
        config.validate()?;

        let core = Arc::new(CacheCore {
            name: config.name.clone(),
            ttl: config.ttl_duration(),
            state: RwLock::new(CacheState {
                entries: HashMap::with_capacity(config.initial_capacity),
                loader: Some(loader),
                registry_index: None,
            }),
            counters: Counters::default(),
        });

        let index = registry.register(&core);
        core.state.write().registry_index = Some(index);
        debug!(cache = %config.name, index, ttl = ?config.ttl, "Cache registered");

        Ok(Self {
            core,
            registry: Arc::downgrade(registry),
        })
    }

    /// Returns the value for `key`, calling the loader when needed.
    ///
    /// Fails with `CacheClosed` after [`close`](Self::close), and with the
    /// loader's error when a load fails (nothing is stored in that case).
    pub fn get(&self, key: &str) -> Result<V> {
        self.core.get(key)
    }

    /// Returns a copy of the entry for `key` without marking it accessed.
    pub fn peek(&self, key: &str) -> Option<Entry<V>> {
        self.core.state.read().entries.get(key).cloned()
    }

    /// Drops the entry for `key`. The next `get` reloads it.
    pub fn invalidate(&self, key: &str) -> Result<bool> {
        let mut state = self.core.state.write();
        if state.is_closed() {
            return Err(EagerError::CacheClosed);
        }
        Ok(state.entries.remove(key).is_some())
    }

    /// Returns true if `key` currently has an entry.
    pub fn contains_key(&self, key: &str) -> bool {
        self.core.state.read().entries.contains_key(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.core.state.read().entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.core.state.read().entries.is_empty()
    }

    /// Returns true once the cache has been closed.
    pub fn is_closed(&self) -> bool {
        self.core.state.read().is_closed()
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Time-to-live applied on every (re)load.
    pub fn ttl(&self) -> Duration {
        self.core.ttl
    }

    /// Runs one sweep pass now instead of waiting for the registry.
    pub fn sweep_expired(&self, now: Instant) -> SweepReport {
        self.core.sweep_expired(now)
    }

    /// Detaches the cache from its registry and drops every entry and the
    /// loader. Every later `get` fails. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.core.state.write();
        if state.loader.take().is_none() {
            return Ok(());
        }

        let dropped = state.entries.len();
        state.entries = HashMap::new();

        if let Some(index) = state.registry_index.take() {
            if let Some(registry) = self.registry.upgrade() {
                registry.deregister(index, &self.core)?;
            }
        }

        info!(cache = %self.core.name, dropped, "Cache closed");
        Ok(())
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let state = self.core.state.read();
        let counters = &self.core.counters;

        CacheStats {
            name: self.core.name.clone(),
            total_entries: state.entries.len(),
            accessed_entries: state.entries.values().filter(|e| e.accessed).count(),
            expired_entries: state.entries.values().filter(|e| e.is_expired(now)).count(),
            hits: counters.hits.load(Ordering::Relaxed),
            loads: counters.loads.load(Ordering::Relaxed),
            refreshes: counters.refreshes.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            load_failures: counters.load_failures.load(Ordering::Relaxed),
            closed: state.is_closed(),
        }
    }
}

impl<V> Drop for EagerCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!(cache = %self.core.name, error = %err, "Failed to close cache on drop");
        }
    }
}

impl<V> std::fmt::Debug for EagerCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EagerCache")
            .field("name", &self.core.name)
            .field("ttl", &self.core.ttl)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for [`EagerCache`].
pub struct CacheBuilder<V> {
    config: CacheConfig,
    loader: Option<Arc<dyn Loader<V>>>,
}

impl<V> Default for CacheBuilder<V> {
    fn default() -> Self {
        Self {
            config: CacheConfig::default(),
            loader: None,
        }
    }
}

impl<V> CacheBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a builder with the default configuration and no loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the name used in logs and stats.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.name(name);
        self
    }

    /// Sets the time-to-live.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config = self.config.ttl(ttl);
        self
    }

    /// Sets the loader from a closure.
    pub fn loader<F>(mut self, loader: F) -> Self
    where
        F: Fn(&str) -> Result<V> + Send + Sync + 'static,
    {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Sets a loader shared with other caches.
    pub fn shared_loader(mut self, loader: Arc<dyn Loader<V>>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Builds the cache and registers it with the global registry.
    pub fn build(self) -> Result<EagerCache<V>> {
        self.build_in(Registry::global())
    }

    /// Builds the cache and registers it with `registry`.
    pub fn build_in(self, registry: &Arc<Registry>) -> Result<EagerCache<V>> {
        let loader = self.loader.ok_or(EagerError::MissingLoader)?;
        EagerCache::register(self.config, loader, registry)
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    /// Cache name
    pub name: String,
    /// Entries currently stored (including expired)
    pub total_entries: usize,
    /// Entries read since their last load
    pub accessed_entries: usize,
    /// Entries past their expiry, waiting for the sweeper
    pub expired_entries: usize,
    /// Reads answered without a loader call
    pub hits: u64,
    /// Loader calls made on behalf of readers
    pub loads: u64,
    /// Loader calls made by the sweeper
    pub refreshes: u64,
    /// Entries evicted by the sweeper
    pub evictions: u64,
    /// Failed loader calls, readers and sweeper combined
    pub load_failures: u64,
    /// Whether the cache was closed
    pub closed: bool,
}

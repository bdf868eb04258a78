//! Registry of live caches and the background sweeper that walks them.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, instrument};

use eager_core::constants::SWEEPER_THREAD_NAME;
use eager_core::error::{EagerError, Result};
use eager_core::traits::Sweep;
use eager_core::types::SweepSummary;

use crate::cache::{CacheBuilder, EagerCache};
use crate::config::{validate_interval, RegistryConfig};

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

/// Registry of caches swept on one shared schedule.
///
/// Slots are never reused or compacted: removing a cache tombstones its slot
/// so the indices held by other caches stay valid. Slots hold weak references,
/// the registry never keeps a cache alive.
///
/// # Thread Safety
///
/// The slot list has its own lock, held only long enough to register,
/// deregister, or snapshot the live caches. Sweeping a cache never happens
/// under it.
pub struct Registry {
    slots: RwLock<Vec<Option<Weak<dyn Sweep>>>>,
    sweep_interval: Mutex<Duration>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Registry {
    /// Creates an empty registry with the default sweep interval.
    pub fn new() -> Arc<Self> {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates an empty registry.
    ///
    /// The configured interval is only reported until a sweeper is started;
    /// `start_sweeper` decides the interval actually used.
    pub fn with_config(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            slots: RwLock::new(Vec::new()),
            sweep_interval: Mutex::new(config.sweep_interval_duration()),
            sweeper: Mutex::new(None),
        })
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> &'static Arc<Registry> {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Starts the background sweeper.
    ///
    /// Only the first call has an effect; it fixes the interval and spawns the
    /// thread. Later calls return `Ok(false)` and their interval is ignored.
    /// The thread stops once the registry is dropped, so the global
    /// registry's sweeper runs for the life of the process.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> Result<bool> {
        validate_interval(interval)?;

        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            debug!(
                interval_ms = interval.as_millis() as u64,
                "Sweeper already running, ignoring interval"
            );
            return Ok(false);
        }

        *self.sweep_interval.lock() = interval;
        let registry = Arc::downgrade(self);
        let handle = thread::Builder::new()
            .name(SWEEPER_THREAD_NAME.into())
            .spawn(move || sweep_loop(registry, interval))?;
        *sweeper = Some(handle);

        info!(interval_ms = interval.as_millis() as u64, "Sweeper started");
        Ok(true)
    }

    /// Returns true while the sweeper thread is alive.
    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Interval between sweep passes.
    pub fn sweep_interval(&self) -> Duration {
        *self.sweep_interval.lock()
    }

    /// Creates a cache registered with this registry.
    pub fn create_cache<V, F>(self: &Arc<Self>, ttl: Duration, loader: F) -> Result<EagerCache<V>>
    where
        V: Clone + Send + Sync + 'static,
        F: Fn(&str) -> Result<V> + Send + Sync + 'static,
    {
        CacheBuilder::new().ttl(ttl).loader(loader).build_in(self)
    }

    /// Appends `cache` and returns its slot index.
    pub(crate) fn register<S: Sweep + 'static>(&self, cache: &Arc<S>) -> usize {
        let weak = Arc::downgrade(cache);
        let weak: Weak<dyn Sweep> = weak;
        let mut slots = self.slots.write();
        slots.push(Some(weak));
        slots.len() - 1
    }

    /// Tombstones slot `index`, which must hold `cache`.
    pub(crate) fn deregister<S: Sweep + 'static>(&self, index: usize, cache: &Arc<S>) -> Result<()> {
        let mut slots = self.slots.write();
        let holds_cache = slots
            .get(index)
            .and_then(Option::as_ref)
            .is_some_and(|weak| std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(cache)));

        if !holds_cache {
            error!(index, cache = cache.name(), "Registry slot does not hold the cache being removed");
            return Err(EagerError::RegistryCorrupted { index });
        }

        slots[index] = None;
        debug!(index, cache = cache.name(), "Cache deregistered");
        Ok(())
    }

    /// Sweeps every live cache once, in registration order.
    ///
    /// This is what the background sweeper runs on each tick; calling it
    /// directly triggers a pass immediately.
    #[instrument(skip(self))]
    pub fn sweep_all(&self) -> SweepSummary {
        let live: Vec<Arc<dyn Sweep>> = self
            .slots
            .read()
            .iter()
            .flatten()
            .filter_map(Weak::upgrade)
            .collect();

        let mut summary = SweepSummary::default();
        for cache in live {
            let report = cache.sweep_expired(Instant::now());
            summary.add(&report);
        }

        debug!(
            caches = summary.caches,
            evicted = summary.evicted,
            refreshed = summary.refreshed,
            failed = summary.failed,
            "Sweep pass finished"
        );
        summary
    }

    /// Number of caches currently registered and alive.
    pub fn live_caches(&self) -> usize {
        self.slots
            .read()
            .iter()
            .flatten()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of slots ever handed out, tombstones included.
    pub fn slot_count(&self) -> usize {
        self.slots.read().len()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("slots", &self.slot_count())
            .field("live_caches", &self.live_caches())
            .field("sweep_interval", &self.sweep_interval())
            .field("sweeper_running", &self.is_sweeper_running())
            .finish()
    }
}

fn sweep_loop(registry: Weak<Registry>, interval: Duration) {
    loop {
        thread::sleep(interval);
        let Some(registry) = registry.upgrade() else {
            debug!("Registry dropped, sweeper exiting");
            return;
        };
        // A pass that panics must not take the sweeper down with it
        if panic::catch_unwind(AssertUnwindSafe(|| registry.sweep_all())).is_err() {
            error!("Sweep pass panicked, retrying next tick");
        }
    }
}

/// Starts the global registry's sweeper. See [`Registry::start_sweeper`].
pub fn start_sweeper(interval: Duration) -> Result<bool> {
    Registry::global().start_sweeper(interval)
}

/// Creates a cache registered with the global registry.
pub fn create_cache<V, F>(ttl: Duration, loader: F) -> Result<EagerCache<V>>
where
    V: Clone + Send + Sync + 'static,
    F: Fn(&str) -> Result<V> + Send + Sync + 'static,
{
    Registry::global().create_cache(ttl, loader)
}

//! Common traits for eagercache.
//!
//! These are the seams between a cache, the code that fills it, and the
//! registry that sweeps it.

use std::time::Instant;

use crate::error::Result;
use crate::types::SweepReport;

// ═══════════════════════════════════════════════════════════════════════════════
// LOADER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Produces a fresh value for a key.
///
/// A loader is the only I/O boundary of a cache: it may hit the network, the
/// disk, or just compute. It is called concurrently for different keys (a
/// reader's miss and the sweeper's refresh threads), never concurrently for
/// the same key of the same cache.
///
/// Any `Fn(&str) -> Result<V> + Send + Sync` closure is a loader.
pub trait Loader<V>: Send + Sync {
    /// Loads the value for `key`.
    fn load(&self, key: &str) -> Result<V>;
}

impl<V, F> Loader<V> for F
where
    F: Fn(&str) -> Result<V> + Send + Sync,
{
    fn load(&self, key: &str) -> Result<V> {
        self(key)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SWEEP TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Something a registry can sweep.
///
/// The registry only holds weak references to implementors, so it stays
/// independent of the value type stored in each cache.
pub trait Sweep: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Evicts expired entries nobody read and refreshes expired entries that
    /// were read since their last load. `now` is the reference time for both
    /// the expiry check and the new expiry.
    fn sweep_expired(&self, now: Instant) -> SweepReport;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EagerError;

    fn load_with<L: Loader<String>>(loader: &L, key: &str) -> Result<String> {
        loader.load(key)
    }

    #[test]
    fn test_closure_is_loader() {
        let loader = |key: &str| -> Result<String> { Ok(format!("v{key}")) };
        assert_eq!(load_with(&loader, "a").unwrap(), "va");
    }

    #[test]
    fn test_loader_error_passes_through() {
        let loader = |key: &str| -> Result<String> { Err(EagerError::loader(key, "offline")) };
        let err = load_with(&loader, "a").unwrap_err();
        assert!(err.is_recoverable());
    }
}

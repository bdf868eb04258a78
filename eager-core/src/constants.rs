//! Shared constants for eagercache.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// SWEEPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Interval between sweep passes until a sweeper is explicitly started.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(120);

/// Name given to the background sweeper thread.
pub const SWEEPER_THREAD_NAME: &str = "eager-sweeper";

/// Name given to the scoped threads that reload stale entries during a sweep.
pub const REFRESH_THREAD_NAME: &str = "eager-refresh";

/// Upper bound on refresh threads a single cache spawns per sweep pass.
/// Stale keys beyond it are split across the same workers.
pub const MAX_REFRESH_WORKERS: usize = 16;

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Entry time-to-live used by `CacheConfig::default()`.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Initial capacity reserved for a cache's entry map.
pub const DEFAULT_INITIAL_CAPACITY: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Environment variable overriding the cache TTL, in milliseconds.
pub const ENV_TTL_MS: &str = "EAGERCACHE_TTL_MS";

/// Environment variable overriding the sweep interval, in milliseconds.
pub const ENV_SWEEP_MS: &str = "EAGERCACHE_SWEEP_MS";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sweep_interval_is_two_minutes() {
        assert_eq!(DEFAULT_SWEEP_INTERVAL, Duration::from_secs(2 * 60));
    }

    #[test]
    fn test_env_keys_unique() {
        assert_ne!(ENV_TTL_MS, ENV_SWEEP_MS);
    }
}

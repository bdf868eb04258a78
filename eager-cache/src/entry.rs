//! Per-key cache record.

use std::time::{Duration, Instant};

/// One key's value together with its expiry and access flag.
///
/// `accessed` starts out false every time the value is (re)loaded and flips
/// to true on the first read that finds the loaded value. The sweeper uses it
/// to decide between eviction and eager refresh.
#[derive(Clone, Debug)]
pub struct Entry<V> {
    pub(crate) value: V,
    pub(crate) expires_at: Instant,
    pub(crate) accessed: bool,
}

impl<V> Entry<V> {
    /// Creates a freshly loaded, not yet accessed entry.
    pub(crate) fn loaded(value: V, now: Instant, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: now + ttl,
            accessed: false,
        }
    }

    /// The stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Instant after which the entry is stale.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the entry was read since it was last loaded.
    pub fn is_accessed(&self) -> bool {
        self.accessed
    }

    /// Returns true if the entry is stale at `now`.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at < now
    }

    /// Time left until expiry, zero once stale.
    pub fn time_remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_entry_is_not_accessed() {
        let now = Instant::now();
        let entry = Entry::loaded("v", now, Duration::from_secs(1));

        assert!(!entry.is_accessed());
        assert_eq!(entry.expires_at(), now + Duration::from_secs(1));
        assert_eq!(*entry.value(), "v");
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Instant::now();
        let entry = Entry::loaded((), now, Duration::from_millis(100));

        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + Duration::from_millis(100)));
        assert!(entry.is_expired(now + Duration::from_millis(101)));
    }

    #[test]
    fn test_time_remaining_saturates() {
        let now = Instant::now();
        let entry = Entry::loaded((), now, Duration::from_millis(50));

        assert_eq!(entry.time_remaining(now), Duration::from_millis(50));
        assert_eq!(entry.time_remaining(now + Duration::from_secs(1)), Duration::ZERO);
    }
}

//! Reports produced by sweep passes.

/// Outcome of sweeping a single cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired entries removed because nobody read them since their last load
    pub evicted: usize,
    /// Expired entries reloaded because they were read since their last load
    pub refreshed: usize,
    /// Refreshes whose loader call failed; the old value was kept
    pub failed: usize,
}

impl SweepReport {
    /// Returns true if the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.evicted == 0 && self.refreshed == 0 && self.failed == 0
    }
}

/// Outcome of one registry pass over all live caches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Caches that were swept
    pub caches: usize,
    /// Expired entries evicted across all caches
    pub evicted: usize,
    /// Expired entries refreshed across all caches
    pub refreshed: usize,
    /// Refreshes that failed across all caches
    pub failed: usize,
}

impl SweepSummary {
    /// Folds one cache's report into the summary.
    pub fn add(&mut self, report: &SweepReport) {
        self.caches += 1;
        self.evicted += report.evicted;
        self.refreshed += report.refreshed;
        self.failed += report.failed;
    }
}

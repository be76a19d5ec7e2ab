//! Admission counters
//!
//! Counters are updated with relaxed atomics; a snapshot is not a consistent
//! cut across counters, only each value on its own is exact.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::controller::{PublishOutcome, UnpublishOutcome};

/// Live admission counters
#[derive(Debug)]
pub struct AdmissionStats {
    published: AtomicU64,
    prepared_before: AtomicU64,
    rejected: AtomicU64,
    unpublished: AtomicU64,
    unpublished_before: AtomicU64,
    failures: AtomicU64,
    started_at: Instant,
}

impl AdmissionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            prepared_before: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            unpublished: AtomicU64::new(0),
            unpublished_before: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn record_publish(&self, outcome: PublishOutcome) {
        let counter = match outcome {
            PublishOutcome::Published => &self.published,
            PublishOutcome::PreparedBefore => &self.prepared_before,
            PublishOutcome::ReachedMaxUpstreamLimit => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unpublish(&self, outcome: UnpublishOutcome) {
        let counter = match outcome {
            UnpublishOutcome::Unpublished => &self.unpublished,
            UnpublishOutcome::UnpublishedBefore => &self.unpublished_before,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            published: self.published.load(Ordering::Relaxed),
            prepared_before: self.prepared_before.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            unpublished: self.unpublished.load(Ordering::Relaxed),
            unpublished_before: self.unpublished_before.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for AdmissionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the admission counters
#[derive(Debug, Clone, Default)]
pub struct AdmissionSnapshot {
    /// Slots granted
    pub published: u64,
    /// Prepare calls from learners already holding a slot
    pub prepared_before: u64,
    /// Prepare calls refused because the lesson was full
    pub rejected: u64,
    /// Slots released
    pub unpublished: u64,
    /// Unpublish calls from learners holding no slot
    pub unpublished_before: u64,
    /// Calls that ended in an error
    pub failures: u64,
    /// Time since the counters were created
    pub uptime: Duration,
}

impl AdmissionSnapshot {
    /// Slots granted minus slots released
    ///
    /// Lesson teardown drops slots without an unpublish call, so this is an
    /// upper bound on the slots currently held.
    pub fn net_publishers(&self) -> i64 {
        self.published as i64 - self.unpublished as i64
    }

    /// Share of prepare calls refused for capacity, 0.0 when there were none
    pub fn rejection_rate(&self) -> f64 {
        let total = self.published + self.prepared_before + self.rejected;
        if total > 0 {
            self.rejected as f64 / total as f64
        } else {
            0.0
        }
    }
}

//! Ledger configuration

use std::time::Duration;

use crate::activity::log::DEFAULT_MAX_RECORDS;

/// Slot ledger configuration options
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// How long an operation waits for a lesson's lock before failing
    pub lock_timeout: Duration,

    /// How often the cleanup task scans for idle lessons
    pub cleanup_interval: Duration,

    /// Lessons with no publishers are evicted after this long without changes
    pub idle_lesson_timeout: Duration,

    /// Buffered slot events per subscriber before lagging
    pub event_capacity: usize,

    /// Activity records kept in memory before the oldest are dropped
    pub activity_retention: usize,

    /// Wait for each journal append to reach the disk
    pub sync_journal: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            cleanup_interval: Duration::from_secs(30),
            idle_lesson_timeout: Duration::from_secs(300),
            event_capacity: 1024,
            activity_retention: DEFAULT_MAX_RECORDS,
            sync_journal: true,
        }
    }
}

impl LedgerConfig {
    /// Set the lock timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the idle lesson timeout
    pub fn idle_lesson_timeout(mut self, timeout: Duration) -> Self {
        self.idle_lesson_timeout = timeout;
        self
    }

    /// Set the event channel capacity (minimum 1)
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Set how many activity records are retained (minimum 1)
    pub fn activity_retention(mut self, records: usize) -> Self {
        self.activity_retention = records.max(1);
        self
    }

    /// Enable or disable fsync after each journal append
    pub fn sync_journal(mut self, sync: bool) -> Self {
        self.sync_journal = sync;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();

        assert_eq!(config.lock_timeout, Duration::from_secs(2));
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
        assert_eq!(config.idle_lesson_timeout, Duration::from_secs(300));
        assert_eq!(config.event_capacity, 1024);
        assert_eq!(config.activity_retention, 10_000);
        assert!(config.sync_journal);
    }

    #[test]
    fn test_builder_chaining() {
        let config = LedgerConfig::default()
            .lock_timeout(Duration::from_millis(50))
            .cleanup_interval(Duration::from_secs(1))
            .idle_lesson_timeout(Duration::from_secs(10))
            .event_capacity(0)
            .activity_retention(0)
            .sync_journal(false);

        assert_eq!(config.lock_timeout, Duration::from_millis(50));
        assert_eq!(config.cleanup_interval, Duration::from_secs(1));
        assert_eq!(config.idle_lesson_timeout, Duration::from_secs(10));
        // Capacity is clamped so the broadcast channel can be created
        assert_eq!(config.event_capacity, 1);
        assert_eq!(config.activity_retention, 1);
        assert!(!config.sync_journal);
    }
}

//! Slot ledger implementation
//!
//! The authoritative holder sets for all lessons. Each lesson has its own
//! lock; the lesson index is only write-locked to insert or evict an entry.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{broadcast, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use super::config::LedgerConfig;
use super::entry::{AcquireOutcome, LessonSlots, LessonState, LessonStats, ReleaseOutcome};
use super::event::SlotEvent;
use super::journal::{live_holders, FileJournal, Journal, JournalRecord, NullJournal};
use super::key::{LearnerId, LessonId};
use crate::activity::ActivityLog;
use crate::error::{Error, Result};

/// Atomic slot operations
///
/// Implementations must apply each call as a single unit relative to every
/// other call on the same lesson, and must not partially apply a call that
/// fails or is cancelled.
pub trait SlotLedger: Send + Sync + 'static {
    /// Grant `learner` a slot unless it already holds one or the lesson is full
    fn try_acquire(
        &self,
        lesson: &LessonId,
        learner: &LearnerId,
        capacity: NonZeroU32,
    ) -> impl Future<Output = Result<AcquireOutcome>> + Send;

    /// Take `learner`'s slot back if it holds one
    fn release(
        &self,
        lesson: &LessonId,
        learner: &LearnerId,
    ) -> impl Future<Output = Result<ReleaseOutcome>> + Send;

    /// Learners holding a slot, read under the lesson's lock
    fn streaming_learners(
        &self,
        lesson: &LessonId,
    ) -> impl Future<Output = Result<Vec<LearnerId>>> + Send;

    /// Snapshot of a lesson, `None` if the ledger has no entry for it
    fn lesson_stats(
        &self,
        lesson: &LessonId,
    ) -> impl Future<Output = Result<Option<LessonStats>>> + Send;

    /// Drop every slot of a lesson; returns how many were held
    fn end_lesson(&self, lesson: &LessonId) -> impl Future<Output = Result<usize>> + Send;
}

type Entry = Arc<RwLock<LessonSlots>>;

/// In-memory slot ledger with an optional durable journal
pub struct MemoryLedger<J: Journal = NullJournal> {
    /// Map of lesson id to its slot holders
    lessons: RwLock<HashMap<LessonId, Entry>>,

    /// Write-ahead journal for committed changes
    journal: J,

    /// Record of every committed publish and unpublish
    activity: Arc<ActivityLog>,

    /// Fan-out of committed changes
    events: broadcast::Sender<SlotEvent>,

    /// Configuration
    config: LedgerConfig,
}

impl MemoryLedger<NullJournal> {
    /// Create a non-durable ledger with default configuration
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    /// Create a non-durable ledger with custom configuration
    pub fn with_config(config: LedgerConfig) -> Self {
        Self::with_journal(config, NullJournal)
    }
}

impl MemoryLedger<FileJournal> {
    /// Open a durable ledger, replaying the journal at `path`
    pub fn open(config: LedgerConfig, path: impl AsRef<Path>) -> Result<Self> {
        let (journal, records) = FileJournal::open(path)?;
        let journal = journal.with_sync(config.sync_journal);
        Ok(Self::recover(config, journal, records))
    }
}

impl<J: Journal> MemoryLedger<J> {
    /// Create an empty ledger writing to `journal`
    pub fn with_journal(config: LedgerConfig, journal: J) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            lessons: RwLock::new(HashMap::new()),
            journal,
            activity: Arc::new(ActivityLog::with_max_records(config.activity_retention)),
            events,
            config,
        }
    }

    /// Rebuild a ledger from previously journaled records
    ///
    /// Records are trusted: capacity was enforced when they were written.
    pub fn recover(
        config: LedgerConfig,
        journal: J,
        records: impl IntoIterator<Item = JournalRecord>,
    ) -> Self {
        let records: Vec<JournalRecord> = records.into_iter().collect();
        let replayed = records.len();
        let lessons = live_holders(records);
        tracing::info!(
            records = replayed,
            lessons = lessons.len(),
            "Ledger recovered from journal"
        );

        let ledger = Self::with_journal(config, journal);
        let recovered = lessons
            .into_iter()
            .map(|(lesson, holders)| {
                let mut slots = LessonSlots::new();
                for learner in holders {
                    slots.insert(learner);
                }
                (lesson, Arc::new(RwLock::new(slots)))
            })
            .collect();
        Self {
            lessons: RwLock::new(recovered),
            ..ledger
        }
    }

    /// Get the ledger configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Activity records of committed publishes and unpublishes
    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    /// Subscribe to committed slot changes
    pub fn subscribe(&self) -> broadcast::Receiver<SlotEvent> {
        self.events.subscribe()
    }

    /// Number of lessons with an entry in the ledger
    pub async fn lesson_count(&self) -> usize {
        self.lessons.read().await.len()
    }

    /// Append to the journal, off the async worker when it blocks on disk
    fn append_journal(&self, record: &JournalRecord) -> io::Result<()> {
        let offload = self.journal.blocks_on_io()
            && Handle::try_current()
                .is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread);
        if offload {
            tokio::task::block_in_place(|| self.journal.append(record))
        } else {
            self.journal.append(record)
        }
    }

    /// Record and broadcast a committed change
    fn publish_event(&self, event: SlotEvent) {
        self.activity.record(&event);
        // A send error only means nobody is subscribed
        let _ = self.events.send(event);
    }

    async fn existing(&self, lesson: &LessonId) -> Option<Entry> {
        self.lessons.read().await.get(lesson).cloned()
    }

    async fn existing_or_insert(&self, lesson: &LessonId) -> Entry {
        if let Some(entry) = self.existing(lesson).await {
            return entry;
        }
        let mut lessons = self.lessons.write().await;
        lessons
            .entry(lesson.clone())
            .or_insert_with(|| Arc::new(RwLock::new(LessonSlots::new())))
            .clone()
    }

    /// Remove a retired entry from the index unless it was already replaced
    async fn unlink_retired(&self, lesson: &LessonId, entry: &Entry) {
        let mut lessons = self.lessons.write().await;
        if lessons
            .get(lesson)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
        {
            lessons.remove(lesson);
        }
    }

    fn timeout_error(&self, lesson: &LessonId) -> Error {
        Error::LockTimeout {
            lesson: lesson.clone(),
            waited: self.config.lock_timeout,
        }
    }

    /// Write-lock a lesson, creating its entry if needed
    async fn lock_or_insert(&self, lesson: &LessonId) -> Result<OwnedRwLockWriteGuard<LessonSlots>> {
        let locked = async {
            loop {
                let entry = self.existing_or_insert(lesson).await;
                let slots = Arc::clone(&entry).write_owned().await;
                if !slots.retired {
                    return slots;
                }
                drop(slots);
                self.unlink_retired(lesson, &entry).await;
            }
        };
        tokio::time::timeout(self.config.lock_timeout, locked)
            .await
            .map_err(|_| self.timeout_error(lesson))
    }

    /// Write-lock a lesson if it has an entry
    async fn lock_existing(
        &self,
        lesson: &LessonId,
    ) -> Result<Option<OwnedRwLockWriteGuard<LessonSlots>>> {
        let locked = async {
            loop {
                let Some(entry) = self.existing(lesson).await else {
                    return None;
                };
                let slots = Arc::clone(&entry).write_owned().await;
                if !slots.retired {
                    return Some(slots);
                }
                drop(slots);
                self.unlink_retired(lesson, &entry).await;
            }
        };
        tokio::time::timeout(self.config.lock_timeout, locked)
            .await
            .map_err(|_| self.timeout_error(lesson))
    }

    /// Read-lock a lesson if it has an entry
    async fn read_existing(
        &self,
        lesson: &LessonId,
    ) -> Result<Option<OwnedRwLockReadGuard<LessonSlots>>> {
        let locked = async {
            loop {
                let Some(entry) = self.existing(lesson).await else {
                    return None;
                };
                let slots = Arc::clone(&entry).read_owned().await;
                if !slots.retired {
                    return Some(slots);
                }
                drop(slots);
                self.unlink_retired(lesson, &entry).await;
            }
        };
        tokio::time::timeout(self.config.lock_timeout, locked)
            .await
            .map_err(|_| self.timeout_error(lesson))
    }

    /// Evict lessons that have had no publishers for `idle_lesson_timeout`
    ///
    /// Entries busy with another operation are skipped until the next run.
    /// Returns the number of evicted lessons.
    pub async fn cleanup(&self) -> usize {
        let mut lessons = self.lessons.write().await;
        let now = Instant::now();
        let timeout = self.config.idle_lesson_timeout;

        let idle: Vec<LessonId> = lessons
            .iter()
            .filter_map(|(lesson, entry)| {
                // Try to get the lock without blocking
                let mut slots = entry.try_write().ok()?;
                if slots.state() == LessonState::Idle
                    && now.duration_since(slots.last_change) >= timeout
                {
                    slots.retired = true;
                    Some(lesson.clone())
                } else {
                    None
                }
            })
            .collect();

        for lesson in &idle {
            lessons.remove(lesson);
            tracing::debug!(lesson = %lesson, "Idle lesson evicted");
        }

        idle.len()
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let ledger = Arc::clone(self);
        let interval = ledger.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let evicted = ledger.cleanup().await;
                if evicted > 0 {
                    tracing::info!(evicted = evicted, "Ledger cleanup finished");
                }
            }
        })
    }
}

impl<J: Journal> SlotLedger for MemoryLedger<J> {
    async fn try_acquire(
        &self,
        lesson: &LessonId,
        learner: &LearnerId,
        capacity: NonZeroU32,
    ) -> Result<AcquireOutcome> {
        let mut slots = self.lock_or_insert(lesson).await?;

        // No await from here on: the change is applied whole or not at all
        let outcome = slots.check_acquire(learner, capacity);
        match outcome {
            AcquireOutcome::Acquired => {
                self.append_journal(&JournalRecord::Acquire {
                    lesson: lesson.clone(),
                    learner: learner.clone(),
                })?;
                slots.insert(learner.clone());

                let active = slots.active_count();
                self.publish_event(SlotEvent::acquired(lesson.clone(), learner.clone(), active));

                tracing::info!(
                    lesson = %lesson,
                    learner = %learner,
                    active = active,
                    capacity = capacity.get(),
                    "Publish slot acquired"
                );
            }
            AcquireOutcome::AlreadyHeld => {
                tracing::debug!(lesson = %lesson, learner = %learner, "Publish slot already held");
            }
            AcquireOutcome::CapacityExceeded => {
                tracing::debug!(
                    lesson = %lesson,
                    learner = %learner,
                    active = slots.active_count(),
                    capacity = capacity.get(),
                    "Lesson at publish capacity"
                );
            }
        }

        Ok(outcome)
    }

    async fn release(&self, lesson: &LessonId, learner: &LearnerId) -> Result<ReleaseOutcome> {
        let Some(mut slots) = self.lock_existing(lesson).await? else {
            tracing::debug!(lesson = %lesson, learner = %learner, "Release on unknown lesson");
            return Ok(ReleaseOutcome::NotHeld);
        };

        let outcome = slots.check_release(learner);
        if outcome == ReleaseOutcome::Released {
            self.append_journal(&JournalRecord::Release {
                lesson: lesson.clone(),
                learner: learner.clone(),
            })?;
            slots.remove(learner);

            let active = slots.active_count();
            self.publish_event(SlotEvent::released(lesson.clone(), learner.clone(), active));

            tracing::info!(
                lesson = %lesson,
                learner = %learner,
                active = active,
                "Publish slot released"
            );
        } else {
            tracing::debug!(lesson = %lesson, learner = %learner, "No publish slot to release");
        }

        Ok(outcome)
    }

    async fn streaming_learners(&self, lesson: &LessonId) -> Result<Vec<LearnerId>> {
        Ok(self
            .read_existing(lesson)
            .await?
            .map(|slots| slots.learners().to_vec())
            .unwrap_or_default())
    }

    async fn lesson_stats(&self, lesson: &LessonId) -> Result<Option<LessonStats>> {
        Ok(self.read_existing(lesson).await?.map(|slots| slots.stats()))
    }

    async fn end_lesson(&self, lesson: &LessonId) -> Result<usize> {
        let Some(mut slots) = self.lock_existing(lesson).await? else {
            return Ok(0);
        };

        self.append_journal(&JournalRecord::LessonEnded {
            lesson: lesson.clone(),
        })?;
        let dropped = slots.active_count() as usize;
        slots.clear();
        slots.retired = true;
        self.publish_event(SlotEvent::lesson_ended(lesson.clone()));
        tracing::info!(lesson = %lesson, dropped = dropped, "Lesson ended, slots dropped");

        let entry = Arc::clone(OwnedRwLockWriteGuard::rwlock(&slots));
        drop(slots);
        self.unlink_retired(lesson, &entry).await;

        Ok(dropped)
    }
}

impl Default for MemoryLedger<NullJournal> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use crate::ledger::event::SlotEventKind;

    fn lesson(id: &str) -> LessonId {
        LessonId::new(id).unwrap()
    }

    fn learner(id: &str) -> LearnerId {
        LearnerId::new(id).unwrap()
    }

    fn cap(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    struct FailingJournal;

    impl Journal for FailingJournal {
        fn append(&self, _record: &JournalRecord) -> io::Result<()> {
            Err(io::Error::other("disk unavailable"))
        }
    }

    #[tokio::test]
    async fn test_acquire_until_full() {
        let ledger = MemoryLedger::new();
        let l = lesson("lesson-1");

        assert_eq!(
            ledger.try_acquire(&l, &learner("a"), cap(2)).await.unwrap(),
            AcquireOutcome::Acquired
        );
        assert_eq!(
            ledger.try_acquire(&l, &learner("b"), cap(2)).await.unwrap(),
            AcquireOutcome::Acquired
        );
        assert_eq!(
            ledger.try_acquire(&l, &learner("c"), cap(2)).await.unwrap(),
            AcquireOutcome::CapacityExceeded
        );
        assert_eq!(
            ledger.try_acquire(&l, &learner("a"), cap(2)).await.unwrap(),
            AcquireOutcome::AlreadyHeld
        );

        let stats = ledger.lesson_stats(&l).await.unwrap().unwrap();
        assert_eq!(stats.active_count, 2);
        assert_eq!(stats.learners, vec![learner("a"), learner("b")]);
        assert_eq!(stats.state, LessonState::Active);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let ledger = MemoryLedger::new();
        let l = lesson("lesson-1");

        assert_eq!(
            ledger.release(&l, &learner("a")).await.unwrap(),
            ReleaseOutcome::NotHeld
        );
        // Releasing on an unknown lesson must not create an entry
        assert_eq!(ledger.lesson_count().await, 0);

        ledger.try_acquire(&l, &learner("a"), cap(1)).await.unwrap();
        assert_eq!(
            ledger.release(&l, &learner("a")).await.unwrap(),
            ReleaseOutcome::Released
        );
        assert_eq!(
            ledger.release(&l, &learner("a")).await.unwrap(),
            ReleaseOutcome::NotHeld
        );
        assert!(ledger.streaming_learners(&l).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lessons_are_independent() {
        let ledger = MemoryLedger::new();

        ledger
            .try_acquire(&lesson("l1"), &learner("a"), cap(1))
            .await
            .unwrap();
        assert_eq!(
            ledger
                .try_acquire(&lesson("l2"), &learner("a"), cap(1))
                .await
                .unwrap(),
            AcquireOutcome::Acquired
        );
        assert_eq!(ledger.lesson_count().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_never_exceeds_capacity() {
        let ledger = Arc::new(MemoryLedger::new());
        let l = lesson("crowded");

        let mut handles = Vec::new();
        for i in 0..64 {
            let ledger = Arc::clone(&ledger);
            let l = l.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .try_acquire(&l, &learner(&format!("learner-{i}")), cap(5))
                    .await
                    .unwrap()
            }));
        }

        let mut acquired = 0;
        for handle in handles {
            if handle.await.unwrap() == AcquireOutcome::Acquired {
                acquired += 1;
            }
        }

        assert_eq!(acquired, 5);
        assert_eq!(ledger.streaming_learners(&l).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_failed_journal_write_leaves_state_untouched() {
        let ledger = MemoryLedger::with_journal(LedgerConfig::default(), FailingJournal);
        let mut events = ledger.subscribe();
        let l = lesson("lesson-1");

        let result = ledger.try_acquire(&l, &learner("a"), cap(3)).await;
        assert!(matches!(result, Err(Error::Journal(_))));
        assert!(ledger.streaming_learners(&l).await.unwrap().is_empty());
        assert!(events.try_recv().is_err());

        // No-op outcomes never touch the journal
        assert_eq!(
            ledger.release(&l, &learner("a")).await.unwrap(),
            ReleaseOutcome::NotHeld
        );
    }

    #[tokio::test]
    async fn test_lock_timeout_changes_nothing() {
        let config = LedgerConfig::default().lock_timeout(Duration::from_millis(20));
        let ledger = MemoryLedger::with_config(config);
        let l = lesson("lesson-1");
        ledger.try_acquire(&l, &learner("a"), cap(3)).await.unwrap();
        let mut events = ledger.subscribe();

        let entry = ledger.existing(&l).await.unwrap();
        let held = entry.write().await;

        let result = ledger.try_acquire(&l, &learner("b"), cap(3)).await;
        assert!(matches!(result, Err(Error::LockTimeout { .. })));
        assert!(result.unwrap_err().is_transient());
        let result = ledger.release(&l, &learner("a")).await;
        assert!(matches!(result, Err(Error::LockTimeout { .. })));
        drop(held);

        assert_eq!(ledger.streaming_learners(&l).await.unwrap(), vec![learner("a")]);
        assert!(events.try_recv().is_err());
        assert_eq!(ledger.activity().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_changes_nothing() {
        let ledger = Arc::new(MemoryLedger::new());
        let l = lesson("lesson-1");
        ledger.try_acquire(&l, &learner("a"), cap(3)).await.unwrap();
        let mut events = ledger.subscribe();

        let entry = ledger.existing(&l).await.unwrap();
        let held = entry.write().await;

        let waiting = {
            let ledger = Arc::clone(&ledger);
            let l = l.clone();
            tokio::spawn(async move { ledger.try_acquire(&l, &learner("b"), cap(3)).await })
        };
        // Let the task reach the lock before cancelling it
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());

        // Dropping the caller's future works the same way
        let timed_out =
            tokio::time::timeout(Duration::from_millis(10), ledger.try_acquire(&l, &learner("c"), cap(3)))
                .await;
        assert!(timed_out.is_err());
        drop(held);

        assert_eq!(ledger.streaming_learners(&l).await.unwrap(), vec![learner("a")]);
        assert!(events.try_recv().is_err());
        assert_eq!(ledger.activity().len(), 1);

        // The lock is free again for the next caller
        assert_eq!(
            ledger.try_acquire(&l, &learner("b"), cap(3)).await.unwrap(),
            AcquireOutcome::Acquired
        );
    }

    #[tokio::test]
    async fn test_events_only_for_committed_changes() {
        let ledger = MemoryLedger::new();
        let mut events = ledger.subscribe();
        let l = lesson("lesson-1");

        ledger.try_acquire(&l, &learner("a"), cap(1)).await.unwrap();
        ledger.try_acquire(&l, &learner("a"), cap(1)).await.unwrap();
        ledger.try_acquire(&l, &learner("b"), cap(1)).await.unwrap();
        ledger.release(&l, &learner("b")).await.unwrap();
        ledger.release(&l, &learner("a")).await.unwrap();

        let first = events.try_recv().unwrap();
        assert_eq!(first.kind, SlotEventKind::Acquired);
        assert_eq!(first.learner, Some(learner("a")));
        assert_eq!(first.active_count, 1);

        let second = events.try_recv().unwrap();
        assert_eq!(second.kind, SlotEventKind::Released);
        assert_eq!(second.active_count, 0);

        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_end_lesson() {
        let ledger = MemoryLedger::new();
        let l = lesson("lesson-1");
        ledger.try_acquire(&l, &learner("a"), cap(3)).await.unwrap();
        ledger.try_acquire(&l, &learner("b"), cap(3)).await.unwrap();

        assert_eq!(ledger.end_lesson(&l).await.unwrap(), 2);
        assert_eq!(ledger.lesson_count().await, 0);
        assert!(ledger.lesson_stats(&l).await.unwrap().is_none());
        assert_eq!(ledger.end_lesson(&l).await.unwrap(), 0);

        // The lesson can be used again afterwards
        assert_eq!(
            ledger.try_acquire(&l, &learner("c"), cap(1)).await.unwrap(),
            AcquireOutcome::Acquired
        );
    }

    #[tokio::test]
    async fn test_cleanup_evicts_idle_lessons_only() {
        let config = LedgerConfig::default().idle_lesson_timeout(Duration::ZERO);
        let ledger = MemoryLedger::with_config(config);

        ledger
            .try_acquire(&lesson("idle"), &learner("a"), cap(1))
            .await
            .unwrap();
        ledger.release(&lesson("idle"), &learner("a")).await.unwrap();
        ledger
            .try_acquire(&lesson("busy"), &learner("b"), cap(1))
            .await
            .unwrap();

        assert_eq!(ledger.cleanup().await, 1);
        assert_eq!(ledger.lesson_count().await, 1);
        assert_eq!(
            ledger.streaming_learners(&lesson("busy")).await.unwrap(),
            vec![learner("b")]
        );
    }

    #[tokio::test]
    async fn test_retired_entry_is_re_resolved() {
        let config = LedgerConfig::default().idle_lesson_timeout(Duration::ZERO);
        let ledger = MemoryLedger::with_config(config);
        let l = lesson("lesson-1");
        ledger.try_acquire(&l, &learner("a"), cap(1)).await.unwrap();
        ledger.release(&l, &learner("a")).await.unwrap();

        // A caller that resolved the entry before eviction
        let stale = ledger.existing(&l).await.unwrap();
        assert_eq!(ledger.cleanup().await, 1);
        assert!(stale.read().await.retired);

        ledger.try_acquire(&l, &learner("b"), cap(1)).await.unwrap();
        assert_eq!(
            ledger.streaming_learners(&l).await.unwrap(),
            vec![learner("b")]
        );
    }

    #[tokio::test]
    async fn test_recover_from_journal_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.journal");

        {
            let ledger = MemoryLedger::open(LedgerConfig::default(), &path).unwrap();
            let (l1, l2) = (lesson("l1"), lesson("l2"));
            ledger.try_acquire(&l1, &learner("a"), cap(3)).await.unwrap();
            ledger.try_acquire(&l1, &learner("b"), cap(3)).await.unwrap();
            ledger.release(&l1, &learner("a")).await.unwrap();
            ledger.try_acquire(&l1, &learner("c"), cap(3)).await.unwrap();
            ledger.try_acquire(&l2, &learner("d"), cap(3)).await.unwrap();
            ledger.end_lesson(&l2).await.unwrap();
        }

        let ledger = MemoryLedger::open(LedgerConfig::default(), &path).unwrap();
        assert_eq!(ledger.lesson_count().await, 1);
        assert_eq!(
            ledger.streaming_learners(&lesson("l1")).await.unwrap(),
            vec![learner("b"), learner("c")]
        );
        assert!(ledger
            .streaming_learners(&lesson("l2"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_durable_commits_on_multi_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.journal");
        let ledger = Arc::new(MemoryLedger::open(LedgerConfig::default(), &path).unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move {
                    let l = lesson(&format!("lesson-{}", i % 4));
                    ledger.try_acquire(&l, &learner(&format!("learner-{i}")), cap(3)).await
                })
            })
            .collect();

        let mut acquired = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == AcquireOutcome::Acquired {
                acquired += 1;
            }
        }
        // Four lessons, three slots each
        assert_eq!(acquired, 12);
        drop(ledger);

        let ledger = MemoryLedger::open(LedgerConfig::default(), &path).unwrap();
        let mut recovered = 0;
        for i in 0..4 {
            let held = ledger
                .streaming_learners(&lesson(&format!("lesson-{i}")))
                .await
                .unwrap();
            assert_eq!(held.len(), 3);
            recovered += held.len();
        }
        assert_eq!(recovered, 12);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Acquire(u8),
        Release(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6).prop_map(Op::Acquire),
            (0u8..6).prop_map(Op::Release),
        ]
    }

    proptest! {
        #[test]
        fn prop_matches_model_and_respects_capacity(ops in prop::collection::vec(op(), 1..64)) {
            let ledger = MemoryLedger::new();
            let l = lesson("prop");
            let capacity = cap(3);
            let mut model: Vec<u8> = Vec::new();

            for op in ops {
                match op {
                    Op::Acquire(n) => {
                        let got = tokio_test::block_on(
                            ledger.try_acquire(&l, &learner(&n.to_string()), capacity),
                        )
                        .unwrap();
                        let expected = if model.contains(&n) {
                            AcquireOutcome::AlreadyHeld
                        } else if model.len() as u32 >= capacity.get() {
                            AcquireOutcome::CapacityExceeded
                        } else {
                            model.push(n);
                            AcquireOutcome::Acquired
                        };
                        prop_assert_eq!(got, expected);
                    }
                    Op::Release(n) => {
                        let got = tokio_test::block_on(
                            ledger.release(&l, &learner(&n.to_string())),
                        )
                        .unwrap();
                        let expected = if model.contains(&n) {
                            model.retain(|m| *m != n);
                            ReleaseOutcome::Released
                        } else {
                            ReleaseOutcome::NotHeld
                        };
                        prop_assert_eq!(got, expected);
                    }
                }

                let held = tokio_test::block_on(ledger.streaming_learners(&l)).unwrap();
                prop_assert!(held.len() as u32 <= capacity.get());
                prop_assert_eq!(held.len(), model.len());
            }
        }
    }
}

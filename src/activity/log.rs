//! Activity records built from slot events

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::ledger::{LearnerId, LessonId, SlotEvent, SlotEventKind};

/// Default number of records kept in memory
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

/// Logged action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Publish,
    Unpublish,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Publish => "publish",
            ActionType::Unpublish => "unpublish",
        }
    }
}

/// One logged action
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    /// Monotonic record id
    pub id: u64,
    pub learner_id: LearnerId,
    pub lesson_id: LessonId,
    pub action: ActionType,
    /// Commit time of the slot change
    pub recorded_at: SystemTime,
}

/// Bounded in-memory activity log
///
/// The ledger records into it while the lesson's lock is held, so every
/// committed change gets exactly one record. The oldest records are dropped
/// once `max_records` is reached.
pub struct ActivityLog {
    records: Mutex<VecDeque<ActivityRecord>>,
    next_id: AtomicU64,
    max_records: usize,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_max_records(DEFAULT_MAX_RECORDS)
    }

    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            max_records: max_records.max(1),
        }
    }

    /// Record a slot event; returns the record id, `None` for lesson teardown
    pub fn record(&self, event: &SlotEvent) -> Option<u64> {
        let action = match event.kind {
            SlotEventKind::Acquired => ActionType::Publish,
            SlotEventKind::Released => ActionType::Unpublish,
            SlotEventKind::LessonEnded => return None,
        };
        let learner_id = event.learner.clone()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut records = self.records.lock();
        if records.len() == self.max_records {
            records.pop_front();
        }
        records.push_back(ActivityRecord {
            id,
            learner_id,
            lesson_id: event.lesson.clone(),
            action,
            recorded_at: event.at,
        });
        Some(id)
    }

    /// All retained records, oldest first
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Retained records for one lesson, oldest first
    pub fn records_for_lesson(&self, lesson: &LessonId) -> Vec<ActivityRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| &r.lesson_id == lesson)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

//! Slot change events
//!
//! Every committed change to a lesson's holder set is broadcast to
//! subscribers. No event is sent for calls that left the ledger untouched.

use std::time::SystemTime;

use super::key::{LearnerId, LessonId};

/// Kind of committed change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEventKind {
    /// A learner was granted a slot
    Acquired,
    /// A learner gave a slot back
    Released,
    /// All slots of the lesson were dropped
    LessonEnded,
}

/// A committed ledger change
#[derive(Debug, Clone)]
pub struct SlotEvent {
    /// What happened
    pub kind: SlotEventKind,
    /// Lesson the change applies to
    pub lesson: LessonId,
    /// Learner involved (`None` for `LessonEnded`)
    pub learner: Option<LearnerId>,
    /// Holder count right after the change
    pub active_count: u32,
    /// Wall-clock commit time
    pub at: SystemTime,
}

impl SlotEvent {
    pub(super) fn acquired(lesson: LessonId, learner: LearnerId, active_count: u32) -> Self {
        Self {
            kind: SlotEventKind::Acquired,
            lesson,
            learner: Some(learner),
            active_count,
            at: SystemTime::now(),
        }
    }

    pub(super) fn released(lesson: LessonId, learner: LearnerId, active_count: u32) -> Self {
        Self {
            kind: SlotEventKind::Released,
            lesson,
            learner: Some(learner),
            active_count,
            at: SystemTime::now(),
        }
    }

    pub(super) fn lesson_ended(lesson: LessonId) -> Self {
        Self {
            kind: SlotEventKind::LessonEnded,
            lesson,
            learner: None,
            active_count: 0,
            at: SystemTime::now(),
        }
    }
}

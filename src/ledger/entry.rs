//! Per-lesson slot state
//!
//! This module defines the state the ledger keeps for a single lesson. The
//! active count is derived from the holder list, so the two can never drift.

use std::num::NonZeroU32;
use std::time::Instant;

use super::key::LearnerId;

/// Result of trying to take a publish slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A new slot was granted
    Acquired,
    /// The learner already held a slot; nothing changed
    AlreadyHeld,
    /// The lesson is at capacity; nothing changed
    CapacityExceeded,
}

/// Result of giving a publish slot back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The learner's slot was removed
    Released,
    /// The learner held no slot; nothing changed
    NotHeld,
}

/// Whether a lesson currently has publishers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonState {
    /// At least one learner holds a slot
    Active,
    /// No learner holds a slot
    Idle,
}

/// Publish state of one learner in one lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    /// The learner holds no slot in the lesson
    NotPublishing,
    /// The learner holds a slot and may publish
    Publishing,
}

/// Slot holders for a single lesson
#[derive(Debug)]
pub struct LessonSlots {
    /// Learners holding a slot, in admission order
    learners: Vec<LearnerId>,

    /// When the holder set last changed (or the entry was created)
    pub last_change: Instant,

    /// Set once the entry has been evicted from the index
    pub(super) retired: bool,
}

impl LessonSlots {
    pub(super) fn new() -> Self {
        Self {
            learners: Vec::new(),
            last_change: Instant::now(),
            retired: false,
        }
    }

    /// Number of learners holding a slot
    pub fn active_count(&self) -> u32 {
        self.learners.len() as u32
    }

    /// Learners holding a slot
    pub fn learners(&self) -> &[LearnerId] {
        &self.learners
    }

    pub fn holds(&self, learner: &LearnerId) -> bool {
        self.learners.contains(learner)
    }

    pub fn state(&self) -> LessonState {
        if self.learners.is_empty() {
            LessonState::Idle
        } else {
            LessonState::Active
        }
    }

    /// Decide what `try_acquire` would do without changing anything
    pub(super) fn check_acquire(&self, learner: &LearnerId, capacity: NonZeroU32) -> AcquireOutcome {
        if self.holds(learner) {
            AcquireOutcome::AlreadyHeld
        } else if self.active_count() >= capacity.get() {
            AcquireOutcome::CapacityExceeded
        } else {
            AcquireOutcome::Acquired
        }
    }

    /// Decide what `release` would do without changing anything
    pub(super) fn check_release(&self, learner: &LearnerId) -> ReleaseOutcome {
        if self.holds(learner) {
            ReleaseOutcome::Released
        } else {
            ReleaseOutcome::NotHeld
        }
    }

    pub(super) fn insert(&mut self, learner: LearnerId) {
        if !self.holds(&learner) {
            self.learners.push(learner);
            self.last_change = Instant::now();
        }
    }

    pub(super) fn remove(&mut self, learner: &LearnerId) {
        let before = self.learners.len();
        self.learners.retain(|l| l != learner);
        if self.learners.len() != before {
            self.last_change = Instant::now();
        }
    }

    pub(super) fn clear(&mut self) {
        self.learners.clear();
        self.last_change = Instant::now();
    }

    pub(super) fn stats(&self) -> LessonStats {
        LessonStats {
            active_count: self.active_count(),
            learners: self.learners.clone(),
            state: self.state(),
            last_change: self.last_change,
        }
    }
}

/// Snapshot of a lesson's slot state
#[derive(Debug, Clone)]
pub struct LessonStats {
    /// Number of learners holding a slot
    pub active_count: u32,
    /// Learners holding a slot, in admission order
    pub learners: Vec<LearnerId>,
    /// Whether the lesson has publishers
    pub state: LessonState,
    /// When the holder set last changed
    pub last_change: Instant,
}

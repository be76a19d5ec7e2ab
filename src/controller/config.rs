//! Controller configuration

use std::collections::HashMap;

use super::retry::RetryPolicy;
use crate::error::Result;
use crate::ledger::{LedgerConfig, LessonId};
use crate::policy::LessonCapacity;

/// Default maximum number of learners publishing into one lesson
pub const DEFAULT_MAXIMUM_LEARNER_STREAMINGS: u32 = 13;

/// Admission controller configuration options
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Maximum concurrent publishing learners per lesson
    pub maximum_learner_streamings: u32,

    /// Per-lesson capacity overrides
    pub capacity_overrides: HashMap<LessonId, u32>,

    /// Only lessons with an override resolve a capacity
    pub strict_capacity: bool,

    /// Retry policy for transient ledger failures
    pub retry: RetryPolicy,

    /// Slot ledger options
    pub ledger: LedgerConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            maximum_learner_streamings: DEFAULT_MAXIMUM_LEARNER_STREAMINGS,
            capacity_overrides: HashMap::new(),
            strict_capacity: false,
            retry: RetryPolicy::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Set the default per-lesson capacity
    pub fn maximum_learner_streamings(mut self, max: u32) -> Self {
        self.maximum_learner_streamings = max;
        self
    }

    /// Override the capacity of a single lesson
    pub fn capacity_override(mut self, lesson: LessonId, max: u32) -> Self {
        self.capacity_overrides.insert(lesson, max);
        self
    }

    /// Refuse lessons that have no override
    pub fn strict_capacity(mut self) -> Self {
        self.strict_capacity = true;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the ledger options
    pub fn ledger(mut self, ledger: LedgerConfig) -> Self {
        self.ledger = ledger;
        self
    }

    /// Build the capacity policy, rejecting zero limits
    pub fn capacity_policy(&self) -> Result<LessonCapacity> {
        let mut policy = if self.strict_capacity {
            LessonCapacity::strict()
        } else {
            LessonCapacity::new(self.maximum_learner_streamings)?
        };
        for (lesson, max) in &self.capacity_overrides {
            policy = policy.with_override(lesson.clone(), *max)?;
        }
        Ok(policy)
    }
}

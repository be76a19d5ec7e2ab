//! Publish capacity per lesson

use std::collections::HashMap;
use std::num::NonZeroU32;

use crate::error::{Error, Result};
use crate::ledger::key::LessonId;

/// Resolves how many learners may publish into a lesson at once
///
/// Must be pure: the same lesson resolves to the same value until the policy
/// is rebuilt. An unresolvable lesson is a configuration error, never an
/// unlimited lesson.
pub trait CapacityPolicy: Send + Sync + 'static {
    fn capacity(&self, lesson: &LessonId) -> Result<NonZeroU32>;
}

fn non_zero(scope: impl Into<String>, value: u32) -> Result<NonZeroU32> {
    NonZeroU32::new(value).ok_or_else(|| Error::InvalidCapacity {
        scope: scope.into(),
    })
}

/// Same capacity for every lesson
#[derive(Debug, Clone, Copy)]
pub struct FixedCapacity(NonZeroU32);

impl FixedCapacity {
    pub fn new(max: u32) -> Result<Self> {
        Ok(Self(non_zero("all lessons", max)?))
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl CapacityPolicy for FixedCapacity {
    fn capacity(&self, _lesson: &LessonId) -> Result<NonZeroU32> {
        Ok(self.0)
    }
}

/// Default capacity with per-lesson overrides
///
/// A strict policy has no default, so only overridden lessons resolve.
#[derive(Debug, Clone)]
pub struct LessonCapacity {
    default: Option<NonZeroU32>,
    overrides: HashMap<LessonId, NonZeroU32>,
}

impl LessonCapacity {
    /// Policy falling back to `default` for lessons without an override
    pub fn new(default: u32) -> Result<Self> {
        Ok(Self {
            default: Some(non_zero("default", default)?),
            overrides: HashMap::new(),
        })
    }

    /// Policy that only resolves overridden lessons
    pub fn strict() -> Self {
        Self {
            default: None,
            overrides: HashMap::new(),
        }
    }

    /// Set the capacity for one lesson
    pub fn with_override(mut self, lesson: LessonId, max: u32) -> Result<Self> {
        let max = non_zero(format!("lesson {lesson}"), max)?;
        self.overrides.insert(lesson, max);
        Ok(self)
    }

    pub fn is_strict(&self) -> bool {
        self.default.is_none()
    }
}

impl CapacityPolicy for LessonCapacity {
    fn capacity(&self, lesson: &LessonId) -> Result<NonZeroU32> {
        self.overrides
            .get(lesson)
            .copied()
            .or(self.default)
            .ok_or_else(|| Error::CapacityUnresolved(lesson.clone()))
    }
}

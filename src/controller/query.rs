//! Read-only view of slot holders

use std::sync::Arc;

use crate::error::Result;
use crate::ledger::{LearnerId, LessonId, LessonStats, PublishState, SlotLedger};

/// Query façade over the slot ledger
///
/// Reads go through the lesson's lock, so a snapshot never shows a
/// half-applied change.
pub struct StreamingQuery<L: SlotLedger> {
    ledger: Arc<L>,
}

impl<L: SlotLedger> Clone for StreamingQuery<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<L: SlotLedger> StreamingQuery<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Learners currently holding a publish slot in the lesson
    pub async fn streaming_learners(&self, lesson_id: impl AsRef<str>) -> Result<Vec<LearnerId>> {
        let lesson = LessonId::new(lesson_id)?;
        self.ledger.streaming_learners(&lesson).await
    }

    /// Snapshot of the lesson; `None` if nobody published since it was evicted
    pub async fn lesson_stats(&self, lesson_id: impl AsRef<str>) -> Result<Option<LessonStats>> {
        let lesson = LessonId::new(lesson_id)?;
        self.ledger.lesson_stats(&lesson).await
    }

    /// Whether the learner currently holds a slot in the lesson
    pub async fn publish_state(
        &self,
        lesson_id: impl AsRef<str>,
        learner_id: impl AsRef<str>,
    ) -> Result<PublishState> {
        let lesson = LessonId::new(lesson_id)?;
        let learner = LearnerId::new(learner_id)?;
        let held = self.ledger.streaming_learners(&lesson).await?;
        Ok(if held.contains(&learner) {
            PublishState::Publishing
        } else {
            PublishState::NotPublishing
        })
    }
}

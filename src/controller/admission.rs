//! Admission controller

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::config::ControllerConfig;
use super::outcome::{PublishOutcome, UnpublishOutcome};
use super::query::StreamingQuery;
use super::retry::RetryPolicy;
use crate::activity::ActivityLog;
use crate::error::{Error, Result};
use crate::ledger::{FileJournal, Journal, LearnerId, LessonId, MemoryLedger, SlotLedger};
use crate::policy::{CapacityPolicy, LessonCapacity};
use crate::stats::{AdmissionSnapshot, AdmissionStats};

/// Decides whether a learner may start publishing into a lesson
///
/// Every decision is made by the ledger under the lesson's lock, so any
/// number of controllers sharing one ledger stay within capacity.
///
/// Controllers built with [`in_memory`](AdmissionController::in_memory) or
/// [`durable`](AdmissionController::durable) run the ledger's idle-lesson
/// cleanup until they are shut down or dropped.
pub struct AdmissionController<L: SlotLedger = MemoryLedger, P: CapacityPolicy = LessonCapacity> {
    ledger: Arc<L>,
    policy: P,
    retry: RetryPolicy,
    stats: AdmissionStats,
    cleanup: Option<JoinHandle<()>>,
}

impl AdmissionController<MemoryLedger> {
    /// Controller over a fresh non-durable ledger
    pub fn in_memory(config: ControllerConfig) -> Result<Self> {
        let policy = config.capacity_policy()?;
        let ledger = Arc::new(MemoryLedger::with_config(config.ledger.clone()));
        Ok(Self::with_parts(ledger, policy, config.retry).with_cleanup_task())
    }
}

impl AdmissionController<MemoryLedger<FileJournal>> {
    /// Controller over a journaled ledger, recovering state from `path`
    pub fn durable(config: ControllerConfig, path: impl AsRef<Path>) -> Result<Self> {
        let policy = config.capacity_policy()?;
        let ledger = MemoryLedger::open(config.ledger.clone(), path)?;
        tracing::info!(
            default_capacity = config.maximum_learner_streamings,
            strict = config.strict_capacity,
            "Durable admission controller ready"
        );
        Ok(Self::with_parts(Arc::new(ledger), policy, config.retry).with_cleanup_task())
    }
}

impl<J: Journal, P: CapacityPolicy> AdmissionController<MemoryLedger<J>, P> {
    /// Start evicting idle lessons in the background
    ///
    /// Outside a tokio runtime there is nothing to spawn on; eviction stays
    /// off and a warning is logged.
    pub fn with_cleanup_task(mut self) -> Self {
        if self.cleanup.is_some() {
            return self;
        }
        if Handle::try_current().is_ok() {
            self.cleanup = Some(self.ledger.spawn_cleanup_task());
            tracing::debug!(
                interval_ms = self.ledger.config().cleanup_interval.as_millis() as u64,
                "Idle lesson cleanup started"
            );
        } else {
            tracing::warn!("No tokio runtime, idle lesson cleanup disabled");
        }
        self
    }

    /// Activity records of every committed publish and unpublish
    pub fn activity(&self) -> &ActivityLog {
        self.ledger.activity()
    }
}

impl<L: SlotLedger, P: CapacityPolicy> AdmissionController<L, P> {
    /// Assemble a controller from an existing ledger and policy
    pub fn with_parts(ledger: Arc<L>, policy: P, retry: RetryPolicy) -> Self {
        Self {
            ledger,
            policy,
            retry,
            stats: AdmissionStats::new(),
            cleanup: None,
        }
    }

    /// Ask for a publish slot
    ///
    /// Lesson full and already publishing are normal outcomes. Errors mean
    /// the request was malformed, the lesson has no capacity configured, or
    /// the ledger kept failing; in every error case nothing changed.
    pub async fn prepare_publish(
        &self,
        lesson_id: impl AsRef<str>,
        learner_id: impl AsRef<str>,
    ) -> Result<PublishOutcome> {
        let lesson = LessonId::new(lesson_id)?;
        let learner = LearnerId::new(learner_id)?;

        let capacity = match self.policy.capacity(&lesson) {
            Ok(capacity) => capacity,
            Err(e) => {
                self.stats.record_failure();
                tracing::error!(lesson = %lesson, error = %e, "Cannot resolve publish capacity");
                return Err(e);
            }
        };

        let ledger = &*self.ledger;
        let (lesson_ref, learner_ref) = (&lesson, &learner);
        let acquired = self
            .retry
            .run(move |_| ledger.try_acquire(lesson_ref, learner_ref, capacity))
            .await;

        let outcome = match acquired {
            Ok(outcome) => PublishOutcome::from(outcome),
            Err(e) => {
                self.stats.record_failure();
                log_failure(&lesson, &learner, "prepare publish", &e);
                return Err(e);
            }
        };

        self.stats.record_publish(outcome);
        if outcome == PublishOutcome::ReachedMaxUpstreamLimit {
            tracing::warn!(
                lesson = %lesson,
                learner = %learner,
                capacity = capacity.get(),
                "Publish rejected, lesson reached max upstream limit"
            );
        }

        Ok(outcome)
    }

    /// Give a publish slot back; a learner without a slot is not an error
    pub async fn unpublish(
        &self,
        lesson_id: impl AsRef<str>,
        learner_id: impl AsRef<str>,
    ) -> Result<UnpublishOutcome> {
        let lesson = LessonId::new(lesson_id)?;
        let learner = LearnerId::new(learner_id)?;

        let ledger = &*self.ledger;
        let (lesson_ref, learner_ref) = (&lesson, &learner);
        let released = self
            .retry
            .run(move |_| ledger.release(lesson_ref, learner_ref))
            .await;

        match released {
            Ok(outcome) => {
                let outcome = UnpublishOutcome::from(outcome);
                self.stats.record_unpublish(outcome);
                Ok(outcome)
            }
            Err(e) => {
                self.stats.record_failure();
                log_failure(&lesson, &learner, "unpublish", &e);
                Err(e)
            }
        }
    }

    /// Learners currently holding a slot in the lesson
    pub async fn streaming_learners(&self, lesson_id: impl AsRef<str>) -> Result<Vec<LearnerId>> {
        self.query().streaming_learners(lesson_id).await
    }

    /// Read-only view sharing this controller's ledger
    pub fn query(&self) -> StreamingQuery<L> {
        StreamingQuery::new(Arc::clone(&self.ledger))
    }

    /// Drop every slot of a torn-down lesson; returns how many were held
    pub async fn end_lesson(&self, lesson_id: impl AsRef<str>) -> Result<usize> {
        let lesson = LessonId::new(lesson_id)?;
        let ledger = &*self.ledger;
        let lesson_ref = &lesson;
        self.retry
            .run(move |_| ledger.end_lesson(lesson_ref))
            .await
            .inspect_err(|_| self.stats.record_failure())
    }

    /// Current admission counters
    pub fn stats(&self) -> AdmissionSnapshot {
        self.stats.snapshot()
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Stop background work; the ledger stays usable
    pub fn shutdown(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup.abort();
            tracing::debug!("Idle lesson cleanup stopped");
        }
    }
}

impl<L: SlotLedger, P: CapacityPolicy> Drop for AdmissionController<L, P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn log_failure(lesson: &LessonId, learner: &LearnerId, op: &'static str, error: &Error) {
    match error {
        Error::RetriesExhausted { attempts, last } => tracing::error!(
            lesson = %lesson,
            learner = %learner,
            op = op,
            attempts = *attempts,
            error = %last,
            "Slot ledger unavailable, giving up"
        ),
        _ => tracing::error!(
            lesson = %lesson,
            learner = %learner,
            op = op,
            error = %error,
            "Slot operation failed"
        ),
    }
}

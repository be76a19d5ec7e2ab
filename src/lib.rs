//! Streaming-slot admission for live lessons
//!
//! A live lesson lets only a bounded number of learners publish an upload
//! stream at once. This crate decides, under concurrent requests, who gets
//! one of those slots:
//!
//! - [`AdmissionController::prepare_publish`] grants a slot, reports that the
//!   learner already holds one, or reports that the lesson is full
//! - [`AdmissionController::unpublish`] gives a slot back, idempotently
//! - [`AdmissionController::streaming_learners`] lists current holders
//!
//! The slot count of a lesson never exceeds its capacity, whatever the
//! interleaving of calls.
//!
//! # Example
//!
//! ```no_run
//! use lesson_slots::{AdmissionController, ControllerConfig, PublishOutcome};
//!
//! #[tokio::main]
//! async fn main() -> lesson_slots::Result<()> {
//!     let config = ControllerConfig::default().maximum_learner_streamings(3);
//!     let controller = AdmissionController::in_memory(config)?;
//!
//!     match controller.prepare_publish("lesson-42", "learner-7").await? {
//!         PublishOutcome::Published | PublishOutcome::PreparedBefore => {
//!             // start the upload stream
//!         }
//!         PublishOutcome::ReachedMaxUpstreamLimit => {
//!             // tell the learner the lesson is full
//!         }
//!     }
//!
//!     controller.unpublish("lesson-42", "learner-7").await?;
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod controller;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod stats;

pub use activity::{ActionType, ActivityLog, ActivityRecord};
pub use controller::{
    AdmissionController, ControllerConfig, PublishOutcome, RetryPolicy, StreamingQuery,
    UnpublishOutcome,
};
pub use error::{Error, JournalError, Result};
pub use ledger::{
    LearnerId, LedgerConfig, LessonId, LessonStats, MemoryLedger, PublishState, SlotEvent,
    SlotLedger,
};
pub use policy::{CapacityPolicy, FixedCapacity, LessonCapacity};
pub use stats::{AdmissionSnapshot, AdmissionStats};

//! Publish admission
//!
//! The controller validates a request, resolves the lesson's capacity and
//! hands the decision to the slot ledger, retrying transient failures.

pub mod admission;
pub mod config;
pub mod outcome;
pub mod query;
pub mod retry;

pub use admission::AdmissionController;
pub use config::{ControllerConfig, DEFAULT_MAXIMUM_LEARNER_STREAMINGS};
pub use outcome::{PublishOutcome, UnpublishOutcome};
pub use query::StreamingQuery;
pub use retry::RetryPolicy;

//! Publish activity log
//!
//! Holds one entry per committed publish or unpublish. The slot ledger writes
//! the entry in the same critical section as the change itself; calls that
//! changed nothing leave no trace.

pub mod log;

pub use log::{ActionType, ActivityLog, ActivityRecord};

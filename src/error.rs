//! Error types
//!
//! Expected admission outcomes (lesson full, already publishing, not
//! publishing) are never errors; see [`crate::controller::PublishOutcome`].

use std::time::Duration;

use thiserror::Error;

use crate::ledger::key::LessonId;

/// Result type for controller and ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    /// A lesson or learner id failed validation
    #[error("invalid {field}: {reason}")]
    InvalidId {
        field: &'static str,
        reason: &'static str,
    },

    /// Capacity configuration contains a zero limit
    #[error("invalid capacity for {scope}: must be at least 1")]
    InvalidCapacity { scope: String },

    /// No capacity is configured for the lesson
    #[error("no capacity configured for lesson {0}")]
    CapacityUnresolved(LessonId),

    /// The per-lesson lock could not be taken in time
    #[error("timed out after {waited:?} waiting for lesson {lesson}")]
    LockTimeout { lesson: LessonId, waited: Duration },

    /// Journal I/O failed; the operation was not applied
    #[error("journal write failed: {0}")]
    Journal(#[from] std::io::Error),

    /// Journal contents could not be decoded during recovery
    #[error("corrupt journal: {0}")]
    CorruptJournal(#[from] JournalError),

    /// All retry attempts hit transient failures
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: Box<Error> },
}

impl Error {
    /// Whether the operation may succeed if attempted again
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::LockTimeout { .. } | Error::Journal(_))
    }
}

/// Journal frame decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JournalError {
    #[error("unknown record kind 0x{0:02x} at offset {1}")]
    UnknownKind(u8, usize),

    #[error("invalid UTF-8 in record at offset {0}")]
    InvalidUtf8(usize),

    #[error("empty id in record at offset {0}")]
    EmptyId(usize),

    #[error("frame length checksum mismatch at offset {0}")]
    HeaderChecksum(usize),

    #[error("frame body checksum mismatch at offset {0}")]
    BodyChecksum(usize),

    #[error("malformed frame at offset {0}")]
    Malformed(usize),
}

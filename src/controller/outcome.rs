//! Caller-facing admission outcomes
//!
//! All variants are normal responses. Errors are reserved for malformed input,
//! missing configuration and infrastructure failures.

use crate::ledger::{AcquireOutcome, ReleaseOutcome};

/// Response to a prepare-publish request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The learner was granted a slot and may start publishing
    Published,
    /// The learner already held a slot; it still may publish
    PreparedBefore,
    /// The lesson is full; the learner cannot publish right now
    ReachedMaxUpstreamLimit,
}

impl PublishOutcome {
    /// Whether the learner holds a slot after the call
    pub fn may_publish(&self) -> bool {
        matches!(self, PublishOutcome::Published | PublishOutcome::PreparedBefore)
    }
}

impl From<AcquireOutcome> for PublishOutcome {
    fn from(outcome: AcquireOutcome) -> Self {
        match outcome {
            AcquireOutcome::Acquired => PublishOutcome::Published,
            AcquireOutcome::AlreadyHeld => PublishOutcome::PreparedBefore,
            AcquireOutcome::CapacityExceeded => PublishOutcome::ReachedMaxUpstreamLimit,
        }
    }
}

/// Response to an unpublish request; both variants are success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpublishOutcome {
    /// The learner's slot was released
    Unpublished,
    /// The learner held no slot
    UnpublishedBefore,
}

impl From<ReleaseOutcome> for UnpublishOutcome {
    fn from(outcome: ReleaseOutcome) -> Self {
        match outcome {
            ReleaseOutcome::Released => UnpublishOutcome::Unpublished,
            ReleaseOutcome::NotHeld => UnpublishOutcome::UnpublishedBefore,
        }
    }
}

//! Lesson and learner identifiers
//!
//! Both ids are opaque strings issued by external collaborators. The ledger
//! only checks that they are well formed; existence is validated upstream.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Longest accepted id, bounded by the journal's 16-bit length prefix
pub const MAX_ID_LEN: usize = u16::MAX as usize;

fn validate(field: &'static str, raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        return Err(Error::InvalidId {
            field,
            reason: "must not be empty",
        });
    }
    if raw.len() > MAX_ID_LEN {
        return Err(Error::InvalidId {
            field,
            reason: "too long",
        });
    }
    Ok(())
}

/// Identifier of a live lesson
///
/// Cheap to clone; the string is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LessonId(Arc<str>);

impl LessonId {
    /// Create a lesson id, rejecting blank or oversized values
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref();
        validate("lesson id", id)?;
        Ok(Self(Arc::from(id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a learner
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LearnerId(Arc<str>);

impl LearnerId {
    /// Create a learner id, rejecting blank or oversized values
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref();
        validate("learner id", id)?;
        Ok(Self(Arc::from(id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_ids() {
        assert!(matches!(
            LessonId::new(""),
            Err(Error::InvalidId {
                field: "lesson id",
                ..
            })
        ));
        assert!(matches!(
            LearnerId::new("   "),
            Err(Error::InvalidId {
                field: "learner id",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_oversized_ids() {
        let long = "x".repeat(MAX_ID_LEN + 1);
        assert!(LessonId::new(&long).is_err());
        assert!(LessonId::new(&long[..MAX_ID_LEN]).is_ok());
    }

    #[test]
    fn test_display_and_equality() {
        let a = LearnerId::new("learner-a").unwrap();
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "learner-a");
        assert_eq!(b.as_str(), "learner-a");
    }
}

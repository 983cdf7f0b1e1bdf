//! Error taxonomy for the reconciliation engine.
//!
//! Steady-state outcomes (a comment that cannot be located, an edit that
//! cannot be attributed) are modelled as result enums elsewhere; these
//! variants exist so callers can lift them into `?`-style control flow.

use thiserror::Error;

/// Errors surfaced by the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The comment's source span could not be located
    #[error("Couldn't locate the comment in the source code")]
    LocateComment,

    /// No unique best revision could be found for a comment
    #[error("Couldn't determine the edit that added the comment")]
    Ambiguous,

    /// A markup fragment could not be rendered to plain text
    #[error("Failed to render markup: {reason}")]
    ParseFailure { reason: String },

    /// A computed offset falls outside the source text
    #[error("Offset {offset} is outside of source bounds (length {len})")]
    OffsetOutOfBounds { offset: usize, len: usize },

    /// A configured pattern did not compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A comment index does not exist in the rendered comment list
    #[error("Comment index {index} is out of range (have {len} comments)")]
    CommentIndex { index: usize, len: usize },
}

impl EngineError {
    /// Whether the caller can recover by refetching and retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::LocateComment | EngineError::Ambiguous | EngineError::ParseFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(EngineError::LocateComment.is_recoverable());
        assert!(EngineError::Ambiguous.is_recoverable());
        assert!(EngineError::ParseFailure {
            reason: "bad".to_string()
        }
        .is_recoverable());
        assert!(!EngineError::OffsetOutOfBounds { offset: 10, len: 5 }.is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = EngineError::OffsetOutOfBounds { offset: 10, len: 5 };
        assert_eq!(
            err.to_string(),
            "Offset 10 is outside of source bounds (length 5)"
        );
    }
}

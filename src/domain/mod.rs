//! Domain types for the reconciliation engine.
//!
//! This module contains the plain data structures:
//! - Signature: candidates scanned out of wikitext source
//! - Comment: rendered comments and their fingerprints
//! - Revision: revisions, diffs and attribution results
//! - Lifecycle: visit records, snapshots and per-comment state

pub mod comment;
pub mod lifecycle;
pub mod revision;
pub mod signature;

// Re-export commonly used types
pub use comment::{CommentFingerprint, CommentFormat, DisplayedComment};
pub use lifecycle::{
    Arrival, CommentSnapshot, CommentState, CommentStructure, Lifecycle, Verdict, VisitRecord,
};
pub use revision::{Attribution, DiffBody, DiffLine, DiffLineKind, DiffMatch, RevisionDiff, RevisionRef};
pub use signature::{Author, SignatureCandidate};

//! Revisions, diffs and attribution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Reference to a page revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRef {
    /// Revision ID
    pub id: u64,
    /// When the revision was saved
    pub timestamp: DateTime<Utc>,
    /// User who saved it
    #[serde(default)]
    pub user: Option<String>,
    /// Edit summary
    #[serde(default)]
    pub comment: Option<String>,
}

/// Kind of a line in a structured diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineKind {
    Added,
    Removed,
    Context,
}

/// One line of a structured diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub text: String,
}

/// Diff body as supplied by the revision source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "body", rename_all = "snake_case")]
pub enum DiffBody {
    /// MediaWiki compare-API table rows
    Html(String),
    /// Pre-split lines
    Lines(Vec<DiffLine>),
}

/// A revision together with the diff it introduced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionDiff {
    pub revision: RevisionRef,
    pub diff: DiffBody,
}

/// Score of one revision against a fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffMatch {
    pub revision: RevisionRef,
    /// Word overlap between added text and the comment text
    pub word_overlap: f64,
    /// Distance between comment time and revision time, whole minutes, in ms
    pub date_proximity_ms: u64,
}

/// Outcome of picking the adding edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "revision", rename_all = "snake_case")]
pub enum Attribution {
    /// A unique best revision
    Revision(RevisionRef),
    /// No match, or the top two are indistinguishable
    Ambiguous,
}

impl Attribution {
    /// Convert into a result, mapping `Ambiguous` to an error
    pub fn into_result(self) -> Result<RevisionRef, EngineError> {
        match self {
            Attribution::Revision(revision) => Ok(revision),
            Attribution::Ambiguous => Err(EngineError::Ambiguous),
        }
    }
}

//! Rendered comments and the fingerprints built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a comment is presented in the rendered page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentFormat {
    /// Signature shown inline at the end of the comment text
    #[default]
    Classic,
    /// Author and timestamp moved into a header above the text
    Reformatted,
}

/// A comment as displayed on the page, in document order.
///
/// This is the data a page parser hands to the engine; it is also the JSON
/// shape the CLI reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayedComment {
    /// Stable identity of the comment, if the page assigned one
    #[serde(default)]
    pub id: Option<String>,
    /// Author as displayed
    pub author: String,
    /// Timestamp string as displayed
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Parsed timestamp
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Headline of the enclosing section
    #[serde(default)]
    pub section_headline: Option<String>,
    /// Whether a heading immediately precedes the comment
    #[serde(default)]
    pub follows_heading: bool,
    /// Displayed text, including signature and controls
    pub text: String,
    /// Presentation capability
    #[serde(default)]
    pub format: CommentFormat,
}

/// Identity signals of a rendered comment.
///
/// Built on demand from the rendered state and never persisted across page
/// loads. Preceding fingerprints are most-recent-first and never carry
/// their own predecessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentFingerprint {
    /// Zero-based rank among all comments on the page
    pub ordinal_index: usize,
    pub author: String,
    pub timestamp: Option<String>,
    pub date: Option<DateTime<Utc>>,
    /// Up to two immediately preceding comments, most recent first
    pub preceding: Vec<CommentFingerprint>,
    pub follows_heading: bool,
    pub section_headline: Option<String>,
    /// Normalized text with boilerplate stripped
    pub text: String,
}

impl CommentFingerprint {
    /// Copy of this fingerprint without its predecessors
    pub fn identity_signal(&self) -> CommentFingerprint {
        CommentFingerprint {
            preceding: Vec::new(),
            ..self.clone()
        }
    }
}

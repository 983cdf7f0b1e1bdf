//! Comment lifecycle, visit records and change snapshots.

use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::revision::RevisionRef;

/// Lifecycle classification of a comment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Unchanged,
    New,
    Changed,
    ChangedSincePreviousVisit,
    Deleted,
}

impl Lifecycle {
    pub fn is_changed(&self) -> bool {
        matches!(self, Lifecycle::Changed | Lifecycle::ChangedSincePreviousVisit)
    }
}

/// The user's past visits to a page plus the current time.
///
/// Timestamps are Unix seconds; `visits` is ordered oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub visits: Vec<i64>,
    pub now: i64,
}

impl VisitRecord {
    pub fn new(visits: Vec<i64>, now: i64) -> Self {
        Self { visits, now }
    }

    /// The most recent visit before the current one
    pub fn previous_visit(&self) -> Option<DateTime<Utc>> {
        self.visits
            .iter()
            .rev()
            .find(|&&ts| ts <= self.now)
            .and_then(|&ts| Utc.timestamp_opt(ts, 0).single())
    }

    /// Whether this is the first recorded visit
    pub fn is_first_visit(&self) -> bool {
        self.previous_visit().is_none()
    }
}

/// Structural description of a rendered comment's content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentStructure {
    /// Block kinds of the comment's parts, in order (`p`, `ul`, `dl`, ...)
    pub tags: Vec<String>,
    /// Number of footnote references inside the comment
    #[serde(default)]
    pub footnotes: usize,
    /// Representations of interactive templates, in order
    #[serde(default)]
    pub interactive: Vec<String>,
}

/// A comment's content captured at one revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSnapshot {
    pub structure: CommentStructure,
    /// `sha256:` digest of the normalized content
    pub digest: String,
}

impl CommentSnapshot {
    /// Capture a snapshot, hashing whitespace-normalized content
    pub fn new(structure: CommentStructure, content: &str) -> Self {
        let normalized = content.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let digest = format!("sha256:{}", hex::encode(hasher.finalize()));

        Self { structure, digest }
    }
}

/// Result of comparing two snapshots of the same logical comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Content can be substituted in place
    pub patchable: bool,
    pub lifecycle: Lifecycle,
}

/// New/seen flags for a comment at page load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrival {
    pub is_new: bool,
    pub seen: bool,
}

/// Persistent state attached to a comment's stable ID
#[derive(Debug, Clone, Default)]
pub struct CommentState {
    pub id: String,
    lifecycle: Lifecycle,
    seen: bool,
    seen_before_changed: Option<bool>,
    adding_edit: OnceLock<RevisionRef>,
}

impl CommentState {
    pub fn new(id: impl Into<String>, arrival: Arrival) -> Self {
        Self {
            id: id.into(),
            lifecycle: if arrival.is_new {
                Lifecycle::New
            } else {
                Lifecycle::Unchanged
            },
            seen: arrival.seen,
            seen_before_changed: None,
            adding_edit: OnceLock::new(),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_seen(&self) -> bool {
        self.seen
    }

    /// Seen value cached when the comment was marked changed
    pub fn seen_before_changed(&self) -> Option<bool> {
        self.seen_before_changed
    }

    /// The user has looked at the comment
    pub fn mark_seen(&mut self) {
        self.seen = true;
    }

    /// Revision that added the comment, if already attributed
    pub fn adding_edit(&self) -> Option<&RevisionRef> {
        self.adding_edit.get()
    }

    /// Memoize the adding edit.
    ///
    /// Written at most once; later calls return the first stored revision.
    pub fn record_adding_edit(&self, revision: RevisionRef) -> &RevisionRef {
        self.adding_edit.get_or_init(|| revision)
    }

    pub(crate) fn transition(&mut self, next: Lifecycle) {
        match next {
            Lifecycle::Changed | Lifecycle::ChangedSincePreviousVisit => {
                if self.seen_before_changed.is_none() {
                    self.seen_before_changed = Some(self.seen);
                }
                self.seen = false;
            }
            Lifecycle::Unchanged => {
                if let Some(seen) = self.seen_before_changed.take() {
                    self.seen = seen;
                }
            }
            Lifecycle::New | Lifecycle::Deleted => {}
        }
        self.lifecycle = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revision(id: u64) -> RevisionRef {
        RevisionRef {
            id,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            user: None,
            comment: None,
        }
    }

    #[test]
    fn test_previous_visit_ignores_future_entries() {
        let record = VisitRecord::new(vec![100, 200, 900], 500);
        assert_eq!(record.previous_visit().unwrap().timestamp(), 200);
        assert!(VisitRecord::new(vec![], 500).is_first_visit());
    }

    #[test]
    fn test_snapshot_digest_ignores_whitespace() {
        let a = CommentSnapshot::new(CommentStructure::default(), "Hello  world\n");
        let b = CommentSnapshot::new(CommentStructure::default(), "Hello world");
        let c = CommentSnapshot::new(CommentStructure::default(), "Hello there");
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.digest, c.digest);
        assert!(a.digest.starts_with("sha256:"));
    }

    #[test]
    fn test_adding_edit_written_once() {
        let state = CommentState::new("c1", Arrival { is_new: false, seen: true });
        assert!(state.adding_edit().is_none());
        assert_eq!(state.record_adding_edit(revision(1)).id, 1);
        assert_eq!(state.record_adding_edit(revision(2)).id, 1);
        assert_eq!(state.adding_edit().unwrap().id, 1);
    }

    #[test]
    fn test_changed_then_reverted_restores_seen() {
        let mut state = CommentState::new("c1", Arrival { is_new: false, seen: true });
        state.transition(Lifecycle::Changed);
        assert!(!state.is_seen());
        assert_eq!(state.seen_before_changed(), Some(true));

        // A second change keeps the original cached value
        state.mark_seen();
        state.transition(Lifecycle::Changed);
        assert_eq!(state.seen_before_changed(), Some(true));

        state.transition(Lifecycle::Unchanged);
        assert!(state.is_seen());
        assert_eq!(state.seen_before_changed(), None);
        assert_eq!(state.lifecycle(), Lifecycle::Unchanged);
    }
}

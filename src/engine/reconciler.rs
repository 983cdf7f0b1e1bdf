//! Change reconciliation and seen-state bookkeeping.
//!
//! Two questions are answered here: can a changed comment be patched in
//! place, and which lifecycle state (and seen flag) does it carry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    Arrival, CommentSnapshot, CommentState, CommentStructure, Lifecycle, Verdict, VisitRecord,
};

/// Slack between minute-precision comment times and second-precision
/// visit times
pub const SEEN_TOLERANCE_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_tolerance")]
    pub tolerance_seconds: i64,
}

fn default_tolerance() -> i64 {
    SEEN_TOLERANCE_SECS
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tolerance_seconds: default_tolerance(),
        }
    }
}

/// Which revision the previous snapshot was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    /// The revision currently displayed
    Displayed,
    /// The revision the user saw on their previous visit
    PreviousVisit,
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self { config }
    }

    /// Whether `current` content can replace `previous` node by node
    pub fn is_patchable(previous: &CommentStructure, current: &CommentStructure) -> bool {
        previous.tags == current.tags
            && previous.footnotes == current.footnotes
            && previous.interactive == current.interactive
    }

    /// Compare two snapshots of the same logical comment.
    ///
    /// A missing previous snapshot means the comment appeared; a missing
    /// current one means it was deleted.
    pub fn reconcile(
        &self,
        previous: Option<&CommentSnapshot>,
        current: Option<&CommentSnapshot>,
        baseline: Baseline,
    ) -> Verdict {
        let verdict = match (previous, current) {
            (None, Some(_)) => Verdict {
                patchable: false,
                lifecycle: Lifecycle::New,
            },
            (Some(_), None) => Verdict {
                patchable: false,
                lifecycle: Lifecycle::Deleted,
            },
            (None, None) => Verdict {
                patchable: false,
                lifecycle: Lifecycle::Unchanged,
            },
            (Some(previous), Some(current)) => {
                let lifecycle = if previous.digest == current.digest {
                    Lifecycle::Unchanged
                } else if baseline == Baseline::PreviousVisit {
                    Lifecycle::ChangedSincePreviousVisit
                } else {
                    Lifecycle::Changed
                };
                Verdict {
                    patchable: Self::is_patchable(&previous.structure, &current.structure),
                    lifecycle,
                }
            }
        };

        debug!(lifecycle = ?verdict.lifecycle, patchable = verdict.patchable, "Reconciled comment");
        verdict
    }

    /// New/seen flags for a comment when the page loads.
    ///
    /// A comment is new when its time plus the tolerance is at or after the
    /// previous visit. It is seen when it is not new or is the
    /// current user's own, unless it was left unseen in an earlier session.
    pub fn classify_arrival(
        &self,
        date: Option<DateTime<Utc>>,
        author: &str,
        visits: &VisitRecord,
        current_user: Option<&str>,
        carried_unseen: bool,
    ) -> Arrival {
        let is_new = match (date, visits.previous_visit()) {
            (Some(date), Some(previous)) => {
                date + Duration::seconds(self.config.tolerance_seconds) >= previous
            }
            _ => false,
        };
        let own = current_user.is_some_and(|user| user == author);

        Arrival {
            is_new,
            seen: (!is_new || own) && !carried_unseen,
        }
    }

    /// Apply a lifecycle verdict or external trigger to a comment's state
    pub fn apply(&self, state: &mut CommentState, lifecycle: Lifecycle) {
        debug!(comment = %state.id, from = ?state.lifecycle(), to = ?lifecycle, "Lifecycle transition");
        state.transition(lifecycle);
    }
}

//! Attributing a comment to the revision that added it.
//!
//! Each revision's diff is reduced to its added, non-heading lines. The
//! word overlap is the better of the whole added text and the best single
//! fragment, so an edit adding several unrelated comments isn't penalised.
//! Ties are never broken by guessing: equal top matches are ambiguous.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::markup;
use crate::adapters::MarkupRenderer;
use crate::domain::{
    Attribution, CommentFingerprint, CommentState, DiffBody, DiffLineKind, DiffMatch, RevisionDiff,
};

const MINUTE_MS: i64 = 60_000;

/// Diff scoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Fragments with nested markup are re-rendered when the overlap is
    /// below this value
    #[serde(default = "default_rerender_below")]
    pub rerender_below: f64,
}

fn default_rerender_below() -> f64 {
    1.0
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            rerender_below: default_rerender_below(),
        }
    }
}

fn added_cell_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<td[^>]*class="[^"]*\bdiff-addedline\b[^"]*"[^>]*>(.*?)</td>"#)
            .expect("valid diff cell regex")
    })
}

fn html_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid html tag regex"))
}

/// Added lines of a diff, excluding headings and blank lines
pub fn added_fragments(diff: &DiffBody) -> Vec<String> {
    let lines: Vec<String> = match diff {
        DiffBody::Html(html) => added_cell_regex()
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|cell| markup::decode_entities(&html_tag_regex().replace_all(cell.as_str(), "")))
            .collect(),
        DiffBody::Lines(lines) => lines
            .iter()
            .filter(|line| line.kind == DiffLineKind::Added)
            .map(|line| line.text.clone())
            .collect(),
    };

    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty() && !markup::is_heading_line(line))
        .collect()
}

fn overlap_of(text: &str, fragments: &[String]) -> f64 {
    let whole = markup::word_overlap(text, &fragments.join("\n"));
    fragments
        .iter()
        .map(|fragment| markup::word_overlap(text, fragment))
        .fold(whole, f64::max)
}

/// Scores revision diffs against fingerprints
#[derive(Debug, Clone, Default)]
pub struct DiffMatcher {
    config: DiffConfig,
}

impl DiffMatcher {
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// Score one diff on its raw added text
    pub fn score(&self, fingerprint: &CommentFingerprint, diff: &RevisionDiff) -> DiffMatch {
        let fragments = added_fragments(&diff.diff);
        DiffMatch {
            revision: diff.revision.clone(),
            word_overlap: overlap_of(&fingerprint.text, &fragments),
            date_proximity_ms: date_proximity_ms(fingerprint, diff),
        }
    }

    /// Score every diff, re-rendering markup-heavy fragments when the raw
    /// overlap is low and a renderer is available
    pub async fn attribute(
        &self,
        fingerprint: &CommentFingerprint,
        diffs: &[RevisionDiff],
        renderer: Option<&dyn MarkupRenderer>,
    ) -> Vec<DiffMatch> {
        let mut matches = Vec::with_capacity(diffs.len());

        for diff in diffs {
            let mut scored = self.score(fingerprint, diff);

            if let Some(renderer) = renderer {
                if scored.word_overlap < self.config.rerender_below {
                    let mut fragments = added_fragments(&diff.diff);
                    let mut rendered_any = false;
                    for fragment in fragments.iter_mut() {
                        if !markup::contains_nested_markup(fragment) {
                            continue;
                        }
                        match renderer.render(fragment).await {
                            Ok(text) => {
                                *fragment = text;
                                rendered_any = true;
                            }
                            Err(e) => {
                                warn!(revision = diff.revision.id, "Scoring raw fragment: {}", e);
                            }
                        }
                    }
                    if rendered_any {
                        scored.word_overlap = overlap_of(&fingerprint.text, &fragments);
                    }
                }
            }

            debug!(
                revision = scored.revision.id,
                overlap = scored.word_overlap,
                proximity_ms = scored.date_proximity_ms,
                "Scored revision"
            );
            matches.push(scored);
        }

        matches
    }

    /// Pick the single best revision, or `Ambiguous`
    pub fn pick_best(matches: &[DiffMatch]) -> Attribution {
        let mut ranked: Vec<&DiffMatch> = matches.iter().collect();
        ranked.sort_by(|a, b| compare(a, b));

        match ranked.as_slice() {
            [] => Attribution::Ambiguous,
            [first, second, ..] if compare(first, second) == Ordering::Equal => {
                debug!(revision = first.revision.id, "Top revisions tie");
                Attribution::Ambiguous
            }
            [first, ..] => Attribution::Revision(first.revision.clone()),
        }
    }

    /// Attribute a comment, memoizing the result on its state
    pub async fn find_adding_edit(
        &self,
        fingerprint: &CommentFingerprint,
        diffs: &[RevisionDiff],
        renderer: Option<&dyn MarkupRenderer>,
        state: &CommentState,
    ) -> Attribution {
        if let Some(revision) = state.adding_edit() {
            return Attribution::Revision(revision.clone());
        }

        let matches = self.attribute(fingerprint, diffs, renderer).await;
        match Self::pick_best(&matches) {
            Attribution::Revision(revision) => {
                let stored = state.record_adding_edit(revision);
                info!(comment = %state.id, revision = stored.id, "Found adding edit");
                Attribution::Revision(stored.clone())
            }
            Attribution::Ambiguous => Attribution::Ambiguous,
        }
    }
}

/// Higher overlap first, then closer in time
fn compare(a: &DiffMatch, b: &DiffMatch) -> Ordering {
    b.word_overlap
        .total_cmp(&a.word_overlap)
        .then(a.date_proximity_ms.cmp(&b.date_proximity_ms))
}

/// Distance between comment and revision time, truncated to whole minutes
fn date_proximity_ms(fingerprint: &CommentFingerprint, diff: &RevisionDiff) -> u64 {
    let Some(date) = fingerprint.date else {
        return u64::MAX;
    };
    let comment_minute = date.timestamp_millis().div_euclid(MINUTE_MS);
    let revision_minute = diff.revision.timestamp.timestamp_millis().div_euclid(MINUTE_MS);
    (comment_minute - revision_minute).unsigned_abs() * MINUTE_MS as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DiffLine, RevisionRef};
    use chrono::{TimeZone, Utc};

    fn revision(id: u64, minute: u32, second: u32) -> RevisionRef {
        RevisionRef {
            id,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, second).unwrap(),
            user: None,
            comment: None,
        }
    }

    fn diff_match(id: u64, overlap: f64, proximity: u64) -> DiffMatch {
        DiffMatch {
            revision: revision(id, 0, 0),
            word_overlap: overlap,
            date_proximity_ms: proximity,
        }
    }

    #[test]
    fn test_added_fragments_from_html() {
        let html = r#"<tr><td class="diff-marker" data-marker="+"></td><td class="diff-addedline diff-side-added"><div>New &lt;b&gt;point&lt;/b&gt; here</div></td></tr>
<tr><td class="diff-context diff-side-deleted"><div>old context</div></td></tr>
<tr><td class="diff-addedline"><div>== Heading ==</div></td></tr>
<tr><td class="diff-deletedline"><div>removed text</div></td></tr>"#;
        let fragments = added_fragments(&DiffBody::Html(html.to_string()));
        assert_eq!(fragments, vec!["New <b>point</b> here".to_string()]);
    }

    #[test]
    fn test_added_fragments_from_lines() {
        let body = DiffBody::Lines(vec![
            DiffLine { kind: DiffLineKind::Context, text: "ctx".to_string() },
            DiffLine { kind: DiffLineKind::Added, text: "added".to_string() },
            DiffLine { kind: DiffLineKind::Removed, text: "gone".to_string() },
            DiffLine { kind: DiffLineKind::Added, text: "=== H ===".to_string() },
        ]);
        assert_eq!(added_fragments(&body), vec!["added".to_string()]);
    }

    #[test]
    fn test_proximity_truncates_seconds() {
        let fp = CommentFingerprint {
            ordinal_index: 0,
            author: "A".to_string(),
            timestamp: None,
            date: Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
            preceding: Vec::new(),
            follows_heading: false,
            section_headline: None,
            text: "text".to_string(),
        };
        let same_minute = RevisionDiff {
            revision: revision(1, 0, 59),
            diff: DiffBody::Lines(Vec::new()),
        };
        let later = RevisionDiff {
            revision: revision(2, 2, 30),
            diff: DiffBody::Lines(Vec::new()),
        };
        assert_eq!(date_proximity_ms(&fp, &same_minute), 0);
        assert_eq!(date_proximity_ms(&fp, &later), 2 * 60_000);
    }

    #[test]
    fn test_pick_best_orders_by_overlap_then_time() {
        let matches = vec![
            diff_match(1, 0.5, 0),
            diff_match(2, 0.9, 120_000),
            diff_match(3, 0.9, 60_000),
        ];
        assert_eq!(DiffMatcher::pick_best(&matches), Attribution::Revision(revision(3, 0, 0)));
    }

    #[test]
    fn test_pick_best_ambiguous() {
        assert_eq!(DiffMatcher::pick_best(&[]), Attribution::Ambiguous);
        let tied = vec![
            diff_match(1, 0.2, 0),
            diff_match(2, 0.8, 60_000),
            diff_match(3, 0.8, 60_000),
        ];
        assert_eq!(DiffMatcher::pick_best(&tied), Attribution::Ambiguous);
    }
}

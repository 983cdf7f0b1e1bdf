//! Locating a rendered comment inside wikitext source.
//!
//! Candidates are signatures whose author and timestamp are compatible with
//! the fingerprint. Each is scored on four signals and the best one above
//! [`MATCH_THRESHOLD`] wins:
//!
//! - **Position**: the signatures right before it agree with the
//!   fingerprint's preceding comments, and its ordinal equals the comment's
//! - **Text**: word overlap between the comment text and the source text
//!   between the previous signature and this one
//! - **Heading**: both do or don't directly follow a heading
//! - **Section**: the nearest preceding heading has the same headline
//!
//! Equal top scores resolve to the candidate that appears first in source.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::extractor::SignatureExtractor;
use super::fingerprint::PRECEDING_DEPTH;
use super::markup::{self, Heading};
use crate::domain::{CommentFingerprint, SignatureCandidate};
use crate::error::EngineError;

/// Minimum total score for a candidate to count as a match
pub const MATCH_THRESHOLD: f64 = 2.5;

/// Scoring weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Full agreement of preceding signatures
    #[serde(default = "default_position_weight")]
    pub position_weight: f64,
    /// Ordinal of the signature equals the comment's index
    #[serde(default = "default_ordinal_weight")]
    pub ordinal_weight: f64,
    /// Full word overlap
    #[serde(default = "default_text_weight")]
    pub text_weight: f64,
    /// Follows-heading flags agree
    #[serde(default = "default_follows_heading_weight")]
    pub follows_heading_weight: f64,
    /// Section headlines agree
    #[serde(default = "default_section_weight")]
    pub section_weight: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_position_weight() -> f64 {
    2.0
}
fn default_ordinal_weight() -> f64 {
    0.5
}
fn default_text_weight() -> f64 {
    1.0
}
fn default_follows_heading_weight() -> f64 {
    0.5
}
fn default_section_weight() -> f64 {
    1.0
}
fn default_threshold() -> f64 {
    MATCH_THRESHOLD
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            position_weight: default_position_weight(),
            ordinal_weight: default_ordinal_weight(),
            text_weight: default_text_weight(),
            follows_heading_weight: default_follows_heading_weight(),
            section_weight: default_section_weight(),
            threshold: default_threshold(),
        }
    }
}

/// Weighted contribution of each signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub position_agreement: f64,
    pub text_overlap: f64,
    pub heading_agreement: f64,
    pub section_agreement: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.position_agreement + self.text_overlap + self.heading_agreement + self.section_agreement
    }
}

/// A scored signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub signature: SignatureCandidate,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// Further signatures continuing the same comment on its last line
    #[serde(default)]
    pub extra_signatures: Vec<SignatureCandidate>,
}

impl MatchCandidate {
    /// `[line_start, signature_end)` of the matched comment
    pub fn span(&self) -> (usize, usize) {
        self.signature.span()
    }

    /// End offset including co-signatures
    pub fn full_end_offset(&self) -> usize {
        self.extra_signatures
            .last()
            .map_or(self.signature.signature_end_offset, |s| s.signature_end_offset)
    }

    /// Indentation for a reply to this comment
    pub fn reply_indentation(&self) -> String {
        format!("{}:", self.signature.indentation)
    }
}

/// Outcome of a locate request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "match", rename_all = "snake_case")]
pub enum Location {
    Found(MatchCandidate),
    /// The comment's source span is currently unknowable
    NotFound,
}

impl Location {
    pub fn is_found(&self) -> bool {
        matches!(self, Location::Found(_))
    }

    /// Convert into a result, mapping `NotFound` to `LocateComment`
    pub fn into_result(self) -> Result<MatchCandidate, EngineError> {
        match self {
            Location::Found(candidate) => Ok(candidate),
            Location::NotFound => Err(EngineError::LocateComment),
        }
    }
}

/// Matches fingerprints against source text
#[derive(Debug, Clone, Default)]
pub struct SourceMatcher {
    config: MatcherConfig,
    extractor: SignatureExtractor,
}

impl SourceMatcher {
    pub fn new(config: MatcherConfig, extractor: SignatureExtractor) -> Self {
        Self { config, extractor }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Locate one comment in `source`
    pub fn locate(
        &self,
        fingerprint: &CommentFingerprint,
        source: &str,
    ) -> Result<Location, EngineError> {
        let signatures = self.extractor.extract(source);
        let headings = markup::headings(source);
        self.locate_among(fingerprint, source, &signatures, &headings)
    }

    /// Locate many comments, scanning the source once
    pub fn locate_all(
        &self,
        fingerprints: &[CommentFingerprint],
        source: &str,
    ) -> Result<Vec<Location>, EngineError> {
        let signatures = self.extractor.extract(source);
        let headings = markup::headings(source);
        fingerprints
            .iter()
            .map(|fp| self.locate_among(fp, source, &signatures, &headings))
            .collect()
    }

    fn locate_among(
        &self,
        fingerprint: &CommentFingerprint,
        source: &str,
        signatures: &[SignatureCandidate],
        headings: &[Heading],
    ) -> Result<Location, EngineError> {
        let mut best: Option<(usize, ScoreBreakdown, f64)> = None;

        for (index, signature) in signatures.iter().enumerate() {
            check_bounds(signature, source.len())?;
            if !signature.accepts(&fingerprint.author, fingerprint.timestamp.as_deref()) {
                continue;
            }

            let breakdown = self.score(fingerprint, source, signatures, headings, index);
            let score = breakdown.total();
            debug!(
                ordinal = signature.ordinal,
                score,
                position = breakdown.position_agreement,
                text = breakdown.text_overlap,
                "Scored signature candidate"
            );

            if best.as_ref().map_or(true, |(_, _, top)| score > *top) {
                best = Some((index, breakdown, score));
            }
        }

        match best {
            Some((index, breakdown, score)) if score > self.config.threshold => {
                info!(
                    author = %fingerprint.author,
                    ordinal = index,
                    score,
                    "Located comment in source"
                );
                Ok(Location::Found(MatchCandidate {
                    signature: signatures[index].clone(),
                    score,
                    breakdown,
                    extra_signatures: continuation_signatures(source, signatures, index),
                }))
            }
            _ => {
                debug!(author = %fingerprint.author, "No candidate above threshold");
                Ok(Location::NotFound)
            }
        }
    }

    fn score(
        &self,
        fingerprint: &CommentFingerprint,
        source: &str,
        signatures: &[SignatureCandidate],
        headings: &[Heading],
        index: usize,
    ) -> ScoreBreakdown {
        let signature = &signatures[index];
        let previous_end = index
            .checked_sub(1)
            .map_or(0, |i| signatures[i].signature_end_offset);

        // Preceding signatures, most recent first
        let slots = fingerprint.preceding.len().max(index.min(PRECEDING_DEPTH));
        let preceding_ratio = if slots == 0 {
            1.0
        } else {
            let agreeing = (0..slots)
                .filter(|&k| {
                    let before = index.checked_sub(k + 1).map(|j| &signatures[j]);
                    match (fingerprint.preceding.get(k), before) {
                        (Some(expected), Some(found)) => {
                            found.accepts(&expected.author, expected.timestamp.as_deref())
                        }
                        _ => false,
                    }
                })
                .count();
            agreeing as f64 / slots as f64
        };
        let mut position_agreement = preceding_ratio * self.config.position_weight;
        if signature.ordinal == fingerprint.ordinal_index {
            position_agreement += self.config.ordinal_weight;
        }

        let body = comment_body(source, headings, previous_end, signature.signature_start_offset);
        let text_overlap = markup::word_overlap(&fingerprint.text, &body) * self.config.text_weight;

        let follows_heading = headings
            .iter()
            .any(|h| h.start >= previous_end && h.end <= signature.line_start_offset);
        let heading_agreement = if follows_heading == fingerprint.follows_heading {
            self.config.follows_heading_weight
        } else {
            0.0
        };

        let section = headings
            .iter()
            .rev()
            .find(|h| h.end <= signature.line_start_offset)
            .map(|h| h.text.as_str());
        let section_agreement = if section == fingerprint.section_headline.as_deref() {
            self.config.section_weight
        } else {
            0.0
        };

        ScoreBreakdown {
            position_agreement,
            text_overlap,
            heading_agreement,
            section_agreement,
        }
    }
}

fn check_bounds(signature: &SignatureCandidate, len: usize) -> Result<(), EngineError> {
    if signature.signature_end_offset > len {
        return Err(EngineError::OffsetOutOfBounds {
            offset: signature.signature_end_offset,
            len,
        });
    }
    if signature.line_start_offset > signature.signature_end_offset {
        return Err(EngineError::OffsetOutOfBounds {
            offset: signature.line_start_offset,
            len: signature.signature_end_offset,
        });
    }
    Ok(())
}

/// Source text between two offsets, heading lines removed
fn comment_body(source: &str, headings: &[Heading], start: usize, end: usize) -> String {
    let start = start.min(end);
    let mut body = String::with_capacity(end - start);
    let mut cursor = start;
    for heading in headings.iter().filter(|h| h.start >= start && h.end <= end) {
        body.push_str(&source[cursor..heading.start]);
        cursor = heading.end;
    }
    body.push_str(&source[cursor..end]);
    body
}

/// Signatures following `index` on the same line
fn continuation_signatures(
    source: &str,
    signatures: &[SignatureCandidate],
    index: usize,
) -> Vec<SignatureCandidate> {
    let mut extra = Vec::new();
    let mut end = signatures[index].signature_end_offset;
    for next in &signatures[index + 1..] {
        if next.signature_start_offset < end || source[end..next.signature_start_offset].contains('\n') {
            break;
        }
        end = next.signature_end_offset;
        extra.push(next.clone());
    }
    extra
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(author: &str, timestamp: &str, text: &str) -> CommentFingerprint {
        CommentFingerprint {
            ordinal_index: 0,
            author: author.to_string(),
            timestamp: Some(timestamp.to_string()),
            date: None,
            preceding: Vec::new(),
            follows_heading: false,
            section_headline: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_locate_single_comment() {
        let source = "Hello. [[User:Alice|Alice]] 10:00, 1 January 2024 (UTC)";
        let fp = fingerprint("Alice", "10:00, 1 January 2024 (UTC)", "Hello.");
        let found = SourceMatcher::default().locate(&fp, source).unwrap().into_result().unwrap();
        assert_eq!(found.span(), (0, source.len()));
        assert!(found.score > MATCH_THRESHOLD);
        assert_eq!(found.reply_indentation(), ":");
    }

    #[test]
    fn test_wrong_author_not_found() {
        let source = "Hello. [[User:Alice|Alice]] 10:00, 1 January 2024 (UTC)";
        let fp = fingerprint("Mallory", "10:00, 1 January 2024 (UTC)", "Hello.");
        let location = SourceMatcher::default().locate(&fp, source).unwrap();
        assert_eq!(location, Location::NotFound);
        assert_eq!(location.into_result(), Err(EngineError::LocateComment));
    }

    #[test]
    fn test_below_threshold_not_found() {
        let source = "Hello. [[User:Alice|Alice]] 10:00, 1 January 2024 (UTC)";
        let matcher = SourceMatcher::new(
            MatcherConfig {
                threshold: 100.0,
                ..Default::default()
            },
            SignatureExtractor::default(),
        );
        let fp = fingerprint("Alice", "10:00, 1 January 2024 (UTC)", "Hello.");
        assert!(!matcher.locate(&fp, source).unwrap().is_found());
    }

    #[test]
    fn test_co_signatures_attached() {
        let source = "Joint. [[User:Ann|Ann]] 10:00, 1 January 2024 (UTC) [[User:Ben|Ben]] 10:05, 1 January 2024 (UTC)\nNext. [[User:Cid|Cid]] 11:00, 1 January 2024 (UTC)";
        let fp = fingerprint("Ann", "10:00, 1 January 2024 (UTC)", "Joint.");
        let found = SourceMatcher::default().locate(&fp, source).unwrap().into_result().unwrap();
        assert_eq!(found.extra_signatures.len(), 1);
        assert_eq!(found.extra_signatures[0].author.name(), Some("Ben"));
        assert_eq!(&source[found.full_end_offset() - 5..found.full_end_offset()], "(UTC)");
        assert!(found.full_end_offset() < source.find("\nNext").unwrap() + 1);
    }

    #[test]
    fn test_text_overlap_monotonic() {
        let source = "apples oranges pears plums [[User:Alice|Alice]] 10:00, 1 January 2024 (UTC)";
        let matcher = SourceMatcher::default();
        let mut previous = 0.0;
        for text in ["kiwi", "apples kiwi", "apples oranges", "apples oranges pears plums"] {
            let fp = fingerprint("Alice", "10:00, 1 January 2024 (UTC)", text);
            let found = matcher.locate(&fp, source).unwrap().into_result().unwrap();
            assert!(found.score >= previous);
            previous = found.score;
        }
    }

    const TS: &str = "10:00, 1 January 2024 (UTC)";

    /// Fingerprint whose position signals agree with no candidate
    fn detached(text: &str, section: Option<&str>, follows_heading: bool) -> CommentFingerprint {
        CommentFingerprint {
            ordinal_index: 9,
            preceding: vec![fingerprint("Zed", TS, "elsewhere")],
            follows_heading,
            section_headline: section.map(str::to_string),
            ..fingerprint("Bob", TS, text)
        }
    }

    fn lenient() -> SourceMatcher {
        SourceMatcher::new(
            MatcherConfig {
                threshold: 1.0,
                ..Default::default()
            },
            SignatureExtractor::default(),
        )
    }

    #[test]
    fn test_equal_scores_pick_first_in_source() {
        let source = format!(
            "Same words. [[User:Bob|Bob]] {ts}\nSame words. [[User:Bob|Bob]] {ts}",
            ts = TS
        );
        let fp = detached("Same words.", None, false);
        let found = lenient().locate(&fp, &source).unwrap().into_result().unwrap();
        assert_eq!(found.signature.ordinal, 0);
        assert_eq!(found.breakdown.position_agreement, 0.0);
    }

    #[test]
    fn test_section_headline_decides() {
        let source = format!(
            "== Apples ==\nI agree with this. [[User:Bob|Bob]] {ts}\n== Pears ==\nI agree with this. [[User:Bob|Bob]] {ts}\n",
            ts = TS
        );
        let matcher = lenient();

        let pears = detached("I agree with this.", Some("Pears"), true);
        let found = matcher.locate(&pears, &source).unwrap().into_result().unwrap();
        assert_eq!(found.signature.ordinal, 1);

        let apples = detached("I agree with this.", Some("Apples"), true);
        let found = matcher.locate(&apples, &source).unwrap().into_result().unwrap();
        assert_eq!(found.signature.ordinal, 0);
    }

    #[test]
    fn test_follows_heading_decides() {
        let source = format!(
            "== Topic ==\nSame. [[User:Bob|Bob]] {ts}\nSame. [[User:Bob|Bob]] {ts}\n",
            ts = TS
        );
        let fp = detached("Same.", Some("Topic"), false);
        let found = lenient().locate(&fp, &source).unwrap().into_result().unwrap();
        assert_eq!(found.signature.ordinal, 1);

        let fp = detached("Same.", Some("Topic"), true);
        let found = lenient().locate(&fp, &source).unwrap().into_result().unwrap();
        assert_eq!(found.signature.ordinal, 0);
    }
}

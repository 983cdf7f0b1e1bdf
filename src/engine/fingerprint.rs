//! Fingerprints of rendered comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extractor::SignatureExtractor;
use super::markup;
use crate::domain::{CommentFingerprint, CommentFormat, DisplayedComment};
use crate::error::EngineError;

/// Number of preceding comments carried in a fingerprint
pub const PRECEDING_DEPTH: usize = 2;

/// Bytes allowed between the author name and the timestamp of an inline
/// signature
const SIGNATURE_SPAN: usize = 120;

/// A comment as exposed by the rendered page
pub trait RenderedComment {
    fn author(&self) -> &str;
    fn timestamp(&self) -> Option<&str>;
    fn date(&self) -> Option<DateTime<Utc>>;
    fn section_headline(&self) -> Option<&str>;
    fn follows_heading(&self) -> bool;
    /// Displayed text, possibly with signature and controls
    fn displayed_text(&self) -> &str;
    fn format(&self) -> CommentFormat;
}

impl RenderedComment for DisplayedComment {
    fn author(&self) -> &str {
        &self.author
    }

    fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    fn section_headline(&self) -> Option<&str> {
        self.section_headline.as_deref()
    }

    fn follows_heading(&self) -> bool {
        self.follows_heading
    }

    fn displayed_text(&self) -> &str {
        &self.text
    }

    fn format(&self) -> CommentFormat {
        self.format
    }
}

/// Boilerplate removed from rendered text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// Labels of interactive controls appended to comments
    #[serde(default = "default_ui_controls")]
    pub ui_controls: Vec<String>,

    /// Notes inserted next to edited comments
    #[serde(default = "default_change_notes")]
    pub change_notes: Vec<String>,
}

fn default_ui_controls() -> Vec<String> {
    ["Reply", "Edit", "Thank", "Copy link", "Go to parent"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_change_notes() -> Vec<String> {
    ["(edited)", "(changed)", "(deleted)"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            ui_controls: default_ui_controls(),
            change_notes: default_change_notes(),
        }
    }
}

/// Builds fingerprints from rendered comments
#[derive(Debug, Clone, Default)]
pub struct FingerprintBuilder {
    config: FingerprintConfig,
    extractor: SignatureExtractor,
}

impl FingerprintBuilder {
    pub fn new(config: FingerprintConfig, extractor: SignatureExtractor) -> Self {
        Self { config, extractor }
    }

    /// Comment text with signature, controls and change notes removed
    pub fn normalized_text<C: RenderedComment>(&self, comment: &C) -> String {
        let mut text = comment.displayed_text().to_string();
        for note in &self.config.change_notes {
            text = text.replace(note.as_str(), " ");
        }

        loop {
            let trimmed =
                text.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | '|'));
            let stripped = self
                .config
                .ui_controls
                .iter()
                .filter(|control| !control.is_empty())
                .find_map(|control| trimmed.strip_suffix(control.as_str()));
            match stripped {
                Some(rest) => text = rest.to_string(),
                None => {
                    text = trimmed.to_string();
                    break;
                }
            }
        }

        if comment.format() == CommentFormat::Classic {
            text = strip_inline_signature(&text, comment.author(), comment.timestamp());
        }

        markup::normalize_whitespace(&text)
    }

    /// Identity signals of one comment, without predecessors
    fn identity<C: RenderedComment>(&self, comment: &C, index: usize) -> CommentFingerprint {
        let timestamp = comment.timestamp().map(str::trim).filter(|ts| !ts.is_empty());
        let date = comment
            .date()
            .or_else(|| timestamp.and_then(|ts| self.extractor.parse_date(ts)));

        CommentFingerprint {
            ordinal_index: index,
            author: comment.author().to_string(),
            timestamp: timestamp.map(str::to_string),
            date,
            preceding: Vec::new(),
            follows_heading: comment.follows_heading(),
            section_headline: comment.section_headline().map(markup::normalize_whitespace),
            text: self.normalized_text(comment),
        }
    }

    /// Build the fingerprint of `comments[index]`
    pub fn build<C: RenderedComment>(
        &self,
        comments: &[C],
        index: usize,
    ) -> Result<CommentFingerprint, EngineError> {
        let comment = comments.get(index).ok_or(EngineError::CommentIndex {
            index,
            len: comments.len(),
        })?;

        let mut fingerprint = self.identity(comment, index);
        fingerprint.preceding = (1..=PRECEDING_DEPTH)
            .filter_map(|back| index.checked_sub(back))
            .map(|i| self.identity(&comments[i], i))
            .collect();

        Ok(fingerprint)
    }

    /// Fingerprints of every comment, in document order
    pub fn build_all<C: RenderedComment>(&self, comments: &[C]) -> Vec<CommentFingerprint> {
        let identities: Vec<CommentFingerprint> = comments
            .iter()
            .enumerate()
            .map(|(i, c)| self.identity(c, i))
            .collect();

        identities
            .iter()
            .enumerate()
            .map(|(i, identity)| CommentFingerprint {
                preceding: (1..=PRECEDING_DEPTH)
                    .filter_map(|back| i.checked_sub(back))
                    .map(|j| identities[j].clone())
                    .collect(),
                ..identity.clone()
            })
            .collect()
    }
}

/// Cut an inline "Author (talk) timestamp" tail off the text
fn strip_inline_signature(text: &str, author: &str, timestamp: Option<&str>) -> String {
    let Some(timestamp) = timestamp.filter(|ts| !ts.is_empty()) else {
        return text.to_string();
    };
    let Some(ts_pos) = text.rfind(timestamp) else {
        return text.to_string();
    };

    let mut cut = ts_pos;
    if let Some(author_pos) = text[..ts_pos].rfind(author) {
        if ts_pos - author_pos <= SIGNATURE_SPAN {
            cut = author_pos;
        }
    }

    text[..cut]
        .trim_end_matches(['-', '\u{2014}', '\u{2013}', ' '])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(author: &str, timestamp: &str, text: &str) -> DisplayedComment {
        DisplayedComment {
            id: None,
            author: author.to_string(),
            timestamp: Some(timestamp.to_string()),
            date: None,
            section_headline: Some("Topic".to_string()),
            follows_heading: false,
            text: text.to_string(),
            format: CommentFormat::Classic,
        }
    }

    #[test]
    fn test_normalized_text_strips_boilerplate() {
        let builder = FingerprintBuilder::default();
        let c = comment(
            "Alice",
            "10:00, 1 January 2024 (UTC)",
            "I agree   with this. (edited) -- Alice (talk) 10:00, 1 January 2024 (UTC) [Reply]",
        );
        assert_eq!(builder.normalized_text(&c), "I agree with this.");
    }

    #[test]
    fn test_reformatted_keeps_text() {
        let builder = FingerprintBuilder::default();
        let mut c = comment("Alice", "10:00, 1 January 2024 (UTC)", "Alice is right here.");
        c.format = CommentFormat::Reformatted;
        assert_eq!(builder.normalized_text(&c), "Alice is right here.");
    }

    #[test]
    fn test_build_collects_two_predecessors() {
        let builder = FingerprintBuilder::default();
        let comments = vec![
            comment("A", "10:00, 1 January 2024 (UTC)", "one"),
            comment("B", "10:01, 1 January 2024 (UTC)", "two"),
            comment("C", "10:02, 1 January 2024 (UTC)", "three"),
            comment("D", "10:03, 1 January 2024 (UTC)", "four"),
        ];

        let fp = builder.build(&comments, 3).unwrap();
        assert_eq!(fp.ordinal_index, 3);
        assert_eq!(fp.preceding.len(), 2);
        assert_eq!(fp.preceding[0].author, "C");
        assert_eq!(fp.preceding[1].author, "B");
        assert!(fp.preceding[0].preceding.is_empty());
        assert!(fp.date.is_some());

        let first = builder.build(&comments, 0).unwrap();
        assert!(first.preceding.is_empty());

        assert_eq!(builder.build_all(&comments)[3], fp);
        assert!(matches!(
            builder.build(&comments, 9),
            Err(EngineError::CommentIndex { index: 9, len: 4 })
        ));
    }

    #[test]
    fn test_blank_timestamp_becomes_none() {
        let builder = FingerprintBuilder::default();
        let comments = vec![comment("A", "  ", "text")];
        let fp = builder.build(&comments, 0).unwrap();
        assert_eq!(fp.timestamp, None);
        assert_eq!(fp.date, None);
    }
}

//! Signature extraction from wikitext source.
//!
//! Scans source text for user signatures (a user link followed by a
//! timestamp) and `{{unsigned}}`-style templates, producing candidates in
//! left-to-right order. Extraction is total: a construct that doesn't fit
//! the patterns is skipped, never reported as an error.

use std::ops::Range;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::markup;
use crate::domain::{Author, SignatureCandidate};
use crate::error::EngineError;

const DEFAULT_TIMESTAMP_PATTERN: &str = r"(?P<date>\d{1,2}:\d{2}, \d{1,2} (?:January|February|March|April|May|June|July|August|September|October|November|December) \d{4})(?P<tz> \([A-Z]{2,5}\))?";

/// Patterns used to recognize signatures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Timestamp regex; must capture the date part as `date`, optionally a
    /// trailing timezone as `tz`
    #[serde(default = "default_timestamp_pattern")]
    pub timestamp_pattern: String,

    /// chrono format for the `date` capture
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Namespaces whose links identify an author
    #[serde(default = "default_user_namespaces")]
    pub user_namespaces: Vec<String>,

    /// Template names marking an unsigned comment
    #[serde(default = "default_unsigned_templates")]
    pub unsigned_templates: Vec<String>,

    /// Maximum bytes between an author link and its timestamp
    #[serde(default = "default_max_signature_length")]
    pub max_signature_length: usize,
}

fn default_timestamp_pattern() -> String {
    DEFAULT_TIMESTAMP_PATTERN.to_string()
}
fn default_date_format() -> String {
    "%H:%M, %d %B %Y".to_string()
}
fn default_user_namespaces() -> Vec<String> {
    vec![
        "User".to_string(),
        "User talk".to_string(),
        "Special:Contributions".to_string(),
    ]
}
fn default_unsigned_templates() -> Vec<String> {
    vec![
        "unsigned".to_string(),
        "unsigned2".to_string(),
        "unsigned IP".to_string(),
        "unsigned IP2".to_string(),
        "unsignedIP".to_string(),
        "unsignedIP2".to_string(),
    ]
}
fn default_max_signature_length() -> usize {
    255
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timestamp_pattern: default_timestamp_pattern(),
            date_format: default_date_format(),
            user_namespaces: default_user_namespaces(),
            unsigned_templates: default_unsigned_templates(),
            max_signature_length: default_max_signature_length(),
        }
    }
}

/// A timestamp found in text
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampMatch {
    pub range: Range<usize>,
    /// Full match, timezone included
    pub raw: String,
    pub date: Option<DateTime<Utc>>,
}

/// A signature before line boundaries are assigned
struct RawSignature {
    author: Author,
    timestamp: Option<TimestampMatch>,
    start: usize,
    end: usize,
}

/// Compiled signature patterns
#[derive(Debug, Clone)]
pub struct SignatureExtractor {
    config: ExtractorConfig,
    timestamp_re: Regex,
    user_link_re: Regex,
    unsigned_re: Regex,
}

fn compile(pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern).map_err(|e| EngineError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Turn a page name into a pattern accepting spaces or underscores
fn name_pattern(name: &str) -> String {
    name.split([' ', '_'])
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[ _]+")
}

impl Default for SignatureExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default()).expect("built-in signature patterns compile")
    }
}

impl SignatureExtractor {
    /// Compile the configured patterns
    pub fn new(config: ExtractorConfig) -> Result<Self, EngineError> {
        let timestamp_re = compile(&config.timestamp_pattern)?;
        if timestamp_re.capture_names().flatten().all(|name| name != "date") {
            return Err(EngineError::InvalidPattern {
                pattern: config.timestamp_pattern.clone(),
                reason: "missing named group 'date'".to_string(),
            });
        }

        let namespaces = config
            .user_namespaces
            .iter()
            .map(|ns| name_pattern(ns))
            .collect::<Vec<_>>()
            .join("|");
        let user_link_re = compile(&format!(
            r"\[\[:?[ _]*(?i:{})[ _]*[:/][ _]*(?P<name>[^|\]\[#/\n]+?)[ _]*(?:[|#/][^\]\n]*)?\]\]",
            namespaces
        ))?;

        let templates = config
            .unsigned_templates
            .iter()
            .map(|t| name_pattern(t))
            .collect::<Vec<_>>()
            .join("|");
        let unsigned_re = compile(&format!(
            r"\{{\{{[ _]*(?i:{})[ _]*(?P<params>\|[^{{}}]*)?\}}\}}",
            templates
        ))?;

        Ok(Self {
            config,
            timestamp_re,
            user_link_re,
            unsigned_re,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Find the first timestamp in a piece of text
    pub fn find_timestamp(&self, text: &str) -> Option<TimestampMatch> {
        self.timestamp_re
            .captures(text)
            .and_then(|caps| self.timestamp_from_captures(&caps))
    }

    /// Parse a timestamp string as shown in the rendered page
    pub fn parse_date(&self, timestamp: &str) -> Option<DateTime<Utc>> {
        self.find_timestamp(timestamp).and_then(|m| m.date)
    }

    fn timestamp_from_captures(&self, caps: &regex::Captures<'_>) -> Option<TimestampMatch> {
        let whole = caps.get(0)?;
        let date = caps.name("date").and_then(|d| {
            NaiveDateTime::parse_from_str(d.as_str(), &self.config.date_format)
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        });
        Some(TimestampMatch {
            range: whole.range(),
            raw: whole.as_str().to_string(),
            date,
        })
    }

    /// Scan source text for signatures, in order of appearance
    pub fn extract(&self, source: &str) -> Vec<SignatureCandidate> {
        let templates = self.unsigned_templates(source);
        let mut raw = self.user_signatures(source, &templates);
        raw.extend(templates);
        raw.sort_by_key(|sig| sig.start);

        let mut candidates: Vec<SignatureCandidate> = Vec::with_capacity(raw.len());
        for sig in raw {
            let boundary = candidates.last().map(|c| c.signature_end_offset);
            if boundary.is_some_and(|end| sig.start < end) {
                debug!(offset = sig.start, "Skipping signature inside previous signature");
                continue;
            }
            let line_start = comment_start(source, boundary, sig.start);
            let line_end = source[line_start..].find('\n').map_or(source.len(), |i| line_start + i);
            let indentation = markup::indentation(&source[line_start..line_end]).to_string();
            let (raw_timestamp, date) = match sig.timestamp {
                Some(ts) => (ts.raw, ts.date),
                None => (String::new(), None),
            };

            candidates.push(SignatureCandidate {
                author: sig.author,
                raw_timestamp,
                date,
                line_start_offset: line_start,
                signature_start_offset: sig.start,
                signature_end_offset: sig.end,
                indentation,
                ordinal: candidates.len(),
            });
        }

        debug!(count = candidates.len(), "Extracted signatures");
        candidates
    }

    /// Timestamps preceded by a user link on the same line
    fn user_signatures(&self, source: &str, templates: &[RawSignature]) -> Vec<RawSignature> {
        let mut found = Vec::new();
        let mut previous_end = 0;

        for caps in self.timestamp_re.captures_iter(source) {
            let Some(ts) = self.timestamp_from_captures(&caps) else {
                continue;
            };
            if templates
                .iter()
                .any(|t| t.start <= ts.range.start && ts.range.end <= t.end)
            {
                continue;
            }

            // A template between link and timestamp owns the link side
            let template_end = templates
                .iter()
                .map(|t| t.end)
                .filter(|&end| end <= ts.range.start)
                .max()
                .unwrap_or(0);
            let mut window_start = markup::line_start(source, ts.range.start)
                .max(previous_end)
                .max(template_end)
                .max(ts.range.start.saturating_sub(self.config.max_signature_length));
            while !source.is_char_boundary(window_start) {
                window_start += 1;
            }
            let window = &source[window_start..ts.range.start];

            let links: Vec<(usize, String)> = self
                .user_link_re
                .captures_iter(window)
                .filter_map(|c| {
                    let name = c.name("name")?.as_str().replace('_', " ");
                    Some((window_start + c.get(0)?.start(), name.trim().to_string()))
                })
                .collect();

            let Some((_, author)) = links.last().cloned() else {
                continue;
            };
            let start = links
                .iter()
                .find(|(_, name)| *name == author)
                .map(|(offset, _)| *offset)
                .unwrap_or(ts.range.start);

            previous_end = ts.range.end;
            found.push(RawSignature {
                author: Author::Named(author),
                start,
                end: ts.range.end,
                timestamp: Some(ts),
            });
        }

        found
    }

    /// `{{unsigned|Name|date}}` style templates
    fn unsigned_templates(&self, source: &str) -> Vec<RawSignature> {
        self.unsigned_re
            .captures_iter(source)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let params = caps.name("params").map(|p| p.as_str()).unwrap_or("");

                let mut author = None;
                let mut timestamp = None;
                for param in params.split('|').map(str::trim).filter(|p| !p.is_empty()) {
                    if param.contains('=') {
                        continue;
                    }
                    if timestamp.is_none() {
                        if let Some(mut ts) = self.find_timestamp(param) {
                            let offset = whole.start() + whole.as_str().find(param).unwrap_or(0);
                            ts.range = (offset + ts.range.start)..(offset + ts.range.end);
                            timestamp = Some(ts);
                            continue;
                        }
                    }
                    if author.is_none() {
                        author = Some(param.replace('_', " "));
                    }
                }

                Some(RawSignature {
                    author: author.map(Author::Named).unwrap_or(Author::Undated),
                    timestamp,
                    start: whole.start(),
                    end: whole.end(),
                })
            })
            .collect()
    }
}

/// Offset where a comment whose signature starts at `signature_start` begins.
///
/// Text after the previous signature up to the end of its line belongs to
/// the previous comment; blank and heading lines are skipped.
fn comment_start(source: &str, boundary: Option<usize>, signature_start: usize) -> usize {
    let mut cursor = boundary.unwrap_or(0).min(signature_start);
    if boundary.is_some() {
        if let Some(newline) = source[cursor..signature_start].find('\n') {
            cursor += newline + 1;
        }
    }

    loop {
        let eol = match source[cursor..].find('\n') {
            Some(i) => cursor + i,
            None => break,
        };
        if eol >= signature_start {
            break;
        }
        let line = &source[cursor..eol];
        if line.trim().is_empty() || markup::is_heading_line(line) {
            cursor = eol + 1;
        } else {
            break;
        }
    }

    while cursor < signature_start && matches!(source.as_bytes()[cursor], b' ' | b'\t') {
        cursor += 1;
    }
    cursor
}

/// Extract signatures with the default patterns
pub fn extract_signatures(source: &str) -> Vec<SignatureCandidate> {
    SignatureExtractor::default().extract(source)
}

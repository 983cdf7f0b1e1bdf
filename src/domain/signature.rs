//! Signature candidates scanned out of wikitext source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author attached to a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    /// A named user (or IP address)
    Named(String),
    /// The signature explicitly marks the comment as unattributed
    Undated,
}

impl Author {
    /// Whether this author is compatible with a rendered author name.
    ///
    /// `Undated` is compatible with any author.
    pub fn accepts(&self, name: &str) -> bool {
        match self {
            Author::Named(own) => own == name,
            Author::Undated => true,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Author::Named(name) => Some(name),
            Author::Undated => None,
        }
    }
}

/// A signature-like construct found in source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureCandidate {
    /// Author of the signature
    pub author: Author,
    /// Timestamp exactly as written in the source (empty when absent)
    pub raw_timestamp: String,
    /// Parsed timestamp, if the raw string could be parsed
    pub date: Option<DateTime<Utc>>,
    /// Byte offset where the comment's first line starts
    pub line_start_offset: usize,
    /// Byte offset where the signature itself starts
    pub signature_start_offset: usize,
    /// Byte offset just past the signature
    pub signature_end_offset: usize,
    /// Indentation characters (`:`, `*`, `#`) of the comment's first line
    pub indentation: String,
    /// Position among all candidates of the scan (0-indexed)
    pub ordinal: usize,
}

impl SignatureCandidate {
    /// The comment's span in the source, `[line_start, signature_end)`
    pub fn span(&self) -> (usize, usize) {
        (self.line_start_offset, self.signature_end_offset)
    }

    /// Check whether a rendered timestamp string is compatible with this
    /// signature.
    ///
    /// Exact equality, or the rendered string being a prefix of the raw one
    /// (markup may carry a trailing timezone the rendered view drops). A
    /// missing rendered timestamp is compatible with everything; an empty
    /// one only with a signature that has no timestamp either.
    pub fn timestamp_accepts(&self, timestamp: Option<&str>) -> bool {
        match timestamp {
            None => true,
            Some("") => self.raw_timestamp.is_empty(),
            Some(ts) => self.raw_timestamp == ts || self.raw_timestamp.starts_with(ts),
        }
    }

    /// Author and timestamp compatibility in one call
    pub fn accepts(&self, author: &str, timestamp: Option<&str>) -> bool {
        self.author.accepts(author) && self.timestamp_accepts(timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(author: Author, raw: &str) -> SignatureCandidate {
        SignatureCandidate {
            author,
            raw_timestamp: raw.to_string(),
            date: None,
            line_start_offset: 0,
            signature_start_offset: 5,
            signature_end_offset: 10,
            indentation: String::new(),
            ordinal: 0,
        }
    }

    #[test]
    fn test_undated_accepts_any_author() {
        let sig = candidate(Author::Undated, "10:00, 1 January 2024 (UTC)");
        assert!(sig.accepts("Alice", Some("10:00, 1 January 2024")));
        assert!(sig.accepts("Bob", None));
    }

    #[test]
    fn test_timestamp_prefix_tolerates_timezone() {
        let sig = candidate(Author::Named("Bob".to_string()), "10:00, 1 January 2024 (UTC)");
        assert!(sig.timestamp_accepts(Some("10:00, 1 January 2024 (UTC)")));
        assert!(sig.timestamp_accepts(Some("10:00, 1 January 2024")));
        assert!(!sig.timestamp_accepts(Some("10:01, 1 January 2024")));
        assert!(!sig.accepts("Alice", None));
    }

    #[test]
    fn test_empty_timestamp_is_not_a_prefix() {
        let dated = candidate(Author::Named("Bob".to_string()), "10:00, 1 January 2024 (UTC)");
        assert!(!dated.timestamp_accepts(Some("")));

        let undated = candidate(Author::Undated, "");
        assert!(undated.timestamp_accepts(Some("")));
    }
}

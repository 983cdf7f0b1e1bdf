//! Wikitext helpers shared by the engine components.
//!
//! Nothing here tries to be a wikitext parser. The helpers only strip enough
//! markup for bag-of-words comparison and find headings and line boundaries.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// A section heading found in source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    /// Headline with markup stripped
    pub text: String,
    /// Byte offset of the heading line start
    pub start: usize,
    /// Byte offset just past the heading line (excluding the newline)
    pub end: usize,
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(={1,6})[ \t]*(.+?)[ \t]*(={1,6})[ \t]*$").expect("valid heading regex")
    })
}

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[(?:[^\[\]|]*\|)?([^\[\]]*)\]\]").expect("valid link regex"))
}

fn external_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[(?:https?:)?//[^\s\]]+\s*([^\]]*)\]").expect("valid external link regex")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->|</?[a-zA-Z][^>]*>").expect("valid tag regex"))
}

/// List all headings in source order
pub fn headings(source: &str) -> Vec<Heading> {
    heading_regex()
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let open = caps.get(1)?.as_str().len();
            let close = caps.get(3)?.as_str().len();
            let level = open.min(close);
            let text = strip_markup(caps.get(2)?.as_str());
            Some(Heading {
                level,
                text: normalize_whitespace(&text),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Whether a single line is a heading
pub fn is_heading_line(line: &str) -> bool {
    heading_regex().is_match(line.trim_end_matches(['\r', '\n']))
}

/// Strip links, tags and emphasis, leaving readable text
pub fn strip_markup(text: &str) -> String {
    let text = tag_regex().replace_all(text, " ");
    let text = link_regex().replace_all(&text, "$1");
    let text = external_link_regex().replace_all(&text, "$1");
    text.replace("'''", "")
        .replace("''", "")
        .replace("{{", " ")
        .replace("}}", " ")
        .replace('|', " ")
}

/// Collapse whitespace runs to single spaces and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether the text contains markup whose rendering changes its words
pub fn contains_nested_markup(text: &str) -> bool {
    text.contains("{{") || text.contains("<ref") || text.contains("__")
}

/// Decode the handful of entities MediaWiki diff tables emit
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&amp;", "&")
}

/// Byte offset of the start of the line containing `offset`
pub fn line_start(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// Leading indentation characters of a line
pub fn indentation(line: &str) -> &str {
    let end = line
        .find(|c: char| !matches!(c, ':' | '*' | '#'))
        .unwrap_or(line.len());
    &line[..end]
}

/// Lowercased words of at least two characters
pub fn word_set(text: &str) -> HashSet<String> {
    strip_markup(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Dice coefficient between the word sets of two texts, in `[0, 1]`
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let a = word_set(a);
    let b = word_set(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(&b).count();
    (2 * common) as f64 / (a.len() + b.len()) as f64
}

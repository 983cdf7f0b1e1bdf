//! MediaWiki action API client.
//!
//! Fetches page source, revision history with compare-API diffs, and
//! renders wikitext fragments through `action=parse`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{MarkupRenderer, RevisionSource};
use crate::domain::{DiffBody, DiffLine, DiffLineKind, RevisionDiff, RevisionRef};
use crate::engine::markup;
use crate::error::EngineError;

const DEFAULT_USER_AGENT: &str = concat!("talkmark/", env!("CARGO_PKG_VERSION"));

/// MediaWiki API client
pub struct MediaWikiClient {
    /// api.php endpoint
    endpoint: String,
    /// HTTP client
    client: reqwest::Client,
}

/// `action=query` response
#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<PageEntry>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    revisions: Vec<RevisionEntry>,
}

#[derive(Debug, Deserialize)]
struct RevisionEntry {
    revid: Option<u64>,
    #[serde(default)]
    parentid: u64,
    timestamp: Option<DateTime<Utc>>,
    user: Option<String>,
    comment: Option<String>,
    slots: Option<Slots>,
}

#[derive(Debug, Deserialize)]
struct Slots {
    main: SlotContent,
}

#[derive(Debug, Deserialize)]
struct SlotContent {
    content: String,
}

/// `action=compare` response
#[derive(Debug, Deserialize)]
struct CompareResponse {
    compare: Option<CompareBody>,
}

#[derive(Debug, Deserialize)]
struct CompareBody {
    #[serde(default)]
    body: String,
}

/// `action=parse` response
#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: Option<ParseBody>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ParseBody {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    info: String,
}

impl MediaWikiClient {
    /// Create a client for an api.php endpoint
    pub fn new(endpoint: impl Into<String>, user_agent: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    async fn get<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params);
        self.send(request).await
    }

    /// `action=parse` request; the fragment travels in a form body so long
    /// fragments don't hit URL length limits
    fn parse_request(&self, fragment: &str) -> reqwest::RequestBuilder {
        self.client
            .post(&self.endpoint)
            .query(&[("format", "json"), ("formatversion", "2")])
            .form(&[
                ("action", "parse"),
                ("text", fragment),
                ("contentmodel", "wikitext"),
                ("prop", "text"),
                ("disablelimitreport", "1"),
            ])
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to query {}", self.endpoint))?;

        response
            .error_for_status()
            .context("MediaWiki API returned an error status")?
            .json()
            .await
            .context("Failed to parse MediaWiki API response")
    }

    async fn compare(&self, from: u64, to: u64) -> Result<String> {
        let (from, to) = (from.to_string(), to.to_string());
        let response: CompareResponse = self
            .get(&[("action", "compare"), ("fromrev", from.as_str()), ("torev", to.as_str())])
            .await?;
        Ok(response.compare.map(|c| c.body).unwrap_or_default())
    }

    async fn revision_content(&self, revid: u64) -> Result<String> {
        let revid = revid.to_string();
        let response: QueryResponse = self
            .get(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("revids", revid.as_str()),
                ("rvprop", "content"),
                ("rvslots", "main"),
            ])
            .await?;
        first_content(response).with_context(|| format!("Revision {} has no content", revid))
    }
}

fn first_content(response: QueryResponse) -> Option<String> {
    response
        .query?
        .pages
        .into_iter()
        .filter(|page| !page.missing)
        .flat_map(|page| page.revisions)
        .find_map(|rev| rev.slots.map(|s| s.main.content))
}

#[async_trait]
impl RevisionSource for MediaWikiClient {
    fn name(&self) -> &str {
        "mediawiki"
    }

    async fn fetch_source(&self, title: &str) -> Result<String> {
        let response: QueryResponse = self
            .get(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("titles", title),
                ("rvprop", "content"),
                ("rvslots", "main"),
            ])
            .await?;
        first_content(response).with_context(|| format!("Page not found: {}", title))
    }

    async fn fetch_revisions(&self, title: &str, limit: usize) -> Result<Vec<RevisionDiff>> {
        let limit = limit.to_string();
        let response: QueryResponse = self
            .get(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("titles", title),
                ("rvprop", "ids|timestamp|user|comment"),
                ("rvlimit", limit.as_str()),
            ])
            .await?;

        let entries = response
            .query
            .map(|q| q.pages.into_iter().flat_map(|p| p.revisions).collect::<Vec<_>>())
            .unwrap_or_default();

        let mut diffs = Vec::with_capacity(entries.len());
        for entry in entries {
            let (Some(id), Some(timestamp)) = (entry.revid, entry.timestamp) else {
                continue;
            };
            let diff = if entry.parentid == 0 {
                // Page creation: everything was added
                let content = self.revision_content(id).await?;
                DiffBody::Lines(
                    content
                        .lines()
                        .map(|line| DiffLine {
                            kind: DiffLineKind::Added,
                            text: line.to_string(),
                        })
                        .collect(),
                )
            } else {
                DiffBody::Html(self.compare(entry.parentid, id).await?)
            };
            debug!(revision = id, "Fetched revision diff");

            diffs.push(RevisionDiff {
                revision: RevisionRef {
                    id,
                    timestamp,
                    user: entry.user,
                    comment: entry.comment,
                },
                diff,
            });
        }

        Ok(diffs)
    }
}

#[async_trait]
impl MarkupRenderer for MediaWikiClient {
    async fn render(&self, fragment: &str) -> Result<String, EngineError> {
        let response: ParseResponse = self
            .send(self.parse_request(fragment))
            .await
            .map_err(|e| EngineError::ParseFailure {
                reason: format!("{:#}", e),
            })?;

        match (response.parse, response.error) {
            (Some(parse), _) => Ok(markup::normalize_whitespace(&markup::decode_entities(
                &markup::strip_markup(&parse.text),
            ))),
            (None, Some(error)) => Err(EngineError::ParseFailure { reason: error.info }),
            (None, None) => Err(EngineError::ParseFailure {
                reason: "empty parse response".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_content() {
        let json = r#"{"query":{"pages":[{"pageid":1,"title":"Talk:X","revisions":[{"slots":{"main":{"contentmodel":"wikitext","content":"Hi"}}}]}]}}"#;
        let response: QueryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_content(response), Some("Hi".to_string()));

        let missing = r#"{"query":{"pages":[{"title":"Talk:Y","missing":true}]}}"#;
        let response: QueryResponse = serde_json::from_str(missing).unwrap();
        assert_eq!(first_content(response), None);
    }

    #[test]
    fn test_revision_entry_parsing() {
        let json = r#"{"revid":42,"parentid":41,"timestamp":"2024-01-01T10:00:00Z","user":"Alice","comment":"reply"}"#;
        let entry: RevisionEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.revid, Some(42));
        assert_eq!(entry.parentid, 41);
        assert_eq!(entry.user.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_parse_request_sends_fragment_in_body() {
        let client = MediaWikiClient::new("https://example.org/w/api.php", None).unwrap();
        let fragment = "{{tq|".to_string() + &"word ".repeat(2_000) + "}}";
        let request = client.parse_request(&fragment).build().unwrap();

        assert_eq!(request.method(), &reqwest::Method::POST);
        assert!(!request.url().as_str().contains("text="));
        assert!(request.url().as_str().len() < 200);

        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let body = std::str::from_utf8(body).unwrap();
        assert!(body.contains("action=parse"));
        assert!(body.contains("text=%7B%7Btq%7Cword"));
    }
}

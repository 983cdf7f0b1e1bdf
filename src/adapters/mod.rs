//! Adapter interfaces for I/O collaborators.
//!
//! The engine never performs I/O itself. Page source, revision diffs and
//! markup rendering come from implementations of these traits.

pub mod fixtures;
pub mod mediawiki;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::RevisionDiff;
use crate::error::EngineError;

pub use fixtures::FixtureSource;
pub use mediawiki::MediaWikiClient;

/// Source of page markup and revision history
#[async_trait]
pub trait RevisionSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Current markup source of a page
    async fn fetch_source(&self, title: &str) -> Result<String>;

    /// Most recent revisions of a page with the diffs they introduced,
    /// newest first
    async fn fetch_revisions(&self, title: &str, limit: usize) -> Result<Vec<RevisionDiff>>;
}

/// Renders a markup fragment to plain text
#[async_trait]
pub trait MarkupRenderer: Send + Sync {
    /// Fails with [`EngineError::ParseFailure`] when the fragment can't be
    /// rendered
    async fn render(&self, markup: &str) -> Result<String, EngineError>;
}

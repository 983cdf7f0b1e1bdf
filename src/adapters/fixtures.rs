//! Revision source backed by files on disk.
//!
//! Layout of a fixture directory:
//! - `source.wiki`: current page markup
//! - `revisions.json`: array of revision diffs, newest first
//!
//! Titles are ignored; one directory holds one page.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use super::RevisionSource;
use crate::domain::RevisionDiff;

pub struct FixtureSource {
    dir: PathBuf,
}

impl FixtureSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl RevisionSource for FixtureSource {
    fn name(&self) -> &str {
        "fixtures"
    }

    async fn fetch_source(&self, _title: &str) -> Result<String> {
        let path = self.dir.join("source.wiki");
        fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read source: {}", path.display()))
    }

    async fn fetch_revisions(&self, _title: &str, limit: usize) -> Result<Vec<RevisionDiff>> {
        let path = self.dir.join("revisions.json");
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read revisions: {}", path.display()))?;
        let mut revisions: Vec<RevisionDiff> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse revisions: {}", path.display()))?;

        revisions.truncate(limit);
        Ok(revisions)
    }
}

//! Command-line interface for talkmark.
//!
//! Provides commands for listing signatures, locating comments in source,
//! attributing comments to revisions, classifying comments against a visit
//! record and reconciling comment snapshots.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapters::{FixtureSource, MarkupRenderer, MediaWikiClient, RevisionSource};
use crate::config;
use crate::domain::{CommentSnapshot, CommentStructure, DisplayedComment, VisitRecord};
use crate::engine::{Baseline, DiffMatcher, Engine, RenderedComment};

/// talkmark - comment identity and reconciliation for wikitext talk pages
#[derive(Parser, Debug)]
#[command(name = "talkmark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List signatures found in a wikitext file
    Signatures {
        /// Wikitext source file
        file: PathBuf,
    },

    /// Locate a rendered comment in wikitext source
    Locate {
        /// Wikitext source file
        #[arg(short, long)]
        source: PathBuf,

        /// JSON file with the rendered comments in document order
        #[arg(short, long)]
        comments: PathBuf,

        /// Index of the comment to locate
        #[arg(short, long)]
        index: usize,
    },

    /// Find the revision that added a comment
    Attribute {
        /// JSON file with the rendered comments in document order
        #[arg(short, long)]
        comments: PathBuf,

        /// Index of the comment to attribute
        #[arg(short, long)]
        index: usize,

        /// Directory holding source.wiki and revisions.json
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// MediaWiki api.php endpoint (defaults to the configured one)
        #[arg(long, env = "TALKMARK_API")]
        api: Option<String>,

        /// Page title (required with --api)
        #[arg(short, long)]
        title: Option<String>,

        /// Number of revisions to examine
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Classify comments as new/seen against a visit record
    Classify {
        /// JSON file with the rendered comments in document order
        #[arg(short, long)]
        comments: PathBuf,

        /// JSON file with the visit record
        #[arg(short, long)]
        visits: PathBuf,

        /// Current user name (defaults to the configured one)
        #[arg(short, long)]
        user: Option<String>,

        /// Comment IDs left unseen in a previous session (comma-separated)
        #[arg(long)]
        unseen: Option<String>,
    },

    /// Compare two snapshots of a comment
    Reconcile {
        /// JSON snapshot input for the displayed version
        previous: PathBuf,

        /// JSON snapshot input for the fetched version
        current: PathBuf,

        /// The previous snapshot is from the user's previous visit
        #[arg(long)]
        since_previous_visit: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Snapshot file shape for `reconcile`
#[derive(Debug, Deserialize)]
struct SnapshotInput {
    #[serde(default)]
    structure: CommentStructure,
    content: String,
}

/// One line of `classify` output
#[derive(Debug, Serialize)]
struct ClassifiedComment<'a> {
    index: usize,
    id: Option<&'a str>,
    author: &'a str,
    is_new: bool,
    seen: bool,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let settings = config::config()?;
        let engine = Engine::new(&settings.engine).context("Invalid engine configuration")?;

        match self.command {
            Commands::Signatures { file } => {
                let source = read_text(&file)?;
                print_json(&engine.extractor.extract(&source))
            }
            Commands::Locate {
                source,
                comments,
                index,
            } => {
                let source = read_text(&source)?;
                let comments: Vec<DisplayedComment> = read_json(&comments)?;
                let fingerprint = engine.fingerprints.build(&comments, index)?;
                let location = engine.matcher.locate(&fingerprint, &source)?;
                print_json(&location)
            }
            Commands::Attribute {
                comments,
                index,
                fixtures,
                api,
                title,
                limit,
            } => {
                let comments: Vec<DisplayedComment> = read_json(&comments)?;
                let fingerprint = engine.fingerprints.build(&comments, index)?;

                let api = api.or_else(|| settings.api_endpoint.clone());
                let (source, renderer): (Box<dyn RevisionSource>, Option<MediaWikiClient>) =
                    match (fixtures, api) {
                        (Some(dir), _) => (Box::new(FixtureSource::new(dir)) as Box<dyn RevisionSource>, None),
                        (None, Some(endpoint)) => {
                            let ua = settings.user_agent.as_deref();
                            (
                                Box::new(MediaWikiClient::new(endpoint.clone(), ua)?) as Box<dyn RevisionSource>,
                                Some(MediaWikiClient::new(endpoint, ua)?),
                            )
                        }
                        (None, None) => anyhow::bail!("Use --fixtures <dir> or --api <url>"),
                    };

                let title = title.unwrap_or_default();
                if renderer.is_some() && title.is_empty() {
                    anyhow::bail!("--title is required with --api");
                }

                let diffs = source.fetch_revisions(&title, limit).await?;
                let renderer = renderer.as_ref().map(|r| r as &dyn MarkupRenderer);
                let matches = engine.diffs.attribute(&fingerprint, &diffs, renderer).await;
                let attribution = DiffMatcher::pick_best(&matches);

                info!(revisions = matches.len(), source = source.name(), "Attribution finished");
                print_json(&attribution)
            }
            Commands::Classify {
                comments,
                visits,
                user,
                unseen,
            } => {
                let comments: Vec<DisplayedComment> = read_json(&comments)?;
                let visits: VisitRecord = read_json(&visits)?;
                let user = user.or_else(|| settings.current_user.clone());
                let unseen: Vec<&str> = unseen
                    .as_deref()
                    .map(|s| s.split(',').map(str::trim).collect())
                    .unwrap_or_default();

                let fingerprints = engine.fingerprints.build_all(&comments);
                let classified: Vec<ClassifiedComment<'_>> = comments
                    .iter()
                    .zip(&fingerprints)
                    .enumerate()
                    .map(|(index, (comment, fingerprint))| {
                        let carried = comment
                            .id
                            .as_deref()
                            .is_some_and(|id| unseen.contains(&id));
                        let arrival = engine.reconciler.classify_arrival(
                            fingerprint.date,
                            comment.author(),
                            &visits,
                            user.as_deref(),
                            carried,
                        );
                        ClassifiedComment {
                            index,
                            id: comment.id.as_deref(),
                            author: &comment.author,
                            is_new: arrival.is_new,
                            seen: arrival.seen,
                        }
                    })
                    .collect();
                print_json(&classified)
            }
            Commands::Reconcile {
                previous,
                current,
                since_previous_visit,
            } => {
                let previous: SnapshotInput = read_json(&previous)?;
                let current: SnapshotInput = read_json(&current)?;
                let previous = CommentSnapshot::new(previous.structure, &previous.content);
                let current = CommentSnapshot::new(current.structure, &current.content);
                let baseline = if since_previous_visit {
                    Baseline::PreviousVisit
                } else {
                    Baseline::Displayed
                };
                print_json(&engine.reconciler.reconcile(Some(&previous), Some(&current), baseline))
            }
            Commands::Config => show_config(settings),
        }
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_text(path)?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON: {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

/// Show resolved configuration
fn show_config(settings: &config::ResolvedConfig) -> Result<()> {
    println!("talkmark configuration\n");
    match &settings.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
    println!(
        "API endpoint: {}",
        settings.api_endpoint.as_deref().unwrap_or("(not set)")
    );
    println!(
        "Current user: {}",
        settings.current_user.as_deref().unwrap_or("(not set)")
    );
    println!("\nEngine:");
    println!(
        "{}",
        serde_yaml::to_string(&settings.engine).context("Failed to serialize engine config")?
    );
    Ok(())
}

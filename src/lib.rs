//! talkmark - comment identity and reconciliation for wikitext talk pages
//!
//! Given a comment as it appears on a rendered discussion page, talkmark
//! finds where that comment lives in the page's wikitext, which revision
//! added it, and how it relates to the copy the reader saw last time.
//!
//! # Modules
//!
//! - `engine`: Signature extraction, fingerprinting, source matching,
//!   diff attribution and reconciliation
//! - `domain`: Data structures (SignatureCandidate, CommentFingerprint,
//!   RevisionDiff, CommentState)
//! - `adapters`: Revision sources and markup renderers (MediaWiki, fixtures)
//! - `config`: Configuration file discovery and engine settings
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # List signatures in a page
//! talkmark signatures page.wiki
//!
//! # Locate the third rendered comment in source
//! talkmark locate --source page.wiki --comments comments.json --index 2
//!
//! # Find the revision that added it
//! talkmark attribute --comments comments.json --index 2 --fixtures ./history
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;

// Re-export main types at crate root for convenience
pub use config::EngineConfig;
pub use domain::{
    Attribution, CommentFingerprint, CommentSnapshot, CommentState, DisplayedComment, Lifecycle,
    RevisionDiff, RevisionRef, SignatureCandidate, VisitRecord,
};
pub use engine::{
    extract_signatures, DiffMatcher, Engine, FingerprintBuilder, Location, MatchCandidate,
    Reconciler, SignatureExtractor, SourceMatcher,
};
pub use error::EngineError;

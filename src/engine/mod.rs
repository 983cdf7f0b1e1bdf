//! Comment identity and reconciliation engine.
//!
//! This module contains:
//! - Extractor: signature candidates from wikitext source
//! - Fingerprint: identity signals of rendered comments
//! - Matcher: locating a fingerprint in source
//! - Diff: attributing a comment to the revision that added it
//! - Reconciler: patchability, lifecycle and seen state

pub mod diff;
pub mod extractor;
pub mod fingerprint;
pub mod markup;
pub mod matcher;
pub mod reconciler;

// Re-export commonly used types
pub use diff::{added_fragments, DiffConfig, DiffMatcher};
pub use extractor::{extract_signatures, ExtractorConfig, SignatureExtractor, TimestampMatch};
pub use fingerprint::{FingerprintBuilder, FingerprintConfig, RenderedComment, PRECEDING_DEPTH};
pub use matcher::{
    Location, MatchCandidate, MatcherConfig, ScoreBreakdown, SourceMatcher, MATCH_THRESHOLD,
};
pub use reconciler::{Baseline, Reconciler, ReconcilerConfig, SEEN_TOLERANCE_SECS};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// All components wired from one configuration
#[derive(Debug, Clone, Default)]
pub struct Engine {
    pub extractor: SignatureExtractor,
    pub fingerprints: FingerprintBuilder,
    pub matcher: SourceMatcher,
    pub diffs: DiffMatcher,
    pub reconciler: Reconciler,
}

impl Engine {
    /// Compile patterns and build every component
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let extractor = SignatureExtractor::new(config.extractor.clone())?;
        Ok(Self {
            fingerprints: FingerprintBuilder::new(config.fingerprint.clone(), extractor.clone()),
            matcher: SourceMatcher::new(config.matcher.clone(), extractor.clone()),
            diffs: DiffMatcher::new(config.diff.clone()),
            reconciler: Reconciler::new(config.reconciler.clone()),
            extractor,
        })
    }
}

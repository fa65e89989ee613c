//! Error types for the tiering crate

use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading a processor definition for analysis.
///
/// These never escape [`crate::ComplexityAnalyzer::recommend_for_file`]; they
/// are folded into the fallback recommendation's `analysis.error`.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Processor file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read processor file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid processor definition in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of profile analysis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("No samples collected")]
    NoSamples,
}

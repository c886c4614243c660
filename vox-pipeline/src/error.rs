//! Error types for vox-pipeline
//!
//! Errors fall into three groups:
//! - Configuration errors (`UnknownFeature`, `Common(Config)`) fail fast
//!   before any clip is touched.
//! - Per-language errors (`MetadataNotFound`) skip one language.
//! - Per-clip errors (`ClipNotFound`, `ClipUnreadable`, `TimedOut`, `Worker`)
//!   are counted and never abort the batch.
//! - `FeatureExtraction` blanks one extractor's columns in an otherwise
//!   complete row.

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The per-language metadata table is absent
    #[error("Metadata table not found: {0}")]
    MetadataNotFound(PathBuf),

    /// A clip referenced by the metadata table does not exist
    #[error("Clip not found: {0}")]
    ClipNotFound(PathBuf),

    /// A clip exists but could not be decoded or written
    #[error("Clip unreadable {path}: {reason}")]
    ClipUnreadable {
        /// Clip path
        path: PathBuf,
        /// Underlying decoder or encoder message
        reason: String,
    },

    /// One extractor failed for one clip
    #[error("Feature extraction failed ({extractor}): {source}")]
    FeatureExtraction {
        /// Registry name of the failing extractor
        extractor: &'static str,
        /// Extractor-level error
        #[source]
        source: crate::types::ExtractionError,
    },

    /// A requested feature name is not registered
    #[error("Unknown feature: {name} (available: {available})")]
    UnknownFeature {
        /// The unrecognized name
        name: String,
        /// Comma-separated registered names
        available: String,
    },

    /// Delimited table read/write error
    #[error("Table error: {0}")]
    Table(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// vox-common error
    #[error("Common error: {0}")]
    Common(#[from] vox_common::Error),

    /// The language run was cancelled before every clip finished
    #[error("Cancelled")]
    Cancelled,

    /// A work item exceeded its time budget
    #[error("Timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// A worker task panicked or was aborted
    #[error("Worker failure: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Shorthand for a `ClipUnreadable` error
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ClipUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

//! vox-pipeline library interface
//!
//! Common Voice preprocessing and acoustic feature extraction:
//! - [`workflow::PreprocessingStage`]: silence trimming and gender partitioning
//! - [`workflow::ExtractionEngine`]: per-clip acoustic features to one table per language
//! - [`workflow::Pipeline`]: both stages over many languages with a shared worker pool

pub mod config;
pub mod error;
pub mod extractors;
pub mod models;
pub mod services;
pub mod types;
pub mod utils;
pub mod workflow;

pub use crate::config::{CliOverrides, PipelineConfig};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::workflow::{MultiRunReport, Pipeline, RunSummary};

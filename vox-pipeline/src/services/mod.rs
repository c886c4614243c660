//! Corpus services: metadata loading, silence trimming, output filtering

pub mod duration_filter;
pub mod metadata_loader;
pub mod silence_trimmer;

pub use duration_filter::{DurationFilter, DurationFilterReport};
pub use metadata_loader::{LoadStats, MetadataLoader, METADATA_FILE_NAME};
pub use silence_trimmer::{SampleRange, SilenceError, SilenceTrimmer, TrimOutcome};

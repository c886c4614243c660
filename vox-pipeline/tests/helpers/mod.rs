//! Test Helper Utilities
//!
//! Shared utilities for testing vox-pipeline

#![allow(dead_code)]

pub mod audio_generator;
pub mod corpus;

// Re-export commonly used items
pub use audio_generator::{generate_test_wav, ClipConfig};
pub use corpus::{read_table, CorpusBuilder, TableContents};

/// Route library logs to the test harness output (idempotent)
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vox_pipeline=debug")),
        )
        .with_test_writer()
        .try_init();
}

//! # vox-common
//!
//! Shared code for the vox speech-corpus tools:
//! - Common error type
//! - Configuration loading and directory resolution
//! - Progress event types and EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};

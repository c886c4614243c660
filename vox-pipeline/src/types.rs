//! Core Types and Trait Definitions for vox-pipeline
//!
//! Defines the extractor capability shared by every acoustic feature family:
//! each extractor is an independent, stateless type that turns one trimmed
//! [`AudioBuffer`] into a set of named scalar or vector measurements.

use crate::models::AudioBuffer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Feature values
// ============================================================================

/// One measurement produced by an extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// Single number (e.g. `pitch_mean`)
    Scalar(f64),
    /// Fixed-length vector (e.g. 13 MFCC means)
    Vector(Vec<f64>),
}

impl FeatureValue {
    /// Number of table cells this value occupies
    pub fn width(&self) -> usize {
        match self {
            FeatureValue::Scalar(_) => 1,
            FeatureValue::Vector(v) => v.len(),
        }
    }
}

/// Named measurements produced by one or more extractors
pub type FeatureMap = BTreeMap<String, FeatureValue>;

/// Declared output key of an extractor
///
/// Vector keys are flattened into 1-based indexed columns when written:
/// `mfcc_mean` with width 13 becomes `mfcc_mean_1` .. `mfcc_mean_13`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureKey {
    /// Key name
    pub name: &'static str,
    /// `None` for scalars, `Some(n)` for n-element vectors
    pub width: Option<usize>,
}

impl FeatureKey {
    /// Declare a scalar key
    pub const fn scalar(name: &'static str) -> Self {
        Self { name, width: None }
    }

    /// Declare a fixed-length vector key
    pub const fn vector(name: &'static str, width: usize) -> Self {
        Self {
            name,
            width: Some(width),
        }
    }

    /// Table column names for this key
    pub fn columns(&self) -> Vec<String> {
        match self.width {
            None => vec![self.name.to_string()],
            Some(n) => (1..=n).map(|i| format!("{}_{}", self.name, i)).collect(),
        }
    }

    /// Whether `value` matches this declaration's shape
    pub fn accepts(&self, value: &FeatureValue) -> bool {
        match (self.width, value) {
            (None, FeatureValue::Scalar(_)) => true,
            (Some(n), FeatureValue::Vector(v)) => v.len() == n,
            _ => false,
        }
    }

    /// Deterministic fallback value (zero or zero vector)
    pub fn zero(&self) -> FeatureValue {
        match self.width {
            None => FeatureValue::Scalar(0.0),
            Some(n) => FeatureValue::Vector(vec![0.0; n]),
        }
    }
}

/// Map with every declared key set to its zero fallback
pub fn zero_features(keys: &[FeatureKey]) -> FeatureMap {
    keys.iter()
        .map(|k| (k.name.to_string(), k.zero()))
        .collect()
}

// ============================================================================
// Extractor Trait
// ============================================================================

/// Acoustic feature extractor
///
/// Implementations must:
/// - never mutate the buffer (enforced by the shared borrow),
/// - return every declared key on success,
/// - return zero fallbacks rather than an error for empty or all-silent
///   input, so that numeric edge cases never surface as failures.
///
/// # Example
/// ```rust,ignore
/// use vox_pipeline::types::{ExtractionError, FeatureExtractor, FeatureKey, FeatureMap, FeatureValue};
/// use vox_pipeline::models::AudioBuffer;
///
/// pub struct PeakExtractor;
///
/// impl FeatureExtractor for PeakExtractor {
///     fn name(&self) -> &'static str { "peak" }
///     fn output_keys(&self) -> &'static [FeatureKey] {
///         const KEYS: &[FeatureKey] = &[FeatureKey::scalar("peak")];
///         KEYS
///     }
///     fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
///         let mut out = FeatureMap::new();
///         out.insert("peak".into(), FeatureValue::Scalar(audio.peak() as f64));
///         Ok(out)
///     }
/// }
/// ```
pub trait FeatureExtractor: Send + Sync {
    /// Registry name (e.g. "pitch")
    fn name(&self) -> &'static str;

    /// Keys this extractor always produces, in column order
    fn output_keys(&self) -> &'static [FeatureKey];

    /// Compute features from a trimmed, normalized buffer
    ///
    /// # Errors
    /// Returns `ExtractionError` only for genuine failures; the engine records
    /// the failure and keeps the clip's other features.
    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError>;
}

/// Extraction error
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Input cannot be analyzed by this extractor
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Output did not match the declared keys
    #[error("Output shape mismatch for '{key}': {detail}")]
    ShapeMismatch {
        /// Offending key
        key: String,
        /// What was wrong
        detail: String,
    },

    /// Non-finite intermediate result
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// The extractor panicked
    #[error("Extractor panicked: {0}")]
    Panicked(String),
}

//! Acoustic feature extractors
//!
//! Each extractor implements [`FeatureExtractor`] and computes one family of
//! measurements from a trimmed, normalized [`AudioBuffer`].
//!
//! # Extractors (registry order)
//! 1. **pitch** - YIN f0 mean/variance over voiced frames
//! 2. **formant** - F1..F3 from LPC envelope peaks at 10 time points
//! 3. **mfcc** - 13 cepstral coefficients, mean/variance vectors
//! 4. **hnr** - harmonics-to-noise ratio over defined frames
//! 5. **spectral_centroid**, **spectral_bandwidth**, **spectral_flatness**
//! 6. **spectral_contrast** - 7 octave bands, mean/variance vectors
//! 7. **chroma** - 12 pitch classes, mean/variance vectors
//! 8. **zero_crossing** - frame-wise zero-crossing rate
//!
//! # Failure isolation
//! [`ExtractorSet::run`] calls every selected extractor against the same
//! buffer. An extractor that errors, panics, or returns keys that do not
//! match its declaration is recorded as failed; the others still run.

pub mod chroma;
pub mod dsp;
pub mod formant;
pub mod hnr;
pub mod mfcc;
pub mod pitch;
pub mod spectral;
pub mod zero_crossing;

use crate::error::{PipelineError, PipelineResult};
use crate::models::AudioBuffer;
use crate::types::{ExtractionError, FeatureExtractor, FeatureKey, FeatureMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

pub use chroma::ChromaExtractor;
pub use formant::FormantExtractor;
pub use hnr::HnrExtractor;
pub use mfcc::MfccExtractor;
pub use pitch::PitchExtractor;
pub use spectral::{
    SpectralBandwidthExtractor, SpectralCentroidExtractor, SpectralContrastExtractor,
    SpectralFlatnessExtractor,
};
pub use zero_crossing::ZeroCrossingExtractor;

/// Closed, ordered set of available extractors
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn FeatureExtractor>>,
}

impl ExtractorRegistry {
    /// Registry with every built-in extractor
    pub fn standard() -> Self {
        Self::with_extractors(vec![
            Arc::new(PitchExtractor::default()),
            Arc::new(FormantExtractor::default()),
            Arc::new(MfccExtractor::default()),
            Arc::new(HnrExtractor::default()),
            Arc::new(SpectralCentroidExtractor),
            Arc::new(SpectralBandwidthExtractor),
            Arc::new(SpectralFlatnessExtractor),
            Arc::new(SpectralContrastExtractor::default()),
            Arc::new(ChromaExtractor::default()),
            Arc::new(ZeroCrossingExtractor::default()),
        ])
    }

    /// Registry over a caller-supplied list, in the given order
    pub fn with_extractors(extractors: Vec<Arc<dyn FeatureExtractor>>) -> Self {
        Self { extractors }
    }

    /// Registered names in registry order
    pub fn available(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Resolve a feature selection
    ///
    /// `None` selects every registered extractor. `Some(&[])` selects none,
    /// which yields identifying columns only. Names are trimmed and
    /// lower-cased, duplicates collapse, and the result keeps registry order
    /// regardless of the order requested.
    ///
    /// # Errors
    /// `UnknownFeature` for the first name that is not registered.
    pub fn select(&self, names: Option<&[String]>) -> PipelineResult<ExtractorSet> {
        let Some(names) = names else {
            return Ok(ExtractorSet::new(self.extractors.clone()));
        };

        let wanted: Vec<String> = names.iter().map(|n| n.trim().to_lowercase()).collect();
        if let Some(unknown) = wanted.iter().find(|n| !self.extractors.iter().any(|e| e.name() == n.as_str())) {
            return Err(PipelineError::UnknownFeature {
                name: unknown.clone(),
                available: self.available().join(", "),
            });
        }

        let selected = self
            .extractors
            .iter()
            .filter(|e| wanted.iter().any(|n| n == e.name()))
            .cloned()
            .collect();
        Ok(ExtractorSet::new(selected))
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Output of one [`ExtractorSet::run`]
#[derive(Debug, Default)]
pub struct ExtractorSetOutput {
    /// Merged keys from every extractor that succeeded
    pub features: FeatureMap,
    /// One `FeatureExtraction` error per failed extractor, in run order
    pub failures: Vec<PipelineError>,
}

impl ExtractorSetOutput {
    pub fn failed_names(&self) -> Vec<&'static str> {
        self.failures
            .iter()
            .filter_map(|e| match e {
                PipelineError::FeatureExtraction { extractor, .. } => Some(*extractor),
                _ => None,
            })
            .collect()
    }
}

/// Selected extractors, run together against one buffer
#[derive(Clone)]
pub struct ExtractorSet {
    extractors: Vec<Arc<dyn FeatureExtractor>>,
}

impl ExtractorSet {
    pub fn new(extractors: Vec<Arc<dyn FeatureExtractor>>) -> Self {
        Self { extractors }
    }

    /// Names in run order
    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Get extractor count
    pub fn count(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Declared keys of every extractor, in run order
    pub fn schema(&self) -> Vec<FeatureKey> {
        self.extractors
            .iter()
            .flat_map(|e| e.output_keys().iter().copied())
            .collect()
    }

    /// Run every extractor against `audio`, isolating failures
    pub fn run(&self, audio: &AudioBuffer) -> ExtractorSetOutput {
        let mut output = ExtractorSetOutput::default();

        for extractor in &self.extractors {
            let name = extractor.name();
            match run_isolated(extractor.as_ref(), audio) {
                Ok(features) => {
                    debug!(extractor = name, keys = features.len(), "Extraction successful");
                    output.features.extend(features);
                }
                Err(source) => {
                    let error = PipelineError::FeatureExtraction { extractor: name, source };
                    warn!(error = %error, "Extraction failed (per-extractor isolation)");
                    output.failures.push(error);
                }
            }
        }
        output
    }
}

/// Call one extractor, converting panics and malformed output into errors
fn run_isolated(extractor: &dyn FeatureExtractor, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
    let result = catch_unwind(AssertUnwindSafe(|| extractor.extract(audio)))
        .map_err(|payload| ExtractionError::Panicked(panic_message(payload.as_ref())))??;
    validate_output(extractor.output_keys(), result)
}

/// Keep only declared keys and check their shapes and finiteness
fn validate_output(keys: &[FeatureKey], mut produced: FeatureMap) -> Result<FeatureMap, ExtractionError> {
    let mut validated = FeatureMap::new();
    for key in keys {
        let value = produced.remove(key.name).ok_or_else(|| ExtractionError::ShapeMismatch {
            key: key.name.to_string(),
            detail: "missing".to_string(),
        })?;
        if !key.accepts(&value) {
            return Err(ExtractionError::ShapeMismatch {
                key: key.name.to_string(),
                detail: format!("expected width {}, got {}", key.width.unwrap_or(1), value.width()),
            });
        }
        let finite = match &value {
            crate::types::FeatureValue::Scalar(x) => x.is_finite(),
            crate::types::FeatureValue::Vector(v) => v.iter().all(|x| x.is_finite()),
        };
        if !finite {
            return Err(ExtractionError::Numerical(format!("non-finite value for '{}'", key.name)));
        }
        validated.insert(key.name.to_string(), value);
    }
    Ok(validated)
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Mock Extractors for Testing
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::types::FeatureValue;

    /// Configurable misbehaving extractor
    pub enum Behavior {
        Constant(f64),
        Fail,
        Panic,
        WrongShape,
        NotFinite,
    }

    pub struct MockExtractor {
        pub name: &'static str,
        pub behavior: Behavior,
    }

    const MOCK_KEYS: &[FeatureKey] = &[FeatureKey::scalar("mock_value")];

    impl FeatureExtractor for MockExtractor {
        fn name(&self) -> &'static str {
            self.name
        }

        fn output_keys(&self) -> &'static [FeatureKey] {
            MOCK_KEYS
        }

        fn extract(&self, _audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
            let mut out = FeatureMap::new();
            match self.behavior {
                Behavior::Constant(x) => {
                    out.insert("mock_value".into(), FeatureValue::Scalar(x));
                }
                Behavior::Fail => return Err(ExtractionError::InvalidInput("Mock failure".to_string())),
                Behavior::Panic => panic!("mock extractor exploded"),
                Behavior::WrongShape => {
                    out.insert("mock_value".into(), FeatureValue::Vector(vec![1.0, 2.0]));
                }
                Behavior::NotFinite => {
                    out.insert("mock_value".into(), FeatureValue::Scalar(f64::NAN));
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Behavior, MockExtractor};
    use super::*;
    use crate::extractors::dsp::test_signals::sine;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_registry_order() {
        assert_eq!(
            ExtractorRegistry::standard().available(),
            vec![
                "pitch",
                "formant",
                "mfcc",
                "hnr",
                "spectral_centroid",
                "spectral_bandwidth",
                "spectral_flatness",
                "spectral_contrast",
                "chroma",
                "zero_crossing",
            ]
        );
    }

    #[test]
    fn test_default_selection_is_everything() {
        let registry = ExtractorRegistry::standard();
        let set = registry.select(None).unwrap();
        assert_eq!(set.names(), registry.available());
    }

    #[test]
    fn test_empty_selection_is_nothing() {
        let none: Vec<String> = Vec::new();
        let set = ExtractorRegistry::standard().select(Some(none.as_slice())).unwrap();
        assert!(set.is_empty());
        assert!(set.schema().is_empty());
    }

    #[test]
    fn test_selection_keeps_registry_order_and_dedupes() {
        let set = ExtractorRegistry::standard()
            .select(Some(names(&["mfcc", " Pitch", "mfcc"]).as_slice()))
            .unwrap();
        assert_eq!(set.names(), vec!["pitch", "mfcc"]);
        let cols: Vec<String> = set.schema().iter().flat_map(|k| k.columns()).collect();
        assert_eq!(cols.len(), 2 + 26);
        assert_eq!(cols[0], "pitch_mean");
        assert_eq!(cols[2], "mfcc_mean_1");
    }

    #[test]
    fn test_unknown_feature_rejected() {
        let err = ExtractorRegistry::standard()
            .select(Some(names(&["pitch", "loudness"]).as_slice()))
            .err()
            .unwrap();
        match err {
            PipelineError::UnknownFeature { name, available } => {
                assert_eq!(name, "loudness");
                assert!(available.contains("zero_crossing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failures_isolated() {
        let set = ExtractorSet::new(vec![
            Arc::new(MockExtractor { name: "boom", behavior: Behavior::Panic }),
            Arc::new(MockExtractor { name: "bad", behavior: Behavior::Fail }),
            Arc::new(MockExtractor { name: "shape", behavior: Behavior::WrongShape }),
            Arc::new(MockExtractor { name: "nan", behavior: Behavior::NotFinite }),
            Arc::new(PitchExtractor::default()),
        ]);
        let audio = sine(200.0, 0.5, 16000, 0.5);
        let out = set.run(&audio);

        assert_eq!(out.failed_names(), vec!["boom", "bad", "shape", "nan"]);
        assert!(matches!(
            out.failures[0],
            PipelineError::FeatureExtraction { source: ExtractionError::Panicked(_), .. }
        ));
        assert!(matches!(
            out.failures[2],
            PipelineError::FeatureExtraction { source: ExtractionError::ShapeMismatch { .. }, .. }
        ));
        assert!(matches!(
            out.failures[3],
            PipelineError::FeatureExtraction { source: ExtractionError::Numerical(_), .. }
        ));
        assert!(out.features.contains_key("pitch_mean"));
        assert!(!out.features.contains_key("mock_value"));
    }

    #[test]
    fn test_every_standard_extractor_honours_its_declaration() {
        let set = ExtractorRegistry::standard().select(None).unwrap();
        let out = set.run(&sine(180.0, 1.0, 16000, 0.7));
        assert!(out.failures.is_empty(), "failures: {:?}", out.failed_names());
        for key in set.schema() {
            assert!(key.accepts(&out.features[key.name]), "{} malformed", key.name);
        }
    }

    #[test]
    fn test_constant_mock_passes_validation() {
        let set = ExtractorSet::new(vec![Arc::new(MockExtractor {
            name: "ok",
            behavior: Behavior::Constant(3.5),
        })]);
        let out = set.run(&sine(200.0, 0.1, 8000, 0.5));
        assert_eq!(out.features["mock_value"], crate::types::FeatureValue::Scalar(3.5));
    }
}

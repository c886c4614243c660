//! Zero-crossing rate

use crate::extractors::dsp::{frames, mean_var, HOP_LENGTH, N_FFT};
use crate::models::AudioBuffer;
use crate::types::{ExtractionError, FeatureExtractor, FeatureKey, FeatureMap, FeatureValue};

const KEYS: &[FeatureKey] = &[FeatureKey::scalar("zcr_mean"), FeatureKey::scalar("zcr_var")];

/// Fraction of adjacent sample pairs whose sign differs, per frame
#[derive(Debug, Clone)]
pub struct ZeroCrossingExtractor {
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for ZeroCrossingExtractor {
    fn default() -> Self {
        Self {
            frame_length: N_FFT,
            hop_length: HOP_LENGTH,
        }
    }
}

/// Zero counts as positive
pub fn crossing_rate(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|pair| pair[0].is_sign_negative() != pair[1].is_sign_negative())
        .count();
    crossings as f64 / frame.len() as f64
}

impl FeatureExtractor for ZeroCrossingExtractor {
    fn name(&self) -> &'static str {
        "zero_crossing"
    }

    fn output_keys(&self) -> &'static [FeatureKey] {
        KEYS
    }

    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
        let rates: Vec<f64> = frames(audio.samples(), self.frame_length, self.hop_length)
            .into_iter()
            .map(crossing_rate)
            .collect();
        let (mean, var) = mean_var(&rates);

        let mut out = FeatureMap::new();
        out.insert("zcr_mean".into(), FeatureValue::Scalar(mean));
        out.insert("zcr_var".into(), FeatureValue::Scalar(var));
        Ok(out)
    }
}

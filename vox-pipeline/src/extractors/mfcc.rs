//! Mel-frequency cepstral coefficients

use crate::extractors::dsp::{column_mean_var, dct_ortho, mel_filterbank, power_to_db, Spectrogram, N_FFT};
use crate::models::AudioBuffer;
use crate::types::{ExtractionError, FeatureExtractor, FeatureKey, FeatureMap, FeatureValue};

/// Coefficients kept per frame
pub const N_MFCC: usize = 13;

const KEYS: &[FeatureKey] = &[
    FeatureKey::vector("mfcc_mean", N_MFCC),
    FeatureKey::vector("mfcc_var", N_MFCC),
];

/// MFCC extractor: power spectrogram, mel bands, log, DCT-II
#[derive(Debug, Clone)]
pub struct MfccExtractor {
    pub n_mels: usize,
}

impl Default for MfccExtractor {
    fn default() -> Self {
        Self { n_mels: 40 }
    }
}

impl MfccExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// One row of [`N_MFCC`] coefficients per non-silent frame
    pub fn coefficients(&self, audio: &AudioBuffer) -> Vec<Vec<f64>> {
        let stft = Spectrogram::standard(audio.samples(), audio.sample_rate());
        if stft.frames.is_empty() {
            return Vec::new();
        }
        let fmax = audio.sample_rate() as f64 / 2.0;
        let bank = mel_filterbank(self.n_mels, N_FFT, audio.sample_rate(), 0.0, fmax);

        stft.active_frames()
            .map(|frame| {
                let log_mel: Vec<f64> = bank
                    .iter()
                    .map(|weights| {
                        let energy: f64 = weights.iter().zip(frame).map(|(w, m)| w * m * m).sum();
                        power_to_db(energy)
                    })
                    .collect();
                dct_ortho(&log_mel, N_MFCC)
            })
            .collect()
    }
}

impl FeatureExtractor for MfccExtractor {
    fn name(&self) -> &'static str {
        "mfcc"
    }

    fn output_keys(&self) -> &'static [FeatureKey] {
        KEYS
    }

    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
        let rows = self.coefficients(audio);
        let (mean, var) = column_mean_var(&rows, N_MFCC);

        let mut out = FeatureMap::new();
        out.insert("mfcc_mean".into(), FeatureValue::Vector(mean));
        out.insert("mfcc_var".into(), FeatureValue::Vector(var));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::dsp::test_signals::{empty, noise, silence, sine};

    fn vector(map: &FeatureMap, key: &str) -> Vec<f64> {
        match &map[key] {
            FeatureValue::Vector(v) => v.clone(),
            _ => panic!("{key} is not a vector"),
        }
    }

    #[test]
    fn test_output_shape() {
        let out = MfccExtractor::new().extract(&sine(300.0, 0.5, 16000, 0.5)).unwrap();
        assert_eq!(vector(&out, "mfcc_mean").len(), 13);
        assert_eq!(vector(&out, "mfcc_var").len(), 13);
        assert!(vector(&out, "mfcc_mean").iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_louder_signal_raises_c0() {
        let extractor = MfccExtractor::new();
        let quiet = vector(&extractor.extract(&noise(0.5, 16000, 0.05)).unwrap(), "mfcc_mean");
        let loud = vector(&extractor.extract(&noise(0.5, 16000, 0.5)).unwrap(), "mfcc_mean");
        assert!(loud[0] > quiet[0]);
    }

    #[test]
    fn test_degenerate_input_falls_back_to_zero() {
        for audio in [empty(16000), silence(0.5, 16000)] {
            let out = MfccExtractor::new().extract(&audio).unwrap();
            assert_eq!(vector(&out, "mfcc_mean"), vec![0.0; 13]);
            assert_eq!(vector(&out, "mfcc_var"), vec![0.0; 13]);
        }
    }

    #[test]
    fn test_deterministic() {
        let audio = noise(0.3, 16000, 0.3);
        let a = MfccExtractor::new().extract(&audio).unwrap();
        let b = MfccExtractor::new().extract(&audio).unwrap();
        assert_eq!(a, b);
    }
}

//! Pitch-class energy profile
//!
//! Each FFT bin's power is folded onto the nearest of 12 equal-tempered
//! pitch classes (A4 = 440 Hz, index 0 = C). Each frame is scaled so its
//! strongest class is 1.

use crate::extractors::dsp::{column_mean_var, Spectrogram};
use crate::models::AudioBuffer;
use crate::types::{ExtractionError, FeatureExtractor, FeatureKey, FeatureMap, FeatureValue};

pub const N_CHROMA: usize = 12;

const KEYS: &[FeatureKey] = &[
    FeatureKey::vector("chroma_mean", N_CHROMA),
    FeatureKey::vector("chroma_var", N_CHROMA),
];

/// Bins below this are ignored (A0)
const MIN_FREQ_HZ: f64 = 27.5;

#[derive(Debug, Clone)]
pub struct ChromaExtractor {
    pub tuning_hz: f64,
}

impl Default for ChromaExtractor {
    fn default() -> Self {
        Self { tuning_hz: 440.0 }
    }
}

impl ChromaExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pitch class for a frequency, `None` below the analysis range
    pub fn pitch_class(&self, freq: f64) -> Option<usize> {
        if freq < MIN_FREQ_HZ {
            return None;
        }
        let semitones_from_a = (12.0 * (freq / self.tuning_hz).log2()).round() as i64;
        Some((semitones_from_a + 9).rem_euclid(N_CHROMA as i64) as usize)
    }

    /// One normalized 12-vector per non-silent frame
    pub fn chromagram(&self, audio: &AudioBuffer) -> Vec<Vec<f64>> {
        let stft = Spectrogram::standard(audio.samples(), audio.sample_rate());
        let classes: Vec<Option<usize>> = stft.frequencies().iter().map(|&f| self.pitch_class(f)).collect();

        stft.active_frames()
            .filter_map(|frame| {
                let mut chroma = vec![0.0f64; N_CHROMA];
                for (m, class) in frame.iter().zip(&classes) {
                    if let Some(c) = class {
                        chroma[*c] += m * m;
                    }
                }
                let max = chroma.iter().cloned().fold(0.0f64, f64::max);
                if max <= 0.0 {
                    return None;
                }
                chroma.iter_mut().for_each(|v| *v /= max);
                Some(chroma)
            })
            .collect()
    }
}

impl FeatureExtractor for ChromaExtractor {
    fn name(&self) -> &'static str {
        "chroma"
    }

    fn output_keys(&self) -> &'static [FeatureKey] {
        KEYS
    }

    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
        let rows = self.chromagram(audio);
        let (mean, var) = column_mean_var(&rows, N_CHROMA);

        let mut out = FeatureMap::new();
        out.insert("chroma_mean".into(), FeatureValue::Vector(mean));
        out.insert("chroma_var".into(), FeatureValue::Vector(var));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::dsp::test_signals::{empty, silence, sine};

    #[test]
    fn test_pitch_class_mapping() {
        let chroma = ChromaExtractor::new();
        assert_eq!(chroma.pitch_class(440.0), Some(9)); // A
        assert_eq!(chroma.pitch_class(261.63), Some(0)); // C4
        assert_eq!(chroma.pitch_class(880.0), Some(9));
        assert_eq!(chroma.pitch_class(10.0), None);
    }

    #[test]
    fn test_a440_dominates() {
        let out = ChromaExtractor::new().extract(&sine(440.0, 1.0, 16000, 0.5)).unwrap();
        let FeatureValue::Vector(mean) = &out["chroma_mean"] else {
            panic!("chroma_mean is not a vector");
        };
        let strongest = mean
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(strongest, 9);
        assert!(mean.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_degenerate_input_falls_back_to_zero() {
        for audio in [empty(16000), silence(0.5, 16000)] {
            let out = ChromaExtractor::new().extract(&audio).unwrap();
            assert_eq!(out["chroma_mean"], FeatureValue::Vector(vec![0.0; 12]));
            assert_eq!(out["chroma_var"], FeatureValue::Vector(vec![0.0; 12]));
        }
    }
}

//! Frame-wise spectral shape statistics
//!
//! All four extractors share the standard magnitude spectrogram and skip
//! digitally silent frames; with no frames left they report zeros.

use crate::extractors::dsp::{column_mean_var, mean_var, power_to_db, Spectrogram, AMIN};
use crate::models::AudioBuffer;
use crate::types::{ExtractionError, FeatureExtractor, FeatureKey, FeatureMap, FeatureValue};

fn scalar_pair(mean_key: &str, var_key: &str, values: &[f64]) -> FeatureMap {
    let (mean, var) = mean_var(values);
    let mut out = FeatureMap::new();
    out.insert(mean_key.to_string(), FeatureValue::Scalar(mean));
    out.insert(var_key.to_string(), FeatureValue::Scalar(var));
    out
}

/// Magnitude-weighted centroid of one frame in Hz
fn frame_centroid(frame: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = frame.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    frame.iter().zip(freqs).map(|(m, f)| m * f).sum::<f64>() / total
}

// ============================================================================
// Centroid
// ============================================================================

const CENTROID_KEYS: &[FeatureKey] = &[
    FeatureKey::scalar("spectral_centroid_mean"),
    FeatureKey::scalar("spectral_centroid_var"),
];

/// Spectral centroid ("center of mass" of the spectrum)
#[derive(Debug, Clone, Default)]
pub struct SpectralCentroidExtractor;

impl FeatureExtractor for SpectralCentroidExtractor {
    fn name(&self) -> &'static str {
        "spectral_centroid"
    }

    fn output_keys(&self) -> &'static [FeatureKey] {
        CENTROID_KEYS
    }

    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
        let stft = Spectrogram::standard(audio.samples(), audio.sample_rate());
        let freqs = stft.frequencies();
        let values: Vec<f64> = stft.active_frames().map(|f| frame_centroid(f, &freqs)).collect();
        Ok(scalar_pair("spectral_centroid_mean", "spectral_centroid_var", &values))
    }
}

// ============================================================================
// Bandwidth
// ============================================================================

const BANDWIDTH_KEYS: &[FeatureKey] = &[
    FeatureKey::scalar("spectral_bandwidth_mean"),
    FeatureKey::scalar("spectral_bandwidth_var"),
];

/// Second-order spectral bandwidth around the centroid
#[derive(Debug, Clone, Default)]
pub struct SpectralBandwidthExtractor;

impl FeatureExtractor for SpectralBandwidthExtractor {
    fn name(&self) -> &'static str {
        "spectral_bandwidth"
    }

    fn output_keys(&self) -> &'static [FeatureKey] {
        BANDWIDTH_KEYS
    }

    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
        let stft = Spectrogram::standard(audio.samples(), audio.sample_rate());
        let freqs = stft.frequencies();
        let values: Vec<f64> = stft
            .active_frames()
            .map(|frame| {
                let total: f64 = frame.iter().sum();
                if total <= 0.0 {
                    return 0.0;
                }
                let centroid = frame_centroid(frame, &freqs);
                let spread: f64 = frame
                    .iter()
                    .zip(&freqs)
                    .map(|(m, f)| m * (f - centroid) * (f - centroid))
                    .sum();
                (spread / total).sqrt()
            })
            .collect();
        Ok(scalar_pair("spectral_bandwidth_mean", "spectral_bandwidth_var", &values))
    }
}

// ============================================================================
// Flatness
// ============================================================================

const FLATNESS_KEYS: &[FeatureKey] = &[
    FeatureKey::scalar("spectral_flatness_mean"),
    FeatureKey::scalar("spectral_flatness_var"),
];

/// Geometric over arithmetic mean of the power spectrum (1 = white noise)
#[derive(Debug, Clone, Default)]
pub struct SpectralFlatnessExtractor;

impl FeatureExtractor for SpectralFlatnessExtractor {
    fn name(&self) -> &'static str {
        "spectral_flatness"
    }

    fn output_keys(&self) -> &'static [FeatureKey] {
        FLATNESS_KEYS
    }

    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
        let stft = Spectrogram::standard(audio.samples(), audio.sample_rate());
        let values: Vec<f64> = stft
            .active_frames()
            .map(|frame| {
                let n = frame.len() as f64;
                let log_mean = frame.iter().map(|m| (m * m).max(AMIN).ln()).sum::<f64>() / n;
                let arith = frame.iter().map(|m| (m * m).max(AMIN)).sum::<f64>() / n;
                log_mean.exp() / arith
            })
            .collect();
        Ok(scalar_pair("spectral_flatness_mean", "spectral_flatness_var", &values))
    }
}

// ============================================================================
// Contrast
// ============================================================================

/// Octave sub-bands above the base band
pub const CONTRAST_BANDS: usize = 6;
const CONTRAST_WIDTH: usize = CONTRAST_BANDS + 1;

const CONTRAST_KEYS: &[FeatureKey] = &[
    FeatureKey::vector("spectral_contrast_mean", CONTRAST_WIDTH),
    FeatureKey::vector("spectral_contrast_var", CONTRAST_WIDTH),
];

/// Peak-to-valley level difference per octave band
///
/// Band 0 covers `[0, fmin]`, band k covers `[fmin * 2^(k-1), fmin * 2^k]`,
/// and the last band extends to Nyquist. A band with no FFT bins (low
/// sample rates) contributes 0.
#[derive(Debug, Clone)]
pub struct SpectralContrastExtractor {
    pub fmin: f64,
    /// Fraction of each band's bins averaged for the peak and valley levels
    pub quantile: f64,
}

impl Default for SpectralContrastExtractor {
    fn default() -> Self {
        Self {
            fmin: 200.0,
            quantile: 0.02,
        }
    }
}

impl SpectralContrastExtractor {
    fn band_bins(&self, freqs: &[f64], nyquist: f64) -> Vec<Vec<usize>> {
        let mut edges = vec![0.0];
        edges.extend((0..=CONTRAST_BANDS).map(|k| self.fmin * 2f64.powi(k as i32)));

        (0..CONTRAST_WIDTH)
            .map(|band| {
                let (low, mut high) = (edges[band], edges[band + 1]);
                if band == CONTRAST_BANDS {
                    high = high.max(nyquist);
                }
                freqs
                    .iter()
                    .enumerate()
                    .filter(|&(_, &f)| f >= low && f <= high)
                    .map(|(k, _)| k)
                    .collect()
            })
            .collect()
    }

    fn frame_contrast(&self, frame: &[f64], bands: &[Vec<usize>]) -> Vec<f64> {
        bands
            .iter()
            .map(|bins| {
                if bins.is_empty() {
                    return 0.0;
                }
                let mut levels: Vec<f64> = bins.iter().map(|&k| frame[k]).collect();
                levels.sort_by(|a, b| a.total_cmp(b));
                let take = ((self.quantile * levels.len() as f64).round() as usize).clamp(1, levels.len());
                let valley = levels[..take].iter().sum::<f64>() / take as f64;
                let peak = levels[levels.len() - take..].iter().sum::<f64>() / take as f64;
                power_to_db(peak) - power_to_db(valley)
            })
            .collect()
    }
}

impl FeatureExtractor for SpectralContrastExtractor {
    fn name(&self) -> &'static str {
        "spectral_contrast"
    }

    fn output_keys(&self) -> &'static [FeatureKey] {
        CONTRAST_KEYS
    }

    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
        let stft = Spectrogram::standard(audio.samples(), audio.sample_rate());
        let bands = self.band_bins(&stft.frequencies(), audio.sample_rate() as f64 / 2.0);
        let rows: Vec<Vec<f64>> = stft.active_frames().map(|f| self.frame_contrast(f, &bands)).collect();
        let (mean, var) = column_mean_var(&rows, CONTRAST_WIDTH);

        let mut out = FeatureMap::new();
        out.insert("spectral_contrast_mean".into(), FeatureValue::Vector(mean));
        out.insert("spectral_contrast_var".into(), FeatureValue::Vector(var));
        Ok(out)
    }
}

//! Harmonics-to-noise ratio (autocorrelation method)
//!
//! Per frame: remove DC, apply a Hann window, take the normalized
//! autocorrelation and divide out the window's own autocorrelation. The
//! strongest peak `r` in the pitch lag range gives `10 * log10(r / (1 - r))`.
//! Frames that are near-silent or have no positive peak are undefined and
//! dropped before averaging.

use crate::extractors::dsp::{hann_window, mean_var, seconds_to_samples};
use crate::models::AudioBuffer;
use crate::types::{ExtractionError, FeatureExtractor, FeatureKey, FeatureMap, FeatureValue};

const KEYS: &[FeatureKey] = &[FeatureKey::scalar("hnr_mean"), FeatureKey::scalar("hnr_var")];

/// Upper bound for `r`, caps HNR near 60 dB
const MAX_CORRELATION: f64 = 0.999_999;

#[derive(Debug, Clone)]
pub struct HnrExtractor {
    /// Lowest pitch considered, in Hz; sets the frame length
    pub min_pitch: f64,
    /// Highest pitch considered, in Hz
    pub max_pitch: f64,
    /// Frames whose peak is below this fraction of the clip peak are silent
    pub silence_threshold: f64,
    /// Frame hop in seconds
    pub hop_seconds: f64,
}

impl Default for HnrExtractor {
    fn default() -> Self {
        Self {
            min_pitch: 75.0,
            max_pitch: 600.0,
            silence_threshold: 0.1,
            hop_seconds: 0.010,
        }
    }
}

impl HnrExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// HNR in dB for every defined frame
    pub fn frame_values(&self, audio: &AudioBuffer) -> Vec<f64> {
        let sr = audio.sample_rate();
        let samples = audio.samples();
        let clip_peak = audio.peak() as f64;
        if samples.is_empty() || clip_peak == 0.0 {
            return Vec::new();
        }

        let min_lag = ((sr as f64 / self.max_pitch).floor() as usize).max(1);
        let max_lag = (sr as f64 / self.min_pitch).ceil() as usize;
        // Three periods of the lowest pitch
        let frame_len = 3 * max_lag;
        if samples.len() < frame_len || max_lag >= frame_len {
            return Vec::new();
        }

        let window = hann_window(frame_len);
        let window_ac = normalized_autocorrelation(&window, max_lag);
        let hop = seconds_to_samples(self.hop_seconds, sr);

        let mut values = Vec::new();
        let mut frame = vec![0.0f64; frame_len];
        let mut start = 0;
        while start + frame_len <= samples.len() {
            let raw = &samples[start..start + frame_len];
            start += hop;

            let local_peak = raw.iter().fold(0.0f64, |m, &s| m.max((s as f64).abs()));
            if local_peak < self.silence_threshold * clip_peak {
                continue;
            }

            let mean = raw.iter().map(|&s| s as f64).sum::<f64>() / frame_len as f64;
            for ((dst, &s), &w) in frame.iter_mut().zip(raw).zip(&window) {
                *dst = (s as f64 - mean) * w;
            }

            let ac = normalized_autocorrelation(&frame, max_lag);
            if ac.is_empty() {
                continue;
            }

            let best = (min_lag..=max_lag)
                .filter(|&lag| window_ac[lag] > 0.0)
                .map(|lag| ac[lag] / window_ac[lag])
                .fold(f64::NEG_INFINITY, f64::max);

            if best > 0.0 && best.is_finite() {
                let r = best.min(MAX_CORRELATION);
                values.push(10.0 * (r / (1.0 - r)).log10());
            }
        }
        values
    }
}

/// `r(lag) / r(0)` for lags `0..=max_lag`; empty for a zero-energy signal
fn normalized_autocorrelation(signal: &[f64], max_lag: usize) -> Vec<f64> {
    let energy: f64 = signal.iter().map(|x| x * x).sum();
    if energy <= 0.0 {
        return Vec::new();
    }
    (0..=max_lag.min(signal.len().saturating_sub(1)))
        .map(|lag| signal.iter().zip(&signal[lag..]).map(|(a, b)| a * b).sum::<f64>() / energy)
        .collect()
}

impl FeatureExtractor for HnrExtractor {
    fn name(&self) -> &'static str {
        "hnr"
    }

    fn output_keys(&self) -> &'static [FeatureKey] {
        KEYS
    }

    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
        let (mean, var) = mean_var(&self.frame_values(audio));
        let mut out = FeatureMap::new();
        out.insert("hnr_mean".into(), FeatureValue::Scalar(mean));
        out.insert("hnr_var".into(), FeatureValue::Scalar(var));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::dsp::test_signals::{empty, noise, silence, sine};

    fn hnr_mean(audio: &AudioBuffer) -> f64 {
        match HnrExtractor::new().extract(audio).unwrap()["hnr_mean"] {
            FeatureValue::Scalar(x) => x,
            _ => panic!("hnr_mean is not scalar"),
        }
    }

    #[test]
    fn test_periodic_signal_has_high_hnr() {
        let hnr = hnr_mean(&sine(200.0, 1.0, 16000, 0.8));
        assert!(hnr > 20.0, "hnr = {hnr}");
    }

    #[test]
    fn test_noise_below_periodic_signal() {
        let periodic = hnr_mean(&sine(200.0, 1.0, 16000, 0.8));
        let noisy = hnr_mean(&noise(1.0, 16000, 0.8));
        assert!(noisy < periodic);
        assert!(noisy < 10.0, "noise hnr = {noisy}");
    }

    #[test]
    fn test_degenerate_input_falls_back_to_zero() {
        for audio in [empty(16000), silence(1.0, 16000)] {
            assert_eq!(hnr_mean(&audio), 0.0);
        }
    }

    #[test]
    fn test_short_clip_has_no_frames() {
        let audio = sine(200.0, 0.01, 16000, 0.8);
        assert!(HnrExtractor::new().frame_values(&audio).is_empty());
    }
}

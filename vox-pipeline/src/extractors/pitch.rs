//! Fundamental frequency (YIN)
//!
//! Frame-wise f0 via the cumulative mean normalized difference function.
//! Frames with no dip below the aperiodicity threshold are unvoiced and
//! excluded from the aggregate.

use crate::extractors::dsp::{mean_var, seconds_to_samples};
use crate::models::AudioBuffer;
use crate::types::{ExtractionError, FeatureExtractor, FeatureKey, FeatureMap, FeatureValue};

const KEYS: &[FeatureKey] = &[FeatureKey::scalar("pitch_mean"), FeatureKey::scalar("pitch_var")];

/// YIN pitch tracker
#[derive(Debug, Clone)]
pub struct PitchExtractor {
    /// Lowest detectable f0 in Hz
    pub f0_min: f64,
    /// Highest detectable f0 in Hz
    pub f0_max: f64,
    /// CMNDF threshold below which a frame is voiced
    pub threshold: f64,
    /// Frame hop in seconds
    pub hop_seconds: f64,
}

impl Default for PitchExtractor {
    fn default() -> Self {
        Self {
            f0_min: 60.0,
            f0_max: 500.0,
            threshold: 0.15,
            hop_seconds: 0.010,
        }
    }
}

impl PitchExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// f0 in Hz for every voiced frame
    pub fn track(&self, audio: &AudioBuffer) -> Vec<f64> {
        let sr = audio.sample_rate() as f64;
        let min_lag = ((sr / self.f0_max).floor() as usize).max(2);
        let max_lag = (sr / self.f0_min).ceil() as usize;
        if max_lag <= min_lag {
            return Vec::new();
        }

        // Integration window of one longest period
        let window = max_lag;
        let frame_len = window + max_lag + 1;
        let hop = seconds_to_samples(self.hop_seconds, audio.sample_rate());
        let samples = audio.samples();
        if samples.len() < frame_len {
            return Vec::new();
        }

        let mut diff = vec![0.0f64; max_lag + 1];
        let mut cmndf = vec![1.0f64; max_lag + 1];
        let mut out = Vec::new();

        let mut start = 0;
        while start + frame_len <= samples.len() {
            let frame = &samples[start..start + frame_len];
            start += hop;

            for (tau, d) in diff.iter_mut().enumerate().skip(1) {
                *d = (0..window)
                    .map(|j| {
                        let delta = frame[j] as f64 - frame[j + tau] as f64;
                        delta * delta
                    })
                    .sum();
            }

            let mut running = 0.0;
            for tau in 1..=max_lag {
                running += diff[tau];
                cmndf[tau] = if running > 0.0 {
                    diff[tau] * tau as f64 / running
                } else {
                    1.0
                };
            }

            if let Some(tau) = self.first_dip(&cmndf, min_lag, max_lag) {
                let refined = parabolic_peak(&cmndf, tau);
                if refined > 0.0 {
                    let f0 = sr / refined;
                    if f0.is_finite() && f0 > 0.0 {
                        out.push(f0);
                    }
                }
            }
        }
        out
    }

    /// First lag under the threshold, walked down to its local minimum
    fn first_dip(&self, cmndf: &[f64], min_lag: usize, max_lag: usize) -> Option<usize> {
        let mut tau = min_lag;
        while tau <= max_lag {
            if cmndf[tau] < self.threshold {
                while tau < max_lag && cmndf[tau + 1] < cmndf[tau] {
                    tau += 1;
                }
                return Some(tau);
            }
            tau += 1;
        }
        None
    }
}

/// Sub-sample minimum position around `tau`
fn parabolic_peak(values: &[f64], tau: usize) -> f64 {
    if tau == 0 || tau + 1 >= values.len() {
        return tau as f64;
    }
    let (a, b, c) = (values[tau - 1], values[tau], values[tau + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < f64::EPSILON {
        return tau as f64;
    }
    tau as f64 + 0.5 * (a - c) / denom
}

impl FeatureExtractor for PitchExtractor {
    fn name(&self) -> &'static str {
        "pitch"
    }

    fn output_keys(&self) -> &'static [FeatureKey] {
        KEYS
    }

    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
        let f0 = self.track(audio);
        let (mean, var) = mean_var(&f0);

        let mut out = FeatureMap::new();
        out.insert("pitch_mean".into(), FeatureValue::Scalar(mean));
        out.insert("pitch_var".into(), FeatureValue::Scalar(var));
        Ok(out)
    }
}

//! Formant frequencies (LPC envelope peaks)
//!
//! The clip is sampled at a fixed number of evenly spaced time points. At
//! each point a short pre-emphasized, Hamming-windowed frame is fitted with
//! an all-pole model (autocorrelation method, Levinson-Durbin), and the
//! lowest three peaks of the model envelope below the ceiling are F1..F3.
//! A formant missing at a time point is excluded from that formant's mean.

use crate::extractors::dsp::{hamming_window, seconds_to_samples};
use crate::models::AudioBuffer;
use crate::types::{ExtractionError, FeatureExtractor, FeatureKey, FeatureMap, FeatureValue};
use std::f64::consts::PI;

const KEYS: &[FeatureKey] = &[
    FeatureKey::scalar("f1_mean"),
    FeatureKey::scalar("f2_mean"),
    FeatureKey::scalar("f3_mean"),
];

const ENVELOPE_POINTS: usize = 512;

/// LPC formant tracker
#[derive(Debug, Clone)]
pub struct FormantExtractor {
    /// Number of time points across the clip
    pub time_points: usize,
    /// Analysis frame length in seconds
    pub window_seconds: f64,
    /// Highest formant searched for, in Hz
    pub max_formant_hz: f64,
    /// Peaks at or below this are ignored, in Hz
    pub min_formant_hz: f64,
}

impl Default for FormantExtractor {
    fn default() -> Self {
        Self {
            time_points: 10,
            window_seconds: 0.030,
            max_formant_hz: 5500.0,
            min_formant_hz: 90.0,
        }
    }
}

impl FormantExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formant frequencies found at each time point (ascending, up to three)
    pub fn track(&self, audio: &AudioBuffer) -> Vec<Vec<f64>> {
        let samples = audio.samples();
        let sr = audio.sample_rate();
        if samples.is_empty() || self.time_points == 0 {
            return Vec::new();
        }

        let frame_len = seconds_to_samples(self.window_seconds, sr).min(samples.len());
        let window = hamming_window(frame_len);
        let order = (2 + sr as usize / 1000).min(16);
        let ceiling = self.max_formant_hz.min(sr as f64 / 2.0);
        let alpha = (-2.0 * PI * 50.0 / sr as f64).exp();

        (0..self.time_points)
            .map(|i| {
                let center = ((i as f64 + 0.5) / self.time_points as f64 * samples.len() as f64) as usize;
                let start = center
                    .saturating_sub(frame_len / 2)
                    .min(samples.len() - frame_len);
                let frame = &samples[start..start + frame_len];

                let mut emphasized = Vec::with_capacity(frame_len);
                let mut prev = if start > 0 { samples[start - 1] as f64 } else { 0.0 };
                for (&s, &w) in frame.iter().zip(&window) {
                    let s = s as f64;
                    emphasized.push((s - alpha * prev) * w);
                    prev = s;
                }

                match lpc_coefficients(&emphasized, order) {
                    Some(a) => envelope_peaks(&a, sr, ceiling, self.min_formant_hz, 3),
                    None => Vec::new(),
                }
            })
            .collect()
    }
}

/// All-pole coefficients `a[0..=order]` with `a[0] == 1`
///
/// Returns `None` for a zero-energy frame.
fn lpc_coefficients(frame: &[f64], order: usize) -> Option<Vec<f64>> {
    let order = order.min(frame.len().saturating_sub(1));
    if order == 0 {
        return None;
    }

    let mut r: Vec<f64> = (0..=order)
        .map(|lag| frame.iter().zip(&frame[lag..]).map(|(a, b)| a * b).sum())
        .collect();
    if r[0] <= f64::MIN_POSITIVE {
        return None;
    }
    // Slight white-noise floor keeps the recursion stable
    r[0] *= 1.0 + 1e-9;

    let mut a = vec![0.0; order + 1];
    a[0] = 1.0;
    let mut err = r[0];
    let mut prev = a.clone();

    for i in 1..=order {
        let acc: f64 = r[i] + (1..i).map(|j| a[j] * r[i - j]).sum::<f64>();
        let k = -acc / err;
        prev.copy_from_slice(&a);
        for j in 1..i {
            a[j] = prev[j] + k * prev[i - j];
        }
        a[i] = k;
        err *= 1.0 - k * k;
        if err <= 0.0 {
            break;
        }
    }

    if a.iter().all(|c| c.is_finite()) {
        Some(a)
    } else {
        None
    }
}

/// Local maxima of `1 / |A(e^jw)|^2` between `floor` and `ceiling` Hz
fn envelope_peaks(a: &[f64], sample_rate: u32, ceiling: f64, floor: f64, max_peaks: usize) -> Vec<f64> {
    let sr = sample_rate as f64;
    let freqs: Vec<f64> = (0..ENVELOPE_POINTS)
        .map(|i| ceiling * i as f64 / (ENVELOPE_POINTS - 1) as f64)
        .collect();
    let envelope: Vec<f64> = freqs
        .iter()
        .map(|&f| {
            let w = 2.0 * PI * f / sr;
            let (mut re, mut im) = (0.0, 0.0);
            for (k, &c) in a.iter().enumerate() {
                re += c * (w * k as f64).cos();
                im -= c * (w * k as f64).sin();
            }
            1.0 / (re * re + im * im).max(1e-300)
        })
        .collect();

    let mut peaks = Vec::new();
    for i in 1..ENVELOPE_POINTS - 1 {
        if envelope[i] > envelope[i - 1] && envelope[i] >= envelope[i + 1] && freqs[i] > floor {
            // Parabolic refinement on the log envelope
            let (l, c, r) = (envelope[i - 1].ln(), envelope[i].ln(), envelope[i + 1].ln());
            let denom = l - 2.0 * c + r;
            let offset = if denom.abs() > f64::EPSILON { 0.5 * (l - r) / denom } else { 0.0 };
            let step = freqs[1] - freqs[0];
            peaks.push(freqs[i] + offset.clamp(-0.5, 0.5) * step);
            if peaks.len() == max_peaks {
                break;
            }
        }
    }
    peaks
}

impl FeatureExtractor for FormantExtractor {
    fn name(&self) -> &'static str {
        "formant"
    }

    fn output_keys(&self) -> &'static [FeatureKey] {
        KEYS
    }

    fn extract(&self, audio: &AudioBuffer) -> Result<FeatureMap, ExtractionError> {
        let points = self.track(audio);

        let mut out = FeatureMap::new();
        for (idx, key) in KEYS.iter().enumerate() {
            let values: Vec<f64> = points.iter().filter_map(|p| p.get(idx).copied()).collect();
            let mean = if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            };
            out.insert(key.name.to_string(), FeatureValue::Scalar(mean));
        }
        Ok(out)
    }
}

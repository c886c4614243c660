//! Shared signal-processing primitives
//!
//! Spectral extractors share one STFT layout: centered frames of
//! [`N_FFT`] samples with zero padding at both ends, a periodic Hann window
//! and a hop of [`HOP_LENGTH`] samples. Spectra hold `N_FFT / 2 + 1` bins.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// FFT size for spectral features
pub const N_FFT: usize = 2048;

/// Hop between spectral frames
pub const HOP_LENGTH: usize = 512;

/// Floor applied before taking logarithms
pub const AMIN: f64 = 1e-10;

/// Frames with total power at or below this are treated as digital silence
pub const SILENT_FRAME_POWER: f64 = 1e-12;

/// Periodic Hann window
pub fn hann_window(len: usize) -> Vec<f64> {
    if len == 0 {
        return Vec::new();
    }
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}

/// Symmetric Hamming window
pub fn hamming_window(len: usize) -> Vec<f64> {
    if len < 2 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (len - 1) as f64).cos())
        .collect()
}

/// Magnitude spectrogram, one `Vec` of bins per frame
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// `frames[t][k]` = |X_t(k)|
    pub frames: Vec<Vec<f64>>,
    pub n_fft: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    /// Centered STFT of `samples`
    ///
    /// Empty input yields zero frames.
    pub fn compute(samples: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> Self {
        let mut frames = Vec::new();
        if samples.is_empty() || n_fft == 0 || hop == 0 {
            return Self {
                frames,
                n_fft,
                sample_rate,
            };
        }

        let pad = n_fft / 2;
        let mut padded = vec![0.0f64; samples.len() + 2 * pad];
        for (dst, &src) in padded[pad..].iter_mut().zip(samples) {
            *dst = src as f64;
        }

        let window = hann_window(n_fft);
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let n_bins = n_fft / 2 + 1;
        let n_frames = 1 + (padded.len() - n_fft) / hop;

        let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];
        for t in 0..n_frames {
            let start = t * hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * window[i], 0.0);
            }
            fft.process(&mut buffer);
            frames.push(buffer[..n_bins].iter().map(|c| c.norm()).collect());
        }

        Self {
            frames,
            n_fft,
            sample_rate,
        }
    }

    /// STFT with the default spectral layout
    pub fn standard(samples: &[f32], sample_rate: u32) -> Self {
        Self::compute(samples, sample_rate, N_FFT, HOP_LENGTH)
    }

    /// Number of bins per frame
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Center frequency of each bin in Hz
    pub fn frequencies(&self) -> Vec<f64> {
        fft_frequencies(self.sample_rate, self.n_fft)
    }

    /// Frames that are not digital silence
    pub fn active_frames(&self) -> impl Iterator<Item = &Vec<f64>> {
        self.frames
            .iter()
            .filter(|frame| frame.iter().map(|m| m * m).sum::<f64>() > SILENT_FRAME_POWER)
    }
}

/// Bin center frequencies for an `n_fft`-point real FFT
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    (0..=n_fft / 2)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}

/// Hz to mel (HTK)
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Mel to Hz (HTK)
pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank, `n_mels` rows of `n_fft / 2 + 1` weights
///
/// Filters are area-normalized (Slaney style).
pub fn mel_filterbank(n_mels: usize, n_fft: usize, sample_rate: u32, fmin: f64, fmax: f64) -> Vec<Vec<f64>> {
    let freqs = fft_frequencies(sample_rate, n_fft);
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
            let norm = 2.0 / (upper - lower);
            freqs
                .iter()
                .map(|&f| {
                    let rising = (f - lower) / (center - lower);
                    let falling = (upper - f) / (upper - center);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II, first `n_out` coefficients
pub fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = input.len();
    if n == 0 {
        return vec![0.0; n_out];
    }
    let scale0 = (1.0 / n as f64).sqrt();
    let scale = (2.0 / n as f64).sqrt();
    (0..n_out)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f64 * (2 * i + 1) as f64 / (2 * n) as f64).cos())
                .sum();
            sum * if k == 0 { scale0 } else { scale }
        })
        .collect()
}

/// Power to decibels with an [`AMIN`] floor
pub fn power_to_db(power: f64) -> f64 {
    10.0 * power.max(AMIN).log10()
}

/// Population mean and variance; `(0.0, 0.0)` for no values
pub fn mean_var(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var)
}

/// Per-column mean and variance of equal-length rows
///
/// Returns zero vectors of `width` when there are no rows.
pub fn column_mean_var(rows: &[Vec<f64>], width: usize) -> (Vec<f64>, Vec<f64>) {
    let mut means = vec![0.0; width];
    let mut vars = vec![0.0; width];
    if rows.is_empty() {
        return (means, vars);
    }
    let mut column = Vec::with_capacity(rows.len());
    for c in 0..width {
        column.clear();
        column.extend(rows.iter().map(|r| r.get(c).copied().unwrap_or(0.0)));
        let (m, v) = mean_var(&column);
        means[c] = m;
        vars[c] = v;
    }
    (means, vars)
}

/// Fixed-length time frames over raw samples, without padding
///
/// Input shorter than one frame yields a single frame of the whole input;
/// empty input yields nothing.
pub fn frames(samples: &[f32], frame_len: usize, hop: usize) -> Vec<&[f32]> {
    if samples.is_empty() || frame_len == 0 || hop == 0 {
        return Vec::new();
    }
    if samples.len() <= frame_len {
        return vec![samples];
    }
    let count = 1 + (samples.len() - frame_len) / hop;
    (0..count)
        .map(|i| &samples[i * hop..i * hop + frame_len])
        .collect()
}

/// Seconds to samples, rounded, at least 1
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    ((seconds * sample_rate as f64).round() as usize).max(1)
}

#[cfg(test)]
pub(crate) mod test_signals {
    //! Deterministic synthetic inputs for extractor tests

    use crate::models::AudioBuffer;
    use std::f64::consts::PI;

    pub fn sine(freq: f64, secs: f64, sample_rate: u32, amplitude: f64) -> AudioBuffer {
        let n = (secs * sample_rate as f64) as usize;
        let samples = (0..n)
            .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin()) as f32)
            .collect();
        AudioBuffer::new(samples, sample_rate).unwrap()
    }

    /// Uniform noise in [-amplitude, amplitude] from a fixed-seed LCG
    pub fn noise(secs: f64, sample_rate: u32, amplitude: f64) -> AudioBuffer {
        let n = (secs * sample_rate as f64) as usize;
        let mut state: u64 = 0x2545_F491_4F6C_DD1D;
        let samples = (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
                (amplitude * (2.0 * unit - 1.0)) as f32
            })
            .collect();
        AudioBuffer::new(samples, sample_rate).unwrap()
    }

    pub fn silence(secs: f64, sample_rate: u32) -> AudioBuffer {
        AudioBuffer::new(vec![0.0; (secs * sample_rate as f64) as usize], sample_rate).unwrap()
    }

    pub fn empty(sample_rate: u32) -> AudioBuffer {
        AudioBuffer::new(Vec::new(), sample_rate).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_roundtrip() {
        for hz in [0.0, 100.0, 1000.0, 4000.0, 8000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stft_frame_count_and_peak_bin() {
        let sr = 16000;
        let signal = test_signals::sine(1000.0, 1.0, sr, 0.5);
        let stft = Spectrogram::standard(signal.samples(), sr);

        assert_eq!(stft.frames.len(), 1 + signal.len() / HOP_LENGTH);
        assert_eq!(stft.frames[0].len(), N_FFT / 2 + 1);

        let mid = &stft.frames[stft.frames.len() / 2];
        let peak_bin = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        // 1000 Hz at 16 kHz with 2048 points lands on bin 128
        assert_eq!(peak_bin, 128);
    }

    #[test]
    fn test_stft_empty_input() {
        assert!(Spectrogram::standard(&[], 16000).frames.is_empty());
    }

    #[test]
    fn test_dct_of_constant_concentrates_in_c0() {
        let out = dct_ortho(&[1.0; 8], 4);
        assert!((out[0] - 8f64.sqrt()).abs() < 1e-9);
        assert!(out[1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn test_mean_var_population() {
        assert_eq!(mean_var(&[]), (0.0, 0.0));
        let (m, v) = mean_var(&[1.0, 2.0, 3.0, 4.0]);
        assert!((m - 2.5).abs() < 1e-12);
        assert!((v - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_frames_layout() {
        let samples = vec![0.0f32; 10];
        assert_eq!(frames(&samples, 4, 2).len(), 4);
        assert_eq!(frames(&samples, 20, 2).len(), 1);
        assert!(frames(&[], 4, 2).is_empty());
    }

    #[test]
    fn test_mel_filters_cover_band() {
        let bank = mel_filterbank(40, N_FFT, 16000, 0.0, 8000.0);
        assert_eq!(bank.len(), 40);
        assert!(bank.iter().all(|row| row.iter().any(|&w| w > 0.0)));
    }
}

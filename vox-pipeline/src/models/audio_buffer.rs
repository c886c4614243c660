//! In-memory mono audio

use crate::error::{PipelineError, PipelineResult};

/// Mono f32 samples plus sample rate
///
/// Produced by the decoder, then normalized and trimmed before any extractor
/// sees it. Transformations return new buffers; nothing mutates in place.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap samples, rejecting a zero sample rate
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> PipelineResult<Self> {
        if sample_rate == 0 {
            return Err(PipelineError::Common(vox_common::Error::InvalidInput(
                "Sample rate must be positive".to_string(),
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Samples in [-1.0, 1.0]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
    }

    /// Root-mean-square amplitude over the whole buffer
    pub fn rms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_squares / self.samples.len() as f64).sqrt()
    }

    /// Loudness relative to full scale (1.0), `-inf` for digital silence
    pub fn dbfs(&self) -> f64 {
        let rms = self.rms();
        if rms == 0.0 {
            return f64::NEG_INFINITY;
        }
        20.0 * rms.log10()
    }

    /// Peak-normalize to [-1.0, 1.0]
    ///
    /// Digital silence is returned unchanged.
    pub fn normalized(&self) -> AudioBuffer {
        let peak = self.peak();
        if peak == 0.0 || !peak.is_finite() {
            return self.clone();
        }
        let gain = 1.0 / peak;
        AudioBuffer {
            samples: self.samples.iter().map(|&s| s * gain).collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Copy of `[start, end)`, clamped to the buffer
    pub fn slice(&self, start: usize, end: usize) -> AudioBuffer {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        AudioBuffer {
            samples: self.samples[start..end].to_vec(),
            sample_rate: self.sample_rate,
        }
    }

    /// Convert milliseconds to a sample count at this buffer's rate
    pub fn ms_to_samples(&self, ms: u32) -> usize {
        (ms as u64 * self.sample_rate as u64 / 1000) as usize
    }
}

//! Audio Test Fixture Generator
//!
//! Generates mono 16-bit WAV clips shaped like short spoken utterances:
//! optional leading and trailing silence around a harmonic "voice".

use std::path::{Path, PathBuf};

/// Configuration for a generated clip
#[derive(Debug, Clone)]
pub struct ClipConfig {
    pub sample_rate: u32,
    /// Silence before the voiced section, seconds
    pub lead_silence: f64,
    /// Voiced section, seconds
    pub voiced: f64,
    /// Silence after the voiced section, seconds
    pub tail_silence: f64,
    /// Fundamental frequency of the voiced section
    pub f0: f64,
    /// Peak amplitude of the voiced section (0..1)
    pub amplitude: f64,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            lead_silence: 1.0,
            voiced: 3.0,
            tail_silence: 1.0,
            f0: 150.0,
            amplitude: 0.5,
        }
    }
}

impl ClipConfig {
    /// Voice-like clip with a given fundamental
    pub fn voice(f0: f64) -> Self {
        Self {
            f0,
            ..Default::default()
        }
    }

    pub fn total_seconds(&self) -> f64 {
        self.lead_silence + self.voiced + self.tail_silence
    }

    /// Samples of the whole clip
    pub fn samples(&self) -> Vec<f32> {
        let sr = self.sample_rate as f64;
        let lead = (self.lead_silence * sr) as usize;
        let voiced = (self.voiced * sr) as usize;
        let tail = (self.tail_silence * sr) as usize;

        let mut samples = vec![0.0f32; lead];
        samples.extend((0..voiced).map(|i| {
            let t = i as f64 / sr;
            // Three harmonics with falling amplitude
            let value: f64 = [(1.0, 1.0), (2.0, 0.5), (3.0, 0.25)]
                .iter()
                .map(|(h, a)| a * (2.0 * std::f64::consts::PI * self.f0 * h * t).sin())
                .sum();
            (self.amplitude * value / 1.75) as f32
        }));
        samples.extend(std::iter::repeat(0.0f32).take(tail));
        samples
    }
}

/// Write a clip as mono 16-bit WAV
pub fn generate_test_wav(path: &Path, config: &ClipConfig) -> anyhow::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in config.samples() {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_clip_length() {
        let temp_dir = TempDir::new().unwrap();
        let config = ClipConfig::default();
        let path = generate_test_wav(&temp_dir.path().join("a.wav"), &config).unwrap();

        let reader = hound::WavReader::open(path).unwrap();
        assert_eq!(reader.duration(), (config.total_seconds() * 16000.0) as u32);
    }
}

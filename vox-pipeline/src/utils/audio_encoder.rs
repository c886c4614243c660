//! WAV output for preprocessed clips

use crate::error::{PipelineError, PipelineResult};
use crate::models::AudioBuffer;
use std::path::Path;

/// Write `audio` as 16-bit PCM mono WAV
///
/// Samples are clamped to [-1.0, 1.0]. The file is written under a temporary
/// name and renamed into place, so readers never see a half-written clip.
pub fn write_wav(audio: &AudioBuffer, dest: &Path) -> PipelineResult<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let tmp = dest.with_extension("wav.partial");
    let encode = || -> Result<(), hound::Error> {
        let mut writer = hound::WavWriter::create(&tmp, spec)?;
        for &s in audio.samples() {
            let clamped = s.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32).round() as i16)?;
        }
        writer.finalize()
    };

    if let Err(e) = encode() {
        let _ = std::fs::remove_file(&tmp);
        return Err(PipelineError::unreadable(dest, format!("wav encode failed: {}", e)));
    }

    std::fs::rename(&tmp, dest)?;
    Ok(())
}

/// Duration of a WAV file in seconds, read from its header
pub fn wav_duration_seconds(path: &Path) -> PipelineResult<f64> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| PipelineError::unreadable(path, format!("wav header: {}", e)))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(PipelineError::unreadable(path, "zero sample rate"));
    }
    // duration() counts frames, independent of channel count
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

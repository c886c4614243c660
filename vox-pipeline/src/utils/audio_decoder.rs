//! Audio Decoding Utilities
//!
//! Decodes compressed clips (MP3 in the corpus, anything symphonia probes in
//! practice) to a mono [`AudioBuffer`] at the source sample rate.

use crate::error::{PipelineError, PipelineResult};
use crate::models::AudioBuffer;
use std::path::Path;
use symphonia::core::audio::{AudioBuffer as SymphoniaBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Decode an audio file to mono f32 samples
///
/// **Algorithm:**
/// 1. Probe format (extension used as a hint only)
/// 2. Pick the first track with a real codec
/// 3. Decode every packet, skipping corrupt ones
/// 4. Average channels down to mono
///
/// # Errors
/// * `ClipNotFound` if the file does not exist
/// * `ClipUnreadable` if it cannot be probed, has no audio track, or yields
///   no samples at all
pub fn decode_audio_file(file_path: &Path) -> PipelineResult<AudioBuffer> {
    tracing::debug!(path = %file_path.display(), "Decoding audio file");

    if !file_path.exists() {
        return Err(PipelineError::ClipNotFound(file_path.to_path_buf()));
    }

    let file = std::fs::File::open(file_path)
        .map_err(|e| PipelineError::unreadable(file_path, format!("open failed: {}", e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PipelineError::unreadable(file_path, format!("probe failed: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::unreadable(file_path, "no audio track"))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::unreadable(file_path, format!("unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(PipelineError::unreadable(
                    file_path,
                    format!("packet read failed: {}", e),
                ));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_rate.is_none() {
                    sample_rate = Some(decoded.spec().rate);
                }
                samples.extend(convert_to_mono_f32(&decoded));
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                // Corrupt frame; keep going
                skipped_packets += 1;
                tracing::trace!(path = %file_path.display(), error = msg, "Skipping undecodable packet");
            }
            Err(e) => {
                return Err(PipelineError::unreadable(file_path, format!("decode failed: {}", e)));
            }
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| PipelineError::unreadable(file_path, "sample rate unknown"))?;

    if samples.is_empty() {
        return Err(PipelineError::unreadable(file_path, "no decodable audio"));
    }

    tracing::debug!(
        path = %file_path.display(),
        total_samples = samples.len(),
        sample_rate,
        skipped_packets,
        "Audio decoding complete"
    );

    AudioBuffer::new(samples, sample_rate)
}

/// Average all channels of a decoded packet into mono f32
fn convert_to_mono_f32(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::U8(buf) => mix_down(&**buf),
        AudioBufferRef::U16(buf) => mix_down(&**buf),
        AudioBufferRef::U24(buf) => mix_down(&**buf),
        AudioBufferRef::U32(buf) => mix_down(&**buf),
        AudioBufferRef::S8(buf) => mix_down(&**buf),
        AudioBufferRef::S16(buf) => mix_down(&**buf),
        AudioBufferRef::S24(buf) => mix_down(&**buf),
        AudioBufferRef::S32(buf) => mix_down(&**buf),
        AudioBufferRef::F32(buf) => mix_down(&**buf),
        AudioBufferRef::F64(buf) => mix_down(&**buf),
    }
}

fn mix_down<S>(buf: &SymphoniaBuffer<S>) -> Vec<f32>
where
    S: Sample,
    f32: FromSample<S>,
{
    let num_channels = buf.spec().channels.count();
    let num_frames = buf.frames();
    if num_channels == 0 {
        return Vec::new();
    }

    let mut mono = vec![0.0f32; num_frames];
    for ch in 0..num_channels {
        for (acc, &s) in mono.iter_mut().zip(buf.chan(ch)) {
            *acc += f32::from_sample(s);
        }
    }
    let scale = 1.0 / num_channels as f32;
    mono.iter_mut().for_each(|s| *s *= scale);
    mono
}

//! Utility modules for vox-pipeline

pub mod audio_decoder;
pub mod audio_encoder;

pub use audio_decoder::decode_audio_file;
pub use audio_encoder::{wav_duration_seconds, write_wav};

//! Leading/trailing silence trimming
//!
//! The threshold adapts to each clip: it sits a fixed number of dB below the
//! clip's own overall RMS loudness. A sliding window of `min_silence_ms` is
//! moved across the clip in 1 ms steps; a window whose RMS is at or below
//! the threshold is silent. Overlapping silent windows merge into silent
//! ranges, the complement gives the non-silent ranges, and the trimmed clip
//! spans from the first non-silent sample to the end of the last non-silent
//! range.

use crate::models::AudioBuffer;
use thiserror::Error;

/// Silence trimming configuration errors
#[derive(Debug, Error)]
pub enum SilenceError {
    /// Threshold offset above the clip's own loudness
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Invalid window parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Sample range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRange {
    pub start: usize,
    pub end: usize,
}

impl SampleRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Result of trimming one clip
#[derive(Debug, Clone)]
pub struct TrimOutcome {
    /// Trimmed audio, or the original when nothing non-silent was found
    pub buffer: AudioBuffer,
    /// First kept sample in the original buffer
    pub start: usize,
    /// One past the last kept sample in the original buffer
    pub end: usize,
    /// False when the original was returned unchanged
    pub trimmed: bool,
}

/// Adaptive-threshold silence trimmer
#[derive(Debug, Clone)]
pub struct SilenceTrimmer {
    /// Threshold relative to clip loudness (default: -16 dB)
    threshold_offset_db: f32,

    /// Minimum silence run in milliseconds (default: 500 ms)
    min_silence_ms: u32,

    /// Window step in milliseconds (default: 1 ms)
    seek_step_ms: u32,
}

impl Default for SilenceTrimmer {
    fn default() -> Self {
        Self::new()
    }
}

impl SilenceTrimmer {
    /// Default offset below clip loudness, in dB
    pub const DEFAULT_THRESHOLD_OFFSET_DB: f32 = -16.0;
    /// Default minimum silence run, in milliseconds
    pub const DEFAULT_MIN_SILENCE_MS: u32 = 500;

    /// Create new trimmer with defaults
    pub fn new() -> Self {
        Self {
            threshold_offset_db: Self::DEFAULT_THRESHOLD_OFFSET_DB,
            min_silence_ms: Self::DEFAULT_MIN_SILENCE_MS,
            seek_step_ms: 1,
        }
    }

    /// Set threshold offset relative to the clip's loudness
    pub fn with_threshold_offset_db(mut self, offset_db: f32) -> Result<Self, SilenceError> {
        if !offset_db.is_finite() || offset_db > 0.0 {
            return Err(SilenceError::InvalidThreshold(
                "Threshold offset must be a finite value <= 0 dB".to_string(),
            ));
        }
        self.threshold_offset_db = offset_db;
        Ok(self)
    }

    /// Set minimum silence run length
    pub fn with_min_silence_ms(mut self, min_silence_ms: u32) -> Result<Self, SilenceError> {
        if min_silence_ms == 0 {
            return Err(SilenceError::InvalidParameters(
                "Minimum silence length must be > 0 ms".to_string(),
            ));
        }
        self.min_silence_ms = min_silence_ms;
        Ok(self)
    }

    pub fn threshold_offset_db(&self) -> f32 {
        self.threshold_offset_db
    }

    pub fn min_silence_ms(&self) -> u32 {
        self.min_silence_ms
    }

    /// Linear RMS threshold for `audio`
    pub fn threshold_for(&self, audio: &AudioBuffer) -> f64 {
        audio.rms() * 10f64.powf(self.threshold_offset_db as f64 / 20.0)
    }

    /// Silent ranges, merged and sorted
    pub fn detect_silence(&self, audio: &AudioBuffer) -> Vec<SampleRange> {
        let n = audio.len();
        let window = audio.ms_to_samples(self.min_silence_ms).max(1);
        if n < window {
            return Vec::new();
        }
        let step = audio.ms_to_samples(self.seek_step_ms).max(1);
        let threshold = self.threshold_for(audio);

        // Prefix sums of squares give O(1) window RMS
        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push(0.0f64);
        let mut acc = 0.0f64;
        for &s in audio.samples() {
            acc += (s as f64) * (s as f64);
            prefix.push(acc);
        }
        let window_rms = |start: usize| -> f64 {
            let energy = (prefix[start + window] - prefix[start]).max(0.0);
            (energy / window as f64).sqrt()
        };

        let last_start = n - window;
        let mut starts: Vec<usize> = (0..=last_start).step_by(step).collect();
        if last_start % step != 0 {
            starts.push(last_start);
        }

        let mut ranges: Vec<SampleRange> = Vec::new();
        for start in starts {
            if window_rms(start) > threshold {
                continue;
            }
            let end = start + window;
            match ranges.last_mut() {
                Some(prev) if start <= prev.end => prev.end = prev.end.max(end),
                _ => ranges.push(SampleRange { start, end }),
            }
        }
        ranges
    }

    /// Non-silent ranges: the complement of [`detect_silence`](Self::detect_silence)
    pub fn detect_nonsilent(&self, audio: &AudioBuffer) -> Vec<SampleRange> {
        let n = audio.len();
        if n == 0 {
            return Vec::new();
        }
        let silent = self.detect_silence(audio);

        let mut nonsilent = Vec::new();
        let mut cursor = 0usize;
        for range in &silent {
            if range.start > cursor {
                nonsilent.push(SampleRange {
                    start: cursor,
                    end: range.start,
                });
            }
            cursor = cursor.max(range.end);
        }
        if cursor < n {
            nonsilent.push(SampleRange { start: cursor, end: n });
        }
        nonsilent
    }

    /// Trim leading and trailing silence
    ///
    /// Never returns an empty buffer: if the whole clip is silent (or empty)
    /// the original is returned with `trimmed == false`.
    pub fn trim(&self, audio: &AudioBuffer) -> TrimOutcome {
        let nonsilent = self.detect_nonsilent(audio);
        let (first, last) = match (nonsilent.first(), nonsilent.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                tracing::trace!(samples = audio.len(), "No non-silent range; keeping original");
                return TrimOutcome {
                    buffer: audio.clone(),
                    start: 0,
                    end: audio.len(),
                    trimmed: false,
                };
            }
        };

        let (start, end) = (first.start, last.end);
        if start == 0 && end == audio.len() {
            return TrimOutcome {
                buffer: audio.clone(),
                start,
                end,
                trimmed: false,
            };
        }

        TrimOutcome {
            buffer: audio.slice(start, end),
            start,
            end,
            trimmed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 8000;

    fn tone(secs: f32, amplitude: f32) -> Vec<f32> {
        let n = (secs * SR as f32) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * 200.0 * i as f32 / SR as f32).sin())
            .collect()
    }

    fn buffer(parts: &[Vec<f32>]) -> AudioBuffer {
        AudioBuffer::new(parts.concat(), SR).unwrap()
    }

    #[test]
    fn test_positive_offset_rejected() {
        assert!(SilenceTrimmer::new().with_threshold_offset_db(3.0).is_err());
        assert!(SilenceTrimmer::new().with_threshold_offset_db(-20.0).is_ok());
        assert!(SilenceTrimmer::new().with_min_silence_ms(0).is_err());
    }

    #[test]
    fn test_trims_leading_and_trailing_silence() {
        let audio = buffer(&[vec![0.0; SR as usize], tone(1.0, 0.8), vec![0.0; SR as usize]]);
        let outcome = SilenceTrimmer::new().trim(&audio);

        assert!(outcome.trimmed);
        assert!(outcome.start <= outcome.end);
        assert!(outcome.end <= audio.len());
        // Kept region hugs the tone; windows with a sliver of tone still count as silent
        assert!((outcome.start as i64 - SR as i64).abs() < 80);
        assert!((outcome.end as i64 - 2 * SR as i64).abs() < 80);
        assert_eq!(outcome.buffer.len(), outcome.end - outcome.start);
    }

    #[test]
    fn test_short_gaps_are_not_silence() {
        // 200 ms gap is shorter than the 500 ms minimum run
        let audio = buffer(&[tone(0.6, 0.8), vec![0.0; 1600], tone(0.6, 0.8)]);
        let outcome = SilenceTrimmer::new().trim(&audio);
        assert!(!outcome.trimmed);
        assert_eq!(outcome.buffer.len(), audio.len());
    }

    #[test]
    fn test_all_silent_clip_returned_unchanged() {
        let audio = buffer(&[vec![0.0; 2 * SR as usize]]);
        let outcome = SilenceTrimmer::new().trim(&audio);
        assert!(!outcome.trimmed);
        assert_eq!(outcome.buffer, audio);
    }

    #[test]
    fn test_clip_shorter_than_window_untouched() {
        let audio = buffer(&[vec![0.0; 100], tone(0.1, 0.5)]);
        let trimmer = SilenceTrimmer::new();
        assert!(trimmer.detect_silence(&audio).is_empty());
        let outcome = trimmer.trim(&audio);
        assert_eq!(outcome.buffer.len(), audio.len());
    }

    #[test]
    fn test_empty_clip_returned_unchanged() {
        let audio = AudioBuffer::new(Vec::new(), SR).unwrap();
        let outcome = SilenceTrimmer::new().trim(&audio);
        assert!(outcome.buffer.is_empty());
        assert!(!outcome.trimmed);
    }

    #[test]
    fn test_threshold_is_relative_to_clip_loudness() {
        // Quiet speech with a much quieter floor still trims
        let audio = buffer(&[vec![0.0005; SR as usize], tone(1.0, 0.05), vec![0.0005; SR as usize]]);
        let outcome = SilenceTrimmer::new().trim(&audio);
        assert!(outcome.trimmed);
        assert!(outcome.buffer.len() < audio.len());
        assert!(outcome.buffer.len() >= SR as usize - 200);
    }

    #[test]
    fn test_nonsilent_ranges_are_complement() {
        let audio = buffer(&[vec![0.0; SR as usize], tone(1.0, 0.8), vec![0.0; SR as usize], tone(1.0, 0.8)]);
        let trimmer = SilenceTrimmer::new();
        let silent = trimmer.detect_silence(&audio);
        let nonsilent = trimmer.detect_nonsilent(&audio);

        let total: usize = silent.iter().map(|r| r.len()).sum::<usize>()
            + nonsilent.iter().map(|r| r.len()).sum::<usize>();
        assert_eq!(total, audio.len());
        assert_eq!(nonsilent.len(), 2);
    }
}

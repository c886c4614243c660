//! Minimum-duration pass over preprocessed output

use crate::utils::wav_duration_seconds;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome of one filter pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DurationFilterReport {
    /// WAV files inspected
    pub scanned: usize,
    /// Files deleted for being too short
    pub removed: Vec<PathBuf>,
    /// Files whose header could not be read (left in place)
    pub unreadable: usize,
}

/// Deletes WAV files shorter than a floor
#[derive(Debug, Clone, Copy)]
pub struct DurationFilter {
    min_duration_secs: f64,
}

impl DurationFilter {
    /// Default floor in seconds
    pub const DEFAULT_MIN_DURATION_SECS: f64 = 2.0;

    pub fn new(min_duration_secs: f64) -> Self {
        Self {
            min_duration_secs: min_duration_secs.max(0.0),
        }
    }

    pub fn min_duration_secs(&self) -> f64 {
        self.min_duration_secs
    }

    /// Walk `root` recursively and remove `.wav` files below the floor
    ///
    /// A missing root is treated as empty.
    pub fn apply(&self, root: &Path) -> DurationFilterReport {
        let mut report = DurationFilterReport::default();
        if !root.is_dir() {
            return report;
        }

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error accessing entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_wav(entry.path()) {
                continue;
            }
            report.scanned += 1;

            match wav_duration_seconds(entry.path()) {
                Ok(secs) if secs < self.min_duration_secs => {
                    match std::fs::remove_file(entry.path()) {
                        Ok(()) => {
                            debug!(path = %entry.path().display(), duration = secs, "Removed short clip");
                            report.removed.push(entry.path().to_path_buf());
                        }
                        Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to remove short clip"),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable output");
                    report.unreadable += 1;
                }
            }
        }
        report
    }
}

impl Default for DurationFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_DURATION_SECS)
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

//! Run summaries
//!
//! One [`RunSummary`] per (stage, language), gathered into a
//! [`MultiRunReport`] for multi-language runs.

use crate::workflow::driver::BatchOutcome;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use vox_common::events::{PipelineEvent, Stage};

/// Outcome of one stage for one language
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub stage: Stage,
    pub language: String,
    /// Valid metadata rows dispatched
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Not run because the run was cancelled
    pub skipped: usize,
    /// Individual extractor failures inside otherwise successful rows
    pub extractor_failures: usize,
    /// Preprocessed clips deleted by the duration filter
    pub removed_short: usize,
    pub elapsed_ms: u64,
    /// Files written by the stage (tables, not individual clips)
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    /// Summary seeded from the worker pool's counts
    pub fn from_batch<T>(stage: Stage, language: &str, batch: &BatchOutcome<T>, started: Instant) -> Self {
        Self {
            stage,
            language: language.to_string(),
            total: batch.total,
            attempted: batch.attempted,
            succeeded: batch.succeeded,
            failed: batch.failed,
            skipped: batch.skipped,
            extractor_failures: 0,
            removed_short: 0,
            elapsed_ms: started.elapsed().as_millis() as u64,
            outputs: Vec::new(),
        }
    }

    /// One-line human readable form
    pub fn display_string(&self) -> String {
        let mut line = format!(
            "{} [{}]: {}/{} succeeded, {} failed, {} skipped",
            self.language,
            stage_name(self.stage),
            self.succeeded,
            self.total,
            self.failed,
            self.skipped
        );
        if self.extractor_failures > 0 {
            line.push_str(&format!(", {} extractor failures", self.extractor_failures));
        }
        if self.removed_short > 0 {
            line.push_str(&format!(", {} short clips removed", self.removed_short));
        }
        line.push_str(&format!(" in {:.1}s", self.elapsed_ms as f64 / 1000.0));
        line
    }

    /// Log at info and build the completion event
    pub(crate) fn finish(&self) -> PipelineEvent {
        info!(
            language = %self.language,
            stage = ?self.stage,
            attempted = self.attempted,
            succeeded = self.succeeded,
            failed = self.failed,
            skipped = self.skipped,
            extractor_failures = self.extractor_failures,
            removed_short = self.removed_short,
            elapsed_ms = self.elapsed_ms,
            "Language run complete"
        );
        PipelineEvent::LanguageCompleted {
            stage: self.stage,
            language: self.language.clone(),
            attempted: self.attempted,
            succeeded: self.succeeded,
            failed: self.failed,
            elapsed_ms: self.elapsed_ms,
            timestamp: chrono::Utc::now(),
        }
    }
}

pub fn stage_name(stage: Stage) -> &'static str {
    match stage {
        Stage::Preprocess => "preprocess",
        Stage::Extract => "extract",
    }
}

/// A language that produced no summary
#[derive(Debug, Clone, Serialize)]
pub struct SkippedLanguage {
    pub language: String,
    pub reason: String,
}

/// Results of a multi-language run
#[derive(Debug, Clone, Default, Serialize)]
pub struct MultiRunReport {
    pub summaries: Vec<RunSummary>,
    pub skipped_languages: Vec<SkippedLanguage>,
    /// True when the run was cancelled before every language finished
    pub cancelled: bool,
}

impl MultiRunReport {
    pub fn total_succeeded(&self) -> usize {
        self.summaries.iter().map(|s| s.succeeded).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.summaries.iter().map(|s| s.failed).sum()
    }

    /// Languages that completed a stage
    pub fn completed_languages(&self) -> Vec<&str> {
        self.summaries.iter().map(|s| s.language.as_str()).collect()
    }

    pub fn display_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.summaries.iter().map(RunSummary::display_string).collect();
        lines.extend(
            self.skipped_languages
                .iter()
                .map(|s| format!("{}: skipped ({})", s.language, s.reason)),
        );
        if self.cancelled {
            lines.push("run cancelled".to_string());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(language: &str, succeeded: usize, failed: usize) -> RunSummary {
        RunSummary {
            stage: Stage::Extract,
            language: language.to_string(),
            total: succeeded + failed,
            attempted: succeeded + failed,
            succeeded,
            failed,
            skipped: 0,
            extractor_failures: 0,
            removed_short: 0,
            elapsed_ms: 1500,
            outputs: Vec::new(),
        }
    }

    #[test]
    fn test_display_string() {
        let mut s = summary("es", 9, 1);
        assert_eq!(s.display_string(), "es [extract]: 9/10 succeeded, 1 failed, 0 skipped in 1.5s");
        s.extractor_failures = 2;
        assert!(s.display_string().contains("2 extractor failures"));
    }

    #[test]
    fn test_report_totals() {
        let report = MultiRunReport {
            summaries: vec![summary("es", 3, 1), summary("fr", 2, 0)],
            skipped_languages: vec![SkippedLanguage {
                language: "eo".to_string(),
                reason: "metadata table missing".to_string(),
            }],
            cancelled: false,
        };
        assert_eq!(report.total_succeeded(), 5);
        assert_eq!(report.total_failed(), 1);
        assert_eq!(report.completed_languages(), vec!["es", "fr"]);
        assert_eq!(report.display_lines().len(), 3);
    }

    #[test]
    fn test_summary_serializes() {
        let json = serde_json::to_value(summary("es", 1, 0)).unwrap();
        assert_eq!(json["stage"], "extract");
        assert_eq!(json["succeeded"], 1);
    }
}

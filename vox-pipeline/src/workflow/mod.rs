//! Multi-language pipeline
//!
//! Runs the preprocessing stage or the extraction engine over a list of
//! languages, one language at a time. A language without a metadata table
//! is skipped with a warning; any other per-language error is recorded the
//! same way so that the remaining languages still run.
//!
//! ```text
//! <source_dir>/<lang>/validated.tsv
//! <source_dir>/<lang>/clips/*.mp3
//!        │ preprocess
//!        ▼
//! <processed_dir>/<lang>/{male,female}/*.wav
//!
//! <source_dir>/<lang>/...
//!        │ extract
//!        ▼
//! <features_dir>/<lang>_features.csv
//! ```

pub mod driver;
pub mod extraction;
pub mod preprocessing;
pub mod statistics;

pub use driver::{arm_deadline, BatchOutcome, ItemFailure, WorkerPool};
pub use extraction::{table_file_name, ExtractionEngine, ExtractionReport};
pub use preprocessing::{PreprocessingStage, CLIPS_DIR};
pub use statistics::{MultiRunReport, RunSummary, SkippedLanguage};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vox_common::config::ensure_directory_exists;
use vox_common::events::{EventBus, PipelineEvent, Stage};

/// Entry point shared by the CLI and library callers
pub struct Pipeline {
    config: PipelineConfig,
    pool: WorkerPool,
}

impl Pipeline {
    /// Pipeline with its own cancellation token and no event bus
    pub fn new(config: PipelineConfig) -> Self {
        let pool = WorkerPool::new(config.workers).with_item_timeout(config.clip_timeout);
        Self { config, pool }
    }

    /// Publish progress on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.pool = self.pool.with_events(events);
        self
    }

    /// Share an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.pool = self.pool.with_cancellation(token);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.pool.cancellation_token().clone()
    }

    /// Trim and partition every language's clips into `processed_dir`
    pub async fn preprocess(&self, languages: &[String]) -> PipelineResult<MultiRunReport> {
        let stage = PreprocessingStage::from_config(&self.config, self.pool.clone())?;
        ensure_directory_exists(&self.config.processed_dir)?;
        let _deadline = self.arm_deadline();

        let mut report = MultiRunReport::default();
        for language in languages {
            if self.pool.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let source = self.config.language_source(language);
            let result = stage.run(language, &source, &self.config.processed_dir).await;
            self.record(&mut report, Stage::Preprocess, language, result);
        }
        report.cancelled |= self.pool.is_cancelled();
        Ok(report)
    }

    /// Extract features for every language into `features_dir`
    ///
    /// The feature selection is validated before any language runs.
    pub async fn extract(&self, languages: &[String]) -> PipelineResult<MultiRunReport> {
        let engine = ExtractionEngine::from_config(&self.config, self.pool.clone())?;
        let selection = self.config.features.as_deref();
        engine.registry().select(selection)?;
        ensure_directory_exists(&self.config.features_dir)?;
        let _deadline = self.arm_deadline();

        let mut report = MultiRunReport::default();
        for language in languages {
            if self.pool.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let source = self.config.language_source(language);
            let result = engine
                .run(language, &source, &self.config.features_dir, selection)
                .await
                .map(|r| r.summary);
            self.record(&mut report, Stage::Extract, language, result);
        }
        report.cancelled |= self.pool.is_cancelled();
        Ok(report)
    }

    fn arm_deadline(&self) -> Option<DeadlineGuard> {
        self.config.deadline.map(|deadline| {
            info!(deadline_secs = deadline.as_secs(), "Run deadline armed");
            DeadlineGuard(arm_deadline(self.pool.cancellation_token().clone(), deadline))
        })
    }

    fn record(&self, report: &mut MultiRunReport, stage: Stage, language: &str, result: PipelineResult<RunSummary>) {
        let reason = match result {
            Ok(summary) => {
                report.summaries.push(summary);
                return;
            }
            Err(PipelineError::Cancelled) => {
                report.cancelled = true;
                "cancelled".to_string()
            }
            Err(PipelineError::MetadataNotFound(path)) => {
                warn!(language, table = %path.display(), "Metadata table missing, skipping language");
                format!("metadata table not found: {}", path.display())
            }
            Err(e) => {
                warn!(language, error = %e, "Language failed, continuing with the rest");
                e.to_string()
            }
        };

        self.pool.emit(PipelineEvent::LanguageSkipped {
            stage,
            language: language.to_string(),
            reason: reason.clone(),
        });
        report.skipped_languages.push(SkippedLanguage {
            language: language.to_string(),
            reason,
        });
    }
}

/// Stops the deadline timer when a run ends before it fires
struct DeadlineGuard(tokio::task::JoinHandle<()>);

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

//! Preprocessing stage
//!
//! Trims leading and trailing silence from every valid clip of one language
//! and writes the result, partitioned by gender, as 16-bit mono WAV:
//!
//! ```text
//! <source>/clips/<path>   ->   <dest>/<lang>/<gender>/<path stem>.wav
//! ```
//!
//! An optional second pass deletes outputs shorter than the duration floor.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Gender, MetadataRow};
use crate::services::{DurationFilter, MetadataLoader, SilenceTrimmer, METADATA_FILE_NAME};
use crate::utils::{decode_audio_file, write_wav};
use crate::workflow::driver::WorkerPool;
use crate::workflow::statistics::RunSummary;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use vox_common::config::ensure_directory_exists;
use vox_common::events::Stage;

/// Directory holding a language's audio clips, relative to its corpus root
pub const CLIPS_DIR: &str = "clips";

/// Per-clip settings shared by every worker
#[derive(Debug, Clone)]
struct ClipJob {
    clips_dir: PathBuf,
    language_dir: PathBuf,
    trimmer: SilenceTrimmer,
}

impl ClipJob {
    fn output_path(&self, row: &MetadataRow) -> PathBuf {
        self.language_dir
            .join(row.gender.as_str())
            .join(&row.path)
            .with_extension("wav")
    }

    fn process(&self, row: MetadataRow) -> PipelineResult<PathBuf> {
        let source = self.clips_dir.join(&row.path);
        let audio = decode_audio_file(&source)?;
        let outcome = self.trimmer.trim(&audio);

        let dest = self.output_path(&row);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_wav(&outcome.buffer, &dest)?;

        debug!(
            clip = %row.path,
            start = outcome.start,
            end = outcome.end,
            trimmed = outcome.trimmed,
            "Clip preprocessed"
        );
        Ok(dest)
    }
}

/// Silence trimming and gender partitioning for one language at a time
pub struct PreprocessingStage {
    loader: MetadataLoader,
    trimmer: SilenceTrimmer,
    duration_filter: Option<DurationFilter>,
    pool: WorkerPool,
}

impl PreprocessingStage {
    pub fn new(loader: MetadataLoader, trimmer: SilenceTrimmer, pool: WorkerPool) -> Self {
        Self {
            loader,
            trimmer,
            duration_filter: Some(DurationFilter::default()),
            pool,
        }
    }

    /// Stage configured from resolved settings
    pub fn from_config(config: &PipelineConfig, pool: WorkerPool) -> PipelineResult<Self> {
        let loader = MetadataLoader::new().with_extensions(config.audio_extensions.iter());
        let mut stage = Self::new(loader, config.trimmer()?, pool);
        stage.duration_filter = config
            .duration_filter
            .then(|| DurationFilter::new(config.min_duration_secs));
        Ok(stage)
    }

    /// Replace (or disable with `None`) the post-write duration filter
    pub fn with_duration_filter(mut self, filter: Option<DurationFilter>) -> Self {
        self.duration_filter = filter;
        self
    }

    /// Preprocess every valid clip of `language`
    ///
    /// `source_dir` is the language's corpus root (holding `validated.tsv`
    /// and `clips/`); outputs go under `dest_dir/<language>/`.
    ///
    /// # Errors
    /// * `MetadataNotFound` when `validated.tsv` is absent
    /// * `Table`/`Common` when the table is malformed
    /// * `Io`/`Common` when the output directories cannot be created
    ///
    /// Per-clip failures are counted in the summary, never returned.
    pub async fn run(&self, language: &str, source_dir: &Path, dest_dir: &Path) -> PipelineResult<RunSummary> {
        let started = Instant::now();
        let rows = self.loader.load(&source_dir.join(METADATA_FILE_NAME))?;

        let language_dir = dest_dir.join(language);
        for gender in Gender::ALL {
            ensure_directory_exists(&language_dir.join(gender.as_str()))?;
        }

        info!(language, clips = rows.len(), dest = %language_dir.display(), "Starting preprocessing");

        let job = ClipJob {
            clips_dir: source_dir.join(CLIPS_DIR),
            language_dir: language_dir.clone(),
            trimmer: self.trimmer.clone(),
        };
        let batch = self
            .pool
            .run(
                Stage::Preprocess,
                language,
                rows,
                |row: &MetadataRow| row.path.clone(),
                move |row| job.process(row),
            )
            .await;

        let mut summary = RunSummary::from_batch(Stage::Preprocess, language, &batch, started);

        if let Some(filter) = &self.duration_filter {
            if self.pool.is_cancelled() {
                warn!(language, "Run cancelled, skipping duration filter");
            } else {
                let dir = language_dir.clone();
                let filter = *filter;
                let report = tokio::task::spawn_blocking(move || filter.apply(&dir))
                    .await
                    .map_err(|e| PipelineError::Worker(e.to_string()))?;
                summary.removed_short = report.removed.len();
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        summary.outputs.push(language_dir);
        self.pool.emit(summary.finish());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_replaces_extension_and_keeps_subdirs() {
        let job = ClipJob {
            clips_dir: PathBuf::from("/cv/es/clips"),
            language_dir: PathBuf::from("/out/es"),
            trimmer: SilenceTrimmer::new(),
        };
        let row = MetadataRow {
            path: "batch1/common_voice_es_1.mp3".to_string(),
            gender: Gender::Female,
            age: None,
            locale: None,
        };
        assert_eq!(
            job.output_path(&row),
            PathBuf::from("/out/es/female/batch1/common_voice_es_1.wav")
        );
    }
}

//! Extraction engine
//!
//! For every valid clip of one language: decode once, peak-normalize, trim
//! silence in memory, then run every selected extractor against the same
//! buffer. Rows are collected by the worker pool (never shared mutably),
//! sorted by clip path and written as one table:
//!
//! ```text
//! <dest>/<lang>_features.csv
//! <dest>/<lang>_<gender>_features.csv    (optional)
//! ```
//!
//! A clip that cannot be found, decoded or trimmed produces no row. An
//! extractor that fails leaves its own columns empty in an otherwise
//! complete row.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::extractors::{ExtractorRegistry, ExtractorSet};
use crate::models::{FeatureRow, FeatureTable, MetadataRow};
use crate::services::{MetadataLoader, SilenceTrimmer, METADATA_FILE_NAME};
use crate::utils::decode_audio_file;
use crate::workflow::driver::WorkerPool;
use crate::workflow::preprocessing::CLIPS_DIR;
use crate::workflow::statistics::RunSummary;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use vox_common::events::Stage;

/// File name of a language's feature table
pub fn table_file_name(language: &str) -> String {
    format!("{language}_features.csv")
}

/// Everything a worker needs to turn one metadata row into a feature row
struct ClipExtraction {
    clips_dir: PathBuf,
    trimmer: SilenceTrimmer,
    extractors: Arc<ExtractorSet>,
}

impl ClipExtraction {
    fn process(&self, row: MetadataRow) -> PipelineResult<FeatureRow> {
        let audio = decode_audio_file(&self.clips_dir.join(&row.path))?;
        let trimmed = self.trimmer.trim(&audio.normalized()).buffer;
        let output = self.extractors.run(&trimmed);

        if !output.failures.is_empty() {
            debug!(clip = %row.path, failed = ?output.failed_names(), "Partial feature row");
        }

        Ok(FeatureRow {
            failed_extractors: output.failed_names(),
            path: row.path,
            gender: row.gender,
            age: row.age,
            features: output.features,
        })
    }
}

/// Result of one language's extraction
#[derive(Debug)]
pub struct ExtractionReport {
    pub summary: RunSummary,
    /// Rows written, sorted by clip path
    pub table: FeatureTable,
}

/// Runs the selected extractors over one language's clips
pub struct ExtractionEngine {
    registry: ExtractorRegistry,
    loader: MetadataLoader,
    trimmer: SilenceTrimmer,
    pool: WorkerPool,
    per_gender: bool,
}

impl ExtractionEngine {
    pub fn new(registry: ExtractorRegistry, loader: MetadataLoader, trimmer: SilenceTrimmer, pool: WorkerPool) -> Self {
        Self {
            registry,
            loader,
            trimmer,
            pool,
            per_gender: false,
        }
    }

    /// Engine with the standard registry and resolved settings
    pub fn from_config(config: &PipelineConfig, pool: WorkerPool) -> PipelineResult<Self> {
        let loader = MetadataLoader::new().with_extensions(config.audio_extensions.iter());
        Ok(Self::new(ExtractorRegistry::standard(), loader, config.trimmer()?, pool)
            .with_per_gender(config.per_gender))
    }

    /// Also write one table per gender
    pub fn with_per_gender(mut self, per_gender: bool) -> Self {
        self.per_gender = per_gender;
        self
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Extract features for every valid clip of `language`
    ///
    /// `selection` of `None` runs every registered extractor; an empty
    /// selection produces identifying columns only.
    ///
    /// # Errors
    /// * `UnknownFeature` before any file is touched
    /// * `MetadataNotFound` when `validated.tsv` is absent
    /// * `Cancelled` when cancellation left any clip unprocessed (no table is written)
    /// * `Table`/`Io` when the output table cannot be written
    pub async fn run(
        &self,
        language: &str,
        source_dir: &Path,
        dest_dir: &Path,
        selection: Option<&[String]>,
    ) -> PipelineResult<ExtractionReport> {
        let started = Instant::now();
        let extractors = Arc::new(self.registry.select(selection)?);
        let rows = self.loader.load(&source_dir.join(METADATA_FILE_NAME))?;

        info!(
            language,
            clips = rows.len(),
            extractors = ?extractors.names(),
            "Starting feature extraction"
        );

        let job = ClipExtraction {
            clips_dir: source_dir.join(CLIPS_DIR),
            trimmer: self.trimmer.clone(),
            extractors: Arc::clone(&extractors),
        };
        let batch = self
            .pool
            .run(
                Stage::Extract,
                language,
                rows,
                |row: &MetadataRow| row.path.clone(),
                move |row| job.process(row),
            )
            .await;

        if batch.skipped > 0 {
            warn!(language, skipped = batch.skipped, "Extraction cancelled, table not written");
            return Err(PipelineError::Cancelled);
        }

        let mut summary = RunSummary::from_batch(Stage::Extract, language, &batch, started);
        summary.extractor_failures = batch.results.iter().map(|r| r.failed_extractors.len()).sum();

        let mut table = FeatureTable::new(language, extractors.schema());
        for row in batch.results {
            table.push(row);
        }
        table.sort_by_path();

        let table_path = dest_dir.join(table_file_name(language));
        table.write_csv(&table_path)?;
        info!(language, rows = table.len(), table = %table_path.display(), "Feature table written");
        summary.outputs.push(table_path);

        if self.per_gender {
            for (gender, part) in table.partition_by_gender() {
                let path = dest_dir.join(format!("{}_{}_features.csv", language, gender.as_str()));
                part.write_csv(&path)?;
                debug!(language, gender = gender.as_str(), rows = part.len(), "Gender table written");
                summary.outputs.push(path);
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        self.pool.emit(summary.finish());
        Ok(ExtractionReport { summary, table })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine() -> ExtractionEngine {
        ExtractionEngine::new(
            ExtractorRegistry::standard(),
            MetadataLoader::new(),
            SilenceTrimmer::new(),
            WorkerPool::new(1),
        )
    }

    #[test]
    fn test_table_file_name() {
        assert_eq!(table_file_name("es"), "es_features.csv");
    }

    #[tokio::test]
    async fn test_unknown_feature_fails_before_metadata_read() {
        // No validated.tsv exists: the selection error must win
        let dir = TempDir::new().unwrap();
        let selection = vec!["pitch".to_string(), "timbre".to_string()];
        let result = engine()
            .run("es", dir.path(), dir.path(), Some(selection.as_slice()))
            .await;
        assert!(matches!(result, Err(PipelineError::UnknownFeature { ref name, .. }) if name == "timbre"));
    }

    #[tokio::test]
    async fn test_missing_metadata_is_reported() {
        let dir = TempDir::new().unwrap();
        let result = engine().run("es", dir.path(), dir.path(), None).await;
        assert!(matches!(result, Err(PipelineError::MetadataNotFound(_))));
    }
}

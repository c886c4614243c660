//! Configuration resolution for vox-pipeline
//!
//! Provides multi-tier configuration resolution with CLI → ENV → TOML →
//! compiled default priority. The resolved [`PipelineConfig`] is passed
//! explicitly to every stage; nothing reads global state afterwards.

use crate::services::{DurationFilter, SilenceTrimmer};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use vox_common::config::{env_parse, CompiledDefaults, DirResolver, TomlConfig};
use vox_common::{Error, Result};

/// Environment variable names
pub mod env {
    pub const SOURCE_DIR: &str = "VOX_SOURCE_DIR";
    pub const PROCESSED_DIR: &str = "VOX_PROCESSED_DIR";
    pub const FEATURES_DIR: &str = "VOX_FEATURES_DIR";
    pub const WORKERS: &str = "VOX_WORKERS";
    pub const SILENCE_OFFSET_DB: &str = "VOX_SILENCE_OFFSET_DB";
    pub const MIN_SILENCE_MS: &str = "VOX_MIN_SILENCE_MS";
    pub const MIN_DURATION_SECS: &str = "VOX_MIN_DURATION_SECS";
    pub const CLIP_TIMEOUT_SECS: &str = "VOX_CLIP_TIMEOUT_SECS";
}

/// Values supplied on the command line; `None` defers to lower tiers
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub source_dir: Option<PathBuf>,
    pub processed_dir: Option<PathBuf>,
    pub features_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub min_duration_secs: Option<f64>,
    pub duration_filter: Option<bool>,
    pub features: Option<Vec<String>>,
    pub per_gender: Option<bool>,
    pub deadline_secs: Option<u64>,
    pub log_level: Option<String>,
}

/// Fully resolved pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the downloaded corpus: `<source_dir>/<lang>/validated.tsv`
    pub source_dir: PathBuf,
    /// Root of preprocessed output: `<processed_dir>/<lang>/<gender>/`
    pub processed_dir: PathBuf,
    /// Directory receiving `<lang>_features.csv`
    pub features_dir: PathBuf,
    /// Concurrent per-clip workers
    pub workers: usize,
    /// Silence threshold relative to clip loudness, dB (<= 0)
    pub silence_offset_db: f32,
    /// Minimum silent run, ms
    pub min_silence_ms: u32,
    /// Whether preprocessing runs the duration filter pass
    pub duration_filter: bool,
    /// Preprocessed clips shorter than this are deleted, seconds
    pub min_duration_secs: f64,
    /// Per-clip time budget
    pub clip_timeout: Option<Duration>,
    /// Whole-run deadline; the run is cancelled when it elapses
    pub deadline: Option<Duration>,
    /// Accepted clip extensions
    pub audio_extensions: Vec<String>,
    /// Feature selection; `None` = every registered extractor
    pub features: Option<Vec<String>>,
    /// Also write one table per gender
    pub per_gender: bool,
    /// Log filter level
    pub log_level: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let defaults = CompiledDefaults::default();
        Self {
            source_dir: defaults.source_dir,
            processed_dir: defaults.processed_dir,
            features_dir: defaults.features_dir,
            workers: default_workers(),
            silence_offset_db: SilenceTrimmer::DEFAULT_THRESHOLD_OFFSET_DB,
            min_silence_ms: SilenceTrimmer::DEFAULT_MIN_SILENCE_MS,
            duration_filter: true,
            min_duration_secs: DurationFilter::DEFAULT_MIN_DURATION_SECS,
            clip_timeout: None,
            deadline: None,
            audio_extensions: vec!["mp3".to_string()],
            features: None,
            per_gender: false,
            log_level: defaults.log_level,
        }
    }
}

/// One worker per available core
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl PipelineConfig {
    /// Resolve every field through CLI → ENV → TOML → default
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::default();
        let fallback = Self::default();

        let source_dir = DirResolver::new(env::SOURCE_DIR, toml.source_dir.as_deref(), &defaults.source_dir)
            .resolve(cli.source_dir.as_deref());
        let processed_dir = DirResolver::new(
            env::PROCESSED_DIR,
            toml.processed_dir.as_deref(),
            &defaults.processed_dir,
        )
        .resolve(cli.processed_dir.as_deref());
        let features_dir = DirResolver::new(env::FEATURES_DIR, toml.features_dir.as_deref(), &defaults.features_dir)
            .resolve(cli.features_dir.as_deref());

        let workers = cli
            .workers
            .or_else(|| env_parse(env::WORKERS))
            .or(toml.workers)
            .unwrap_or(fallback.workers);
        let silence_offset_db = env_parse(env::SILENCE_OFFSET_DB)
            .or(toml.silence.threshold_offset_db)
            .unwrap_or(fallback.silence_offset_db);
        let min_silence_ms = env_parse(env::MIN_SILENCE_MS)
            .or(toml.silence.min_silence_ms)
            .unwrap_or(fallback.min_silence_ms);
        let min_duration_secs = cli
            .min_duration_secs
            .or_else(|| env_parse(env::MIN_DURATION_SECS))
            .or(toml.min_duration_secs)
            .unwrap_or(fallback.min_duration_secs);
        let clip_timeout = env_parse::<u64>(env::CLIP_TIMEOUT_SECS)
            .or(toml.clip_timeout_secs)
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        let config = Self {
            source_dir,
            processed_dir,
            features_dir,
            workers,
            silence_offset_db,
            min_silence_ms,
            duration_filter: cli.duration_filter.unwrap_or(fallback.duration_filter),
            min_duration_secs,
            clip_timeout,
            deadline: cli.deadline_secs.filter(|&s| s > 0).map(Duration::from_secs),
            audio_extensions: toml.audio_extensions.clone().unwrap_or(fallback.audio_extensions),
            features: cli.features.clone().or_else(|| toml.features.clone()),
            per_gender: cli.per_gender.unwrap_or(fallback.per_gender),
            log_level: cli.log_level.clone().unwrap_or_else(|| toml.logging.level.clone()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values no stage can run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if !self.silence_offset_db.is_finite() || self.silence_offset_db > 0.0 {
            return Err(Error::Config(format!(
                "silence threshold offset must be <= 0 dB (got {})",
                self.silence_offset_db
            )));
        }
        if self.min_silence_ms == 0 {
            return Err(Error::Config("min_silence_ms must be at least 1".to_string()));
        }
        if !self.min_duration_secs.is_finite() || self.min_duration_secs < 0.0 {
            return Err(Error::Config(format!(
                "min_duration_secs must be >= 0 (got {})",
                self.min_duration_secs
            )));
        }
        if self.audio_extensions.is_empty() {
            return Err(Error::Config("audio_extensions must not be empty".to_string()));
        }
        Ok(())
    }

    /// Silence trimmer built from the configured parameters
    pub fn trimmer(&self) -> Result<SilenceTrimmer> {
        SilenceTrimmer::new()
            .with_threshold_offset_db(self.silence_offset_db)
            .and_then(|t| t.with_min_silence_ms(self.min_silence_ms))
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Corpus directory of one language
    pub fn language_source(&self, language: &str) -> PathBuf {
        self.source_dir.join(language)
    }

    /// Log the effective settings once at startup
    pub fn log_summary(&self) {
        info!(
            source = %self.source_dir.display(),
            processed = %self.processed_dir.display(),
            features = %self.features_dir.display(),
            workers = self.workers,
            silence_offset_db = self.silence_offset_db,
            min_silence_ms = self.min_silence_ms,
            min_duration_secs = self.min_duration_secs,
            "Pipeline configuration"
        );
    }
}

//! vox-pipeline - Common Voice preprocessing and feature extraction CLI
//!
//! ```bash
//! vox-pipeline preprocess --languages es fr --source data/raw --destination data/processed
//! vox-pipeline extract --languages es --features pitch mfcc --per-gender
//! vox-pipeline list-features
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vox_common::events::EventBus;
use vox_pipeline::extractors::ExtractorRegistry;
use vox_pipeline::{CliOverrides, MultiRunReport, Pipeline, PipelineConfig};

/// Command-line arguments for vox-pipeline
#[derive(Parser, Debug)]
#[command(name = "vox-pipeline")]
#[command(about = "Common Voice preprocessing and acoustic feature extraction")]
#[command(version)]
struct Args {
    /// Concurrent per-clip workers (default: CPU cores)
    #[arg(short, long, global = true, env = "VOX_WORKERS")]
    workers: Option<usize>,

    /// TOML config file (default: <config dir>/vox/config.toml)
    #[arg(short, long, global = true, env = "VOX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Cancel the run after this many seconds
    #[arg(long, global = true)]
    deadline_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trim silence and partition clips by gender
    Preprocess {
        /// Language codes, e.g. `es fr`
        #[arg(short, long, num_args = 1.., required = true)]
        languages: Vec<String>,

        /// Corpus root holding `<lang>/validated.tsv` and `<lang>/clips/`
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Output root for `<lang>/<gender>/*.wav`
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Remove preprocessed clips shorter than this (seconds)
        #[arg(long)]
        min_duration: Option<f64>,

        /// Keep short clips
        #[arg(long)]
        no_duration_filter: bool,
    },

    /// Extract acoustic features into one table per language
    Extract {
        #[arg(short, long, num_args = 1.., required = true)]
        languages: Vec<String>,

        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Output directory for `<lang>_features.csv`
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Feature names (default: all); see `list-features`
        #[arg(short, long, num_args = 1..)]
        features: Option<Vec<String>>,

        /// Also write `<lang>_<gender>_features.csv`
        #[arg(long)]
        per_gender: bool,
    },

    /// Print registered feature names
    ListFeatures,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        let mut cli = CliOverrides {
            workers: self.workers,
            deadline_secs: self.deadline_secs,
            log_level: self.log_level.clone(),
            ..Default::default()
        };
        match &self.command {
            Command::Preprocess {
                source,
                destination,
                min_duration,
                no_duration_filter,
                ..
            } => {
                cli.source_dir = source.clone();
                cli.processed_dir = destination.clone();
                cli.min_duration_secs = *min_duration;
                cli.duration_filter = Some(!no_duration_filter);
            }
            Command::Extract {
                source,
                destination,
                features,
                per_gender,
                ..
            } => {
                cli.source_dir = source.clone();
                cli.features_dir = destination.clone();
                cli.features = features.clone();
                cli.per_gender = Some(*per_gender);
            }
            Command::ListFeatures => {}
        }
        cli
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::ListFeatures = args.command {
        for name in ExtractorRegistry::standard().available() {
            println!("{name}");
        }
        return Ok(());
    }

    let toml = vox_common::config::load_or_default(args.config.as_deref())
        .context("Failed to load config file")?;
    let config = PipelineConfig::resolve(&args.overrides(), &toml).context("Invalid configuration")?;

    // Initialize tracing
    let default_filter = format!("vox_pipeline={0},vox_common={0}", config.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting vox-pipeline"
    );
    config.log_summary();

    let events = EventBus::new(256);
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                debug!(event = %json, "Pipeline event");
            }
        }
    });

    let pipeline = Pipeline::new(config).with_events(events);
    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling run");
            cancel.cancel();
        }
    });

    let report = match &args.command {
        Command::Preprocess { languages, .. } => pipeline.preprocess(languages).await?,
        Command::Extract { languages, .. } => pipeline.extract(languages).await?,
        Command::ListFeatures => MultiRunReport::default(),
    };

    for line in report.display_lines() {
        println!("{line}");
    }
    if report.summaries.is_empty() {
        warn!("No language produced output");
    }
    Ok(())
}

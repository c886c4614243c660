//! Configuration loading and data directory resolution
//!
//! Every setting resolves with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: it is logged and the
//! compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Logging section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Silence trimming section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SilenceToml {
    /// Threshold offset below clip loudness, in dB (negative)
    pub threshold_offset_db: Option<f32>,
    /// Minimum silent run length in milliseconds
    pub min_silence_ms: Option<u32>,
}

/// Contents of `config.toml`
///
/// All fields are optional so that partial files are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Directory holding downloaded per-language corpora
    pub source_dir: Option<PathBuf>,
    /// Directory receiving preprocessed clips
    pub processed_dir: Option<PathBuf>,
    /// Directory receiving feature tables
    pub features_dir: Option<PathBuf>,
    /// Worker pool size
    pub workers: Option<usize>,
    /// Default feature selection
    pub features: Option<Vec<String>>,
    /// Accepted clip extensions (without dot)
    pub audio_extensions: Option<Vec<String>>,
    /// Clips shorter than this are removed after preprocessing
    pub min_duration_secs: Option<f64>,
    /// Per-clip timeout in seconds
    pub clip_timeout_secs: Option<u64>,
    /// Silence trimming parameters
    #[serde(default)]
    pub silence: SilenceToml,
    /// Logging parameters
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compiled fallback values used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub source_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub features_dir: PathBuf,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            features_dir: PathBuf::from("data/features"),
            log_level: default_log_level(),
        }
    }
}

/// Resolves one directory setting through the CLI → ENV → TOML → default chain
pub struct DirResolver<'a> {
    env_var_name: &'a str,
    toml_value: Option<&'a Path>,
    default: &'a Path,
}

impl<'a> DirResolver<'a> {
    pub fn new(env_var_name: &'a str, toml_value: Option<&'a Path>, default: &'a Path) -> Self {
        Self {
            env_var_name,
            toml_value,
            default,
        }
    }

    /// Resolve the directory, given an optional command-line value
    pub fn resolve(&self, cli_arg: Option<&Path>) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            debug!(path = %path.display(), "Directory from command line");
            return path.to_path_buf();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(self.env_var_name) {
            if !path.trim().is_empty() {
                debug!(env = self.env_var_name, path = %path, "Directory from environment");
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = self.toml_value {
            debug!(path = %path.display(), "Directory from TOML config");
            return path.to_path_buf();
        }

        // Priority 4: Compiled default
        self.default.to_path_buf()
    }
}

/// Default location of the TOML config file for the platform
///
/// `~/.config/vox/config.toml` on Linux, the platform config dir elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vox").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the TOML config, degrading to defaults when it is missing
///
/// An explicitly requested file that cannot be parsed is an error; an absent
/// default file is not.
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    match explicit {
        Some(path) => load_toml_config(path),
        None => {
            let Some(path) = default_config_path() else {
                return Ok(TomlConfig::default());
            };
            if !path.exists() {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(TomlConfig::default());
            }
            match load_toml_config(&path) {
                Ok(config) => Ok(config),
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable config file, using defaults");
                    Ok(TomlConfig::default())
                }
            }
        }
    }
}

/// Read an environment variable and parse it, ignoring unparsable values
pub fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(env = name, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

/// Create a directory (and parents) if it does not already exist
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        debug!(path = %path.display(), "Created directory");
    } else if !path.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

//! Configuration loading and config file resolution
//!
//! Extractor configuration is static for the lifetime of a run. Sources, highest
//! priority first:
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`PLOTEX_CONFIG`)
//! 3. User config file (`~/.config/plotex/extractor.toml`)
//! 4. System config file (`/etc/plotex/extractor.toml`)
//! 5. Compiled defaults
//!
//! `BETYDB_URL` and `BETYDB_KEY` override the `[betydb]` table after loading.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "PLOTEX_CONFIG";

/// Environment variable overriding the BETYdb base URL
pub const BETYDB_URL_ENV_VAR: &str = "BETYDB_URL";

/// Environment variable overriding the BETYdb API key
pub const BETYDB_KEY_ENV_VAR: &str = "BETYDB_KEY";

/// Extractor configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Name of the extractor; the sensor name is derived from it
    #[serde(default)]
    pub extractor_name: String,

    /// Scientific method recorded in the `method` column (optional)
    #[serde(default)]
    pub method_name: Option<String>,

    /// Names of the algorithm-provided columns, in output order
    #[serde(default)]
    pub variable_names: VariableNames,

    #[serde(default = "default_unknown")]
    pub citation_author: String,

    #[serde(default = "default_unknown")]
    pub citation_title: String,

    #[serde(default = "default_unknown")]
    pub citation_year: String,

    /// Disable CSV and JSON sidecar output
    #[serde(default)]
    pub never_write_csv: bool,

    /// Disable the BETYdb upload
    #[serde(default)]
    pub never_write_betydb: bool,

    /// Stop after the first image that produces a trait row
    #[serde(default = "default_true")]
    pub first_image_only: bool,

    #[serde(default)]
    pub csv: CsvConfig,

    #[serde(default)]
    pub betydb: BetyDbConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            extractor_name: String::new(),
            method_name: None,
            variable_names: VariableNames::default(),
            citation_author: default_unknown(),
            citation_title: default_unknown(),
            citation_year: default_unknown(),
            never_write_csv: false,
            never_write_betydb: false,
            first_image_only: true,
            csv: CsvConfig::default(),
            betydb: BetyDbConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Variable field names, either `"a,b"` or `["a", "b"]` in TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableNames {
    Joined(String),
    List(Vec<String>),
}

impl Default for VariableNames {
    fn default() -> Self {
        VariableNames::List(Vec::new())
    }
}

impl VariableNames {
    /// Field names in configured order, trimmed, empty entries removed
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            VariableNames::Joined(joined) => joined.split(',').collect(),
            VariableNames::List(list) => list.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Shared CSV file contention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvConfig {
    /// Number of tries to open the CSV file before giving up
    #[serde(default = "default_max_open_attempts")]
    pub max_open_attempts: u32,

    /// Ceiling for a single backoff sleep, in seconds
    #[serde(default = "default_max_open_sleep_secs")]
    pub max_open_sleep_secs: f64,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            max_open_attempts: default_max_open_attempts(),
            max_open_sleep_secs: default_max_open_sleep_secs(),
        }
    }
}

/// BETYdb endpoint settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BetyDbConfig {
    /// Base URL of the BETYdb instance (e.g. `https://terraref.ncsa.illinois.edu/bety`)
    #[serde(default)]
    pub url: Option<String>,

    /// API key sent as the `key` query parameter
    #[serde(default)]
    pub key: Option<String>,

    /// Request timeout in seconds (30 when unset)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_unknown() -> String {
    "Unknown".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_open_attempts() -> u32 {
    10
}

fn default_max_open_sleep_secs() -> f64 {
    30.0
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve the configuration file path
///
/// Returns `None` when no source names an existing file; callers then run on
/// compiled defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3/4: user then system config file
    let user_config = dirs::config_dir().map(|d| d.join("plotex").join("extractor.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/plotex/extractor.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Parsed from this file
    File(PathBuf),
    /// This file was named but does not exist; compiled defaults in use
    Missing(PathBuf),
    /// No file named anywhere; compiled defaults in use
    Defaults,
}

impl ConfigOrigin {
    /// Log where the configuration came from; a missing file is a warning
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("Configuration loaded from {}", path.display()),
            ConfigOrigin::Missing(path) => warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            ),
            ConfigOrigin::Defaults => warn!("No config file found, using compiled defaults"),
        }
    }
}

/// Load configuration from `path`, falling back to defaults when it is missing
///
/// Nothing is logged; callers report the origin once tracing is up. A file that
/// exists but cannot be read or parsed is an error.
pub fn load_config_with_origin(path: Option<&Path>) -> Result<(ExtractorConfig, ConfigOrigin)> {
    let (mut config, origin) = match path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Read config {} failed: {}", path.display(), e))
            })?;
            let config: ExtractorConfig = toml::from_str(&content).map_err(|e| {
                Error::Config(format!("Parse config {} failed: {}", path.display(), e))
            })?;
            (config, ConfigOrigin::File(path.to_path_buf()))
        }
        Some(path) => (
            ExtractorConfig::default(),
            ConfigOrigin::Missing(path.to_path_buf()),
        ),
        None => (ExtractorConfig::default(), ConfigOrigin::Defaults),
    };

    apply_env_overrides(&mut config);
    Ok((config, origin))
}

/// Load configuration and log its origin
///
/// A missing file is a warning; a file that exists but cannot be read or parsed is
/// an error.
pub fn load_config(path: Option<&Path>) -> Result<ExtractorConfig> {
    let (config, origin) = load_config_with_origin(path)?;
    origin.log();
    Ok(config)
}

/// Apply `BETYDB_URL` / `BETYDB_KEY` environment overrides
pub fn apply_env_overrides(config: &mut ExtractorConfig) {
    if let Ok(url) = std::env::var(BETYDB_URL_ENV_VAR) {
        if !url.trim().is_empty() {
            config.betydb.url = Some(url);
        }
    }
    if let Ok(key) = std::env::var(BETYDB_KEY_ENV_VAR) {
        if !key.trim().is_empty() {
            config.betydb.key = Some(key);
        }
    }
}

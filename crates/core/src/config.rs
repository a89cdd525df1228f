//! TOML-based configuration for docrecon.
//!
//! Every section is optional in the file; missing values fall back to the
//! defaults below. Command-line flags are applied on top by the binary, after
//! which [`AppConfig::validate`] must pass before any pipeline stage runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Repositories and resolution settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Which files a repository walk reads.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Continuous-mode settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Persistence settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// External schema validator.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Bundle requirements checked at report time.
    #[serde(default)]
    pub pack: Option<PackConfig>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Repository roots to scan, in order.
    #[serde(default)]
    pub repositories: Vec<PathBuf>,

    /// Resolutions with confidence below this need approval (default 0.9).
    #[serde(default = "default_threshold")]
    pub auto_resolve_threshold: f64,

    /// Repositories scanned at once (default 4).
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,

    /// Content digest. `fallback` is for diagnostics only.
    #[serde(default)]
    pub hash_algorithm: HashAlgorithmKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithmKind {
    #[default]
    Sha256,
    Fallback,
}

fn default_threshold() -> f64 {
    0.9
}
fn default_scan_concurrency() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            auto_resolve_threshold: default_threshold(),
            scan_concurrency: default_scan_concurrency(),
            hash_algorithm: HashAlgorithmKind::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Glob patterns matched against repository-relative paths.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Largest file read, in bytes. 0 = unlimited.
    #[serde(default)]
    pub max_file_size: u64,
}

fn default_ignore_patterns() -> Vec<String> {
    [
        ".git/**",
        "**/.git/**",
        "target/**",
        "**/target/**",
        "node_modules/**",
        "**/node_modules/**",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: default_ignore_patterns(),
            max_file_size: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between pipeline runs (default 300).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_interval() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store / validation / pack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. Without one, the ingest stage only warns.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Validator executable. Validation is skipped when unset.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackConfig {
    #[serde(default)]
    pub name: String,

    /// Document type tags that must be present (e.g. `"LICENSE"`).
    #[serde(default)]
    pub required: Vec<String>,

    /// Document type tags that should be present.
    #[serde(default)]
    pub optional: Vec<String>,

    /// Extra pack script evaluated at report time and merged into the pack
    /// check. See [`PackSpec::parse`](crate::validation::PackSpec::parse).
    #[serde(default)]
    pub script: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!(
            repositories = config.pipeline.repositories.len(),
            "configuration parsed successfully"
        );
        Ok(config)
    }

    /// Check that the configuration can drive a pipeline run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.repositories.is_empty() {
            return Err(ConfigError::NoRepositories);
        }
        let threshold = self.pipeline.auto_resolve_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.auto_resolve_threshold".into(),
                detail: format!("threshold must be within [0, 1], got {threshold}"),
            });
        }
        if self.pipeline.scan_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.scan_concurrency".into(),
                detail: "scan concurrency must be > 0".into(),
            });
        }
        if self.daemon.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "daemon.interval_secs".into(),
                detail: "interval must be > 0".into(),
            });
        }
        if let Some(ref command) = self.validation.command {
            if command.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "validation.command".into(),
                    detail: "validator command must not be empty".into(),
                });
            }
        }
        Ok(())
    }
}

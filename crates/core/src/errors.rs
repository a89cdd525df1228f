//! Error types for the docrecon core library.
//!
//! Each I/O-facing subsystem has its own error type derived with `thiserror`,
//! and a top-level [`CoreError`] enum unifies them for callers that want a
//! single error type. The reconciliation engine itself (deduplication,
//! detection, resolution, inference) has no failure mode and never returns
//! these.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// ---------------------------------------------------------------------------
// Scan errors
// ---------------------------------------------------------------------------

/// Errors from walking a repository on disk.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The repository root does not exist.
    #[error("repository root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// The repository root exists but is not a directory.
    #[error("repository root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The directory walk failed at the repository root (e.g. permissions).
    #[error("failed to walk repository: {0}")]
    Walk(#[from] walkdir::Error),

    /// The blocking scan task panicked or was cancelled.
    #[error("scan task for '{repository}' failed: {detail}")]
    TaskFailed { repository: String, detail: String },

    /// Generic I/O wrapper.
    #[error("scan I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors from the document/graph persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed { version: u32, detail: String },

    /// A record could not be serialized for storage.
    #[error("failed to serialize {entity}: {source}")]
    Serialize {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A stored record could not be decoded.
    #[error("stored {entity} record is unreadable: {source}")]
    Corrupt {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// No store was configured for this run.
    #[error("no document store configured; results were not persisted")]
    NotConfigured,

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// No repositories were given, so there is nothing to scan.
    #[error("no repositories specified (use --repo or pipeline.repositories)")]
    NoRepositories,

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Validation collaborator errors
// ---------------------------------------------------------------------------

/// Errors from the external schema validator or rule engine.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The validator process could not be started.
    #[error("failed to spawn validator '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The validator exited with a non-zero status.
    #[error("validator exited with status {exit_code}: {stderr}")]
    Exited { exit_code: i32, stderr: String },

    /// The validator did not finish in time.
    #[error("validator timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The validator produced output that is not a valid report.
    #[error("failed to parse validator output: {0}")]
    Parse(#[from] serde_json::Error),

    /// The rule engine rejected the script.
    #[error("rule evaluation failed: {0}")]
    Rule(String),

    /// I/O error talking to the validator.
    #[error("validator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

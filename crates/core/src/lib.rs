//! docrecon core library.
//!
//! This crate provides the components for reconciling documentation files
//! across repositories: content addressing, deduplication, relationship
//! inference, conflict detection and resolution, filesystem scanning,
//! persistence, collaborator interfaces, and the stage pipeline tying them
//! together.

pub mod config;
pub mod conflict;
pub mod content;
pub mod dedup;
pub mod errors;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod scan;
pub mod store;
pub mod validation;

// Re-exports for convenience.
pub use config::AppConfig;
pub use conflict::{ConflictDetector, ConflictResolver};
pub use content::ContentAddresser;
pub use dedup::Deduplicator;
pub use inference::InferenceEngine;
pub use pipeline::{Pipeline, PipelineState, Stage};
pub use store::{Database, DocumentStore};

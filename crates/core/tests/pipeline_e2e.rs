//! End-to-end tests for the reconciliation pipeline.
//!
//! These tests exercise the real `Pipeline` with:
//! - Repositories laid out in `tempfile` directories
//! - Real SQLite stores (in-memory and on disk)
//! - The default SHA-256 addresser and rule table
//!
//! No network I/O and no external validator processes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use docrecon_core::config::AppConfig;
use docrecon_core::conflict::ResolutionStrategy;
use docrecon_core::pipeline::{Pipeline, PipelineState, Stage};
use docrecon_core::store::{Database, DocumentStore};

// ===========================================================================
// Helpers
// ===========================================================================

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

/// Two repositories sharing a README (modulo whitespace), with disagreeing
/// licenses and changelog versions.
fn fixture() -> (TempDir, Vec<PathBuf>) {
    let dir = TempDir::new().unwrap();
    let alpha = dir.path().join("alpha");
    let beta = dir.path().join("beta");

    write(&alpha, "README.md", "# Shared\r\n\r\n\r\n\r\nSame body.   \r\n");
    write(&alpha, "LICENSE", "MIT License\n");
    write(&alpha, "CHANGELOG.md", "# Changelog\n\n## [1.2.0]\n- first\n");
    write(&alpha, "src/main.rs", "fn main() {}\n");

    write(&beta, "README.md", "# Shared\n\nSame body.\n");
    write(&beta, "LICENSE", "Apache License 2.0\n");
    write(&beta, "CHANGELOG.md", "# Changelog\n\n## [Unreleased]\n\n## [1.10.0]\n- later\n");
    write(&beta, "node_modules/pkg/README.md", "vendored\n");

    (dir, vec![alpha, beta])
}

fn summary(state: &PipelineState) -> Vec<(String, ResolutionStrategy, Option<String>, bool)> {
    state
        .resolutions
        .iter()
        .map(|r| {
            (
                r.conflict_id.clone(),
                r.strategy,
                r.selected_document.as_ref().map(|d| d.hash().to_string()),
                r.requires_approval,
            )
        })
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn test_full_pipeline_with_store() {
    let (_dir, repos) = fixture();
    let db = Arc::new(Database::in_memory().unwrap());
    let store: Arc<dyn DocumentStore> = db.clone();

    let state = Pipeline::new(repos, 0.9).with_store(store).run().await;

    assert!(state.succeeded(), "errors: {:?}", state.errors);
    assert_eq!(state.stage, Stage::Report);

    // README x2 (one duplicate), LICENSE x2, CHANGELOG x2; vendored file ignored
    assert_eq!(state.dedup_stats.total_processed, 6);
    assert_eq!(state.dedup_stats.duplicate_count, 1);
    assert_eq!(state.documents.len(), 5);
    assert_eq!(state.duplicates[0].duplicate.path(), "beta/README.md");
    assert_eq!(state.duplicates[0].original.path(), "alpha/README.md");

    let ids: Vec<&str> = state.conflicts.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["CHANGELOG_version_conflict", "LICENSE_canonical_conflict"]);

    let changelog = &state.resolutions[0];
    assert_eq!(changelog.strategy, ResolutionStrategy::KeepHighestVersion);
    assert_eq!(changelog.selected_document.as_ref().unwrap().path(), "beta/CHANGELOG.md");
    assert!(changelog.requires_approval);

    let license = &state.resolutions[1];
    assert_eq!(license.strategy, ResolutionStrategy::KeepCanonical);
    assert_eq!(license.selected_document.as_ref().unwrap().path(), "alpha/LICENSE");
    assert!(!license.requires_approval);

    assert_eq!(db.count_documents().unwrap(), 5);
    assert_eq!(db.count_conflicts().unwrap(), 2);
    assert!(db.get_resolution("LICENSE_canonical_conflict").unwrap().is_some());

    let report = state.report.unwrap();
    assert!(report.contains("  beta/README.md -> alpha/README.md"));
    assert!(report.contains("[MANUAL] CHANGELOG_version_conflict: KeepHighestVersion (confidence: 0.85)"));
    assert!(report.contains("[AUTO] LICENSE_canonical_conflict: KeepCanonical (confidence: 0.95)"));
    assert!(!report.contains("=== Errors"));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let (_dir, repos) = fixture();
    let db = Arc::new(Database::in_memory().unwrap());
    let pipeline = Pipeline::new(repos, 0.9).with_store(db.clone());

    let first = pipeline.run().await;
    let docs_after_first = db.count_documents().unwrap();
    let edges_after_first = db.count_edges().unwrap();

    let second = pipeline.run().await;
    assert_ne!(first.run_id, second.run_id);

    let hashes = |s: &PipelineState| -> Vec<String> {
        s.documents.iter().map(|d| d.hash().to_string()).collect()
    };
    assert_eq!(hashes(&first), hashes(&second));
    assert_eq!(summary(&first), summary(&second));

    assert_eq!(db.count_documents().unwrap(), docs_after_first);
    assert_eq!(db.count_edges().unwrap(), edges_after_first);
    assert_eq!(db.count_conflicts().unwrap(), 2);
}

#[tokio::test]
async fn test_rerun_against_file_store() {
    let (dir, repos) = fixture();
    let db_path = dir.path().join("state/docrecon.db");

    for _ in 0..2 {
        let db = Arc::new(Database::new(&db_path).unwrap());
        let state = Pipeline::new(repos.clone(), 0.9).with_store(db).run().await;
        assert!(state.succeeded(), "errors: {:?}", state.errors);
    }

    let db = Database::new(&db_path).unwrap();
    let paths: Vec<String> = db.list_documents().unwrap().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec![
            "alpha/CHANGELOG.md",
            "alpha/LICENSE",
            "alpha/README.md",
            "beta/CHANGELOG.md",
            "beta/LICENSE",
        ]
    );
}

#[tokio::test]
async fn test_without_store_completes_with_warning() {
    let (_dir, repos) = fixture();
    let state = Pipeline::new(repos, 0.9).run().await;

    assert!(state.is_complete());
    assert!(!state.succeeded());
    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].contains("no document store configured"));
    assert_eq!(state.resolutions.len(), 2);
}

#[tokio::test]
async fn test_unreadable_repository_does_not_abort() {
    let (dir, mut repos) = fixture();
    repos.insert(0, dir.path().join("missing"));

    let state = Pipeline::new(repos, 0.9)
        .with_store(Arc::new(Database::in_memory().unwrap()))
        .run()
        .await;

    assert!(state.is_complete());
    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].contains("missing"));
    assert_eq!(state.documents.len(), 5);
    assert!(state.report.unwrap().contains("=== Errors (1) ==="));
}

#[tokio::test]
async fn test_from_config_applies_threshold_and_pack() {
    let (_dir, repos) = fixture();
    let mut config = AppConfig::default();
    config.pipeline.repositories = repos;
    config.pipeline.auto_resolve_threshold = 0.8;
    config.pack = Some(docrecon_core::config::PackConfig {
        name: "oss".into(),
        required: vec!["LICENSE".into(), "SECURITY".into()],
        optional: vec!["CONTRIBUTING".into()],
        script: None,
    });
    config.validate().unwrap();

    let state = Pipeline::from_config(&config)
        .with_store(Arc::new(Database::in_memory().unwrap()))
        .run()
        .await;

    // at 0.8 the semver rule resolves automatically
    assert!(state.resolutions.iter().all(|r| !r.requires_approval));

    let pack = state.pack_report.as_ref().unwrap();
    assert!(!pack.success);
    assert!(pack.errors.iter().any(|m| m.message == "missing required document: SECURITY"));
    assert!(pack
        .suggestions
        .iter()
        .any(|m| m.message == "consider adding optional document: CONTRIBUTING"));
    assert!(state.report.unwrap().contains("=== Pack oss ==="));
}

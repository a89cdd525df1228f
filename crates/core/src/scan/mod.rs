//! Repository scanning: walk directories, classify documentation files, and
//! turn each match into a content-addressed [`Document`].
//!
//! Each repository is walked on the blocking pool. Several repositories run
//! concurrently, bounded by a semaphore, and their results are merged back in
//! configured order so downstream stages always see the same document list.

pub mod classify;
pub mod policy;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::content::ContentAddresser;
use crate::errors::ScanError;
use crate::models::{Document, DocumentMetadata};

pub use classify::{canonical_source_for, classify, extract_version};
pub use policy::{ScanDecision, ScanPolicy};

/// Branch recorded when the repository is not under git.
pub const UNKNOWN_BRANCH: &str = "unknown";

/// Merged result of scanning every configured repository.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub documents: Vec<Document>,
    /// One entry per repository that could not be scanned.
    pub errors: Vec<String>,
}

/// Walks repositories and builds documents.
#[derive(Debug, Clone)]
pub struct Scanner {
    policy: ScanPolicy,
    addresser: Arc<ContentAddresser>,
    concurrency: usize,
}

impl Scanner {
    pub fn new(policy: ScanPolicy, concurrency: usize) -> Self {
        Self {
            policy,
            addresser: Arc::new(ContentAddresser::new()),
            concurrency: concurrency.max(1),
        }
    }

    /// Use a specific addresser (e.g. a degraded fallback hasher).
    pub fn with_addresser(mut self, addresser: Arc<ContentAddresser>) -> Self {
        self.addresser = addresser;
        self
    }

    pub fn addresser(&self) -> &ContentAddresser {
        &self.addresser
    }

    /// Scan every repository, at most `concurrency` at a time.
    ///
    /// Never fails as a whole: a repository that cannot be scanned contributes
    /// one error string and no documents.
    pub async fn scan_all(&self, repositories: &[PathBuf]) -> ScanOutcome {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, root) in repositories.iter().cloned().enumerate() {
            let scanner = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        let display = root.display().to_string();
                        tokio::task::spawn_blocking(move || scanner.scan_repository(&root))
                            .await
                            .unwrap_or_else(|e| {
                                Err(ScanError::TaskFailed {
                                    repository: display,
                                    detail: e.to_string(),
                                })
                            })
                    }
                    Err(e) => Err(ScanError::TaskFailed {
                        repository: root.display().to_string(),
                        detail: e.to_string(),
                    }),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<Vec<Document>, ScanError>>> =
            (0..repositories.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!(error = %e, "scan task aborted"),
            }
        }

        let mut outcome = ScanOutcome::default();
        for (root, slot) in repositories.iter().zip(slots) {
            match slot {
                Some(Ok(docs)) => outcome.documents.extend(docs),
                Some(Err(e)) => {
                    warn!(repository = %root.display(), error = %e, "repository scan failed");
                    outcome.errors.push(format!("scan {}: {e}", root.display()));
                }
                None => outcome
                    .errors
                    .push(format!("scan {}: task did not complete", root.display())),
            }
        }

        info!(
            repositories = repositories.len(),
            documents = outcome.documents.len(),
            errors = outcome.errors.len(),
            "scan complete"
        );
        outcome
    }

    /// Walk one repository synchronously.
    ///
    /// Files that cannot be read as UTF-8 text are skipped. Only a missing or
    /// unreadable root is an error.
    pub fn scan_repository(&self, root: &Path) -> Result<Vec<Document>, ScanError> {
        if !root.exists() {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let repository = repository_name(root);
        let branch = detect_branch(root);
        debug!(repository = %repository, branch = %branch, "scanning repository");

        let mut documents = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(ScanError::Walk(e)),
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let Some(document_type) = classify(&file_name) else {
                continue;
            };

            let path = entry.path();
            let rel = path.strip_prefix(root).unwrap_or(path);
            let rel_str = rel.to_string_lossy().replace('\\', "/");

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    debug!(path = %rel_str, error = %e, "skipping file without metadata");
                    continue;
                }
            };
            if !self.policy.evaluate(&rel_str, metadata.len()).is_allowed() {
                continue;
            }

            let raw = match std::fs::read_to_string(path) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(path = %rel_str, error = %e, "skipping unreadable file");
                    continue;
                }
            };

            let last_modified: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default();

            let canonical = canonical_source_for(&file_name, &document_type);
            let mut meta = DocumentMetadata::new(
                format!("{repository}/{rel_str}"),
                document_type.clone(),
                last_modified,
            )
            .with_canonical_source(canonical)
            .with_origin(repository.clone(), branch.clone());
            if let Some(version) = extract_version(&document_type, &raw) {
                meta = meta.with_version(version);
            }

            documents.push(self.addresser.create_document(&raw, meta));
        }

        info!(repository = %repository, documents = documents.len(), "repository scanned");
        Ok(documents)
    }
}

/// Final path component of the repository root.
pub fn repository_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| root.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

/// Current branch of the git repository containing `root`, if any.
pub fn detect_branch(root: &Path) -> String {
    git2::Repository::discover(root)
        .ok()
        .and_then(|repo| {
            repo.head()
                .ok()
                .and_then(|head| head.shorthand().map(str::to_string))
        })
        .unwrap_or_else(|| UNKNOWN_BRANCH.to_string())
}

//! Conflict detection logic.
//!
//! Three independent passes run over the same document set; a document may
//! appear in several conflicts. Conflict IDs are derived from the grouping key
//! so repeated passes over identical input produce identical IDs.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::resolver::ResolutionStrategy;
use crate::dedup::Deduplicator;
use crate::models::{Document, Version};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Categorisation of a conflict.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ConflictType {
    /// Byte-identical content at different paths.
    DuplicateContent,
    /// Same document type, differing versions.
    VersionMismatch,
    /// Several documents of one type claim a canonical source.
    CanonicalConflict,
    /// Structure differs (headings, sections). Not produced by the detector.
    StructuralConflict,
    /// Meaning differs. Not produced by the detector.
    SemanticConflict,
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateContent => write!(f, "DuplicateContent"),
            Self::VersionMismatch => write!(f, "VersionMismatch"),
            Self::CanonicalConflict => write!(f, "CanonicalConflict"),
            Self::StructuralConflict => write!(f, "StructuralConflict"),
            Self::SemanticConflict => write!(f, "SemanticConflict"),
        }
    }
}

/// A detected conflict. Created once per detection pass and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub id: String,
    pub conflict_type: ConflictType,
    /// Ordered, non-empty.
    pub documents: Vec<Document>,
    pub detected_at: DateTime<Utc>,
    /// The detector's own estimate, separate from the resolver's rule confidence.
    pub confidence: f64,
    pub suggested_strategy: ResolutionStrategy,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Stateless conflict detector.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Run the duplicate, version, and canonical passes, in that order.
    pub fn detect_conflicts(docs: &[Document]) -> Vec<Conflict> {
        info!(documents = docs.len(), "detecting conflicts");
        let now = Utc::now();

        let mut conflicts = Vec::new();
        conflicts.extend(Self::duplicate_pass(docs, now));
        conflicts.extend(Self::version_pass(docs, now));
        conflicts.extend(Self::canonical_pass(docs, now));

        info!(count = conflicts.len(), "conflict detection complete");
        conflicts
    }

    /// One `DuplicateContent` conflict per hash group spanning several paths.
    pub fn duplicate_pass(docs: &[Document], now: DateTime<Utc>) -> Vec<Conflict> {
        group_in_order(docs, |d| d.hash().clone())
            .into_iter()
            .filter(|(_, group)| group.len() > 1 && Deduplicator::distinct_paths(group.iter().copied()) > 1)
            .map(|(hash, group)| {
                debug!(hash = %hash, members = group.len(), "duplicate conflict");
                Conflict {
                    id: format!("{hash}_duplicate"),
                    conflict_type: ConflictType::DuplicateContent,
                    documents: group.into_iter().cloned().collect(),
                    detected_at: now,
                    confidence: 1.0,
                    suggested_strategy: ResolutionStrategy::KeepLatest,
                }
            })
            .collect()
    }

    /// One `VersionMismatch` per document type where at least two versions
    /// are present and they disagree. Covers every document of that type.
    pub fn version_pass(docs: &[Document], now: DateTime<Utc>) -> Vec<Conflict> {
        group_in_order(docs, |d| d.document_type().clone())
            .into_iter()
            .filter(|(_, group)| {
                let versions: Vec<Version> = group.iter().filter_map(|d| d.version()).collect();
                versions.len() >= 2 && versions.iter().any(|v| *v != versions[0])
            })
            .map(|(ty, group)| {
                debug!(document_type = %ty, members = group.len(), "version conflict");
                Conflict {
                    id: format!("{ty}_version_conflict"),
                    conflict_type: ConflictType::VersionMismatch,
                    documents: group.into_iter().cloned().collect(),
                    detected_at: now,
                    confidence: 0.8,
                    suggested_strategy: ResolutionStrategy::KeepHighestVersion,
                }
            })
            .collect()
    }

    /// One `CanonicalConflict` per document type with two or more
    /// non-inferred members, covering exactly those members.
    pub fn canonical_pass(docs: &[Document], now: DateTime<Utc>) -> Vec<Conflict> {
        group_in_order(docs, |d| d.document_type().clone())
            .into_iter()
            .filter_map(|(ty, group)| {
                let canonical: Vec<Document> = group
                    .into_iter()
                    .filter(|d| !d.canonical_source().is_inferred())
                    .cloned()
                    .collect();
                (canonical.len() >= 2).then(|| {
                    debug!(document_type = %ty, members = canonical.len(), "canonical conflict");
                    Conflict {
                        id: format!("{ty}_canonical_conflict"),
                        conflict_type: ConflictType::CanonicalConflict,
                        documents: canonical,
                        detected_at: now,
                        confidence: 0.7,
                        suggested_strategy: ResolutionStrategy::KeepCanonical,
                    }
                })
            })
            .collect()
    }
}

/// Group by `key`, with groups in first-seen order and members in input order.
fn group_in_order<K, F>(docs: &[Document], key: F) -> Vec<(K, Vec<&Document>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&Document) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&Document>)> = Vec::new();
    for doc in docs {
        let k = key(doc);
        match index.get(&k) {
            Some(&i) => groups[i].1.push(doc),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![doc]));
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentAddresser;
    use crate::models::{CanonicalSource, DocumentMetadata, DocumentType};
    use chrono::TimeZone;

    fn meta(path: &str, ty: DocumentType) -> DocumentMetadata {
        DocumentMetadata::new(path, ty, Utc.timestamp_opt(1_000, 0).unwrap())
    }

    fn make(body: &str, meta: DocumentMetadata) -> Document {
        ContentAddresser::new().create_document(body, meta)
    }

    #[test]
    fn test_empty_input_has_no_conflicts() {
        assert!(ConflictDetector::detect_conflicts(&[]).is_empty());
    }

    #[test]
    fn test_duplicate_conflict() {
        let docs = vec![
            make("same body", meta("README.md", DocumentType::Readme)),
            make("same body", meta("docs/README.md", DocumentType::Readme)),
        ];
        let conflicts = ConflictDetector::detect_conflicts(&docs);
        assert_eq!(conflicts.len(), 1);
        let c = &conflicts[0];
        assert_eq!(c.conflict_type, ConflictType::DuplicateContent);
        assert_eq!(c.documents.len(), 2);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.suggested_strategy, ResolutionStrategy::KeepLatest);
        assert_eq!(c.id, format!("{}_duplicate", docs[0].hash()));
    }

    #[test]
    fn test_same_path_repeat_is_not_a_conflict() {
        let docs = vec![
            make("x", meta("README.md", DocumentType::Readme)),
            make("x", meta("README.md", DocumentType::Readme)),
        ];
        assert!(ConflictDetector::duplicate_pass(&docs, Utc::now()).is_empty());
    }

    #[test]
    fn test_version_conflict_covers_whole_type_group() {
        let docs = vec![
            make("a", meta("a/CHANGELOG.md", DocumentType::Changelog).with_version(Version::new(1, 0, 0))),
            make("b", meta("b/CHANGELOG.md", DocumentType::Changelog).with_version(Version::new(3, 0, 0))),
            make("c", meta("c/CHANGELOG.md", DocumentType::Changelog)),
            make("d", meta("README.md", DocumentType::Readme).with_version(Version::new(9, 9, 9))),
        ];
        let conflicts = ConflictDetector::detect_conflicts(&docs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, "CHANGELOG_version_conflict");
        assert_eq!(conflicts[0].conflict_type, ConflictType::VersionMismatch);
        assert_eq!(conflicts[0].documents.len(), 3);
        assert_eq!(conflicts[0].confidence, 0.8);
    }

    #[test]
    fn test_custom_alias_joins_closed_type_group() {
        let docs = vec![
            make("a", meta("a/README", DocumentType::Readme).with_version(Version::new(1, 0, 0))),
            make("b", meta("b/README", DocumentType::Readme).with_version(Version::new(2, 0, 0))),
            make("c", meta("c/README", DocumentType::Custom("README".into())).with_version(Version::new(1, 0, 0))),
            make("d", meta("d/README", DocumentType::Custom("readme".into())).with_version(Version::new(4, 0, 0))),
        ];
        let conflicts = ConflictDetector::version_pass(&docs, Utc::now());
        let ids: Vec<&str> = conflicts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["README_version_conflict"]);
        assert_eq!(conflicts[0].documents.len(), 4);
    }

    #[test]
    fn test_equal_versions_do_not_conflict() {
        let docs = vec![
            make("a", meta("a/CHANGELOG.md", DocumentType::Changelog).with_version(Version::new(2, 0, 0))),
            make("b", meta("b/CHANGELOG.md", DocumentType::Changelog).with_version(Version::new(2, 0, 0))),
        ];
        assert!(ConflictDetector::version_pass(&docs, Utc::now()).is_empty());
    }

    #[test]
    fn test_canonical_conflict_only_includes_canonical_members() {
        let docs = vec![
            make("mit", meta("LICENSE", DocumentType::License).with_canonical_source(CanonicalSource::LicenseFile)),
            make("apache", meta("Cargo.toml", DocumentType::License).with_canonical_source(CanonicalSource::CargoToml)),
            make("guess", meta("docs/LICENSE.md", DocumentType::License)),
        ];
        let conflicts = ConflictDetector::detect_conflicts(&docs);
        assert_eq!(conflicts.len(), 1);
        let c = &conflicts[0];
        assert_eq!(c.id, "LICENSE_canonical_conflict");
        assert_eq!(c.conflict_type, ConflictType::CanonicalConflict);
        assert_eq!(c.documents.len(), 2);
        assert!(c.documents.iter().all(|d| !d.canonical_source().is_inferred()));
        assert_eq!(c.confidence, 0.7);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let docs = vec![
            make("same", meta("a/README.md", DocumentType::Readme)),
            make("same", meta("b/README.md", DocumentType::Readme)),
            make("x", meta("a/CHANGELOG.md", DocumentType::Changelog).with_version(Version::new(1, 0, 0))),
            make("y", meta("b/CHANGELOG.md", DocumentType::Changelog).with_version(Version::new(2, 0, 0))),
        ];
        let first = ConflictDetector::detect_conflicts(&docs);
        let second = ConflictDetector::detect_conflicts(&docs);
        let ids = |cs: &[Conflict]| cs.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        for (a, b) in first.iter().zip(second.iter()) {
            let paths = |c: &Conflict| c.documents.iter().map(|d| d.path().to_string()).collect::<Vec<_>>();
            assert_eq!(paths(a), paths(b));
        }
    }
}

//! Rule-based conflict resolution.
//!
//! Resolution carries no state across calls. [`RULES`] is an ordered table of
//! plain records, each holding an applicability predicate and a selector.
//! The highest-priority applicable rule wins; equal priorities fall back to
//! table order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::detector::{Conflict, ConflictType};
use crate::dedup::Deduplicator;
use crate::inference::InferenceEngine;
use crate::models::{CanonicalSource, Document, DocumentType, Edge, EdgeType};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a conflict is (or should be) settled.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ResolutionStrategy {
    KeepLatest,
    KeepHighestVersion,
    KeepCanonical,
    RequireManual,
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeepLatest => write!(f, "KeepLatest"),
            Self::KeepHighestVersion => write!(f, "KeepHighestVersion"),
            Self::KeepCanonical => write!(f, "KeepCanonical"),
            Self::RequireManual => write!(f, "RequireManual"),
        }
    }
}

/// Outcome of resolving one conflict.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionResult {
    pub conflict_id: String,
    pub strategy: ResolutionStrategy,
    pub selected_document: Option<Document>,
    pub confidence: f64,
    pub requires_approval: bool,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

/// A single entry of the resolution table.
pub struct ResolutionRule {
    pub name: &'static str,
    pub priority: u32,
    pub confidence: f64,
    pub strategy: ResolutionStrategy,
    pub applies: fn(&Conflict) -> bool,
    pub resolve: fn(&Conflict) -> Option<&Document>,
}

impl std::fmt::Debug for ResolutionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionRule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("confidence", &self.confidence)
            .field("strategy", &self.strategy)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// The resolution table. Order matters for equal priorities.
pub static RULES: &[ResolutionRule] = &[
    ResolutionRule {
        name: "duplicate-keep-latest",
        priority: 100,
        confidence: 1.0,
        strategy: ResolutionStrategy::KeepLatest,
        applies: is_duplicate_conflict,
        resolve: latest,
    },
    ResolutionRule {
        name: "explicit-canonical",
        priority: 100,
        confidence: 1.0,
        strategy: ResolutionStrategy::KeepCanonical,
        applies: |c| c.documents.iter().any(is_explicit),
        resolve: first_explicit,
    },
    ResolutionRule {
        name: "funding-yaml-canonical",
        priority: 98,
        confidence: 0.98,
        strategy: ResolutionStrategy::KeepCanonical,
        applies: |c| c.documents.iter().any(is_funding_yaml),
        resolve: first_funding_yaml,
    },
    ResolutionRule {
        name: "license-file-canonical",
        priority: 95,
        confidence: 0.95,
        strategy: ResolutionStrategy::KeepCanonical,
        applies: |c| c.documents.iter().any(is_license_file),
        resolve: first_license_file,
    },
    ResolutionRule {
        name: "keep-highest-semver",
        priority: 85,
        confidence: 0.85,
        strategy: ResolutionStrategy::KeepHighestVersion,
        applies: all_versioned,
        resolve: highest_version,
    },
    ResolutionRule {
        name: "canonical-over-inferred",
        priority: 80,
        confidence: 0.80,
        strategy: ResolutionStrategy::KeepCanonical,
        applies: |c| c.documents.iter().any(|d| !d.canonical_source().is_inferred()),
        resolve: most_canonical,
    },
];

fn is_duplicate_conflict(conflict: &Conflict) -> bool {
    conflict.conflict_type == ConflictType::DuplicateContent
}

fn all_versioned(conflict: &Conflict) -> bool {
    !conflict.documents.is_empty() && conflict.documents.iter().all(|d| d.version().is_some())
}

fn latest(conflict: &Conflict) -> Option<&Document> {
    Deduplicator::find_latest(&conflict.documents)
}

fn most_canonical(conflict: &Conflict) -> Option<&Document> {
    Deduplicator::find_canonical(&conflict.documents)
}

fn first_explicit(conflict: &Conflict) -> Option<&Document> {
    conflict.documents.iter().find(|d| is_explicit(d))
}

fn first_funding_yaml(conflict: &Conflict) -> Option<&Document> {
    conflict.documents.iter().find(|d| is_funding_yaml(d))
}

fn first_license_file(conflict: &Conflict) -> Option<&Document> {
    conflict.documents.iter().find(|d| is_license_file(d))
}

fn is_explicit(doc: &Document) -> bool {
    matches!(doc.canonical_source(), CanonicalSource::Explicit(_))
}

fn is_funding_yaml(doc: &Document) -> bool {
    *doc.document_type() == DocumentType::Funding
        && *doc.canonical_source() == CanonicalSource::FundingYaml
}

fn is_license_file(doc: &Document) -> bool {
    *doc.document_type() == DocumentType::License
        && *doc.canonical_source() == CanonicalSource::LicenseFile
}

/// Highest version; the first listed wins on equal versions.
fn highest_version(conflict: &Conflict) -> Option<&Document> {
    let mut best: Option<&Document> = None;
    for doc in &conflict.documents {
        let Some(version) = doc.version() else {
            continue;
        };
        match best.and_then(|b| b.version()) {
            Some(current) if version <= current => {}
            _ => best = Some(doc),
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Stateless resolver over [`RULES`].
pub struct ConflictResolver;

impl ConflictResolver {
    /// The highest-priority rule whose predicate holds, table order breaking ties.
    pub fn find_applicable_rule(conflict: &Conflict) -> Option<&'static ResolutionRule> {
        let mut applicable: Vec<&'static ResolutionRule> =
            RULES.iter().filter(|r| (r.applies)(conflict)).collect();
        // sort_by is stable
        applicable.sort_by(|a, b| b.priority.cmp(&a.priority));
        applicable.into_iter().next()
    }

    /// Resolve one conflict. Never fails; unmatched conflicts require a human.
    pub fn resolve_conflict(conflict: &Conflict, threshold: f64) -> ResolutionResult {
        let timestamp = Utc::now();

        let Some(rule) = Self::find_applicable_rule(conflict) else {
            debug!(conflict_id = %conflict.id, "no resolution rule applied");
            return ResolutionResult {
                conflict_id: conflict.id.clone(),
                strategy: ResolutionStrategy::RequireManual,
                selected_document: None,
                confidence: 0.0,
                requires_approval: true,
                reasoning: "no resolution rule applied".to_string(),
                timestamp,
            };
        };

        let selected = (rule.resolve)(conflict).cloned();
        let requires_approval = rule.confidence < threshold;
        let reasoning = format!(
            "rule {} (priority {}, confidence {:.2}); {}",
            rule.name,
            rule.priority,
            rule.confidence,
            InferenceEngine::reason_about_conflict(conflict)
        );

        debug!(
            conflict_id = %conflict.id,
            rule = rule.name,
            selected = selected.as_ref().map(|d| d.path()).unwrap_or("-"),
            requires_approval,
            "conflict resolved"
        );

        ResolutionResult {
            conflict_id: conflict.id.clone(),
            strategy: rule.strategy,
            selected_document: selected,
            confidence: rule.confidence,
            requires_approval,
            reasoning,
            timestamp,
        }
    }

    /// One result per conflict, in input order.
    pub fn resolve_conflicts(conflicts: &[Conflict], threshold: f64) -> Vec<ResolutionResult> {
        let results: Vec<ResolutionResult> = conflicts
            .iter()
            .map(|c| Self::resolve_conflict(c, threshold))
            .collect();
        let auto = results.iter().filter(|r| !r.requires_approval).count();
        info!(
            total = results.len(),
            auto_resolved = auto,
            manual = results.len() - auto,
            "conflicts resolved"
        );
        results
    }

    /// `SupersededBy` edges from each conflict to the document that replaces it.
    pub fn create_superseded_edges(resolutions: &[ResolutionResult]) -> Vec<Edge> {
        resolutions
            .iter()
            .filter_map(|r| {
                r.selected_document.as_ref().map(|doc| {
                    Edge::new(
                        r.conflict_id.clone(),
                        doc.hash().as_str(),
                        EdgeType::SupersededBy,
                        r.confidence,
                    )
                    .with_metadata("strategy", r.strategy.to_string())
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictDetector;
    use crate::content::ContentAddresser;
    use crate::models::{DocumentMetadata, Version};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn make(body: &str, meta: DocumentMetadata) -> Document {
        ContentAddresser::new().create_document(body, meta)
    }

    fn conflict(conflict_type: ConflictType, documents: Vec<Document>) -> Conflict {
        Conflict {
            id: "test".into(),
            conflict_type,
            documents,
            detected_at: Utc::now(),
            confidence: 0.5,
            suggested_strategy: ResolutionStrategy::RequireManual,
        }
    }

    #[test]
    fn test_rule_table_is_ordered_by_priority() {
        let priorities: Vec<u32> = RULES.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
        assert_eq!(RULES[0].name, "duplicate-keep-latest");
        assert_eq!(RULES[1].name, "explicit-canonical");
    }

    #[test]
    fn test_exact_duplicate_keeps_latest() {
        let docs = vec![
            make("same body", DocumentMetadata::new("README.md", DocumentType::Readme, at(1000))),
            make("same body", DocumentMetadata::new("docs/README.md", DocumentType::Readme, at(5000))),
        ];
        let conflicts = ConflictDetector::detect_conflicts(&docs);
        assert_eq!(conflicts.len(), 1);

        let result = ConflictResolver::resolve_conflict(&conflicts[0], 0.9);
        assert_eq!(result.strategy, ResolutionStrategy::KeepLatest);
        assert_eq!(result.confidence, 1.0);
        assert!(!result.requires_approval);
        assert_eq!(result.selected_document.unwrap().path(), "docs/README.md");
        assert!(result.reasoning.starts_with("rule duplicate-keep-latest"));
    }

    #[test]
    fn test_version_mismatch_keeps_highest() {
        let docs = vec![
            make(
                "old",
                DocumentMetadata::new("a/CHANGELOG.md", DocumentType::Changelog, at(1))
                    .with_version(Version::new(1, 0, 0)),
            ),
            make(
                "new",
                DocumentMetadata::new("b/CHANGELOG.md", DocumentType::Changelog, at(1))
                    .with_version(Version::new(3, 0, 0)),
            ),
        ];
        let conflicts = ConflictDetector::detect_conflicts(&docs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].confidence, 0.8);

        let result = ConflictResolver::resolve_conflict(&conflicts[0], 0.8);
        assert_eq!(result.strategy, ResolutionStrategy::KeepHighestVersion);
        assert_eq!(result.confidence, 0.85);
        assert!(!result.requires_approval);
        let selected = result.selected_document.unwrap();
        assert_eq!(selected.version(), Some(Version::new(3, 0, 0)));
    }

    #[test]
    fn test_license_file_beats_cargo_toml() {
        let docs = vec![
            make(
                "MIT License",
                DocumentMetadata::new("Cargo.toml", DocumentType::License, at(1))
                    .with_canonical_source(CanonicalSource::CargoToml),
            ),
            make(
                "Apache License",
                DocumentMetadata::new("LICENSE", DocumentType::License, at(1))
                    .with_canonical_source(CanonicalSource::LicenseFile),
            ),
        ];
        let conflicts = ConflictDetector::detect_conflicts(&docs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::CanonicalConflict);

        let result = ConflictResolver::resolve_conflict(&conflicts[0], 0.9);
        assert_eq!(result.strategy, ResolutionStrategy::KeepCanonical);
        assert_eq!(result.confidence, 0.95);
        assert!(!result.requires_approval);
        assert_eq!(result.selected_document.unwrap().path(), "LICENSE");
    }

    #[test]
    fn test_no_rule_requires_manual() {
        let c = conflict(
            ConflictType::StructuralConflict,
            vec![make("x", DocumentMetadata::new("SUPPORT.md", DocumentType::Support, at(1)))],
        );
        assert!(ConflictResolver::find_applicable_rule(&c).is_none());

        let result = ConflictResolver::resolve_conflict(&c, 0.9);
        assert_eq!(result.strategy, ResolutionStrategy::RequireManual);
        assert_eq!(result.confidence, 0.0);
        assert!(result.requires_approval);
        assert!(result.selected_document.is_none());
        assert_eq!(result.reasoning, "no resolution rule applied");
    }

    #[test]
    fn test_threshold_controls_approval() {
        let c = conflict(
            ConflictType::CanonicalConflict,
            vec![
                make(
                    "a",
                    DocumentMetadata::new("SECURITY.md", DocumentType::Security, at(1))
                        .with_canonical_source(CanonicalSource::SecurityMd),
                ),
                make("b", DocumentMetadata::new("docs/SECURITY.md", DocumentType::Security, at(2))),
            ],
        );
        let rule = ConflictResolver::find_applicable_rule(&c).unwrap();
        assert_eq!(rule.name, "canonical-over-inferred");

        assert!(ConflictResolver::resolve_conflict(&c, 0.95).requires_approval);
        assert!(!ConflictResolver::resolve_conflict(&c, 0.8).requires_approval);
        assert!(!ConflictResolver::resolve_conflict(&c, 0.5).requires_approval);
    }

    #[test]
    fn test_explicit_wins_over_license_file() {
        let c = conflict(
            ConflictType::CanonicalConflict,
            vec![
                make(
                    "a",
                    DocumentMetadata::new("LICENSE", DocumentType::License, at(1))
                        .with_canonical_source(CanonicalSource::LicenseFile),
                ),
                make(
                    "b",
                    DocumentMetadata::new("legal/LICENSE", DocumentType::License, at(1))
                        .with_canonical_source(CanonicalSource::Explicit("legal".into())),
                ),
            ],
        );
        let result = ConflictResolver::resolve_conflict(&c, 0.9);
        assert_eq!(result.selected_document.unwrap().path(), "legal/LICENSE");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_equal_priority_tie_uses_table_order() {
        // Both priority-100 rules apply; the first listed wins.
        let c = conflict(
            ConflictType::DuplicateContent,
            vec![
                make(
                    "same",
                    DocumentMetadata::new("a/README", DocumentType::Readme, at(1))
                        .with_canonical_source(CanonicalSource::Explicit("a".into())),
                ),
                make("same", DocumentMetadata::new("b/README", DocumentType::Readme, at(9))),
            ],
        );
        let rule = ConflictResolver::find_applicable_rule(&c).unwrap();
        assert_eq!(rule.name, "duplicate-keep-latest");

        let result = ConflictResolver::resolve_conflict(&c, 0.9);
        assert_eq!(result.strategy, ResolutionStrategy::KeepLatest);
        assert_eq!(result.selected_document.unwrap().path(), "b/README");
    }

    #[test]
    fn test_resolve_conflicts_is_one_to_one() {
        let conflicts = vec![
            conflict(ConflictType::SemanticConflict, vec![]),
            conflict(
                ConflictType::StructuralConflict,
                vec![make("x", DocumentMetadata::new("README", DocumentType::Readme, at(1)))],
            ),
        ];
        let results = ConflictResolver::resolve_conflicts(&conflicts, 0.9);
        assert_eq!(results.len(), conflicts.len());
        assert!(ConflictResolver::resolve_conflicts(&[], 0.9).is_empty());
    }

    #[test]
    fn test_superseded_edges_point_from_conflict() {
        let docs = vec![
            make("same", DocumentMetadata::new("a/README.md", DocumentType::Readme, at(1))),
            make("same", DocumentMetadata::new("b/README.md", DocumentType::Readme, at(2))),
        ];
        let conflicts = ConflictDetector::detect_conflicts(&docs);
        let mut results = ConflictResolver::resolve_conflicts(&conflicts, 0.9);
        results.push(ConflictResolver::resolve_conflict(
            &conflict(ConflictType::SemanticConflict, vec![]),
            0.9,
        ));

        let edges = ConflictResolver::create_superseded_edges(&results);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, conflicts[0].id);
        assert_eq!(edges[0].to, docs[0].hash().as_str());
        assert_eq!(edges[0].edge_type, EdgeType::SupersededBy);
        assert_eq!(edges[0].confidence, 1.0);
    }
}

//! Hash-keyed deduplication and canonical-document selection.
//!
//! All functions are pure over their inputs. Ordering is significant: the
//! first document seen for a hash is the original, and ties in "latest" or
//! "canonical" selection are broken by input order.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::models::{CanonicalSource, ContentHash, Document, Edge, EdgeType};

/// Confidence of a duplicate edge. Hash equality is exact proof.
pub const DUPLICATE_EDGE_CONFIDENCE: f64 = 1.0;

/// A repeat occurrence paired with the first document that had its hash.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicatePair {
    pub duplicate: Document,
    pub original: Document,
}

/// Counters from a deduplication pass.
///
/// `unique_count + duplicate_count == total_processed` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub total_processed: usize,
    pub unique_count: usize,
    pub duplicate_count: usize,
    /// Normalized bytes that duplicates would have occupied.
    pub spaces_saved: usize,
}

/// Output of [`Deduplicator::deduplicate`].
#[derive(Debug, Clone, Default)]
pub struct DedupResult {
    pub unique: Vec<Document>,
    pub duplicates: Vec<DuplicatePair>,
    pub stats: DedupStats,
}

/// Stateless deduplication operations.
pub struct Deduplicator;

impl Deduplicator {
    /// Split documents into first-seen uniques and `(duplicate, original)` pairs.
    pub fn deduplicate(docs: &[Document]) -> DedupResult {
        let mut first_seen: HashMap<&ContentHash, usize> = HashMap::new();
        let mut unique: Vec<Document> = Vec::new();
        let mut duplicates = Vec::new();
        let mut total_bytes = 0usize;
        let mut unique_bytes = 0usize;

        for doc in docs {
            total_bytes += doc.content().len();
            match first_seen.get(doc.hash()) {
                Some(&idx) => {
                    debug!(
                        duplicate = doc.path(),
                        original = unique[idx].path(),
                        "duplicate content"
                    );
                    duplicates.push(DuplicatePair {
                        duplicate: doc.clone(),
                        original: unique[idx].clone(),
                    });
                }
                None => {
                    first_seen.insert(doc.hash(), unique.len());
                    unique_bytes += doc.content().len();
                    unique.push(doc.clone());
                }
            }
        }

        let stats = DedupStats {
            total_processed: docs.len(),
            unique_count: unique.len(),
            duplicate_count: duplicates.len(),
            spaces_saved: total_bytes - unique_bytes,
        };
        info!(
            total = stats.total_processed,
            unique = stats.unique_count,
            duplicates = stats.duplicate_count,
            "deduplication complete"
        );

        DedupResult {
            unique,
            duplicates,
            stats,
        }
    }

    /// Documents with the same hash as `target` at a different path.
    pub fn find_duplicates<'a>(target: &Document, docs: &'a [Document]) -> Vec<&'a Document> {
        docs.iter()
            .filter(|d| d.hash() == target.hash() && d.path() != target.path())
            .collect()
    }

    /// Hash equality; paths are irrelevant.
    pub fn is_duplicate(a: &Document, b: &Document) -> bool {
        a.hash() == b.hash()
    }

    /// Group documents by hash, preserving input order inside each group.
    pub fn group_by_hash(docs: &[Document]) -> HashMap<ContentHash, Vec<&Document>> {
        let mut groups: HashMap<ContentHash, Vec<&Document>> = HashMap::new();
        for doc in docs {
            groups.entry(doc.hash().clone()).or_default().push(doc);
        }
        groups
    }

    /// The most recently modified document; first wins on ties.
    pub fn find_latest<'a, I>(docs: I) -> Option<&'a Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        docs.into_iter().fold(None, |best: Option<&Document>, doc| match best {
            Some(b) if doc.last_modified() <= b.last_modified() => Some(b),
            _ => Some(doc),
        })
    }

    /// Fixed authority ranking of canonical sources.
    pub fn canonical_priority(source: &CanonicalSource) -> u32 {
        match source {
            CanonicalSource::Explicit(_) => 100,
            CanonicalSource::FundingYaml => 98,
            CanonicalSource::LicenseFile => 95,
            CanonicalSource::SecurityMd => 90,
            CanonicalSource::CitationCff => 90,
            CanonicalSource::PackageJson => 85,
            CanonicalSource::CargoToml => 85,
            CanonicalSource::Inferred => 50,
        }
    }

    /// Highest-priority document; equal priority goes to the later
    /// `last_modified`, and a full tie keeps the earlier document.
    pub fn find_canonical<'a, I>(docs: I) -> Option<&'a Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        docs.into_iter().fold(None, |best: Option<&Document>, doc| match best {
            None => Some(doc),
            Some(b) => {
                let (pd, pb) = (
                    Self::canonical_priority(doc.canonical_source()),
                    Self::canonical_priority(b.canonical_source()),
                );
                if pd > pb || (pd == pb && doc.last_modified() > b.last_modified()) {
                    Some(doc)
                } else {
                    Some(b)
                }
            }
        })
    }

    /// One `DuplicateOf` edge per pair, from the duplicate to the original.
    pub fn create_duplicate_edges(pairs: &[DuplicatePair]) -> Vec<Edge> {
        pairs
            .iter()
            .map(|p| {
                Edge::new(
                    p.duplicate.hash().as_str(),
                    p.original.hash().as_str(),
                    EdgeType::DuplicateOf,
                    DUPLICATE_EDGE_CONFIDENCE,
                )
                .with_metadata("duplicate_path", p.duplicate.path())
                .with_metadata("original_path", p.original.path())
            })
            .collect()
    }

    /// Distinct paths among `docs`.
    pub(crate) fn distinct_paths<'a, I>(docs: I) -> usize
    where
        I: IntoIterator<Item = &'a Document>,
    {
        docs.into_iter().map(Document::path).collect::<HashSet<_>>().len()
    }
}

//! Wire shapes of persisted records.
//!
//! These are the JSON documents written alongside each row, in the layout
//! graph stores expect: documents keyed by `_key`, edges addressed as
//! `documents/<key>`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::{Conflict, ResolutionResult};
use crate::models::{Document, Edge};

/// Collection prefix used in edge endpoints.
pub const DOCUMENT_COLLECTION: &str = "documents";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(rename = "_key")]
    pub key: String,
    pub hash: String,
    pub content: String,
    pub path: String,
    pub document_type: String,
    pub last_modified: DateTime<Utc>,
    pub version: Option<String>,
    pub repository: String,
    pub branch: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Document> for DocumentRecord {
    fn from(doc: &Document) -> Self {
        let meta = doc.metadata();
        Self {
            key: doc.hash().to_string(),
            hash: doc.hash().to_string(),
            content: doc.content().to_string(),
            path: meta.path.clone(),
            document_type: meta.document_type.to_string(),
            last_modified: meta.last_modified,
            version: meta.version.map(|v| v.to_string()),
            repository: meta.repository.clone(),
            branch: meta.branch.clone(),
            created_at: doc.created_at(),
        }
    }
}

/// Edge metadata key folded into the stored edge key.
pub const EDGE_QUALIFIER_KEY: &str = "duplicate_path";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(rename = "_from")]
    pub from: String,
    #[serde(rename = "_to")]
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub confidence: f64,
    pub metadata: BTreeMap<String, String>,
}

impl EdgeRecord {
    /// Part of the stored edge key besides endpoints and type. Duplicate
    /// edges join equal hashes, so the duplicate's path tells them apart.
    pub fn qualifier(&self) -> &str {
        self.metadata
            .get(EDGE_QUALIFIER_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            from: format!("{DOCUMENT_COLLECTION}/{}", edge.from),
            to: format!("{DOCUMENT_COLLECTION}/{}", edge.to),
            edge_type: edge.edge_type.to_string(),
            confidence: edge.confidence,
            metadata: edge.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    #[serde(rename = "_key")]
    pub key: String,
    pub conflict_type: String,
    /// Content hashes of the member documents, in conflict order.
    pub documents: Vec<String>,
    pub detected_at: DateTime<Utc>,
    pub confidence: f64,
    pub suggested_strategy: String,
}

impl From<&Conflict> for ConflictRecord {
    fn from(conflict: &Conflict) -> Self {
        Self {
            key: conflict.id.clone(),
            conflict_type: conflict.conflict_type.to_string(),
            documents: conflict.documents.iter().map(|d| d.hash().to_string()).collect(),
            detected_at: conflict.detected_at,
            confidence: conflict.confidence,
            suggested_strategy: conflict.suggested_strategy.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRecord {
    pub conflict_id: String,
    pub strategy: String,
    /// Hash of the selected document, if any.
    pub selected_document: Option<String>,
    pub confidence: f64,
    pub requires_approval: bool,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ResolutionResult> for ResolutionRecord {
    fn from(result: &ResolutionResult) -> Self {
        Self {
            conflict_id: result.conflict_id.clone(),
            strategy: result.strategy.to_string(),
            selected_document: result
                .selected_document
                .as_ref()
                .map(|d| d.hash().to_string()),
            confidence: result.confidence,
            requires_approval: result.requires_approval,
            reasoning: result.reasoning.clone(),
            timestamp: result.timestamp,
        }
    }
}

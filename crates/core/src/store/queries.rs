//! Typed writes and reads against the SQLite store.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use super::records::{ConflictRecord, DocumentRecord, EdgeRecord, ResolutionRecord};
use super::{Database, DocumentStore};
use crate::conflict::{Conflict, ResolutionResult};
use crate::errors::StoreError;
use crate::models::{Document, Edge};

fn to_json<T: Serialize>(entity: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Serialize { entity, source })
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

fn upsert_document(conn: &Connection, doc: &Document) -> Result<(), StoreError> {
    let record = DocumentRecord::from(doc);
    let json = to_json("document", &record)?;
    conn.execute(
        "INSERT INTO documents
             (_key, path, document_type, content, last_modified, version, repository, branch, created_at, record)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(_key) DO UPDATE SET
             path = excluded.path,
             document_type = excluded.document_type,
             last_modified = excluded.last_modified,
             version = excluded.version,
             repository = excluded.repository,
             branch = excluded.branch,
             record = excluded.record",
        params![
            record.key,
            record.path,
            record.document_type,
            record.content,
            record.last_modified.to_rfc3339(),
            record.version,
            record.repository,
            record.branch,
            record.created_at.to_rfc3339(),
            json,
        ],
    )?;
    Ok(())
}

fn upsert_edge(conn: &Connection, edge: &Edge) -> Result<(), StoreError> {
    let record = EdgeRecord::from(edge);
    let json = to_json("edge", &record)?;
    conn.execute(
        "INSERT INTO edges (from_key, to_key, edge_type, qualifier, confidence, record)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(from_key, to_key, edge_type, qualifier) DO UPDATE SET
             confidence = excluded.confidence,
             record = excluded.record",
        params![
            edge.from,
            edge.to,
            record.edge_type,
            record.qualifier(),
            edge.confidence,
            json
        ],
    )?;
    Ok(())
}

impl DocumentStore for Database {
    fn insert_documents(&self, documents: &[Document]) -> Result<(), StoreError> {
        self.transaction(|conn| {
            for doc in documents {
                upsert_document(conn, doc)?;
            }
            Ok(())
        })?;
        debug!(count = documents.len(), "documents stored");
        Ok(())
    }

    fn insert_edges(&self, edges: &[Edge]) -> Result<(), StoreError> {
        self.transaction(|conn| {
            for edge in edges {
                upsert_edge(conn, edge)?;
            }
            Ok(())
        })?;
        debug!(count = edges.len(), "edges stored");
        Ok(())
    }

    fn store_conflict(&self, conflict: &Conflict) -> Result<(), StoreError> {
        let record = ConflictRecord::from(conflict);
        let json = to_json("conflict", &record)?;
        self.conn().execute(
            "INSERT INTO conflicts (id, conflict_type, confidence, suggested_strategy, detected_at, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 conflict_type = excluded.conflict_type,
                 confidence = excluded.confidence,
                 suggested_strategy = excluded.suggested_strategy,
                 detected_at = excluded.detected_at,
                 record = excluded.record",
            params![
                record.key,
                record.conflict_type,
                record.confidence,
                record.suggested_strategy,
                record.detected_at.to_rfc3339(),
                json,
            ],
        )?;
        debug!(conflict_id = %conflict.id, "conflict stored");
        Ok(())
    }

    fn store_resolution(&self, resolution: &ResolutionResult) -> Result<(), StoreError> {
        let record = ResolutionRecord::from(resolution);
        let json = to_json("resolution", &record)?;
        self.conn().execute(
            "INSERT INTO resolutions
                 (conflict_id, strategy, selected_key, confidence, requires_approval, reasoning, resolved_at, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(conflict_id) DO UPDATE SET
                 strategy = excluded.strategy,
                 selected_key = excluded.selected_key,
                 confidence = excluded.confidence,
                 requires_approval = excluded.requires_approval,
                 reasoning = excluded.reasoning,
                 resolved_at = excluded.resolved_at,
                 record = excluded.record",
            params![
                record.conflict_id,
                record.strategy,
                record.selected_document,
                record.confidence,
                record.requires_approval,
                record.reasoning,
                record.timestamp.to_rfc3339(),
                json,
            ],
        )?;
        debug!(conflict_id = %resolution.conflict_id, "resolution stored");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

impl Database {
    pub fn count_documents(&self) -> Result<i64, StoreError> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_edges(&self) -> Result<i64, StoreError> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_conflicts(&self) -> Result<i64, StoreError> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM conflicts", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Stored documents ordered by path.
    pub fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT record FROM documents ORDER BY path, _key")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|json| {
                serde_json::from_str(json)
                    .map_err(|source| StoreError::Corrupt { entity: "document", source })
            })
            .collect()
    }

    /// The stored resolution for a conflict, if any.
    pub fn get_resolution(&self, conflict_id: &str) -> Result<Option<ResolutionRecord>, StoreError> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT record FROM resolutions WHERE conflict_id = ?1",
                params![conflict_id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| {
            serde_json::from_str(&j)
                .map_err(|source| StoreError::Corrupt { entity: "resolution", source })
        })
        .transpose()
    }
}

//! Store schema and migration runner.
//!
//! Migrations are SQL strings applied in order; the SQLite `user_version`
//! pragma records the last one applied.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::StoreError;

/// All migrations, in order. Each entry is `(version, description, sql)`.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "documents, edges, conflicts, resolutions",
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            _key           TEXT PRIMARY KEY,
            path           TEXT NOT NULL,
            document_type  TEXT NOT NULL,
            content        TEXT NOT NULL,
            last_modified  TEXT NOT NULL,
            version        TEXT,
            repository     TEXT NOT NULL DEFAULT '',
            branch         TEXT NOT NULL DEFAULT '',
            created_at     TEXT NOT NULL,
            record         TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_type ON documents (document_type);

        CREATE TABLE IF NOT EXISTS edges (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            from_key    TEXT NOT NULL,
            to_key      TEXT NOT NULL,
            edge_type   TEXT NOT NULL,
            confidence  REAL NOT NULL,
            record      TEXT NOT NULL,
            UNIQUE (from_key, to_key, edge_type)
        );

        CREATE INDEX IF NOT EXISTS idx_edges_type ON edges (edge_type);

        CREATE TABLE IF NOT EXISTS conflicts (
            id                  TEXT PRIMARY KEY,
            conflict_type       TEXT NOT NULL,
            confidence          REAL NOT NULL,
            suggested_strategy  TEXT NOT NULL,
            detected_at         TEXT NOT NULL,
            record              TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS resolutions (
            conflict_id        TEXT PRIMARY KEY,
            strategy           TEXT NOT NULL,
            selected_key       TEXT,
            confidence         REAL NOT NULL,
            requires_approval  INTEGER NOT NULL,
            reasoning          TEXT NOT NULL,
            resolved_at        TEXT NOT NULL,
            record             TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_resolutions_approval ON resolutions (requires_approval);
        "#,
    ),
    (
        2,
        "edge qualifier in the edge uniqueness key",
        r#"
        CREATE TABLE edges_v2 (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            from_key    TEXT NOT NULL,
            to_key      TEXT NOT NULL,
            edge_type   TEXT NOT NULL,
            qualifier   TEXT NOT NULL DEFAULT '',
            confidence  REAL NOT NULL,
            record      TEXT NOT NULL,
            UNIQUE (from_key, to_key, edge_type, qualifier)
        );

        INSERT INTO edges_v2 (from_key, to_key, edge_type, qualifier, confidence, record)
            SELECT from_key, to_key, edge_type,
                   COALESCE(json_extract(record, '$.metadata.duplicate_path'), ''),
                   confidence, record
            FROM edges;

        DROP TABLE edges;
        ALTER TABLE edges_v2 RENAME TO edges;
        CREATE INDEX IF NOT EXISTS idx_edges_type ON edges (edge_type);
        "#,
    ),
];

/// Run all pending migrations against `conn`.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;
    info!(
        current_version,
        target_version = MIGRATIONS.last().map(|m| m.0).unwrap_or(0),
        "checking store migrations"
    );

    for &(version, description, sql) in MIGRATIONS {
        if version > current_version {
            info!(version, description, "applying migration");
            conn.execute_batch(sql)
                .map_err(|e| StoreError::MigrationFailed {
                    version,
                    detail: e.to_string(),
                })?;
            set_schema_version(conn, version)?;
            debug!(version, "migration applied");
        }
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<u32, StoreError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: u32) -> Result<(), StoreError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_idempotently() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_v2_keeps_existing_edges() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0].2).unwrap();
        set_schema_version(&conn, 1).unwrap();
        conn.execute(
            "INSERT INTO edges (from_key, to_key, edge_type, confidence, record)
             VALUES ('h', 'h', 'DuplicateOf', 1.0, '{\"metadata\":{\"duplicate_path\":\"b/README\"}}')",
            [],
        )
        .unwrap();

        run_migrations(&conn).unwrap();
        let qualifier: String = conn
            .query_row("SELECT qualifier FROM edges", [], |row| row.get(0))
            .unwrap();
        assert_eq!(qualifier, "b/README");
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };

        for table in ["documents", "edges", "conflicts", "resolutions"] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }
}

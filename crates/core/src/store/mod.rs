//! Persistence for documents, graph edges, conflicts, and resolutions.
//!
//! The pipeline talks to storage only through [`DocumentStore`]. [`Database`]
//! is the provided SQLite implementation: WAL journaling, numbered migrations,
//! and upserts keyed on content hash so reruns over unchanged input leave the
//! store unchanged.

pub mod queries;
pub mod records;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::conflict::{Conflict, ResolutionResult};
use crate::errors::StoreError;
use crate::models::{Document, Edge};

pub use records::{ConflictRecord, DocumentRecord, EdgeRecord, ResolutionRecord};

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// Document/graph store used by the pipeline's persistence stages.
///
/// Every write must be idempotent: writing the same record twice leaves the
/// store as if it had been written once.
pub trait DocumentStore: Send + Sync {
    fn insert_documents(&self, documents: &[Document]) -> Result<(), StoreError>;

    fn insert_edges(&self, edges: &[Edge]) -> Result<(), StoreError>;

    fn store_conflict(&self, conflict: &Conflict) -> Result<(), StoreError>;

    fn store_resolution(&self, resolution: &ResolutionResult) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------------

/// Main database handle wrapping a SQLite connection.
///
/// The inner connection sits behind a `Mutex` so that `Database` is
/// `Send + Sync` and can be shared through `Arc<dyn DocumentStore>`.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and bring its schema up
    /// to date.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;
        debug!("database opened with WAL mode");
        Ok(db)
    }

    /// Open a migrated in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Run all schema migrations.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        schema::run_migrations(&conn)
    }

    /// Obtain a lock on the underlying connection, recovering from poison.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("database mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Execute a closure inside a SQLite transaction. `Ok` commits, `Err`
    /// rolls back.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

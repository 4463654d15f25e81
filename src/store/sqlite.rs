// src/store/sqlite.rs

//! SQLite-backed [`RunStore`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::{debug, warn};

use super::{Run, RunId, RunState, RunStore, StoreError, now_ms};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id            TEXT PRIMARY KEY,
    created_at_ms INTEGER NOT NULL,
    state         TEXT NOT NULL,
    output        TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_runs_created_at ON runs (created_at_ms DESC);
";

/// Run history persisted in a single SQLite database file.
///
/// The connection is serialized behind a mutex; statements are short and
/// row-level, so contention between a streaming run and API reads stays
/// negligible.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    ///
    /// Parent directories are created so a fresh checkout can point at the
    /// default `data/runs.db` without any setup step.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened sqlite run store");
        Self::init(conn)
    }

    /// In-memory database, private to this handle. Used by tests that want
    /// real SQL semantics without touching disk.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl RunStore for SqliteStore {
    fn create(&self, id: &RunId) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO runs (id, created_at_ms, state, output) VALUES (?1, ?2, ?3, '')",
            params![id.as_str(), now_ms(), RunState::Running.as_str()],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateId(id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn append_output(&self, id: &RunId, chunk: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE runs SET output = output || ?1 WHERE id = ?2 AND state = ?3",
            params![chunk, id.as_str(), RunState::Running.as_str()],
        )?;
        if changed == 0 {
            warn!(run_id = %id, "append to missing or finalized run ignored");
        }
        Ok(())
    }

    fn finalize(&self, id: &RunId, success: bool, output: &str) -> Result<(), StoreError> {
        let state = if success {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE runs SET state = ?1, output = ?2 WHERE id = ?3 AND state = ?4",
            params![
                state.as_str(),
                output,
                id.as_str(),
                RunState::Running.as_str()
            ],
        )?;
        if changed == 0 {
            warn!(run_id = %id, "finalize of missing or already finalized run ignored");
        }
        Ok(())
    }

    fn get(&self, id: &RunId) -> Result<Option<Run>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, created_at_ms, state, output FROM runs WHERE id = ?1",
            params![id.as_str()],
            row_to_run,
        )
        .optional()?
        .transpose()
    }

    fn list_all(&self) -> Result<Vec<Run>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, created_at_ms, state, output FROM runs \
             ORDER BY created_at_ms DESC, id DESC",
        )?;
        let rows = stmt.query_map([], row_to_run)?;
        let mut runs = Vec::new();
        for row in rows {
            runs.push(row??);
        }
        Ok(runs)
    }
}

/// A stored state string we cannot parse surfaces as [`StoreError::Corrupt`]
/// rather than being coerced to some default.
fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Run, StoreError>> {
    let id: String = row.get(0)?;
    let created_at_ms: i64 = row.get(1)?;
    let state: String = row.get(2)?;
    let output: String = row.get(3)?;
    Ok(state
        .parse::<RunState>()
        .map(|state| Run {
            id: RunId::from(id),
            created_at_ms,
            state,
            output,
        })
        .map_err(StoreError::Corrupt))
}

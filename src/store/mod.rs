// src/store/mod.rs

//! Durable run history.
//!
//! - [`RunStore`] is the storage contract every backend implements.
//! - [`sqlite`] persists runs in a SQLite database (the default).
//! - [`memory`] keeps runs in a process-local map (tests, `mode = "memory"`).
//!
//! Every run is one row, created `Running` with empty output, appended to
//! while the subprocess streams, and finalized exactly once. Rows are never
//! deleted here; retention is someone else's problem.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Opaque unique identifier for one run.
///
/// Time-derived (`<unix-millis>-<counter>`) so lexicographic ordering roughly
/// follows creation time; the counter makes ids allocated within the same
/// millisecond distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(String);

static RUN_SEQ: AtomicU64 = AtomicU64::new(1);

impl RunId {
    /// Allocate a fresh id.
    pub fn generate() -> Self {
        let seq = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}-{seq:04}", now_ms()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of a run.
///
/// `Running` means no outcome has been recorded yet; the terminal states
/// carry the outcome, so a separate nullable success flag cannot drift out
/// of sync with the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }

    /// Outcome of the run; `None` while still running.
    pub fn success(&self) -> Option<bool> {
        match self {
            RunState::Running => None,
            RunState::Succeeded => Some(true),
            RunState::Failed => Some(false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        }
    }
}

impl FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunState::Running),
            "succeeded" => Ok(RunState::Succeeded),
            "failed" => Ok(RunState::Failed),
            other => Err(format!("unknown run state: {other:?}")),
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt as recorded in the store.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: RunId,
    /// Creation time in unix milliseconds; immutable.
    pub created_at_ms: i64,
    pub state: RunState,
    /// Accumulated process output (stdout + stderr interleaved as
    /// delivered). Append-only until finalization, frozen afterwards.
    pub output: String,
}

impl Run {
    pub fn success(&self) -> Option<bool> {
        self.state.success()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run id already exists: {0}")]
    DuplicateId(RunId),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store mutex poisoned")]
    LockPoisoned,

    #[error("corrupt run row: {0}")]
    Corrupt(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage contract for run records.
///
/// All methods are usable concurrently from any number of in-flight runs;
/// rows for different ids never interfere. A trailing `append_output` racing
/// a `finalize` of the same id is tolerated as a logged no-op on whichever
/// side loses; callers never have to handle that race.
pub trait RunStore: Send + Sync {
    /// Insert a new run in `Running` state with empty output.
    fn create(&self, id: &RunId) -> Result<(), StoreError>;

    /// Atomically concatenate `chunk` to the run's output.
    ///
    /// Missing or already-finalized ids are logged no-ops.
    fn append_output(&self, id: &RunId, chunk: &str) -> Result<(), StoreError>;

    /// Record the terminal state and the final output value.
    ///
    /// Only applies to rows still `Running`; anything else is a logged
    /// no-op, so a record can never be un-finalized.
    fn finalize(&self, id: &RunId, success: bool, output: &str) -> Result<(), StoreError>;

    fn get(&self, id: &RunId) -> Result<Option<Run>, StoreError>;

    /// All runs, newest first by creation time.
    fn list_all(&self) -> Result<Vec<Run>, StoreError>;
}

/// Current unix time in milliseconds.
pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// src/store/memory.rs

//! In-memory [`RunStore`] used by tests and `store.mode = "memory"`.
//!
//! Behaves exactly like the SQLite backend from the caller's point of view;
//! nothing survives process exit.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use super::{Run, RunId, RunState, RunStore, StoreError, now_ms};

#[derive(Default)]
pub struct MemoryStore {
    runs: Mutex<HashMap<RunId, Run>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> Result<MutexGuard<'_, HashMap<RunId, Run>>, StoreError> {
        self.runs.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl RunStore for MemoryStore {
    fn create(&self, id: &RunId) -> Result<(), StoreError> {
        let mut runs = self.runs()?;
        if runs.contains_key(id) {
            return Err(StoreError::DuplicateId(id.clone()));
        }
        runs.insert(
            id.clone(),
            Run {
                id: id.clone(),
                created_at_ms: now_ms(),
                state: RunState::Running,
                output: String::new(),
            },
        );
        Ok(())
    }

    fn append_output(&self, id: &RunId, chunk: &str) -> Result<(), StoreError> {
        let mut runs = self.runs()?;
        match runs.get_mut(id) {
            Some(run) if run.state == RunState::Running => run.output.push_str(chunk),
            _ => warn!(run_id = %id, "append to missing or finalized run ignored"),
        }
        Ok(())
    }

    fn finalize(&self, id: &RunId, success: bool, output: &str) -> Result<(), StoreError> {
        let mut runs = self.runs()?;
        match runs.get_mut(id) {
            Some(run) if run.state == RunState::Running => {
                run.state = if success {
                    RunState::Succeeded
                } else {
                    RunState::Failed
                };
                run.output = output.to_string();
            }
            _ => warn!(run_id = %id, "finalize of missing or already finalized run ignored"),
        }
        Ok(())
    }

    fn get(&self, id: &RunId) -> Result<Option<Run>, StoreError> {
        Ok(self.runs()?.get(id).cloned())
    }

    fn list_all(&self) -> Result<Vec<Run>, StoreError> {
        let runs = self.runs()?;
        let mut all: Vec<Run> = runs.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at_ms
                .cmp(&a.created_at_ms)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(all)
    }
}

// src/snapshot/mock.rs

//! Scripted [`SnapshotProvider`] for tests.
//!
//! The mock keeps a movable branch head and a set of files to materialize on
//! fetch. Fetches write real files to disk so the executor path (entry-point
//! check, spawn, streaming) runs for real against a temp directory.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use super::{AcquireError, RemoteCommit, SnapshotProvider};

#[derive(Debug, Clone)]
struct MockFile {
    rel_path: PathBuf,
    contents: String,
    executable: bool,
}

#[derive(Debug, Default)]
struct MockState {
    head: Option<RemoteCommit>,
    next_commit_error: Option<AcquireError>,
    files: Vec<MockFile>,
    next_fetch_error: Option<AcquireError>,
    fetch_count: usize,
}

#[derive(Clone, Default)]
pub struct MockSnapshotProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockSnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the branch head; subsequent `latest_commit` calls return this.
    pub fn set_head(&self, commit: RemoteCommit) {
        self.state.lock().unwrap().head = Some(commit);
    }

    /// Make the next `latest_commit` call fail once.
    pub fn fail_next_commit(&self, err: AcquireError) {
        self.state.lock().unwrap().next_commit_error = Some(err);
    }

    /// Add a plain file to every future working copy.
    pub fn add_file(&self, rel_path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.state.lock().unwrap().files.push(MockFile {
            rel_path: rel_path.into(),
            contents: contents.into(),
            executable: false,
        });
    }

    /// Add an executable script to every future working copy. Callers supply
    /// the shebang line themselves.
    pub fn add_script(&self, rel_path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.state.lock().unwrap().files.push(MockFile {
            rel_path: rel_path.into(),
            contents: contents.into(),
            executable: true,
        });
    }

    /// Make the next `fetch_source` call fail once.
    pub fn fail_next_fetch(&self, err: AcquireError) {
        self.state.lock().unwrap().next_fetch_error = Some(err);
    }

    /// Number of successful fetches so far.
    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetch_count
    }
}

impl SnapshotProvider for MockSnapshotProvider {
    fn latest_commit(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteCommit, AcquireError>> + Send + '_>> {
        let result = {
            let mut state = self.state.lock().unwrap();
            match state.next_commit_error.take() {
                Some(err) => Err(err),
                None => state.head.clone().ok_or_else(|| {
                    AcquireError::NotFound("mock has no head commit".to_string())
                }),
            }
        };
        Box::pin(async move { result })
    }

    fn fetch_source<'a>(
        &'a self,
        dest: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), AcquireError>> + Send + 'a>> {
        let plan = {
            let mut state = self.state.lock().unwrap();
            match state.next_fetch_error.take() {
                Some(err) => Err(err),
                None => {
                    state.fetch_count += 1;
                    Ok(state.files.clone())
                }
            }
        };
        Box::pin(async move {
            let files = plan?;
            write_working_copy(dest, &files)
                .map_err(|e| AcquireError::Network(format!("mock fetch failed: {e}")))
        })
    }
}

fn write_working_copy(dest: &Path, files: &[MockFile]) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for file in files {
        let path = dest.join(&file.rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &file.contents)?;
        if file.executable {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
            }
        }
    }
    Ok(())
}

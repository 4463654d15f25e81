// src/run/executor.rs

//! The run executor: acquire source, spawn the entry point, stream output.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::RunnerSection;
use crate::errors::Result;
use crate::events::{EventBus, RunEvent};
use crate::snapshot::SnapshotProvider;
use crate::store::{Run, RunId, RunStore};

use super::{CompletionWebhook, RunFailure, RunLauncher};

/// Size of one read from a child stream. Chunks arrive in whatever sizes
/// the pipe delivers; this only caps a single read.
const READ_BUF_SIZE: usize = 8192;

/// How long to keep draining buffered output after a timed-out process has
/// been killed.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Executes runs against working copies produced by a [`SnapshotProvider`].
///
/// Every run follows the same path: the record is created immediately, the
/// run waits for an admission permit, the source is fetched into a private
/// working copy, the entry point is spawned, and its interleaved
/// stdout/stderr stream is appended to the store and mirrored onto the
/// [`EventBus`] chunk by chunk. Exactly one finalize happens per run, no
/// matter how the attempt ends.
pub struct RunExecutor {
    store: Arc<dyn RunStore>,
    provider: Arc<dyn SnapshotProvider>,
    bus: EventBus,
    webhook: Option<CompletionWebhook>,
    workdir: PathBuf,
    entry_point: String,
    timeout: Option<Duration>,
    permits: Semaphore,
}

impl RunExecutor {
    pub fn new(
        store: Arc<dyn RunStore>,
        provider: Arc<dyn SnapshotProvider>,
        bus: EventBus,
        runner: &RunnerSection,
        webhook: Option<CompletionWebhook>,
    ) -> Self {
        Self {
            store,
            provider,
            bus,
            webhook,
            workdir: runner.workdir.clone(),
            entry_point: runner.entry_point.clone(),
            timeout: runner.timeout_seconds.map(Duration::from_secs),
            permits: Semaphore::new(runner.max_parallel_runs),
        }
    }

    /// Create the run record and execute the run in a background task.
    ///
    /// Returns as soon as the record exists; the run itself proceeds
    /// concurrently. Failing to create the record is the only error that
    /// surfaces here, and in that case nothing has been started.
    pub fn start(self: &Arc<Self>) -> Result<RunId> {
        let id = RunId::generate();
        self.store.create(&id)?;
        info!(run_id = %id, "run created");

        let executor = Arc::clone(self);
        let run_id = id.clone();
        tokio::spawn(async move {
            executor.execute(run_id).await;
        });
        Ok(id)
    }

    /// Create the run record and execute the run inline, returning the
    /// finalized record. Used by `--run-now`.
    pub async fn run_to_completion(self: &Arc<Self>) -> Result<Run> {
        let id = RunId::generate();
        self.store.create(&id)?;
        info!(run_id = %id, "run created");

        self.execute(id.clone()).await;
        self.store
            .get(&id)?
            .ok_or_else(|| anyhow!("run {id} missing from store after completion").into())
    }

    /// Drive one run to its terminal state.
    ///
    /// This is the containment boundary: whatever `attempt` does, the run
    /// ends finalized, the completion event is emitted, and the webhook (if
    /// configured) is notified.
    async fn execute(&self, id: RunId) {
        let mut output = String::new();
        let success = match self.attempt(&id, &mut output).await {
            Ok(process_succeeded) => process_succeeded,
            Err(failure) => {
                error!(run_id = %id, error = %failure, "run failed");
                let line = format!("Error: {failure}\n");
                if let Err(err) = self.store.append_output(&id, &line) {
                    warn!(run_id = %id, error = %err, "failed to record failure line");
                }
                output.push_str(&line);
                self.bus.emit(RunEvent::Output {
                    run_id: id.clone(),
                    chunk: line,
                });
                false
            }
        };

        if let Err(err) = self.store.finalize(&id, success, &output) {
            error!(run_id = %id, error = %err, "failed to finalize run");
        }
        info!(run_id = %id, success, "run finished");
        self.bus.emit(RunEvent::Completed {
            run_id: id.clone(),
            success,
        });

        if let Some(webhook) = &self.webhook {
            webhook.notify(&id, success).await;
        }

        self.cleanup_working_copy(&id).await;
    }

    /// One execution attempt. `Ok` carries the process outcome; `Err` means
    /// the run never got a normal exit.
    async fn attempt(
        &self,
        id: &RunId,
        output: &mut String,
    ) -> std::result::Result<bool, RunFailure> {
        if self.permits.available_permits() == 0 {
            info!(run_id = %id, "waiting for a free run slot");
        }
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RunFailure::Shutdown)?;

        let workdir = self.workdir.join(id.as_str());
        tokio::fs::create_dir_all(&self.workdir).await?;

        debug!(run_id = %id, workdir = %workdir.display(), "acquiring source");
        match self.provider.fetch_source(&workdir).await {
            Ok(()) => self.run_entry_point(id, &workdir, output).await,
            Err(err) => Err(RunFailure::Acquire(err)),
        }
    }

    /// Remove the run's working copy. Best-effort; a failed clone may have
    /// left a partial directory behind, and leftovers only cost disk space.
    async fn cleanup_working_copy(&self, id: &RunId) {
        let workdir = self.workdir.join(id.as_str());
        if workdir.exists() {
            if let Err(err) = tokio::fs::remove_dir_all(&workdir).await {
                warn!(run_id = %id, error = %err, "failed to remove working copy");
            }
        }
    }

    async fn run_entry_point(
        &self,
        id: &RunId,
        workdir: &Path,
        output: &mut String,
    ) -> std::result::Result<bool, RunFailure> {
        let script = self.resolve_entry_point(workdir).await?;

        info!(run_id = %id, entry_point = %self.entry_point, "starting run process");
        let mut child = Command::new(&script)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(RunFailure::Spawn)?;

        // Both streams feed one funnel channel; chunk order within a stream
        // is preserved, interleaving across streams follows arrival.
        let (tx, mut rx) = mpsc::channel::<String>(64);
        spawn_chunk_reader(child.stdout.take(), tx.clone());
        spawn_chunk_reader(child.stderr.take(), tx);

        let drive = async {
            // The channel closes when both readers hit EOF, which means the
            // process has closed its pipes; wait() then reaps it.
            while let Some(chunk) = rx.recv().await {
                self.record_chunk(id, output, chunk);
            }
            child.wait().await
        };

        let status = match self.timeout {
            None => drive.await?,
            Some(limit) => match tokio::time::timeout(limit, drive).await {
                Ok(waited) => waited?,
                Err(_) => {
                    warn!(
                        run_id = %id,
                        timeout_secs = limit.as_secs(),
                        "run exceeded timeout, killing process"
                    );
                    if let Err(err) = child.kill().await {
                        warn!(run_id = %id, error = %err, "failed to kill timed-out process");
                    }
                    // Keep whatever output was already in flight.
                    while let Some(chunk) =
                        tokio::time::timeout(DRAIN_GRACE, rx.recv()).await.ok().flatten()
                    {
                        self.record_chunk(id, output, chunk);
                    }
                    return Err(RunFailure::TimedOut(limit.as_secs()));
                }
            },
        };

        let code = status.code().unwrap_or(-1);
        info!(
            run_id = %id,
            exit_code = code,
            success = status.success(),
            "run process exited"
        );
        Ok(status.success())
    }

    /// Check that the configured entry point exists in the working copy and
    /// can be executed, returning its absolute path.
    async fn resolve_entry_point(
        &self,
        workdir: &Path,
    ) -> std::result::Result<PathBuf, RunFailure> {
        let script = workdir.join(&self.entry_point);
        let metadata = match tokio::fs::metadata(&script).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(RunFailure::MissingEntryPoint(self.entry_point.clone())),
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(RunFailure::NotExecutable(self.entry_point.clone()));
            }
        }
        #[cfg(not(unix))]
        let _ = metadata;

        // The working copy path from config may be relative; the spawn uses
        // `current_dir`, so the program path has to be absolute.
        Ok(tokio::fs::canonicalize(&script).await?)
    }

    fn record_chunk(&self, id: &RunId, output: &mut String, chunk: String) {
        output.push_str(&chunk);
        if let Err(err) = self.store.append_output(id, &chunk) {
            warn!(run_id = %id, error = %err, "failed to append output chunk");
        }
        self.bus.emit(RunEvent::Output {
            run_id: id.clone(),
            chunk,
        });
    }
}

impl RunLauncher for Arc<RunExecutor> {
    fn launch(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<RunId>> + Send + '_>> {
        let started = self.start();
        Box::pin(async move { started })
    }
}

/// Forward raw chunks from one child stream into the funnel channel.
///
/// A chunk boundary can split a multi-byte character; the lossy conversion
/// keeps the stream going rather than aborting the run over it.
fn spawn_chunk_reader<R>(stream: Option<R>, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(mut stream) = stream else {
        return;
    };
    tokio::spawn(async move {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(error = %err, "child stream read ended");
                    break;
                }
            }
        }
    });
}

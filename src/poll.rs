// src/poll.rs

//! Commit polling.
//!
//! [`ChangePoller`] asks the [`SnapshotProvider`] for the branch head on a
//! fixed interval and launches a run whenever the head moves. The first
//! observation only records a baseline, so restarting the service never
//! re-runs history.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::{EventBus, RunEvent};
use crate::run::RunLauncher;
use crate::snapshot::SnapshotProvider;

pub struct ChangePoller<L: RunLauncher> {
    provider: Arc<dyn SnapshotProvider>,
    launcher: L,
    bus: EventBus,
    /// Id of the newest commit seen so far; `None` until the first
    /// successful poll.
    last_commit_id: Option<String>,
}

impl<L: RunLauncher> ChangePoller<L> {
    pub fn new(provider: Arc<dyn SnapshotProvider>, launcher: L, bus: EventBus) -> Self {
        Self {
            provider,
            launcher,
            bus,
            last_commit_id: None,
        }
    }

    /// One poll tick.
    ///
    /// Errors never escape: a failed query leaves the watermark untouched
    /// and the next tick tries again. The watermark advances before the
    /// launch, so a commit triggers at most one run even if that launch
    /// fails.
    pub async fn poll_once(&mut self) {
        let commit = match self.provider.latest_commit().await {
            Ok(commit) => commit,
            Err(err) => {
                warn!(error = %err, "failed to query latest commit, will retry");
                return;
            }
        };

        if self.last_commit_id.is_none() {
            info!(commit = %commit.short_id, "recorded branch head as startup baseline");
            self.last_commit_id = Some(commit.id);
            return;
        }
        if self.last_commit_id.as_deref() == Some(commit.id.as_str()) {
            debug!(commit = %commit.short_id, "no new commits");
            return;
        }

        info!(
            commit = %commit.short_id,
            author = %commit.author,
            title = %commit.title,
            "new commit detected"
        );
        self.last_commit_id = Some(commit.id.clone());
        match self.launcher.launch().await {
            Ok(run_id) => {
                self.bus.emit(RunEvent::ChangeDetected { run_id, commit });
            }
            Err(err) => {
                error!(error = %err, "failed to launch run for new commit");
            }
        }
    }

    /// Run the poll loop in a background task until the handle is stopped.
    pub fn spawn(mut self, interval: Duration) -> PollerHandle
    where
        L: 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            // The first tick fires immediately, so startup records the
            // baseline head without waiting out a full interval.
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.poll_once().await,
                    _ = &mut shutdown_rx => {
                        debug!("change poller stopping");
                        break;
                    }
                }
            }
        });
        info!(interval_secs = interval.as_secs(), "change poller started");
        PollerHandle { shutdown_tx, join }
    }
}

/// Handle for a spawned poll loop. Dropping it without calling [`stop`]
/// leaves the loop running detached.
///
/// [`stop`]: PollerHandle::stop
pub struct PollerHandle {
    shutdown_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the loop to exit and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(err) = self.join.await {
            warn!(error = %err, "poller task ended abnormally");
        }
    }
}

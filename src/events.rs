// src/events.rs

//! Broadcast channel for live run activity.
//!
//! Anything that happens to a run while it executes is mirrored onto an
//! [`EventBus`] so observers (the console follower, future UIs) can watch
//! in real time without touching the store. Delivery is best-effort: events
//! are dropped when nobody is subscribed, and a slow subscriber only loses
//! its own backlog.

use tokio::sync::broadcast;
use tracing::trace;

use crate::snapshot::RemoteCommit;
use crate::store::RunId;

/// Capacity of the channel's shared ring buffer. A subscriber that falls
/// further behind than this loses the oldest events.
const DEFAULT_CAPACITY: usize = 256;

/// Events flowing out of the poller and the run executor.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// The poller saw a new commit and launched a run for it.
    ChangeDetected {
        run_id: RunId,
        commit: RemoteCommit,
    },
    /// A chunk of subprocess output, in arrival order.
    Output { run_id: RunId, chunk: String },
    /// The run reached a terminal state.
    Completed { run_id: RunId, success: bool },
}

impl RunEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            RunEvent::ChangeDetected { run_id, .. }
            | RunEvent::Output { run_id, .. }
            | RunEvent::Completed { run_id, .. } => run_id,
        }
    }
}

/// Cheaply cloneable handle to the shared broadcast channel.
///
/// A subscriber only receives events emitted after its `subscribe` call;
/// there is no replay. The store is the source of truth for history.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// A send error only means there are no subscribers right now, which is
    /// a normal state for a headless service.
    pub fn emit(&self, event: RunEvent) {
        if self.sender.send(event).is_err() {
            trace!("event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// src/run/mod.rs

//! Run execution.
//!
//! [`RunExecutor`] owns the full lifecycle of a run: record creation,
//! admission, source acquisition, entry-point spawn, output streaming, and
//! finalization. [`CompletionWebhook`] reports terminal states to an
//! external URL. The poller reaches the executor only through the
//! [`RunLauncher`] trait so tests can count launches without running
//! processes.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::errors::Result;
use crate::snapshot::AcquireError;
use crate::store::RunId;

pub mod executor;
pub mod webhook;

pub use executor::RunExecutor;
pub use webhook::CompletionWebhook;

/// Why a run ended without a normal process exit.
///
/// The `Display` text is appended to the run's output as its final
/// `Error: ...` line, so every variant reads as a plain sentence.
#[derive(Debug, Error)]
pub enum RunFailure {
    #[error("failed to acquire source: {0}")]
    Acquire(#[from] AcquireError),

    #[error("entry point {0} not found in repository")]
    MissingEntryPoint(String),

    #[error("entry point {0} is not executable")]
    NotExecutable(String),

    #[error("failed to start process: {0}")]
    Spawn(std::io::Error),

    #[error("io error during run: {0}")]
    Io(#[from] std::io::Error),

    #[error("run timed out after {0} seconds")]
    TimedOut(u64),

    #[error("executor is shutting down")]
    Shutdown,
}

/// Trait abstracting how new runs are started.
///
/// Production code uses `Arc<RunExecutor>`; tests can provide their own
/// implementation that records launches and hands back canned ids.
pub trait RunLauncher: Send + Sync {
    /// Start a run in the background, returning its id once the run record
    /// exists in the store.
    fn launch(&self) -> Pin<Box<dyn Future<Output = Result<RunId>> + Send + '_>>;
}

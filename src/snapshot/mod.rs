// src/snapshot/mod.rs

//! Access to the watched repository.
//!
//! The poller and the run executor talk to a [`SnapshotProvider`] instead of
//! GitLab directly. This keeps the orchestration logic independent of any
//! hosting service and lets tests swap in a provider that serves scripted
//! commits and writes local working copies.
//!
//! - [`gitlab`] is the production implementation (GitLab REST API + git).
//! - [`mock`] serves canned data for tests.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::Deserialize;
use thiserror::Error;

pub mod gitlab;
pub mod mock;

pub use gitlab::GitLabProvider;
pub use mock::MockSnapshotProvider;

/// Identity of the newest commit on the watched branch.
///
/// The deserialization field names follow the GitLab commits API; the mock
/// provider constructs these directly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteCommit {
    /// Full commit sha; this is the value the poller compares.
    pub id: String,
    pub short_id: String,
    /// First line of the commit message.
    pub title: String,
    #[serde(rename = "author_name")]
    pub author: String,
    /// Commit timestamp as reported by the remote, unparsed.
    pub created_at: String,
}

/// Failure while talking to the remote or materializing a working copy.
///
/// The classification matters: [`AcquireError::Network`] is transient and the
/// poller keeps going, while the other variants usually mean the config is
/// wrong and are worth surfacing loudly.
#[derive(Debug, Clone, Error)]
pub enum AcquireError {
    #[error("authentication rejected by remote: {0}")]
    Auth(String),

    #[error("repository or branch not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Abstraction over "what is the latest commit" and "give me the code".
///
/// Production uses [`GitLabProvider`]; tests use [`MockSnapshotProvider`],
/// which writes real files so the executor path stays fully exercised.
pub trait SnapshotProvider: Send + Sync {
    /// Latest commit on the configured branch.
    fn latest_commit(&self)
    -> Pin<Box<dyn Future<Output = Result<RemoteCommit, AcquireError>> + Send + '_>>;

    /// Materialize a fresh working copy of the repository at `dest`.
    ///
    /// `dest` must not exist yet; the provider creates it. The caller owns
    /// cleanup.
    fn fetch_source<'a>(
        &'a self,
        dest: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), AcquireError>> + Send + 'a>>;
}

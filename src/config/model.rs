// src/config/model.rs

use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [repo]
/// url = "https://gitlab.com/acme/widgets.git"
/// branch = "main"
/// username = "ci-bot"
/// # token comes from the CIWATCH_TOKEN environment variable
///
/// [poll]
/// interval_seconds = 30
///
/// [store]
/// mode = "sqlite"
/// path = "data/runs.db"
///
/// [runner]
/// entry_point = "ci.sh"
/// workdir = "repos"
/// max_parallel_runs = 1
///
/// [webhook]
/// url = "https://hooks.example.com/ci"
/// ```
///
/// Everything except `[repo]` is optional and has reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Remote repository settings from `[repo]`.
    pub repo: RepoSection,

    /// Change polling settings from `[poll]`.
    #[serde(default)]
    pub poll: PollSection,

    /// Run history storage settings from `[store]`.
    #[serde(default)]
    pub store: StoreSection,

    /// Run execution settings from `[runner]`.
    #[serde(default)]
    pub runner: RunnerSection,

    /// Optional completion webhook from `[webhook]`.
    #[serde(default)]
    pub webhook: WebhookSection,
}

/// `[repo]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoSection {
    /// Repository https URL, e.g. `https://gitlab.com/acme/widgets.git`.
    ///
    /// A trailing `.git` is tolerated; the project path for API calls is
    /// derived from this URL.
    pub url: String,

    /// Branch to poll and clone.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Username used for authenticated clone URLs.
    pub username: String,

    /// Access token. Usually left out of the file and supplied via the
    /// `CIWATCH_TOKEN` environment variable instead (the loader fills this
    /// field in).
    #[serde(default)]
    pub token: Option<String>,

    /// Base URL of the remote's REST API, used to query the latest commit.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    "https://gitlab.com/api/v4".to_string()
}

/// `[poll]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PollSection {
    /// Whether the change poller runs at all in service mode.
    #[serde(default = "default_poll_enabled")]
    pub enabled: bool,

    /// Seconds between polls of the remote's latest revision.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

fn default_poll_enabled() -> bool {
    true
}

fn default_interval_seconds() -> u64 {
    30
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            enabled: default_poll_enabled(),
            interval_seconds: default_interval_seconds(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Where run records live.
    #[serde(default)]
    pub mode: StoreMode,

    /// Database file path for `mode = "sqlite"`. Parent directories are
    /// created on open.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/runs.db")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            mode: StoreMode::default(),
            path: default_store_path(),
        }
    }
}

/// Mode for storing run records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// Persist runs in a SQLite database (survives restarts).
    Sqlite,
    /// Keep runs in memory only (lost on restart; mainly for tests).
    Memory,
}

impl Default for StoreMode {
    fn default() -> Self {
        StoreMode::Sqlite
    }
}

impl FromStr for StoreMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StoreMode::Sqlite),
            "memory" => Ok(StoreMode::Memory),
            other => Err(format!(
                "invalid store mode: {other} (expected \"sqlite\" or \"memory\")"
            )),
        }
    }
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// Name of the entry-point script expected at the snapshot root.
    ///
    /// The file must exist in the cloned snapshot and be executable.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// Directory under which per-run snapshot checkouts are created
    /// (`<workdir>/<run-id>`).
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Maximum number of runs allowed to fetch + execute at the same time.
    ///
    /// Additional runs are admitted (they get a `Running` record right away)
    /// but wait for a slot before touching the remote.
    #[serde(default = "default_max_parallel_runs")]
    pub max_parallel_runs: usize,

    /// Optional wall-clock limit for one run's subprocess, in seconds.
    ///
    /// When unset, runs are unbounded and expected to terminate on their own.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

fn default_entry_point() -> String {
    "ci.sh".to_string()
}

fn default_workdir() -> PathBuf {
    PathBuf::from("repos")
}

fn default_max_parallel_runs() -> usize {
    1
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            entry_point: default_entry_point(),
            workdir: default_workdir(),
            max_parallel_runs: default_max_parallel_runs(),
            timeout_seconds: None,
        }
    }
}

/// `[webhook]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebhookSection {
    /// Endpoint POSTed a `{ runId, success, timestamp }` payload on every
    /// run completion. Delivery failures are logged, never escalated.
    #[serde(default)]
    pub url: Option<String>,
}

#![allow(dead_code)]

use std::path::Path;

use ciwatch::config::{
    ConfigFile, PollSection, RepoSection, RunnerSection, StoreMode, StoreSection, WebhookSection,
};
use ciwatch::snapshot::RemoteCommit;

/// A commit fixture with plausible fields derived from the id.
pub fn commit(id: &str) -> RemoteCommit {
    let short_id: String = id.chars().take(8).collect();
    RemoteCommit {
        id: id.to_string(),
        short_id,
        title: format!("Commit {id}"),
        author: "Test Author".to_string(),
        created_at: "2024-01-01T00:00:00.000Z".to_string(),
    }
}

/// Builder for `RunnerSection` to simplify executor test setup.
pub struct RunnerSectionBuilder {
    runner: RunnerSection,
}

impl RunnerSectionBuilder {
    /// Defaults suitable for tests: `ci.sh` entry point, the given workdir,
    /// one run at a time, no timeout.
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        Self {
            runner: RunnerSection {
                entry_point: "ci.sh".to_string(),
                workdir: workdir.as_ref().to_path_buf(),
                max_parallel_runs: 1,
                timeout_seconds: None,
            },
        }
    }

    pub fn entry_point(mut self, name: &str) -> Self {
        self.runner.entry_point = name.to_string();
        self
    }

    pub fn max_parallel_runs(mut self, n: usize) -> Self {
        self.runner.max_parallel_runs = n;
        self
    }

    pub fn timeout_seconds(mut self, secs: u64) -> Self {
        self.runner.timeout_seconds = Some(secs);
        self
    }

    pub fn build(self) -> RunnerSection {
        self.runner
    }
}

/// Builder for a valid `ConfigFile`, for loader/validation tests.
pub struct ConfigFileBuilder {
    config: ConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = ConfigFile {
            repo: RepoSection {
                url: "https://gitlab.example.com/group/project.git".to_string(),
                branch: "main".to_string(),
                username: "ci-bot".to_string(),
                token: Some("glpat-test".to_string()),
                api_base: "https://gitlab.example.com/api/v4".to_string(),
            },
            poll: PollSection::default(),
            store: StoreSection::default(),
            runner: RunnerSection::default(),
            webhook: WebhookSection::default(),
        };
        config.store.mode = StoreMode::Memory;
        Self { config }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.config.repo.url = url.to_string();
        self
    }

    pub fn with_token(mut self, token: Option<&str>) -> Self {
        self.config.repo.token = token.map(str::to_string);
        self
    }

    pub fn with_webhook(mut self, url: &str) -> Self {
        self.config.webhook.url = Some(url.to_string());
        self
    }

    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.config.poll.interval_seconds = secs;
        self
    }

    pub fn build(self) -> ConfigFile {
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

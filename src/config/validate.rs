// src/config/validate.rs

use std::path::Component;

use crate::config::model::{ConfigFile, StoreMode};
use crate::errors::{CiwatchError, Result};

/// Semantic validation of a deserialized [`ConfigFile`].
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_repo(cfg)?;
    validate_poll(cfg)?;
    validate_store(cfg)?;
    validate_runner(cfg)?;
    validate_webhook(cfg)?;
    Ok(())
}

fn validate_repo(cfg: &ConfigFile) -> Result<()> {
    if cfg.repo.url.trim().is_empty() {
        return Err(CiwatchError::ConfigError(
            "[repo].url must not be empty".to_string(),
        ));
    }
    if !(cfg.repo.url.starts_with("http://") || cfg.repo.url.starts_with("https://")) {
        return Err(CiwatchError::ConfigError(format!(
            "[repo].url must be an http(s) URL (got {:?})",
            cfg.repo.url
        )));
    }
    if cfg.repo.username.trim().is_empty() {
        return Err(CiwatchError::ConfigError(
            "[repo].username must not be empty".to_string(),
        ));
    }
    if cfg.repo.branch.trim().is_empty() {
        return Err(CiwatchError::ConfigError(
            "[repo].branch must not be empty".to_string(),
        ));
    }
    match cfg.repo.token.as_deref() {
        Some(token) if !token.trim().is_empty() => {}
        _ => {
            return Err(CiwatchError::ConfigError(format!(
                "repository token missing: set {} or [repo].token",
                crate::config::loader::TOKEN_ENV_VAR
            )));
        }
    }
    Ok(())
}

fn validate_poll(cfg: &ConfigFile) -> Result<()> {
    if cfg.poll.interval_seconds == 0 {
        return Err(CiwatchError::ConfigError(
            "[poll].interval_seconds must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_store(cfg: &ConfigFile) -> Result<()> {
    if cfg.store.mode == StoreMode::Sqlite && cfg.store.path.as_os_str().is_empty() {
        return Err(CiwatchError::ConfigError(
            "[store].path must not be empty when mode = \"sqlite\"".to_string(),
        ));
    }
    Ok(())
}

fn validate_runner(cfg: &ConfigFile) -> Result<()> {
    let entry = cfg.runner.entry_point.trim();
    if entry.is_empty() {
        return Err(CiwatchError::ConfigError(
            "[runner].entry_point must not be empty".to_string(),
        ));
    }

    // The entry point is a path relative to the snapshot root; it may live
    // in a subdirectory but must never escape the snapshot.
    let entry_path = std::path::Path::new(entry);
    if entry_path.is_absolute()
        || entry_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(CiwatchError::ConfigError(format!(
            "[runner].entry_point must be a relative path inside the snapshot (got {entry:?})"
        )));
    }

    if cfg.runner.max_parallel_runs == 0 {
        return Err(CiwatchError::ConfigError(
            "[runner].max_parallel_runs must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.runner.workdir.as_os_str().is_empty() {
        return Err(CiwatchError::ConfigError(
            "[runner].workdir must not be empty".to_string(),
        ));
    }

    if let Some(0) = cfg.runner.timeout_seconds {
        return Err(CiwatchError::ConfigError(
            "[runner].timeout_seconds must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_webhook(cfg: &ConfigFile) -> Result<()> {
    if let Some(url) = cfg.webhook.url.as_deref() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CiwatchError::ConfigError(format!(
                "[webhook].url must be an http(s) URL (got {url:?})"
            )));
        }
    }
    Ok(())
}

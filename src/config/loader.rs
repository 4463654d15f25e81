// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Environment variable consulted for the repository access token.
///
/// Takes precedence over `[repo].token` in the file so the secret can stay
/// out of version-controlled configs.
pub const TOKEN_ENV_VAR: &str = "CIWATCH_TOKEN";

/// Load a configuration file from a given path and return the raw
/// `ConfigFile`.
///
/// This only performs TOML deserialization and the token env override; it
/// does **not** perform semantic validation. Use [`load_and_validate`] for
/// that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let mut config: ConfigFile = toml::from_str(&contents)?;

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load a configuration file from path and run semantic validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML (defaults applied by `serde` + `Default` impls).
/// - Fills `[repo].token` from `CIWATCH_TOKEN` when set.
/// - Checks repo/poll/runner/store settings for obvious mistakes.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut ConfigFile) {
    if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
        if !token.is_empty() {
            config.repo.token = Some(token);
        }
    }
}

/// Helper to resolve a default config path.
///
/// Currently this just returns `Ciwatch.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Ciwatch.toml")
}

// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] is the serde view of `Ciwatch.toml`.
//! - [`loader`] reads the file and applies environment overrides
//!   (`CIWATCH_TOKEN` for the repository token, so the secret never has to
//!   live in the config file).
//! - [`validate`] performs semantic checks after deserialization.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, PollSection, RepoSection, RunnerSection, StoreMode, StoreSection, WebhookSection,
};
pub use validate::validate_config;

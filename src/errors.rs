// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CiwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CiwatchError>;

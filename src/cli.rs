// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `ciwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ciwatch",
    version,
    about = "Watch a remote repository and run its CI script on new commits.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Ciwatch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Ciwatch.toml")]
    pub config: String,

    /// Trigger a single run immediately, follow its output, then exit.
    ///
    /// The exit code reflects the run outcome (0 = succeeded). The poller is
    /// not started in this mode.
    #[arg(long)]
    pub run_now: bool,

    /// Print recorded runs (newest first) and exit.
    #[arg(long)]
    pub history: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CIWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate the config, print the effective settings, but don't
    /// poll or execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

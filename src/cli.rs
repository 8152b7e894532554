// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Invalid arguments (including `--jobs 0`, rejected by the value range)
//! exit with the usage error code 2 via clap's own error handling.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `makeherd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "makeherd",
    version,
    about = "Build every target in a project in parallel, sharing one make jobserver.",
    long_about = None
)]
pub struct CliArgs {
    /// Project root containing the `targets/` tree.
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub root: PathBuf,

    /// Number of jobserver tokens shared across all builds (>= 1).
    ///
    /// Ignored when a jobserver is inherited from MAKEFLAGS; the inherited
    /// pool's capacity governs in that case.
    #[arg(
        short = 'j',
        long = "jobs",
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub jobs: Option<u32>,

    /// Keep building remaining targets after a failure.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Directory for per-target build logs.
    ///
    /// Default: `build-logs` under the project root.
    #[arg(long, value_name = "PATH")]
    pub log_dir: Option<PathBuf>,

    /// Force the line-oriented reporter even when stdout is a terminal.
    #[arg(long)]
    pub plain: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MAKEHERD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Extra arguments passed through to every make invocation.
    #[arg(last = true, value_name = "MAKE_ARGS")]
    pub make_args: Vec<String>,
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

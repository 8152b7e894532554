// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs one external build-tool invocation per target using
//! `tokio::process::Command`: acquire a jobserver token, spawn, capture the
//! combined output, persist the log artifact, release the token. Failures
//! are returned as data in [`BuildResult`], never raised to the scheduler.

pub mod build;

pub use build::{BuildContext, BuildResult, run_build};

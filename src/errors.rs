// src/errors.rs

//! Crate-wide error types.
//!
//! Target failures are never errors; they are recorded as run state. The
//! variants here cover the conditions that abort a run before (or instead
//! of) scheduling anything.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MakeherdError {
    #[error("no targets found under {}", .0.display())]
    NoTargets(PathBuf),

    #[error("jobserver setup failed: {0}")]
    Jobserver(String),
}

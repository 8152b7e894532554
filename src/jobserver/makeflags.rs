// src/jobserver/makeflags.rs

//! Detection of an inherited jobserver from `MAKEFLAGS`.
//!
//! When a parent `make -jN` runs us, it advertises its token pool through
//! the `MAKEFLAGS` environment variable. [`parse_makeflags`] is the pure
//! grammar half; [`channel_from_env`] does the attaching.

use std::env;
use std::os::fd::RawFd;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::jobserver::channel::TokenChannel;

/// How an inherited pool is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobserverAuth {
    /// `--jobserver-auth=fifo:<path>`: a named FIFO to open ourselves.
    Fifo(PathBuf),
    /// `--jobserver-auth=<read>,<write>`: descriptors already open in us.
    Fds(RawFd, RawFd),
}

/// What `MAKEFLAGS` told us, before any descriptor is touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MakeflagsInfo {
    pub auth: Option<JobserverAuth>,
    pub jobs: Option<usize>,
}

/// Parse the jobserver-relevant tokens out of a `MAKEFLAGS` string.
///
/// Tokens are whitespace-delimited and parsed independently. Recognized:
/// `-j<digits>`, `--jobs=<digits>`, `--jobserver-auth=<value>` and the older
/// `--jobserver-fds=<value>`. Anything else, including malformed values, is
/// ignored; the last well-formed occurrence of each wins.
pub fn parse_makeflags(flags: &str) -> MakeflagsInfo {
    let mut info = MakeflagsInfo::default();

    for token in flags.split_whitespace() {
        if token == "-j" || token == "--jobs" {
            // A detached count ("-j 4") never appears in MAKEFLAGS; make
            // normalizes it. Bare forms mean "unbounded", which we ignore.
            continue;
        }
        if let Some(digits) = token.strip_prefix("--jobs=") {
            if let Ok(jobs) = digits.parse::<usize>() {
                info.jobs = Some(jobs);
            }
        } else if let Some(value) = token
            .strip_prefix("--jobserver-auth=")
            .or_else(|| token.strip_prefix("--jobserver-fds="))
        {
            if let Some(auth) = parse_auth(value) {
                info.auth = Some(auth);
            } else {
                warn!(token, "ignoring malformed jobserver auth in MAKEFLAGS");
            }
        } else if let Some(digits) = token.strip_prefix("-j") {
            if let Ok(jobs) = digits.parse::<usize>() {
                info.jobs = Some(jobs);
            }
        }
    }

    info
}

fn parse_auth(value: &str) -> Option<JobserverAuth> {
    if let Some(path) = value.strip_prefix("fifo:") {
        if path.is_empty() {
            return None;
        }
        return Some(JobserverAuth::Fifo(PathBuf::from(path)));
    }

    let (read, write) = value.split_once(',')?;
    let read: RawFd = read.parse().ok()?;
    let write: RawFd = write.parse().ok()?;
    // make emits negative descriptors to mark a pool we cannot use.
    if read < 0 || write < 0 {
        return None;
    }
    Some(JobserverAuth::Fds(read, write))
}

/// Inspect `MAKEFLAGS` and attach to the advertised pool, if any.
///
/// Returns the attached channel (or `None` when the environment carries no
/// jobserver, in which case the caller creates its own pool) together with
/// the `-j` count the parent declared. Failure to open an advertised pool is
/// fatal: the run must not silently fall back to unshared parallelism.
pub fn channel_from_env() -> Result<(Option<TokenChannel>, Option<usize>)> {
    let makeflags = env::var("MAKEFLAGS").unwrap_or_default();
    let info = parse_makeflags(&makeflags);

    let channel = match info.auth {
        None => None,
        Some(JobserverAuth::Fifo(path)) => Some(
            TokenChannel::open_fifo(&path)
                .context("attaching to jobserver advertised in MAKEFLAGS")?,
        ),
        Some(JobserverAuth::Fds(read, write)) => Some(
            TokenChannel::from_raw_fds(read, write)
                .context("attaching to jobserver advertised in MAKEFLAGS")?,
        ),
    };

    if channel.is_some() {
        debug!(jobs = ?info.jobs, "inherited jobserver from MAKEFLAGS");
    }

    Ok((channel, info.jobs))
}

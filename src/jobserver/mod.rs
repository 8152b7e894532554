// src/jobserver/mod.rs

//! The shared token pool bounding global build concurrency.
//!
//! This module implements the GNU make jobserver protocol: a pipe (or named
//! FIFO) carrying one byte per token, where holding a byte authorizes
//! running one job. The pool is shared both with our own workers and with
//! every spawned build tool, so nested `make -j` invocations draw from the
//! same budget.
//!
//! - [`channel`] owns the transfer medium and the acquire/release protocol.
//! - [`makeflags`] detects a pool inherited from a parent via `MAKEFLAGS`.

pub mod channel;
pub mod makeflags;

pub use channel::{Endpoints, Token, TokenChannel};
pub use makeflags::{JobserverAuth, MakeflagsInfo, channel_from_env, parse_makeflags};

// src/engine/mod.rs

//! Build orchestration.
//!
//! This module ties together:
//! - the per-target state table and its transition rules (`state.rs`)
//! - the fixed-pool seed/refill scheduler loop that reacts to:
//!   - build completion events
//!   - shutdown signals (`scheduler.rs`)
//!
//! The scheduler is the sole writer of run state; reporters only ever see
//! it as `RunSnapshot`s over a watch channel.

pub mod scheduler;
pub mod state;

pub use scheduler::{RunEvent, Scheduler};
pub use state::{RunReport, RunSnapshot, StopPolicy, TargetState, TargetStatus};

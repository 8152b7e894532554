// src/engine/state.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::discover::Target;

/// Lifecycle of one target within a run.
///
/// Legal transitions: `Queued → Running`, `Running → Succeeded | Failed`,
/// `Queued → Skipped`. A state is never reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TargetState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TargetState::Succeeded | TargetState::Failed | TargetState::Skipped
        )
    }
}

/// Per-target status row owned by the scheduler.
#[derive(Debug, Clone)]
pub struct TargetStatus {
    pub state: TargetState,
    /// When the target was dispatched; drives the live elapsed display.
    pub started_at: Option<Instant>,
    /// Build-proper wall time (measured from spawn, after token wait),
    /// recorded once terminal.
    pub elapsed: Option<Duration>,
    pub log_path: Option<PathBuf>,
}

impl Default for TargetStatus {
    fn default() -> Self {
        Self {
            state: TargetState::Queued,
            started_at: None,
            elapsed: None,
            log_path: None,
        }
    }
}

/// What to do after the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPolicy {
    /// Stop dispatching after the first failure; in-flight builds finish.
    FailFast,
    /// Keep dispatching regardless of failures.
    ContinueOnError,
}

/// Read-only view of a run, published to reporters on every transition.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub targets: Arc<Vec<Target>>,
    pub statuses: Vec<TargetStatus>,
    pub stopping: bool,
    pub started_at: Instant,
}

/// Final outcome of a run.
#[derive(Debug)]
pub struct RunReport {
    pub targets: Arc<Vec<Target>>,
    pub statuses: Vec<TargetStatus>,
    /// A user interrupt cut the run short; distinct from target failure.
    pub interrupted: bool,
}

impl RunReport {
    fn count(&self, state: TargetState) -> usize {
        self.statuses.iter().filter(|s| s.state == state).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(TargetState::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(TargetState::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(TargetState::Skipped)
    }

    /// The run succeeds iff nothing failed and it was not interrupted.
    pub fn is_success(&self) -> bool {
        !self.interrupted && self.failed() == 0
    }
}

// src/report/mod.rs

//! Progress reporting.
//!
//! Two renderers share one read-only [`RunSnapshot`] view of the scheduler:
//! an interactive table redrawn in place for terminals, and a line-oriented
//! renderer for everything else. The choice is a one-time capability check;
//! neither feeds anything back into scheduling.

pub mod interactive;
pub mod plain;

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::engine::state::{RunSnapshot, TargetState, TargetStatus};

pub use interactive::InteractiveRenderer;
pub use plain::PlainRenderer;

/// A view over scheduler snapshots. Implementations must tolerate being
/// called with the same snapshot more than once.
pub trait Render {
    fn render(&mut self, snapshot: &RunSnapshot) -> Result<()>;

    /// Called once with the final snapshot after the run ends.
    fn finish(&mut self, snapshot: &RunSnapshot) -> Result<()> {
        self.render(snapshot)
    }
}

/// Pick a renderer for this run: the interactive table when stdout is a
/// terminal, the plain renderer otherwise or when forced.
pub fn select_renderer(force_plain: bool) -> Box<dyn Render + Send> {
    if !force_plain && std::io::stdout().is_terminal() {
        Box::new(InteractiveRenderer::new())
    } else {
        Box::new(PlainRenderer::new())
    }
}

/// Drive a renderer from the scheduler's snapshot stream.
///
/// Re-renders on every published transition and on a 250ms tick (so running
/// elapsed times keep moving); exits when the scheduler drops its sender,
/// after one final render.
pub fn spawn_reporter(
    mut snapshot_rx: watch::Receiver<RunSnapshot>,
    mut renderer: Box<dyn Render + Send>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(250));

        loop {
            tokio::select! {
                changed = snapshot_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {}
            }

            let snapshot = snapshot_rx.borrow_and_update().clone();
            if let Err(err) = renderer.render(&snapshot) {
                warn!(error = %err, "progress render failed");
            }
        }

        let snapshot = snapshot_rx.borrow().clone();
        if let Err(err) = renderer.finish(&snapshot) {
            warn!(error = %err, "final progress render failed");
        }
    })
}

/// Shared status cell formatting.
pub(crate) fn format_status(status: &TargetStatus) -> String {
    match status.state {
        TargetState::Queued => "QUEUED".to_string(),
        TargetState::Running => {
            let elapsed = status
                .started_at
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(0.0);
            format!("RUNNING {elapsed:.1}s")
        }
        TargetState::Succeeded => {
            format!("SUCCESS {:.1}s", elapsed_secs(status))
        }
        TargetState::Failed => {
            format!("FAILED {:.1}s", elapsed_secs(status))
        }
        TargetState::Skipped => "SKIPPED".to_string(),
    }
}

fn elapsed_secs(status: &TargetStatus) -> f64 {
    status.elapsed.unwrap_or_default().as_secs_f64()
}

// src/report/plain.rs

use std::io::{Stdout, Write};

use anyhow::Result;

use crate::engine::state::{RunSnapshot, TargetState};
use crate::report::Render;

/// Line-oriented renderer for non-terminal output: one line per target
/// reaching a terminal state. Dispatch is deliberately not logged.
pub struct PlainRenderer<W: Write = Stdout> {
    out: W,
    reported: Vec<bool>,
}

impl PlainRenderer<Stdout> {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl Default for PlainRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> PlainRenderer<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            reported: Vec::new(),
        }
    }
}

impl<W: Write + Send> Render for PlainRenderer<W> {
    fn render(&mut self, snapshot: &RunSnapshot) -> Result<()> {
        if self.reported.len() < snapshot.statuses.len() {
            self.reported.resize(snapshot.statuses.len(), false);
        }

        for (i, (target, status)) in snapshot
            .targets
            .iter()
            .zip(snapshot.statuses.iter())
            .enumerate()
        {
            if self.reported[i] || !status.state.is_terminal() {
                continue;
            }
            self.reported[i] = true;

            let elapsed = status.elapsed.unwrap_or_default().as_secs_f64();
            match status.state {
                TargetState::Succeeded => {
                    writeln!(self.out, "{}: SUCCESS ({elapsed:.1}s)", target.id())?;
                }
                TargetState::Failed => {
                    writeln!(self.out, "{}: FAILURE ({elapsed:.1}s)", target.id())?;
                }
                TargetState::Skipped => {
                    writeln!(self.out, "{}: SKIPPED", target.id())?;
                }
                TargetState::Queued | TargetState::Running => unreachable!(),
            }
        }

        self.out.flush()?;
        Ok(())
    }
}

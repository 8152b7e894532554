// src/report/interactive.rs

use std::io::Write;

use anyhow::Result;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, queue};

use crate::engine::state::{RunSnapshot, TargetState};
use crate::report::{Render, format_status};

/// Live tabular view for terminals: redraws the whole status table in place
/// on every render, with a stopping banner once dispatch is suppressed.
pub struct InteractiveRenderer {
    /// How many lines the previous render produced, so it can be rewound.
    lines_drawn: u16,
}

impl InteractiveRenderer {
    pub fn new() -> Self {
        Self { lines_drawn: 0 }
    }
}

impl Default for InteractiveRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Render for InteractiveRenderer {
    fn render(&mut self, snapshot: &RunSnapshot) -> Result<()> {
        let mut out = std::io::stdout().lock();

        if self.lines_drawn > 0 {
            queue!(
                out,
                cursor::MoveUp(self.lines_drawn),
                cursor::MoveToColumn(0),
                Clear(ClearType::FromCursorDown)
            )?;
        }

        let total = snapshot.targets.len();
        let mut title = format!(
            "Building {total} targets | Elapsed: {:.1}s",
            snapshot.started_at.elapsed().as_secs_f64()
        );
        if snapshot.stopping {
            title.push_str(" | STOPPING AFTER FAILURE");
        }
        writeln!(out, "{}", title.as_str().bold())?;

        let id_width = snapshot
            .targets
            .iter()
            .map(|t| t.id().len())
            .max()
            .unwrap_or(0);

        for (i, (target, status)) in snapshot
            .targets
            .iter()
            .zip(snapshot.statuses.iter())
            .enumerate()
        {
            let cell = format_status(status);
            let cell = match status.state {
                TargetState::Succeeded => cell.green().to_string(),
                TargetState::Failed => cell.red().to_string(),
                _ => cell,
            };
            writeln!(
                out,
                "{:>5}  {:<id_width$}  {}",
                format!("{}/{}", i + 1, total),
                target.id(),
                cell
            )?;
        }

        out.flush()?;
        self.lines_drawn = rewind_lines(total + 1);
        Ok(())
    }

    fn finish(&mut self, snapshot: &RunSnapshot) -> Result<()> {
        // Leave the final table on screen and park the cursor below it.
        self.render(snapshot)
    }
}

/// Cursor rewind distance for a table of `count` lines. `MoveUp` takes a
/// `u16`; saturate instead of truncating for absurdly large target sets.
fn rewind_lines(count: usize) -> u16 {
    u16::try_from(count).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::rewind_lines;

    #[test]
    fn rewind_saturates_instead_of_truncating() {
        assert_eq!(rewind_lines(0), 0);
        assert_eq!(rewind_lines(42), 42);
        // One past u16::MAX would truncate to 0 with a plain cast.
        assert_eq!(rewind_lines(usize::from(u16::MAX) + 1), u16::MAX);
        assert_eq!(rewind_lines(usize::MAX), u16::MAX);
    }
}

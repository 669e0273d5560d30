pub mod widgets;

use std::io;

use anyhow::{Context, Result};
use crossterm::tty::IsTty;
use ratatui::backend::CrosstermBackend;
use ratatui::{Terminal, TerminalOptions, Viewport};

use crate::theme::Palette;
use widgets::RampWidget;

/// Draw the ramps inline below the cursor, leaving the scrollback intact.
/// Does nothing when stdout is not a terminal.
pub fn preview(palette: &Palette) -> Result<()> {
    let stdout = io::stdout();
    if !stdout.is_tty() {
        tracing::debug!("stdout is not a terminal, skipping preview");
        return Ok(());
    }

    let mut terminal = Terminal::with_options(
        CrosstermBackend::new(stdout),
        TerminalOptions {
            viewport: Viewport::Inline(RampWidget::height()),
        },
    )
    .context("Failed to set up terminal preview")?;

    terminal
        .draw(|frame| frame.render_widget(RampWidget::new(palette), frame.area()))
        .context("Failed to draw preview")?;
    println!();
    Ok(())
}

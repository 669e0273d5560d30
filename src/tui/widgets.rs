use ratatui::prelude::*;
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::color::HexColor;
use crate::pipeline::{Mode, STEPS};
use crate::theme::{ColorScale, Palette};

/// Width of one swatch cell, including its trailing gap.
pub const SWATCH_WIDTH: u16 = 5;

/// Left margin before the first swatch: "  accent dark ".
const LABEL_WIDTH: usize = 14;

/// Renders each scale as one row of 12 colored swatches per mode, labelled
/// with the step number, plus a line of seed colors.
pub struct RampWidget<'a> {
    palette: &'a Palette,
}

impl<'a> RampWidget<'a> {
    pub fn new(palette: &'a Palette) -> Self {
        Self { palette }
    }

    /// Rows needed to draw the widget, border included.
    pub fn height() -> u16 {
        // seeds, blank, 2 scales x 2 modes, step numbers, 2 border rows
        2 + 4 + 1 + 2
    }
}

fn to_color(c: HexColor) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

/// Choose black or white foreground for readable text on the given background.
fn contrast_fg(c: HexColor) -> Color {
    if c.relative_luminance() > 0.4 {
        Color::Black
    } else {
        Color::White
    }
}

fn build_ramp_row(scale: &ColorScale, mode: Mode) -> Line<'static> {
    let label = format!("  {} {}", scale.name(), mode);
    let mut spans = vec![Span::raw(format!("{label:<LABEL_WIDTH$}"))];
    for (i, &c) in scale.steps(mode).iter().enumerate() {
        let style = Style::default().bg(to_color(c)).fg(contrast_fg(c));
        spans.push(Span::styled(format!("{:^4}", i + 1), style));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

fn build_seed_row(palette: &Palette) -> Line<'static> {
    let seeds = [
        ("accent", palette.accent),
        ("gray", palette.gray),
        ("light bg", palette.light_background),
        ("dark bg", palette.dark_background),
    ];
    let mut spans = vec![Span::raw("  ")];
    for (name, c) in seeds {
        spans.push(Span::styled(
            format!(" {c} "),
            Style::default().bg(to_color(c)).fg(contrast_fg(c)),
        ));
        spans.push(Span::styled(
            format!(" {name}  "),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn build_step_row() -> Line<'static> {
    let mut spans = vec![Span::raw(" ".repeat(LABEL_WIDTH))];
    for step in 1..=STEPS {
        spans.push(Span::styled(
            format!("{step:^4} "),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

impl Widget for RampWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.palette.extraction.degraded {
            "Ramps (degraded)"
        } else {
            "Ramps"
        };
        let block = Block::bordered().title(title);
        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines = vec![build_seed_row(self.palette), Line::from("")];
        for scale in self.palette.scales() {
            for mode in Mode::ALL {
                lines.push(build_ramp_row(scale, mode));
            }
        }
        lines.push(build_step_row());

        Paragraph::new(lines).render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::orchestrator::{Extraction, ModeResult};
    use crate::pipeline::{harmony, Scheme};

    fn palette() -> Palette {
        let seeds = harmony::generate(crate::color::DEFAULT_SEED, Scheme::Analogous, false);
        let extraction = Extraction {
            light: ModeResult::fallback(Mode::Light),
            dark: ModeResult::fallback(Mode::Dark),
        };
        Palette::assemble(&seeds, Scheme::Analogous, &extraction)
    }

    #[test]
    fn contrast_fg_picks_readable_text() {
        assert_eq!(contrast_fg(HexColor::new(255, 255, 255)), Color::Black);
        assert_eq!(contrast_fg(HexColor::new(0, 0, 0)), Color::White);
    }

    #[test]
    fn renders_swatch_backgrounds() {
        let palette = palette();
        let width = LABEL_WIDTH as u16 + SWATCH_WIDTH * STEPS as u16 + 2;
        let area = Rect::new(0, 0, width, RampWidget::height());
        let mut buf = Buffer::empty(area);
        RampWidget::new(&palette).render(area, &mut buf);

        // first ramp row: border + seed row + blank row
        let y = 3;
        for (i, &c) in palette.accent_scale.light.iter().enumerate() {
            let x = 1 + LABEL_WIDTH as u16 + SWATCH_WIDTH * i as u16;
            assert_eq!(buf[(x, y)].bg, to_color(c), "step {}", i + 1);
        }
        let last_row = y + 3;
        let first = palette.gray_scale.dark[0];
        assert_eq!(buf[(1 + LABEL_WIDTH as u16, last_row)].bg, to_color(first));
    }

    #[test]
    fn title_marks_degraded_output() {
        let palette = palette();
        let area = Rect::new(0, 0, 90, RampWidget::height());
        let mut buf = Buffer::empty(area);
        RampWidget::new(&palette).render(area, &mut buf);

        let top: String = (0..area.width).map(|x| buf[(x, 0)].symbol()).collect();
        assert!(top.contains("Ramps (degraded)"));
    }
}

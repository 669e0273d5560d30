use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::color::HexColor;
use crate::pipeline::harmony::SeedPalette;
use crate::pipeline::orchestrator::{Extraction, ModeResult};
use crate::pipeline::{Family, Mode, Ramp, Scheme, SWATCH_COUNT};

/// One color family across both modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorScale {
    #[serde(skip)]
    pub family: Family,
    pub light: Ramp,
    pub dark: Ramp,
    /// `hsl(...)` mirror of every light step.
    pub light_hsl: Vec<String>,
    pub dark_hsl: Vec<String>,
}

fn hsl_strings(ramp: &Ramp) -> Vec<String> {
    ramp.iter().map(|c| c.to_hsl().to_string()).collect()
}

impl ColorScale {
    pub fn new(family: Family, light: Ramp, dark: Ramp) -> Self {
        Self {
            family,
            light_hsl: hsl_strings(&light),
            dark_hsl: hsl_strings(&dark),
            light,
            dark,
        }
    }

    pub fn name(&self) -> &'static str {
        self.family.name()
    }

    pub fn steps(&self, mode: Mode) -> &Ramp {
        match mode {
            Mode::Light => &self.light,
            Mode::Dark => &self.dark,
        }
    }
}

/// Where one mode's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeReport {
    pub live_steps: usize,
    pub fallback_steps: usize,
    pub session_failed: bool,
}

impl From<&ModeResult> for ModeReport {
    fn from(result: &ModeResult) -> Self {
        Self {
            live_steps: result.live_steps,
            fallback_steps: SWATCH_COUNT - result.live_steps,
            session_failed: result.session_failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    pub light: ModeReport,
    pub dark: ModeReport,
    /// Some step in either mode is a synthesized value.
    pub degraded: bool,
}

/// The full color system for one seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    pub accent: HexColor,
    pub gray: HexColor,
    pub light_background: HexColor,
    pub dark_background: HexColor,
    pub scheme: Scheme,
    pub accent_scale: ColorScale,
    pub gray_scale: ColorScale,
    pub extraction: ExtractionReport,
}

impl Palette {
    /// Combine the seed colors with both modes' ramps.
    pub fn assemble(seeds: &SeedPalette, scheme: Scheme, extraction: &Extraction) -> Self {
        let scale = |family: Family| {
            ColorScale::new(
                family,
                *extraction.light.ramp(family),
                *extraction.dark.ramp(family),
            )
        };

        Self {
            accent: seeds.accent,
            gray: seeds.gray,
            light_background: seeds.light_background,
            dark_background: seeds.dark_background,
            scheme,
            accent_scale: scale(Family::Accent),
            gray_scale: scale(Family::Gray),
            extraction: ExtractionReport {
                light: ModeReport::from(&extraction.light),
                dark: ModeReport::from(&extraction.dark),
                degraded: extraction.degraded(),
            },
        }
    }

    pub fn scales(&self) -> [&ColorScale; 2] {
        [&self.accent_scale, &self.gray_scale]
    }

    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize palette")
    }

    /// Write the JSON form to an arbitrary path.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, format!("{json}\n"))
            .with_context(|| format!("Failed to write palette to {}", path.display()))
    }
}

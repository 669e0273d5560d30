pub mod fallback;
pub mod harmony;
pub mod orchestrator;
pub mod retry;
pub mod swatch;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Steps in one ramp.
pub const STEPS: usize = 12;

/// Swatches rendered by the oracle: accent steps followed by gray steps.
pub const SWATCH_COUNT: usize = STEPS * 2;

/// One 12-step ramp, lightest/darkest extreme first.
pub type Ramp = [crate::color::HexColor; STEPS];

/// Color-scheme mode the oracle renders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Light,
    Dark,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Light, Mode::Dark];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Light => "light",
            Mode::Dark => "dark",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Harmony scheme applied to the seed hue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Analogous,
    Complementary,
    Triadic,
    Monochromatic,
}

impl Scheme {
    pub const ALL: [Scheme; 4] = [
        Scheme::Analogous,
        Scheme::Complementary,
        Scheme::Triadic,
        Scheme::Monochromatic,
    ];
}

/// Color family a swatch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Accent,
    Gray,
}

impl Family {
    pub fn name(self) -> &'static str {
        match self {
            Family::Accent => "accent",
            Family::Gray => "gray",
        }
    }

    /// Map a raw swatch index (0..24) to its family and step.
    /// Accent occupies 0..12 and gray 12..24; anything past 23 has no family.
    pub fn locate(index: usize) -> Option<(Family, usize)> {
        match index {
            0..STEPS => Some((Family::Accent, index)),
            STEPS..SWATCH_COUNT => Some((Family::Gray, index - STEPS)),
            _ => None,
        }
    }
}

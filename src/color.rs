use std::fmt;
use std::str::FromStr;

use palette::{FromColor, Srgb};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PaletteError;

/// Seed used whenever the caller's seed is absent or malformed.
pub const DEFAULT_SEED: HexColor = HexColor {
    r: 0x3B,
    g: 0x82,
    b: 0xF6,
};

/// An sRGB color that always renders as uppercase `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RGB`, `#RRGGBB`, `RGB` or `RRGGBB` (any case, surrounding
    /// whitespace ignored). Shorthand is expanded digit by digit.
    pub fn parse(input: &str) -> Result<Self, PaletteError> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PaletteError::InvalidSeed(input.to_string()));
        }

        let expanded = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => digits.to_string(),
            _ => return Err(PaletteError::InvalidSeed(input.to_string())),
        };

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&expanded[range], 16)
                .map_err(|_| PaletteError::InvalidSeed(input.to_string()))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Parse a seed, falling back to [`DEFAULT_SEED`] when it is missing or invalid.
    pub fn parse_or_default(input: Option<&str>) -> Self {
        match input.map(Self::parse) {
            Some(Ok(color)) => color,
            Some(Err(err)) => {
                tracing::warn!(error = %err, default = %DEFAULT_SEED, "using default seed");
                DEFAULT_SEED
            }
            None => DEFAULT_SEED,
        }
    }

    /// The six hex digits without the leading `#`, as the oracle inputs expect.
    pub fn digits(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Convert to integer-rounded HSL.
    pub fn to_hsl(self) -> Hsl {
        let srgb: Srgb<f32> = Srgb::new(self.r, self.g, self.b).into_format();
        let hsl = palette::Hsl::from_color(srgb);
        let hue = hsl.hue.into_positive_degrees().round() as i32;
        Hsl::new(
            hue,
            (hsl.saturation * 100.0).round() as i32,
            (hsl.lightness * 100.0).round() as i32,
        )
    }

    /// Convert from HSL, rounding each channel to the nearest integer.
    pub fn from_hsl(hsl: Hsl) -> Self {
        let source = palette::Hsl::new(
            f32::from(hsl.h),
            f32::from(hsl.s) / 100.0,
            f32::from(hsl.l) / 100.0,
        );
        let srgb: Srgb<f32> = Srgb::from_color(source);
        Self::from_srgb_f32_clamped(srgb)
    }

    /// Clamp an Srgb<f32> to [0, 1] and convert to a hex color.
    fn from_srgb_f32_clamped(srgb: Srgb<f32>) -> Self {
        let r = (srgb.red.clamp(0.0, 1.0) * 255.0).round() as u8;
        let g = (srgb.green.clamp(0.0, 1.0) * 255.0).round() as u8;
        let b = (srgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self { r, g, b }
    }

    /// WCAG 2.0 relative luminance.
    pub fn relative_luminance(self) -> f32 {
        fn linearize(c: u8) -> f32 {
            let c = c as f32 / 255.0;
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * linearize(self.r) + 0.7152 * linearize(self.g) + 0.0722 * linearize(self.b)
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = PaletteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Integer HSL: hue in degrees `[0, 360)`, saturation and lightness in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hsl {
    pub h: u16,
    pub s: u8,
    pub l: u8,
}

impl Hsl {
    /// Hue wraps modulo 360; saturation and lightness clamp to `[0, 100]`.
    pub fn new(h: i32, s: i32, l: i32) -> Self {
        Self {
            h: h.rem_euclid(360) as u16,
            s: s.clamp(0, 100) as u8,
            l: l.clamp(0, 100) as u8,
        }
    }

    pub fn to_hex(self) -> HexColor {
        HexColor::from_hsl(self)
    }
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hsl({}, {}%, {}%)", self.h, self.s, self.l)
    }
}

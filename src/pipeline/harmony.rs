use serde::Serialize;

use crate::color::{HexColor, Hsl};
use crate::pipeline::{Mode, Scheme};

/// Accent lightness shared by every scheme.
const ACCENT_LIGHTNESS: i32 = 55;
const GRAY_LIGHTNESS: i32 = 50;
const LIGHT_BG_LIGHTNESS: i32 = 98;
const DARK_BG_LIGHTNESS: i32 = 8;

/// The four seed colors fed into the oracle for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedPalette {
    pub accent: HexColor,
    pub gray: HexColor,
    pub light_background: HexColor,
    pub dark_background: HexColor,
}

impl SeedPalette {
    /// Background seed for the given mode.
    pub fn background(&self, mode: Mode) -> HexColor {
        match mode {
            Mode::Light => self.light_background,
            Mode::Dark => self.dark_background,
        }
    }
}

/// Scheme-transformed HSL values before hex conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarmonyHsl {
    pub accent: Hsl,
    pub gray: Hsl,
    pub light_background: Hsl,
    pub dark_background: Hsl,
}

/// Per-scheme constants: hue offsets from the seed, saturation and floors.
struct SchemeRule {
    accent_saturation_floor: i32,
    gray_offset: i32,
    gray_saturation: i32,
    light_bg_offset: i32,
    light_bg_saturation: i32,
    dark_bg_offset: i32,
    dark_bg_saturation: i32,
}

fn rule(scheme: Scheme) -> SchemeRule {
    match scheme {
        Scheme::Analogous => SchemeRule {
            accent_saturation_floor: 70,
            gray_offset: 30,
            gray_saturation: 8,
            light_bg_offset: 15,
            light_bg_saturation: 20,
            dark_bg_offset: 15,
            dark_bg_saturation: 15,
        },
        Scheme::Complementary => SchemeRule {
            accent_saturation_floor: 80,
            gray_offset: 180,
            gray_saturation: 6,
            light_bg_offset: 0,
            light_bg_saturation: 25,
            dark_bg_offset: 180,
            dark_bg_saturation: 20,
        },
        Scheme::Triadic => SchemeRule {
            accent_saturation_floor: 75,
            gray_offset: 120,
            gray_saturation: 7,
            light_bg_offset: 240,
            light_bg_saturation: 15,
            dark_bg_offset: 240,
            dark_bg_saturation: 12,
        },
        Scheme::Monochromatic => SchemeRule {
            accent_saturation_floor: 85,
            gray_offset: 0,
            gray_saturation: 5,
            light_bg_offset: 0,
            light_bg_saturation: 20,
            dark_bg_offset: 0,
            dark_bg_saturation: 15,
        },
    }
}

/// Apply a scheme to the seed's HSL. Hue arithmetic wraps modulo 360.
pub fn transform(seed: Hsl, scheme: Scheme) -> HarmonyHsl {
    let rule = rule(scheme);
    let hue = i32::from(seed.h);

    HarmonyHsl {
        accent: Hsl::new(
            hue,
            i32::from(seed.s).max(rule.accent_saturation_floor),
            ACCENT_LIGHTNESS,
        ),
        gray: Hsl::new(hue + rule.gray_offset, rule.gray_saturation, GRAY_LIGHTNESS),
        light_background: Hsl::new(
            hue + rule.light_bg_offset,
            rule.light_bg_saturation,
            LIGHT_BG_LIGHTNESS,
        ),
        dark_background: Hsl::new(
            hue + rule.dark_bg_offset,
            rule.dark_bg_saturation,
            DARK_BG_LIGHTNESS,
        ),
    }
}

/// Derive the four seed colors.
///
/// With `harmonized` unset the seed is passed through verbatim as the accent;
/// otherwise the scheme-transformed accent replaces it.
pub fn generate(seed: HexColor, scheme: Scheme, harmonized: bool) -> SeedPalette {
    let hsl = transform(seed.to_hsl(), scheme);
    SeedPalette {
        accent: if harmonized {
            hsl.accent.to_hex()
        } else {
            seed
        },
        gray: hsl.gray.to_hex(),
        light_background: hsl.light_background.to_hex(),
        dark_background: hsl.dark_background.to_hex(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::DEFAULT_SEED;

    #[test]
    fn analogous_default_seed() {
        let hsl = transform(DEFAULT_SEED.to_hsl(), Scheme::Analogous);
        assert_eq!(hsl.accent, Hsl::new(217, 91, 55));
        assert_eq!(hsl.gray, Hsl::new(247, 8, 50));
        assert_eq!(hsl.light_background, Hsl::new(232, 20, 98));
        assert_eq!(hsl.dark_background, Hsl::new(232, 15, 8));
    }

    #[test]
    fn unharmonized_accent_is_the_seed() {
        let seeds = generate(DEFAULT_SEED, Scheme::Analogous, false);
        assert_eq!(seeds.accent.to_string(), "#3B82F6");
        assert_eq!(seeds.gray, Hsl::new(247, 8, 50).to_hex());
    }

    #[test]
    fn harmonized_accent_is_transformed() {
        let seeds = generate(DEFAULT_SEED, Scheme::Analogous, true);
        assert_eq!(seeds.accent, Hsl::new(217, 91, 55).to_hex());
        assert_ne!(seeds.accent, DEFAULT_SEED);
    }

    #[test]
    fn saturation_floor_lifts_dull_seeds() {
        let dull = Hsl::new(10, 20, 40);
        assert_eq!(transform(dull, Scheme::Analogous).accent.s, 70);
        assert_eq!(transform(dull, Scheme::Complementary).accent.s, 80);
        assert_eq!(transform(dull, Scheme::Triadic).accent.s, 75);
        assert_eq!(transform(dull, Scheme::Monochromatic).accent.s, 85);
    }

    #[test]
    fn complementary_offsets() {
        let hsl = transform(Hsl::new(200, 60, 50), Scheme::Complementary);
        assert_eq!(hsl.gray, Hsl::new(20, 6, 50));
        assert_eq!(hsl.light_background, Hsl::new(200, 25, 98));
        assert_eq!(hsl.dark_background, Hsl::new(20, 20, 8));
    }

    #[test]
    fn triadic_offsets() {
        let hsl = transform(Hsl::new(300, 90, 50), Scheme::Triadic);
        assert_eq!(hsl.gray.h, 60);
        assert_eq!(hsl.light_background, Hsl::new(180, 15, 98));
        assert_eq!(hsl.dark_background, Hsl::new(180, 12, 8));
    }

    #[test]
    fn monochromatic_keeps_hue() {
        let hsl = transform(Hsl::new(42, 90, 50), Scheme::Monochromatic);
        assert_eq!(hsl.gray, Hsl::new(42, 5, 50));
        assert_eq!(hsl.light_background, Hsl::new(42, 20, 98));
        assert_eq!(hsl.dark_background, Hsl::new(42, 15, 8));
    }

    #[test]
    fn hue_wraps_near_360() {
        let hsl = transform(Hsl::new(350, 50, 50), Scheme::Analogous);
        assert_eq!(hsl.gray.h, 20);
        assert_eq!(hsl.light_background.h, 5);
    }

    #[test]
    fn background_by_mode() {
        let seeds = generate(DEFAULT_SEED, Scheme::Triadic, false);
        assert_eq!(seeds.background(Mode::Light), seeds.light_background);
        assert_eq!(seeds.background(Mode::Dark), seeds.dark_background);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn offsets(scheme: Scheme) -> (i32, i32, i32) {
            match scheme {
                Scheme::Analogous => (30, 15, 15),
                Scheme::Complementary => (180, 0, 180),
                Scheme::Triadic => (120, 240, 240),
                Scheme::Monochromatic => (0, 0, 0),
            }
        }

        proptest! {
            #[test]
            fn hue_offsets_are_exact(h in 0i32..360, s in 0i32..=100, l in 0i32..=100, idx in 0usize..4) {
                let scheme = Scheme::ALL[idx];
                let (gray, light, dark) = offsets(scheme);
                let out = transform(Hsl::new(h, s, l), scheme);
                prop_assert_eq!(i32::from(out.gray.h), (h + gray) % 360);
                prop_assert_eq!(i32::from(out.light_background.h), (h + light) % 360);
                prop_assert_eq!(i32::from(out.dark_background.h), (h + dark) % 360);
                prop_assert_eq!(i32::from(out.accent.h), h);
            }
        }
    }
}

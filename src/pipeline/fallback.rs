use crate::color::{HexColor, Hsl};
use crate::pipeline::{Family, Ramp, STEPS};

const ACCENT_HUE: i32 = 217;
const GRAY_HUE: i32 = 220;
const GRAY_SATURATION: i32 = 5;
const PEAK_STEP: i32 = 9;
const PEAK_SATURATION: i32 = 91;
const MIN_LIGHTNESS: i32 = 5;
const MAX_LIGHTNESS: i32 = 95;

/// HSL of the fallback value for a 0-based `step` of `family`.
pub fn step_hsl(family: Family, step: usize) -> Hsl {
    // formulas are written against 1-based step numbers
    let n = step as i32 + 1;
    match family {
        Family::Accent => {
            let lightness = if n <= 6 {
                95 - 8 * (n - 1)
            } else {
                80 - 12 * (n - 7)
            };
            let saturation = (PEAK_SATURATION - 8 * (n - PEAK_STEP).abs()).max(10);
            Hsl::new(
                ACCENT_HUE,
                saturation,
                lightness.clamp(MIN_LIGHTNESS, MAX_LIGHTNESS),
            )
        }
        Family::Gray => {
            let lightness = 95 - 7 * (n - 1);
            Hsl::new(
                GRAY_HUE,
                GRAY_SATURATION,
                lightness.clamp(MIN_LIGHTNESS, MAX_LIGHTNESS),
            )
        }
    }
}

/// Fallback value for a single missing step.
pub fn step(family: Family, step: usize) -> HexColor {
    step_hsl(family, step).to_hex()
}

/// Complete fallback ramp for a family.
pub fn ramp(family: Family) -> Ramp {
    std::array::from_fn(|i| step(family, i))
}

/// Fill any missing step with its fallback counterpart.
pub fn complete(family: Family, steps: &[Option<HexColor>; STEPS]) -> Ramp {
    std::array::from_fn(|i| steps[i].unwrap_or_else(|| step(family, i)))
}

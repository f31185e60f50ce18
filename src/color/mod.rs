//! Deterministic color assignment for group keys and gradient colors for value ranges.

pub mod hsl;
pub mod scale;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::format::hash_code;

pub use hsl::Color;
pub use scale::{find_color_scale, make_color_scales, ColorScale};

/// An ordered list of hex color stops.
pub type Theme = &'static [&'static str];

/// Dark series colors, one per hue family.
pub const GROUP_THEME: Theme = &[
    "#00783e", "#14b5d0", "#1070ca", "#735dd0", "#ec4c47", "#d9822b", "#f7d154",
];

/// Pastel counterparts of [`GROUP_THEME`], used for backgrounds.
pub const GROUP_LIGHT_THEME: Theme = &[
    "#e4f6ec", "#e8f8fa", "#dbeaf7", "#eceaf9", "#fdeaea", "#faeada", "#fef8e7",
];

pub const PURPLE: Theme = &["#14b5d0", "#1070ca", "#735dd0"];
pub const BLUE_TO_PURPLE: Theme = &["#D4EEE2", "#1070CA", "#37248F"];

/// Smallest color ring built by [`calculate_colors`].
pub const MIN_RING_SIZE: usize = 60;

/// Gradient positions ordered so each new entry lands as far as possible from
/// the ones before it: 0, 1, then successive binary subdivisions.
const POSITIONS: [f64; 256] = [
    0.0, 1.0, 0.5, 0.25, 0.75, 0.125, 0.625, 0.375,
    0.875, 0.0625, 0.8125, 0.1875, 0.6875, 0.3125, 0.5625, 0.4375,
    0.9375, 0.03125, 0.90625, 0.09375, 0.84375, 0.15625, 0.78125, 0.21875,
    0.71875, 0.28125, 0.65625, 0.34375, 0.59375, 0.40625, 0.53125, 0.46875,
    0.96875, 0.015625, 0.953125, 0.046875, 0.921875, 0.078125, 0.890625, 0.109375,
    0.859375, 0.140625, 0.828125, 0.171875, 0.796875, 0.203125, 0.765625, 0.234375,
    0.734375, 0.265625, 0.703125, 0.296875, 0.671875, 0.328125, 0.640625, 0.359375,
    0.609375, 0.390625, 0.578125, 0.421875, 0.546875, 0.453125, 0.515625, 0.484375,
    0.984375, 0.0078125, 0.9765625, 0.0234375, 0.9609375, 0.0390625, 0.9453125, 0.0546875,
    0.9296875, 0.0703125, 0.9140625, 0.0859375, 0.8984375, 0.1015625, 0.8828125, 0.1171875,
    0.8671875, 0.1328125, 0.8515625, 0.1484375, 0.8359375, 0.1640625, 0.8203125, 0.1796875,
    0.8046875, 0.1953125, 0.7890625, 0.2109375, 0.7734375, 0.2265625, 0.7578125, 0.2421875,
    0.7421875, 0.2578125, 0.7265625, 0.2734375, 0.7109375, 0.2890625, 0.6953125, 0.3046875,
    0.6796875, 0.3203125, 0.6640625, 0.3359375, 0.6484375, 0.3515625, 0.6328125, 0.3671875,
    0.6171875, 0.3828125, 0.6015625, 0.3984375, 0.5859375, 0.4140625, 0.5703125, 0.4296875,
    0.5546875, 0.4453125, 0.5390625, 0.4609375, 0.5234375, 0.4765625, 0.5078125, 0.4921875,
    0.9921875, 0.00390625, 0.98828125, 0.01171875, 0.98046875, 0.01953125, 0.97265625, 0.02734375,
    0.96484375, 0.03515625, 0.95703125, 0.04296875, 0.94921875, 0.05078125, 0.94140625, 0.05859375,
    0.93359375, 0.06640625, 0.92578125, 0.07421875, 0.91796875, 0.08203125, 0.91015625, 0.08984375,
    0.90234375, 0.09765625, 0.89453125, 0.10546875, 0.88671875, 0.11328125, 0.87890625, 0.12109375,
    0.87109375, 0.12890625, 0.86328125, 0.13671875, 0.85546875, 0.14453125, 0.84765625, 0.15234375,
    0.83984375, 0.16015625, 0.83203125, 0.16796875, 0.82421875, 0.17578125, 0.81640625, 0.18359375,
    0.80859375, 0.19140625, 0.80078125, 0.19921875, 0.79296875, 0.20703125, 0.78515625, 0.21484375,
    0.77734375, 0.22265625, 0.76953125, 0.23046875, 0.76171875, 0.23828125, 0.75390625, 0.24609375,
    0.74609375, 0.25390625, 0.73828125, 0.26171875, 0.73046875, 0.26953125, 0.72265625, 0.27734375,
    0.71484375, 0.28515625, 0.70703125, 0.29296875, 0.69921875, 0.30078125, 0.69140625, 0.30859375,
    0.68359375, 0.31640625, 0.67578125, 0.32421875, 0.66796875, 0.33203125, 0.66015625, 0.33984375,
    0.65234375, 0.34765625, 0.64453125, 0.35546875, 0.63671875, 0.36328125, 0.62890625, 0.37109375,
    0.62109375, 0.37890625, 0.61328125, 0.38671875, 0.60546875, 0.39453125, 0.59765625, 0.40234375,
    0.58984375, 0.41015625, 0.58203125, 0.41796875, 0.57421875, 0.42578125, 0.56640625, 0.43359375,
    0.55859375, 0.44140625, 0.55078125, 0.44921875, 0.54296875, 0.45703125, 0.53515625, 0.46484375,
    0.52734375, 0.47265625, 0.51953125, 0.48046875, 0.51171875, 0.48828125, 0.50390625, 0.49609375,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupColors {
    pub dark: String,
    pub light: String,
}

/// Group key to colors, in assignment order with `""` first.
pub type ChartColors = IndexMap<String, GroupColors>;

/// Color at `index` of the contrast ring over `theme`. Repeats after 256 entries.
pub fn generate_color_contrast(theme: Theme, index: usize) -> Color {
    blend_colors(theme, POSITIONS[index % POSITIONS.len()])
}

/// Color at `index` of `size` evenly spaced steps along `theme`.
pub fn generate_color_linear(theme: Theme, index: usize, size: usize) -> Color {
    let segments = size.saturating_sub(1).max(1);
    blend_colors(theme, index as f64 / segments as f64)
}

/// Blends between adjacent theme stops at `position` in `[0, 1]`, taking the
/// shortest way round the hue wheel.
pub fn blend_colors(theme: Theme, position: f64) -> Color {
    if theme.len() < 2 {
        return theme.first().map(|hex| theme_stop(hex)).unwrap_or_else(fallback_color);
    }

    let max_index = theme.len() - 1;
    let segment = 1.0 / max_index as f64;

    let start_index = ((max_index as f64 * position).floor().max(0.0) as usize) % theme.len();
    let end_index = (start_index + 1) % theme.len();
    let within = (position - start_index as f64 * segment) / segment;

    let start = theme_stop(theme[start_index]);
    let end = theme_stop(theme[end_index]);

    let mut hue_diff = end.hue() - start.hue();
    if hue_diff > 180.0 {
        hue_diff -= 360.0;
    }
    if hue_diff < -180.0 {
        hue_diff += 360.0;
    }

    let saturation = start.saturation() + within * (end.saturation() - start.saturation());
    let lightness = start.lightness() + within * (end.lightness() - start.lightness());

    start
        .shift_hue(within * hue_diff)
        .set_lightness(lightness)
        .set_saturation(saturation)
}

fn theme_stop(hex: &str) -> Color {
    Color::from_hex(hex).unwrap_or_else(|err| {
        warn!("Ignoring theme color {}: {}", hex, err);
        fallback_color()
    })
}

fn fallback_color() -> Color {
    Color::from_hsl(0.0, 0.0, 0.5)
}

/// Assigns dark and light colors to each distinct group key.
///
/// Keys land on a ring of `max(60, 3 * keys)` contrast colors by their hash, so
/// a key keeps its color no matter which other groups are present. The empty
/// key is always assigned first, at `seed` when given so that repeated runs of
/// one query agree on it.
pub fn calculate_colors(group_keys: &[String], seed: Option<u64>) -> ChartColors {
    let ring_size = MIN_RING_SIZE.max(group_keys.len() * 3);

    let dark: Vec<String> = (0..ring_size)
        .map(|i| generate_color_contrast(GROUP_THEME, i).to_css())
        .collect();
    let light: Vec<String> = (0..ring_size)
        .map(|i| generate_color_contrast(GROUP_LIGHT_THEME, i).to_css())
        .collect();

    let slot = |code: u64| {
        let idx = (code % ring_size as u64) as usize;
        GroupColors {
            dark: dark[idx].clone(),
            light: light[idx].clone(),
        }
    };

    let mut colors = ChartColors::with_capacity(group_keys.len() + 1);
    let empty_code = seed.unwrap_or_else(|| hash_code("") as u64);
    colors.insert(String::new(), slot(empty_code));

    for key in group_keys {
        if !colors.contains_key(key) {
            colors.insert(key.clone(), slot(hash_code(key) as u64));
        }
    }

    colors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_start_with_subdivisions() {
        assert_eq!(&POSITIONS[..5], &[0.0, 1.0, 0.5, 0.25, 0.75]);
        assert!(POSITIONS.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_contrast_endpoints_hit_theme_stops() {
        assert_eq!(generate_color_contrast(GROUP_THEME, 0).to_css(), "#00783e");
        assert_eq!(generate_color_contrast(PURPLE, 2).to_css(), "#1070ca");
        assert_eq!(
            generate_color_contrast(PURPLE, 3),
            generate_color_contrast(PURPLE, 3 + 256)
        );
    }

    #[test]
    fn test_linear_walks_theme_in_order() {
        assert_eq!(generate_color_linear(PURPLE, 0, 3).to_css(), "#14b5d0");
        assert_eq!(generate_color_linear(PURPLE, 1, 3).to_css(), "#1070ca");
        // A single step never divides by zero.
        assert_eq!(generate_color_linear(PURPLE, 0, 1).to_css(), "#14b5d0");
    }

    #[test]
    fn test_blend_takes_short_hue_arc() {
        // Red (0) to magenta (300) crosses 0 rather than sweeping through green.
        const WRAP: Theme = &["#ff0000", "#ff00ff"];
        let mid = blend_colors(WRAP, 0.5);
        assert!((mid.hue() - 330.0).abs() < 1e-6);
    }

    #[test]
    fn test_calculate_colors_reserves_empty_slot_first() {
        let keys = vec!["x".to_string(), "y".to_string(), "x".to_string()];
        let colors = calculate_colors(&keys, Some(42));

        let order: Vec<&str> = colors.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["", "x", "y"]);
        assert_eq!(colors[""], calculate_colors(&keys, Some(42))[""]);
        assert_eq!(colors[""].dark, generate_color_contrast(GROUP_THEME, 42).to_css());
    }

    #[test]
    fn test_seedless_empty_slot_uses_empty_hash() {
        let colors = calculate_colors(&[], None);
        assert_eq!(colors[""].dark, generate_color_contrast(GROUP_THEME, 0).to_css());
        assert_ne!(colors[""], calculate_colors(&[], Some(42))[""]);
    }

    #[test]
    fn test_key_color_is_independent_of_other_keys() {
        let alone = calculate_colors(&["api".to_string()], None);
        let crowded = calculate_colors(&["web".to_string(), "api".to_string()], None);
        assert_eq!(alone["api"], crowded["api"]);
    }
}

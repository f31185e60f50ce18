use std::fmt;

use crate::error::{SeriesVizError, SeriesVizResult};

/// A color in HSL space. Hue is in degrees `[0, 360)`, saturation and lightness in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    hue: f64,
    saturation: f64,
    lightness: f64,
}

impl Color {
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        Self {
            hue: normalize_hue(hue),
            saturation: saturation.clamp(0.0, 1.0),
            lightness: lightness.clamp(0.0, 1.0),
        }
    }

    /// Channels in `[0, 1]`.
    pub fn from_rgb(red: f64, green: f64, blue: f64) -> Self {
        let max = red.max(green).max(blue);
        let min = red.min(green).min(blue);
        let lightness = (max + min) / 2.0;

        if max == min {
            return Self::from_hsl(0.0, 0.0, lightness);
        }

        let delta = max - min;
        let saturation = if lightness > 0.5 {
            delta / (2.0 - max - min)
        } else {
            delta / (max + min)
        };

        let hue = if max == red {
            (green - blue) / delta + if green < blue { 6.0 } else { 0.0 }
        } else if max == green {
            (blue - red) / delta + 2.0
        } else {
            (red - green) / delta + 4.0
        };

        Self::from_hsl(hue * 60.0, saturation, lightness)
    }

    /// Parses `#rgb` or `#rrggbb` (the `#` is optional).
    pub fn from_hex(hex: &str) -> SeriesVizResult<Self> {
        let digits = hex.trim().trim_start_matches('#');
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => {
                return Err(SeriesVizError::InvalidInput {
                    message: format!("not a hex color: {}", hex),
                })
            }
        };

        let channel = |range: std::ops::Range<usize>| -> SeriesVizResult<f64> {
            u8::from_str_radix(&expanded[range], 16)
                .map(|v| v as f64 / 255.0)
                .map_err(|_| SeriesVizError::InvalidInput {
                    message: format!("not a hex color: {}", hex),
                })
        };

        Ok(Self::from_rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn hue(&self) -> f64 {
        self.hue
    }

    pub fn saturation(&self) -> f64 {
        self.saturation
    }

    pub fn lightness(&self) -> f64 {
        self.lightness
    }

    pub fn shift_hue(self, degrees: f64) -> Self {
        Self {
            hue: normalize_hue(self.hue + degrees),
            ..self
        }
    }

    pub fn set_saturation(self, saturation: f64) -> Self {
        Self {
            saturation: saturation.clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn set_lightness(self, lightness: f64) -> Self {
        Self {
            lightness: lightness.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Raises lightness by `ratio` of its current value.
    pub fn lighten_by_ratio(self, ratio: f64) -> Self {
        self.set_lightness(self.lightness * (1.0 + ratio))
    }

    pub fn to_rgb(&self) -> (f64, f64, f64) {
        if self.saturation == 0.0 {
            return (self.lightness, self.lightness, self.lightness);
        }

        let q = if self.lightness < 0.5 {
            self.lightness * (1.0 + self.saturation)
        } else {
            self.lightness + self.saturation - self.lightness * self.saturation
        };
        let p = 2.0 * self.lightness - q;
        let h = self.hue / 360.0;

        (
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        )
    }

    /// Lower-case `#rrggbb`.
    pub fn to_css(&self) -> String {
        let (r, g, b) = self.to_rgb();
        let byte = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;
        format!("#{:02x}{:02x}{:02x}", byte(r), byte(g), byte(b))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

fn normalize_hue(hue: f64) -> f64 {
    if !hue.is_finite() {
        return 0.0;
    }
    let hue = hue.rem_euclid(360.0);
    if hue >= 360.0 {
        0.0
    } else {
        hue
    }
}

fn hue_to_channel(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        for hex in ["#00783e", "#14b5d0", "#1070ca", "#735dd0", "#ec4c47", "#ffffff", "#000000"] {
            assert_eq!(Color::from_hex(hex).unwrap().to_css(), hex);
        }
    }

    #[test]
    fn test_short_hex_and_case() {
        assert_eq!(Color::from_hex("#FFF").unwrap().to_css(), "#ffffff");
        assert_eq!(Color::from_hex("D4EEE2").unwrap().to_css(), "#d4eee2");
    }

    #[test]
    fn test_invalid_hex() {
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#zzzzzz").is_err());
    }

    #[test]
    fn test_primary_hues() {
        assert!((Color::from_hex("#ff0000").unwrap().hue() - 0.0).abs() < 1e-9);
        assert!((Color::from_hex("#00ff00").unwrap().hue() - 120.0).abs() < 1e-9);
        assert!((Color::from_hex("#0000ff").unwrap().hue() - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_shift_hue_wraps() {
        let red = Color::from_hex("#ff0000").unwrap();
        assert!((red.shift_hue(-30.0).hue() - 330.0).abs() < 1e-9);
        assert!((red.shift_hue(390.0).hue() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_lighten_by_ratio_clamps() {
        let grey = Color::from_hsl(0.0, 0.0, 0.5);
        assert!((grey.lighten_by_ratio(0.3).lightness() - 0.65).abs() < 1e-9);
        assert_eq!(grey.lighten_by_ratio(5.0).to_css(), "#ffffff");
    }
}

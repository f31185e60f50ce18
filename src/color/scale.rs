use serde::{Deserialize, Serialize};

use crate::color::{generate_color_linear, Theme};
use crate::format::format_decimal;

/// Upper bound on gradient buckets in one scale.
pub const MAX_COLOR_SCALE_BUCKETS: usize = 7;

/// Color used for the single bucket of a narrow range, as a step of a 7-step gradient.
const NARROW_RANGE_STEP: usize = 1;

/// One colored value range of a heat-map legend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScale {
    pub from: f64,
    pub to: f64,
    pub color: String,
    pub name: String,
}

impl ColorScale {
    /// Membership is half-open, `[from, to)`, except for the last bucket which is closed.
    pub fn contains(&self, value: f64, is_last: bool) -> bool {
        value == self.from || (value > self.from && value < self.to) || (is_last && value == self.to)
    }
}

/// Builds the legend for values between `min` and `max`.
///
/// The first entry is always the blank zero bucket. Wide ranges are split into
/// up to seven equal buckets along `theme`; ranges spanning two units or less
/// collapse into a single bucket.
pub fn make_color_scales(min: Option<f64>, max: Option<f64>, theme: Theme) -> Vec<ColorScale> {
    let mut scales = vec![ColorScale {
        from: 0.0,
        to: 0.0,
        color: "#FFFFFF".to_string(),
        name: " ".to_string(),
    }];

    let (min, max) = match (min, max) {
        (Some(min), Some(max)) if max >= min => (min, max),
        _ => return scales,
    };

    let span = (max - min).trunc();
    let count = if span > MAX_COLOR_SCALE_BUCKETS as f64 {
        MAX_COLOR_SCALE_BUCKETS
    } else {
        span as usize
    };

    if count > 2 {
        let step = (max - min) / count as f64;
        scales.extend((0..count).map(|i| {
            let to = if i == count - 1 {
                max
            } else {
                min + (i + 1) as f64 * step
            };
            ColorScale {
                from: min + i as f64 * step,
                to,
                color: generate_color_linear(theme, i, count).to_css(),
                name: format_decimal(to, 0),
            }
        }));
    } else {
        scales.push(ColorScale {
            from: min,
            to: max,
            color: generate_color_linear(theme, NARROW_RANGE_STEP, MAX_COLOR_SCALE_BUCKETS).to_css(),
            name: format_decimal(max, 0),
        });
    }

    scales
}

/// First bucket of `scales` holding `value`.
pub fn find_color_scale(scales: &[ColorScale], value: f64) -> Option<&ColorScale> {
    let last = scales.len().checked_sub(1)?;
    scales
        .iter()
        .enumerate()
        .find(|(i, scale)| scale.contains(value, *i == last))
        .map(|(_, scale)| scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BLUE_TO_PURPLE;
    use proptest::prelude::*;

    #[test]
    fn test_blank_bucket_always_first() {
        let scales = make_color_scales(None, None, BLUE_TO_PURPLE);
        assert_eq!(scales.len(), 1);
        assert_eq!(scales[0].color, "#FFFFFF");
        assert_eq!(scales[0].name, " ");

        assert_eq!(make_color_scales(Some(5.0), Some(1.0), BLUE_TO_PURPLE).len(), 1);
    }

    #[test]
    fn test_wide_range_uses_seven_buckets() {
        let scales = make_color_scales(Some(1.0), Some(1000.0), BLUE_TO_PURPLE);
        assert_eq!(scales.len(), 1 + MAX_COLOR_SCALE_BUCKETS);
        assert_eq!(scales[1].from, 1.0);
        assert_eq!(scales.last().unwrap().to, 1000.0);
        assert_eq!(scales.last().unwrap().name, "1,000");
        assert_eq!(scales[1].color, "#d4eee2");
    }

    #[test]
    fn test_small_span_uses_span_buckets() {
        let scales = make_color_scales(Some(2.0), Some(6.5), BLUE_TO_PURPLE);
        assert_eq!(scales.len(), 1 + 4);
    }

    #[test]
    fn test_narrow_range_collapses() {
        let scales = make_color_scales(Some(3.0), Some(3.0), BLUE_TO_PURPLE);
        assert_eq!(scales.len(), 2);
        assert_eq!(scales[1].from, 3.0);
        assert_eq!(scales[1].to, 3.0);
        assert_eq!(scales[1].name, "3");
        assert_eq!(
            scales[1].color,
            generate_color_linear(BLUE_TO_PURPLE, 1, MAX_COLOR_SCALE_BUCKETS).to_css()
        );
    }

    #[test]
    fn test_membership_rule() {
        let scales = make_color_scales(Some(0.0), Some(70.0), BLUE_TO_PURPLE);
        assert_eq!(find_color_scale(&scales, 0.0).unwrap().name, " ");
        assert_eq!(find_color_scale(&scales, 10.0).unwrap().name, "20");
        assert_eq!(find_color_scale(&scales, 70.0).unwrap().name, "70");
        assert!(find_color_scale(&scales, 70.5).is_none());
    }

    proptest! {
        #[test]
        fn test_every_value_in_range_matches_one_bucket(
            min in 1.0f64..1_000.0,
            width in 0.0f64..10_000.0,
            t in 0.0f64..=1.0,
        ) {
            let max = min + width;
            let value = (min + t * width).clamp(min, max);
            let scales = make_color_scales(Some(min), Some(max), BLUE_TO_PURPLE);
            let last = scales.len() - 1;

            let matching = scales[1..]
                .iter()
                .enumerate()
                .filter(|(i, scale)| scale.contains(value, i + 1 == last))
                .count();
            prop_assert_eq!(matching, 1);
        }
    }
}

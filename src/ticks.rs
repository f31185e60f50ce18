//! Axis split calculation: picks a "nice" tick increment for a value range
//! and lays ticks out along it.

use std::sync::OnceLock;

use crate::format::js_number;

/// Multipliers applied to each power of ten.
const MULTIPLIERS: [f64; 4] = [1.0, 2.0, 2.5, 5.0];

const MIN_EXPONENT: i32 = -16;
const MAX_EXPONENT: i32 = 16;

/// Significant digits a double can hold before ticks start to collide.
const MAX_DIGITS: usize = 17;

/// Default minimum spacing between two ticks, in pixels.
pub const DEFAULT_TICK_MIN_SPACE: f64 = 30.0;

/// A candidate tick increment and the decimals needed to print it exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Increment {
    pub value: f64,
    pub decimals: u32,
}

/// Ascending increments: 1e-16, 2e-16, 2.5e-16, 5e-16, ... 5e15.
pub fn increments() -> &'static [Increment] {
    static INCREMENTS: OnceLock<Vec<Increment>> = OnceLock::new();
    INCREMENTS.get_or_init(|| generate_increments(10.0, MIN_EXPONENT, MAX_EXPONENT, &MULTIPLIERS))
}

fn generate_increments(base: f64, min_exp: i32, max_exp: i32, multipliers: &[f64]) -> Vec<Increment> {
    let multiplier_decimals: Vec<u32> = multipliers.iter().map(|m| decimals_of(*m)).collect();
    let mut out = Vec::with_capacity(((max_exp - min_exp) as usize) * multipliers.len());

    for exp in min_exp..max_exp {
        let exp_abs = exp.unsigned_abs();
        let magnitude = round_dec(base.powi(exp), exp_abs);

        for (mult, mult_dec) in multipliers.iter().zip(&multiplier_decimals) {
            let raw = mult * magnitude;
            let mut decimals = if raw >= 0.0 && exp >= 0 { 0 } else { exp_abs };
            if exp < *mult_dec as i32 {
                decimals += mult_dec;
            }
            out.push(Increment {
                value: round_dec(raw, decimals),
                decimals,
            });
        }
    }

    out
}

fn decimals_of(value: f64) -> u32 {
    js_number(value)
        .split_once('.')
        .map(|(_, frac)| frac.len() as u32)
        .unwrap_or(0)
}

/// Rounds half up at `decimals` places.
fn round_dec(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor + 0.5).floor() / factor
}

/// The smallest increment whose ticks sit at least `min_space` pixels apart,
/// with the pixel spacing it yields.
pub fn find_incr(min: f64, max: f64, dim: f64, min_space: f64) -> Option<(Increment, f64)> {
    let px_per_unit = dim / (max - min);
    let min_digits = js_number(min.floor()).len();

    increments().iter().find_map(|incr| {
        let space = incr.value * px_per_unit;
        let incr_digits = if incr.value < 10.0 { incr.decimals as usize } else { 0 };

        if space >= min_space && min_digits + incr_digits < MAX_DIGITS {
            Some((*incr, space))
        } else {
            None
        }
    })
}

/// Increment and pixel spacing for an axis of `dim` pixels, or `None` when no
/// increment fits.
pub fn get_incr_space(min: f64, max: f64, dim: f64, min_space: f64) -> Option<(f64, f64)> {
    if dim <= 0.0 {
        return None;
    }
    find_incr(min, max, dim, min_space).map(|(incr, space)| (incr.value, space))
}

/// Tick values for the range `[min, max]` drawn over `dim` pixels.
///
/// Returns `None` when the axis cannot hold labels: a non-positive or too
/// small dimension, an empty or non-finite range, or no increment that fits.
pub fn get_splits(min: f64, max: f64, dim: f64, min_space: f64) -> Option<Vec<f64>> {
    if !(min.is_finite() && max.is_finite()) || max <= min || dim <= 0.0 || dim < min_space {
        return None;
    }

    let (incr, _space) = find_incr(min, max, dim, min_space)?;

    let mut splits = Vec::new();
    let mut value = round_dec((min / incr.value).ceil() * incr.value, incr.decimals);

    while value <= max {
        splits.push(if value == 0.0 { 0.0 } else { value });

        let next = round_dec(value + incr.value, incr.decimals);
        if next <= value {
            break;
        }
        value = next;
    }

    Some(splits)
}

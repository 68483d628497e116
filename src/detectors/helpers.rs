//! Numeric helpers shared by the pipeline stages.
//!
//! Precision is always passed explicitly. Nothing in here infers a rounding
//! scale from a price on its own; callers decide once and thread it through.

use crate::ZigZagPoint;

/// Upper bound on decimals considered significant for a price.
pub const MAX_DECIMALS: u32 = 10;

/// Values closer than this to zero are treated as zero when used as divisors.
pub const ZERO_EPSILON: f64 = 1e-12;

/// Round `value` to `decimals` places (half away from zero).
#[inline]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals.min(MAX_DECIMALS) as i32);
    (value * factor).round() / factor
}

/// Number of decimals in the shortest textual form of `value`, capped at [`MAX_DECIMALS`].
///
/// `100.0` -> 0, `1.25` -> 2, `0.000123` -> 6.
pub fn count_decimals(value: f64) -> u32 {
    if !value.is_finite() || value.fract() == 0.0 {
        return 0;
    }
    let text = format!("{}", value.abs());
    let decimals = match text.split_once('.') {
        Some((_, frac)) => frac.len() as u32,
        None => 0,
    };
    decimals.min(MAX_DECIMALS)
}

/// Precision covering both prices: the larger of their decimal counts.
#[inline]
pub fn shared_precision(a: f64, b: f64) -> u32 {
    count_decimals(a).max(count_decimals(b))
}

/// True if no two adjacent points share a direction.
pub fn alternates(points: &[ZigZagPoint]) -> bool {
    points.windows(2).all(|w| w[0].direction != w[1].direction)
}

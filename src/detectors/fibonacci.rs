//! Fibonacci retracement tables for a support/resistance span.

use serde::{Deserialize, Serialize};

use super::helpers::round_to;

/// Canonical retracement ratios, ascending.
pub const FIB_RATIOS: [f64; 9] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.66, 0.786, 1.0, 1.618];

/// One price per entry of [`FIB_RATIOS`], stored as `(ratio, price)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibonacciLevels {
    pub levels: [(f64, f64); 9],
}

impl FibonacciLevels {
    fn build(anchor: f64, step: f64, precision: u32) -> Self {
        Self {
            levels: FIB_RATIOS.map(|ratio| (ratio, round_to(anchor + step * ratio, precision))),
        }
    }

    /// Price at `ratio`, if it is one of [`FIB_RATIOS`].
    pub fn level(&self, ratio: f64) -> Option<f64> {
        self.levels
            .iter()
            .find(|(r, _)| (r - ratio).abs() < 1e-9)
            .map(|(_, price)| *price)
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.levels.iter().copied()
    }

    /// Level closest to `price`, as `(ratio, level_price)`.
    pub fn nearest(&self, price: f64) -> (f64, f64) {
        self.levels
            .iter()
            .copied()
            .min_by(|a, b| (a.1 - price).abs().total_cmp(&(b.1 - price).abs()))
            .unwrap_or((f64::NAN, f64::NAN))
    }
}

/// Both retracement directions over a span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibonacciTable {
    /// Anchored at support, measured upward
    pub low_to_high: FibonacciLevels,
    /// Anchored at resistance, measured downward
    pub high_to_low: FibonacciLevels,
}

impl FibonacciTable {
    /// Levels between `support` and `resistance`, each rounded to `precision` decimals.
    pub fn new(support: f64, resistance: f64, precision: u32) -> Self {
        let span = resistance - support;
        Self {
            low_to_high: FibonacciLevels::build(support, span, precision),
            high_to_low: FibonacciLevels::build(resistance, -span, precision),
        }
    }
}

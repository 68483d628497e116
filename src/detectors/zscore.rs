//! Smoothed Z-Score turning-point detector.
//!
//! Flags values that sit more than `threshold` standard deviations away from a
//! trailing baseline of `lag` values. Flagged values enter the baseline damped by
//! `influence`, so a run of extreme prints does not immediately become the new
//! normal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    params::{require_param, require_period, ParamMeta, ParameterizedDetector},
    Direction, PatternError, Period, Ratio, Result,
};

/// Parameters of the Z-Score detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZScoreConfig {
    /// Size of the trailing baseline window
    pub lag: Period,
    /// Number of standard deviations a value must clear to be flagged
    pub threshold: f64,
    /// Weight of a flagged value when it enters the baseline
    pub influence: Ratio,
}

impl Default for ZScoreConfig {
    fn default() -> Self {
        Self {
            lag: Period::new_const(5),
            threshold: 3.0,
            influence: Ratio::new_const(0.5),
        }
    }
}

impl ZScoreConfig {
    pub fn new(lag: usize, threshold: f64, influence: f64) -> Result<Self> {
        let config = Self {
            lag: Period::new(lag)?,
            threshold,
            influence: Ratio::new(influence)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lag.get() == 0 {
            return Err(PatternError::InvalidValue("lag must be > 0"));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(PatternError::OutOfRange {
                field: "threshold",
                value: self.threshold,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }
        let influence = self.influence.get();
        if !(0.0..=1.0).contains(&influence) {
            return Err(PatternError::OutOfRange {
                field: "influence",
                value: influence,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}

impl ParameterizedDetector for ZScoreConfig {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[
            ParamMeta::period("lag", 5.0, (2.0, 60.0, 1.0), "Trailing baseline window size"),
            ParamMeta::factor(
                "threshold",
                3.0,
                (0.5, 6.0, 0.25),
                "Standard deviations needed to flag a value",
            ),
            ParamMeta::ratio(
                "influence",
                0.5,
                (0.0, 1.0, 0.05),
                "Weight of a flagged value in the baseline",
            ),
        ];
        META
    }

    /// All three parameters are required; a missing key is an error.
    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let lag = require_period(params, "lag")?;
        let threshold = require_param(params, "threshold")?;
        let influence = require_param(params, "influence")?;
        Self::new(lag.get(), threshold, influence)
    }

    fn config_id() -> &'static str {
        "ZSCORE"
    }
}

/// Trailing window over the filtered series, backed by a fixed ring buffer.
struct Baseline {
    buf: Vec<f64>,
    head: usize,
    mean: f64,
    std_dev: f64,
    flat: bool,
}

impl Baseline {
    fn seed(values: &[f64]) -> Self {
        let mut baseline = Self {
            buf: values.to_vec(),
            head: 0,
            mean: 0.0,
            std_dev: 0.0,
            flat: true,
        };
        baseline.refresh();
        baseline
    }

    /// Most recently pushed value.
    fn newest(&self) -> f64 {
        let len = self.buf.len();
        self.buf[(self.head + len - 1) % len]
    }

    fn push(&mut self, value: f64) {
        self.buf[self.head] = value;
        self.head = (self.head + 1) % self.buf.len();
        self.refresh();
    }

    // Two-pass recompute; incremental sums drift on flat series.
    fn refresh(&mut self) {
        let n = self.buf.len() as f64;
        self.mean = self.buf.iter().sum::<f64>() / n;
        let var = self
            .buf
            .iter()
            .map(|v| (v - self.mean).powi(2))
            .sum::<f64>()
            / n;
        self.std_dev = var.sqrt();
        self.flat = self.buf.iter().all(|v| *v == self.buf[0]);
    }

    /// Every value in the window is identical. The mean of such a window can
    /// still be a few ULPs off, so `std_dev` is not compared against zero.
    fn is_flat(&self) -> bool {
        self.flat
    }
}

/// Run the detector over `values`.
///
/// Returns one entry per input value: `1` above the baseline, `-1` below, `0`
/// otherwise. The first `lag` entries are always `0`. A series no longer than
/// `lag` yields all zeros.
pub fn detect(values: &[f64], config: &ZScoreConfig) -> Result<Vec<i8>> {
    config.validate()?;

    let lag = config.lag.get();
    let mut signals = vec![0i8; values.len()];
    if values.len() <= lag {
        return Ok(signals);
    }

    let influence = config.influence.get();
    let mut baseline = Baseline::seed(&values[..lag]);

    for (i, &value) in values.iter().enumerate().skip(lag) {
        let deviation = value - baseline.mean;
        let fed = if !baseline.is_flat() && deviation.abs() > config.threshold * baseline.std_dev {
            signals[i] = if deviation > 0.0 { 1 } else { -1 };
            influence * value + (1.0 - influence) * baseline.newest()
        } else {
            value
        };
        baseline.push(fed);
    }

    debug!(
        len = values.len(),
        flagged = signals.iter().filter(|s| **s != 0).count(),
        "z-score detection complete"
    );
    Ok(signals)
}

/// A nonzero detector output at `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub position: usize,
    pub direction: Direction,
}

/// Keep only the flagged positions of a raw signal series.
pub fn to_signals(raw: &[i8]) -> Vec<Signal> {
    raw.iter()
        .enumerate()
        .filter_map(|(position, &s)| {
            Direction::from_sign(s).map(|direction| Signal {
                position,
                direction,
            })
        })
        .collect()
}

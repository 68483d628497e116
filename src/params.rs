//! Tunable parameters of the pipeline stages
//!
//! Every stage config describes its knobs with [`ParamMeta`] and can be rebuilt
//! from a loosely-typed `name -> value` map. That is enough to:
//! - list and document the parameters of a stage
//! - sweep a stage over a grid of settings
//! - load configs from flat key/value sources
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use zigscan::prelude::*;
//!
//! for param in ZScoreConfig::param_meta() {
//!     println!("{} ({:?}): {}", param.name, param.param_type, param.description);
//! }
//!
//! let params = HashMap::from([("lag", 20.0), ("threshold", 2.5), ("influence", 0.2)]);
//! let config = ZScoreConfig::with_params(&params).unwrap();
//! assert_eq!(config.lag.get(), 20);
//! ```

use std::collections::HashMap;

use crate::{PatternError, Period, Ratio, Result};

/// Sweep bounds and step: (min, max, step)
pub type Sweep = (f64, f64, f64);

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Kind of value a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in 0.0..=1.0
  Ratio,
  /// Window length, a positive integer
  Period,
  /// Positive real multiplier, e.g. a standard-deviation threshold
  Factor,
  /// Non-negative integer, e.g. a number of decimals
  Count,
}

impl ParamType {
  /// Reason `value` is not acceptable for this kind, if any.
  fn reject(self, value: f64) -> Option<&'static str> {
    match self {
      ParamType::Ratio if !(0.0..=1.0).contains(&value) => Some("Ratio must be within [0, 1]"),
      ParamType::Period if value < 1.0 || value.fract() != 0.0 => {
        Some("Period must be a positive integer")
      },
      ParamType::Factor if value <= 0.0 => Some("Factor must be > 0"),
      ParamType::Count if value < 0.0 || value.fract() != 0.0 => {
        Some("Count must be a non-negative integer")
      },
      _ => None,
    }
  }
}

/// One tunable parameter of a stage
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Key used in parameter maps
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  pub range: Sweep,
  pub description: &'static str,
}

impl ParamMeta {
  const fn new(
    name: &'static str,
    param_type: ParamType,
    default: f64,
    range: Sweep,
    description: &'static str,
  ) -> Self {
    Self { name, param_type, default, range, description }
  }

  pub const fn ratio(name: &'static str, default: f64, range: Sweep, desc: &'static str) -> Self {
    Self::new(name, ParamType::Ratio, default, range, desc)
  }

  pub const fn period(name: &'static str, default: f64, range: Sweep, desc: &'static str) -> Self {
    Self::new(name, ParamType::Period, default, range, desc)
  }

  pub const fn factor(name: &'static str, default: f64, range: Sweep, desc: &'static str) -> Self {
    Self::new(name, ParamType::Factor, default, range, desc)
  }

  pub const fn count(name: &'static str, default: f64, range: Sweep, desc: &'static str) -> Self {
    Self::new(name, ParamType::Count, default, range, desc)
  }

  /// Values from `min` to `max` inclusive, `step` apart.
  ///
  /// Each value is computed from its index, so long sweeps do not accumulate
  /// floating-point drift. A non-positive step yields just `min`.
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    if step <= 0.0 || max < min {
      return vec![min];
    }
    let steps = ((max - min) / step + 1e-9).floor() as usize;
    (0..=steps).map(|i| min + step * i as f64).collect()
  }

  /// Check `value` against the sweep bounds and the parameter kind.
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value.is_nan() || value < min || value > max {
      return Err(PatternError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type.reject(value) {
      Some(reason) => Err(PatternError::InvalidValue(reason)),
      None => Ok(()),
    }
  }
}

// ============================================================
// PARAMETERIZED CONFIG TRAIT
// ============================================================

/// A stage config that can be described by, and rebuilt from, named parameters
pub trait ParameterizedDetector: Sized {
  /// Every configurable parameter of the stage
  fn param_meta() -> &'static [ParamMeta];

  /// Build a config from a parameter map.
  ///
  /// Whether a missing key falls back to its default is up to the stage.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Short stable identifier of the stage
  fn config_id() -> &'static str;

  /// Every parameter at its default value.
  fn default_params() -> HashMap<&'static str, f64> {
    Self::param_meta().iter().map(|m| (m.name, m.default)).collect()
  }

  /// Cartesian product of every parameter's grid, as buildable configs.
  ///
  /// Combinations the stage rejects are left out.
  fn param_grid() -> Vec<Self> {
    let mut combos: Vec<HashMap<&str, f64>> = vec![HashMap::new()];
    for meta in Self::param_meta() {
      let values = meta.generate_grid();
      combos = combos
        .into_iter()
        .flat_map(|combo| {
          values.iter().map(move |&v| {
            let mut next = combo.clone();
            next.insert(meta.name, v);
            next
          })
        })
        .collect();
    }
    combos.iter().filter_map(|combo| Self::with_params(combo).ok()).collect()
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Value of a parameter that has no default
pub fn require_param(params: &HashMap<&str, f64>, key: &'static str) -> Result<f64> {
  params.get(key).copied().ok_or(PatternError::MissingParam(key))
}

/// Ratio under `key`, or `default` when absent
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  Ratio::new(params.get(key).copied().unwrap_or(default))
}

/// Period under `key`; the key must be present
pub fn require_period(params: &HashMap<&str, f64>, key: &'static str) -> Result<Period> {
  let value = require_param(params, key)?;
  match ParamType::Period.reject(value) {
    Some(reason) => Err(PatternError::InvalidValue(reason)),
    None => Period::new(value as usize),
  }
}

// ============================================================
// TESTS
// ============================================================

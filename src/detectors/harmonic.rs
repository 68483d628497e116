//! Harmonic (XABCD) pattern recognition over a zigzag sequence.
//!
//! Every run of five alternating zigzag points is measured as an XABCD
//! structure and scored against seven ratio templates. A ratio inside its
//! template range costs nothing; outside, it costs its relative distance to the
//! nearest bound, in percent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::helpers::{alternates, round_to, ZERO_EPSILON};
use crate::{
    params::{ParamMeta, ParameterizedDetector},
    Direction, PatternError, Result, ZigZagPoint,
};

/// Decimals kept on each derived ratio.
pub const RATIO_DECIMALS: u32 = 3;

/// Per-ratio error charged when a ratio is zero and the relative error is undefined.
pub const ZERO_RATIO_ERROR: f64 = 100.0;

// ============================================================
// TEMPLATES
// ============================================================

/// Named harmonic template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarmonicType {
    Bat,
    Gartley,
    Butterfly,
    Crab,
    DeepCrab,
    Cypher,
    Shark,
}

/// Inclusive `[min, max]` bounds for one ratio.
pub type RatioRange = (f64, f64);

/// Ratio bounds of a template, in XAB, ABC, BCD, XAD order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicTemplate {
    pub kind: HarmonicType,
    pub xab: RatioRange,
    pub abc: RatioRange,
    pub bcd: RatioRange,
    pub xad: RatioRange,
}

pub const TEMPLATES: [HarmonicTemplate; 7] = [
    HarmonicTemplate {
        kind: HarmonicType::Bat,
        xab: (0.382, 0.5),
        abc: (0.382, 0.886),
        bcd: (1.618, 2.618),
        xad: (0.886, 0.886),
    },
    HarmonicTemplate {
        kind: HarmonicType::Gartley,
        xab: (0.618, 0.618),
        abc: (0.382, 0.886),
        bcd: (1.272, 1.618),
        xad: (0.786, 0.786),
    },
    HarmonicTemplate {
        kind: HarmonicType::Butterfly,
        xab: (0.786, 0.786),
        abc: (0.382, 0.886),
        bcd: (1.618, 2.618),
        xad: (1.272, 1.618),
    },
    HarmonicTemplate {
        kind: HarmonicType::Crab,
        xab: (0.382, 0.618),
        abc: (0.382, 0.886),
        bcd: (2.24, 3.618),
        xad: (1.618, 1.618),
    },
    HarmonicTemplate {
        kind: HarmonicType::DeepCrab,
        xab: (0.886, 0.886),
        abc: (0.382, 0.886),
        bcd: (2.0, 3.618),
        xad: (1.618, 1.618),
    },
    HarmonicTemplate {
        kind: HarmonicType::Cypher,
        xab: (0.382, 0.618),
        abc: (1.13, 1.414),
        bcd: (1.272, 2.0),
        xad: (0.786, 0.786),
    },
    HarmonicTemplate {
        kind: HarmonicType::Shark,
        xab: (0.446, 0.618),
        abc: (1.13, 1.618),
        bcd: (1.618, 2.24),
        xad: (0.886, 1.13),
    },
];

/// Percentage error of `ratio` against `[min, max]`.
#[inline]
pub fn ratio_error(ratio: f64, (min, max): RatioRange) -> f64 {
    if (min..=max).contains(&ratio) {
        return 0.0;
    }
    if ratio.abs() < ZERO_EPSILON {
        return ZERO_RATIO_ERROR;
    }
    let nearest = if ratio < min { min } else { max };
    (ratio - nearest).abs() / ratio * 100.0
}

impl HarmonicTemplate {
    /// Summed error over whichever ratios the pattern has.
    pub fn total_error(&self, pattern: &XABCDPattern) -> f64 {
        [
            Some((pattern.xab, self.xab)),
            Some((pattern.abc, self.abc)),
            pattern.bcd.map(|r| (r, self.bcd)),
            pattern.xad.map(|r| (r, self.xad)),
        ]
        .into_iter()
        .flatten()
        .map(|(ratio, range)| ratio_error(ratio, range))
        .sum()
    }
}

// ============================================================
// CONFIG
// ============================================================

/// Harmonic matcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonicConfig {
    /// Complete patterns need `total_error` strictly below this
    pub max_error: f64,
    /// Decimals kept on each leg length before ratios are taken.
    /// `0` rounds legs to whole price units.
    pub leg_precision: u32,
    /// Also report the trailing X, A, B, C as a developing pattern
    pub include_developing: bool,
}

impl Default for HarmonicConfig {
    fn default() -> Self {
        Self {
            max_error: 50.0,
            leg_precision: 0,
            include_developing: false,
        }
    }
}

impl HarmonicConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.max_error.is_finite() || self.max_error <= 0.0 {
            return Err(PatternError::OutOfRange {
                field: "max_error",
                value: self.max_error,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }
        if self.leg_precision > super::helpers::MAX_DECIMALS {
            return Err(PatternError::InvalidConfig(format!(
                "leg_precision {} exceeds {}",
                self.leg_precision,
                super::helpers::MAX_DECIMALS
            )));
        }
        Ok(())
    }
}

impl ParameterizedDetector for HarmonicConfig {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[
            ParamMeta::factor(
                "max_error",
                50.0,
                (10.0, 100.0, 5.0),
                "Upper bound on summed ratio error for a complete pattern",
            ),
            ParamMeta::count(
                "leg_precision",
                0.0,
                (0.0, 8.0, 1.0),
                "Decimals kept on leg lengths before ratio division",
            ),
            ParamMeta::count(
                "include_developing",
                0.0,
                (0.0, 1.0, 1.0),
                "1 to also report the trailing four points as developing patterns",
            ),
        ];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let defaults = Self::default();
        let leg_precision = match params.get("leg_precision") {
            Some(&v) if v >= 0.0 && v.fract() == 0.0 => v as u32,
            Some(_) => {
                return Err(PatternError::InvalidValue(
                    "leg_precision must be a whole number",
                ))
            }
            None => defaults.leg_precision,
        };
        let include_developing = match params.get("include_developing") {
            Some(&v) if v == 0.0 || v == 1.0 => v == 1.0,
            Some(_) => {
                return Err(PatternError::InvalidValue(
                    "include_developing must be 0 or 1",
                ))
            }
            None => defaults.include_developing,
        };
        let config = Self {
            max_error: params.get("max_error").copied().unwrap_or(defaults.max_error),
            leg_precision,
            include_developing,
        };
        config.validate()?;
        Ok(config)
    }

    fn config_id() -> &'static str {
        "HARMONIC"
    }
}

// ============================================================
// PATTERN TYPES
// ============================================================

/// Five (or, while developing, four) zigzag points and their leg ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XABCDPattern {
    pub x: ZigZagPoint,
    pub a: ZigZagPoint,
    pub b: ZigZagPoint,
    pub c: ZigZagPoint,
    pub d: Option<ZigZagPoint>,
    pub xab: f64,
    pub abc: f64,
    pub bcd: Option<f64>,
    pub xad: Option<f64>,
}

impl XABCDPattern {
    /// Measure a 5-point window. `None` if the points do not alternate or a
    /// divisor leg rounds to zero.
    pub fn measure(points: &[ZigZagPoint; 5], leg_precision: u32) -> Option<Self> {
        if !alternates(points) {
            return None;
        }
        let [x, a, b, c, d] = *points;
        let leg = |p: &ZigZagPoint, q: &ZigZagPoint| round_to((p.price - q.price).abs(), leg_precision);

        let xa = leg(&x, &a);
        let ab = leg(&a, &b);
        let bc = leg(&b, &c);
        let cd = leg(&c, &d);
        let xd = leg(&x, &d);
        if [xa, ab, bc].iter().any(|l| *l < ZERO_EPSILON) {
            return None;
        }

        Some(Self {
            x,
            a,
            b,
            c,
            d: Some(d),
            xab: round_to(ab / xa, RATIO_DECIMALS),
            abc: round_to(bc / ab, RATIO_DECIMALS),
            bcd: Some(round_to(cd / bc, RATIO_DECIMALS)),
            xad: Some(round_to(xd / xa, RATIO_DECIMALS)),
        })
    }

    /// Measure X, A, B, C while D has not formed yet.
    pub fn measure_developing(points: &[ZigZagPoint; 4], leg_precision: u32) -> Option<Self> {
        if !alternates(points) {
            return None;
        }
        let [x, a, b, c] = *points;
        let xa = round_to((x.price - a.price).abs(), leg_precision);
        let ab = round_to((a.price - b.price).abs(), leg_precision);
        let bc = round_to((b.price - c.price).abs(), leg_precision);
        if xa < ZERO_EPSILON || ab < ZERO_EPSILON {
            return None;
        }

        Some(Self {
            x,
            a,
            b,
            c,
            d: None,
            xab: round_to(ab / xa, RATIO_DECIMALS),
            abc: round_to(bc / ab, RATIO_DECIMALS),
            bcd: None,
            xad: None,
        })
    }

    /// D exists and every ratio is numeric.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.d.is_some() && self.bcd.is_some() && self.xad.is_some()
    }

    /// Timestamp of the most recent point.
    #[inline]
    pub fn last_timestamp(&self) -> i64 {
        self.d.map_or(self.c.timestamp, |d| d.timestamp)
    }
}

/// A pattern scored against one template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonicMatch {
    pub kind: HarmonicType,
    pub pattern: XABCDPattern,
    pub total_error: f64,
    pub is_developing: bool,
    pub last_timestamp: i64,
}

impl HarmonicMatch {
    /// Trade bias: X at a trough projects a bullish reversal at D.
    #[inline]
    pub fn bias(&self) -> Direction {
        self.pattern.x.direction.opposite()
    }
}

// ============================================================
// MATCHER
// ============================================================

/// Find harmonic patterns with the default configuration.
///
/// Only complete five-point matches are reported. Developing tails need
/// [`find_harmonic_patterns_with`] and `HarmonicConfig { include_developing: true, .. }`.
pub fn find_harmonic_patterns(zigzags: &[ZigZagPoint]) -> Vec<HarmonicMatch> {
    // Default config always validates.
    find_harmonic_patterns_with(zigzags, &HarmonicConfig::default())
}

/// Find harmonic patterns in `zigzags`.
///
/// Every template is tried against every window; a window may match several.
/// With `include_developing` set, the trailing X, A, B, C is also scored
/// against every template and reported with `is_developing`.
pub fn find_harmonic_patterns_with(
    zigzags: &[ZigZagPoint],
    config: &HarmonicConfig,
) -> Vec<HarmonicMatch> {
    let mut matches = Vec::new();

    for (i, window) in zigzags.windows(5).enumerate() {
        let Ok(points) = <&[ZigZagPoint; 5]>::try_from(window) else {
            continue;
        };
        let Some(pattern) = XABCDPattern::measure(points, config.leg_precision) else {
            trace!(start = i, "window skipped: not alternating or zero leg");
            continue;
        };
        for template in &TEMPLATES {
            let total_error = template.total_error(&pattern);
            if total_error < config.max_error {
                matches.push(HarmonicMatch {
                    kind: template.kind,
                    pattern,
                    total_error,
                    is_developing: false,
                    last_timestamp: pattern.last_timestamp(),
                });
            }
        }
    }

    if config.include_developing && zigzags.len() >= 4 {
        let tail = &zigzags[zigzags.len() - 4..];
        let developing = <&[ZigZagPoint; 4]>::try_from(tail)
            .ok()
            .and_then(|points| XABCDPattern::measure_developing(points, config.leg_precision));
        if let Some(pattern) = developing {
            matches.extend(TEMPLATES.iter().map(|template| HarmonicMatch {
                kind: template.kind,
                pattern,
                total_error: template.total_error(&pattern),
                is_developing: true,
                last_timestamp: pattern.last_timestamp(),
            }));
        }
    }

    debug!(
        zigzags = zigzags.len(),
        matches = matches.len(),
        "harmonic scan complete"
    );
    matches
}

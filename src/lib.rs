//! # zigscan - ZigZag structure scanner
//!
//! Turning-point and chart-structure detection for OHLCV series: a rolling
//! Z-Score signal detector, a zigzag builder on top of it, and three matchers
//! that consume the zigzag sequence (harmonic XABCD patterns, triangles, and
//! support/resistance ranges with Fibonacci levels).
//!
//! ## Quick Start
//!
//! ```rust
//! use zigscan::prelude::*;
//!
//! // Define your OHLCV data
//! struct Bar { o: f64, h: f64, l: f64, c: f64, v: f64, t: i64 }
//!
//! impl OHLCV for Bar {
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//!     fn volume(&self) -> f64 { self.v }
//!     fn timestamp(&self) -> Option<i64> { Some(self.t) }
//! }
//!
//! // Create engine with a custom detector configuration
//! let engine = EngineBuilder::new()
//!     .zscore(ZScoreConfig::new(10, 2.5, 0.3).unwrap())
//!     .build()
//!     .unwrap();
//!
//! // Scan your data
//! let bars: Vec<Candle> = vec![];
//! let scan = engine.scan(&bars).unwrap();
//! assert!(scan.zigzags.is_empty());
//! ```

pub mod detectors;
pub mod params;

pub mod prelude {
    pub use crate::{
        // Stages
        detectors::*,
        // Parameters
        params::{
            get_ratio, require_param, require_period, ParamMeta, ParamType, ParameterizedDetector,
        },
        // Model
        Candle,
        Direction,
        // Engine
        EngineBuilder,
        OHLCVExt,
        // Errors
        PatternError,
        Period,
        Ratio,
        Result,
        Stage,
        StructureEngine,
        StructureScan,
        ZigZagPoint,
        OHLCV,
    };
}

use serde::{Deserialize, Serialize};
use tracing::debug;

use detectors::{
    build_zigzags, detect, find_harmonic_patterns_with, find_ranges_in,
    find_triangle_patterns_with, HarmonicConfig, HarmonicMatch, LocalRange, PriceMethod,
    RangeConfig, TriangleConfig, TrianglePattern, ZScoreConfig,
};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors raised by configuration and input validation.
///
/// Too little data is never an error; stages return empty results instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Missing parameter: {0}")]
    MissingParam(&'static str),

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Fraction in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Ratio(f64);

impl Ratio {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(PatternError::InvalidValue("Ratio must be finite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Unchecked, for constants known to be in range
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Ratio {
    type Error = PatternError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Ratio> for f64 {
    fn from(ratio: Ratio) -> f64 {
        ratio.0
    }
}

/// Window length, at least one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Period(usize);

impl Period {
    pub fn new(value: usize) -> Result<Self> {
        match value {
            0 => Err(PatternError::InvalidValue("Period must be > 0")),
            n => Ok(Self(n)),
        }
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for Period {
    type Error = PatternError;

    fn try_from(value: usize) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Period> for usize {
    fn from(period: Period) -> usize {
        period.0
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Price bar consumed by every stage
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    /// Open time in epoch seconds. Bars without one are placed by index.
    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Sanity checks over any [`OHLCV`] bar
pub trait OHLCVExt: OHLCV {
    /// Check the bar, reporting failures at `index`.
    fn validate_at(&self, index: usize) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        let reason = if prices.iter().any(|p| p.is_nan()) {
            "NaN price"
        } else if prices.iter().any(|p| p.is_infinite()) {
            "infinite price"
        } else if self.high() < self.low() {
            "high below low"
        } else {
            return Ok(());
        };
        Err(PatternError::InvalidOHLCV { index, reason })
    }

    fn validate(&self) -> Result<()> {
        self.validate_at(0)
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

/// A candle as delivered by an exchange feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub interval: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Epoch seconds
    pub open_time: i64,
    /// Epoch seconds
    pub close_time: i64,
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.open_time)
    }
}

// ============================================================
// ZIGZAG POINT
// ============================================================

/// Direction of a turning point or a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
        }
    }

    /// `1` is bullish, `-1` bearish, anything else has no direction.
    #[inline]
    pub fn from_sign(sign: i8) -> Option<Self> {
        match sign {
            1 => Some(Direction::Bullish),
            -1 => Some(Direction::Bearish),
            _ => None,
        }
    }
}

/// A recorded price extreme. Bullish points are peaks, bearish points troughs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZigZagPoint {
    pub direction: Direction,
    pub price: f64,
    /// Open time of the extreme's candle, epoch seconds
    pub timestamp: i64,
}

impl ZigZagPoint {
    #[inline]
    pub const fn new(direction: Direction, price: f64, timestamp: i64) -> Self {
        Self {
            direction,
            price,
            timestamp,
        }
    }
}

// ============================================================
// STRUCTURE ENGINE
// ============================================================

/// Matchers that run on top of the zigzag sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Harmonics,
    Triangles,
    Ranges,
}

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub zscore: ZScoreConfig,
    pub price_method: PriceMethod,
    pub harmonics: HarmonicConfig,
    pub triangles: TriangleConfig,
    pub ranges: RangeConfig,
    pub validate_data: bool,
    pub stage_filter: Option<Vec<Stage>>,
}

/// Everything one scan found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureScan {
    pub zigzags: Vec<ZigZagPoint>,
    pub harmonics: Vec<HarmonicMatch>,
    pub triangles: Vec<TrianglePattern>,
    pub ranges: Vec<LocalRange>,
}

/// Runs the full pipeline: prices -> signals -> zigzags -> matchers.
#[derive(Debug, Clone)]
pub struct StructureEngine {
    config: EngineConfig,
}

impl StructureEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ===========================================
    // LOW-LEVEL: Primitives
    // ===========================================

    /// Raw detector output over closing prices.
    pub fn signals<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<i8>> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        detect(&closes, &self.config.zscore)
    }

    /// Zigzag sequence using the engine's price method.
    pub fn zigzags<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<ZigZagPoint>> {
        build_zigzags(bars, &self.config.zscore, self.config.price_method)
    }

    // ===========================================
    // HIGH-LEVEL: Full scan
    // ===========================================

    /// Run every enabled stage over `bars`.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<StructureScan> {
        if self.config.validate_data {
            Self::validate_bars(bars)?;
        }

        let zigzags = self.zigzags(bars)?;
        let mut scan = StructureScan::default();

        if self.runs(Stage::Harmonics) {
            scan.harmonics = find_harmonic_patterns_with(&zigzags, &self.config.harmonics);
        }
        if self.runs(Stage::Triangles) {
            scan.triangles = find_triangle_patterns_with(&zigzags, &self.config.triangles);
        }
        if self.runs(Stage::Ranges) {
            let ranges = &self.config.ranges;
            let reuse = self.config.price_method == PriceMethod::Close
                && ranges.zscore == self.config.zscore;
            scan.ranges = if reuse {
                find_ranges_in(bars, &zigzags, ranges)
            } else {
                let closes = build_zigzags(bars, &ranges.zscore, PriceMethod::Close)?;
                find_ranges_in(bars, &closes, ranges)
            };
        }

        debug!(
            bars = bars.len(),
            zigzags = zigzags.len(),
            harmonics = scan.harmonics.len(),
            triangles = scan.triangles.len(),
            ranges = scan.ranges.len(),
            "structure scan complete"
        );
        scan.zigzags = zigzags;
        Ok(scan)
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn runs(&self, stage: Stage) -> bool {
        self.config
            .stage_filter
            .as_ref()
            .map_or(true, |stages| stages.contains(&stage))
    }

    fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
        bars.iter()
            .enumerate()
            .try_for_each(|(i, bar)| bar.validate_at(i))
    }

    fn validate(&self) -> Result<()> {
        self.config.zscore.validate()?;
        self.config.harmonics.validate()?;
        self.config.triangles.validate()?;
        self.config.ranges.validate()
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating StructureEngine instances
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    ranges_zscore_set: bool,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector parameters; also used for ranges unless they were given their own
    pub fn zscore(mut self, zscore: ZScoreConfig) -> Self {
        self.config.zscore = zscore;
        self
    }

    /// Which candle price marks a zigzag extreme
    pub fn price_method(mut self, method: PriceMethod) -> Self {
        self.config.price_method = method;
        self
    }

    pub fn harmonics(mut self, config: HarmonicConfig) -> Self {
        self.config.harmonics = config;
        self
    }

    pub fn triangles(mut self, config: TriangleConfig) -> Self {
        self.config.triangles = config;
        self
    }

    pub fn ranges(mut self, config: RangeConfig) -> Self {
        self.config.ranges = config;
        self.ranges_zscore_set = true;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Run only the given matchers
    pub fn only_stages(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.config.stage_filter = Some(stages.into_iter().collect());
        self
    }

    /// Build the engine
    pub fn build(mut self) -> Result<StructureEngine> {
        if !self.ranges_zscore_set {
            self.config.ranges.zscore = self.config.zscore;
        }
        let engine = StructureEngine {
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// TESTS
// ============================================================

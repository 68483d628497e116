//! Support/resistance ranges bounded by breakout candles.
//!
//! A range opens on a zigzag point once a later candle closes back on the far
//! side of it, then widens with every peak and trough until a candle closes
//! outside the span. Overlapping ranges are merged and each survivor gets a
//! Fibonacci retracement table.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::fibonacci::FibonacciTable;
use super::helpers::shared_precision;
use super::zigzag::{bar_time, build_zigzags, PriceMethod};
use super::zscore::ZScoreConfig;
use crate::{Direction, PatternError, Result, ZigZagPoint, OHLCV};

/// Range builder settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    /// Detector used for the close-price zigzags
    pub zscore: ZScoreConfig,
    /// A containing range may absorb a contained one only up to this multiple of its span
    pub max_containment_span: f64,
    /// Decimals for Fibonacci levels; `None` uses the finer of the two bounds
    pub precision: Option<u32>,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            zscore: ZScoreConfig::default(),
            max_containment_span: 2.5,
            precision: None,
        }
    }
}

impl RangeConfig {
    pub fn new(zscore: ZScoreConfig) -> Self {
        Self {
            zscore,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.zscore.validate()?;
        if !self.max_containment_span.is_finite() || self.max_containment_span < 1.0 {
            return Err(PatternError::OutOfRange {
                field: "max_containment_span",
                value: self.max_containment_span,
                min: 1.0,
                max: f64::MAX,
            });
        }
        Ok(())
    }

    fn precision_for(&self, support: f64, resistance: f64) -> u32 {
        self.precision
            .unwrap_or_else(|| shared_precision(support, resistance))
    }
}

/// A closed support/resistance interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalRange {
    pub support: f64,
    pub resistance: f64,
    /// Open time of the confirming candle
    pub start: i64,
    /// Timestamp of the zigzag that ended the range
    pub end: i64,
    /// Direction of the zigzag the range opened on
    pub direction: Direction,
    /// Side the range broke out to, `None` if it ran to the end of the data
    pub breakout: Option<Direction>,
    pub fibs: FibonacciTable,
}

impl LocalRange {
    #[inline]
    pub fn span(&self) -> f64 {
        self.resistance - self.support
    }

    /// Inclusive of both bounds.
    #[inline]
    pub fn contains_price(&self, price: f64) -> bool {
        (self.support..=self.resistance).contains(&price)
    }

    #[inline]
    fn strictly_inside(&self, price: f64) -> bool {
        price > self.support && price < self.resistance
    }

    fn should_absorb(&self, other: &LocalRange, max_span: f64) -> bool {
        if self.strictly_inside(other.resistance) || self.strictly_inside(other.support) {
            return true;
        }
        let contains_self = other.support <= self.support && other.resistance >= self.resistance;
        contains_self && other.span() <= max_span * self.span()
    }

    fn absorb(&mut self, other: &LocalRange, config: &RangeConfig) {
        if other.end >= self.end {
            self.breakout = other.breakout;
        }
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
        self.support = self.support.min(other.support);
        self.resistance = self.resistance.max(other.resistance);
        let precision = config.precision_for(self.support, self.resistance);
        self.fibs = FibonacciTable::new(self.support, self.resistance, precision);
    }
}

/// Range still waiting for its breakout.
struct OpenRange {
    start: i64,
    direction: Direction,
    support: Option<f64>,
    resistance: Option<f64>,
}

impl OpenRange {
    fn absorb(&mut self, point: &ZigZagPoint) {
        match point.direction {
            Direction::Bullish => {
                let high = self.resistance.map_or(point.price, |r| r.max(point.price));
                self.resistance = Some(high);
            }
            Direction::Bearish => {
                let low = self.support.map_or(point.price, |s| s.min(point.price));
                self.support = Some(low);
            }
        }
    }

    /// Side of the first close outside the span, once both bounds exist.
    fn breakout<T: OHLCV>(&self, bars: &[T]) -> Option<Direction> {
        let (support, resistance) = (self.support?, self.resistance?);
        bars.iter().find_map(|bar| {
            let close = bar.close();
            if close > resistance {
                Some(Direction::Bullish)
            } else if close < support {
                Some(Direction::Bearish)
            } else {
                None
            }
        })
    }

    fn close(
        self,
        end: i64,
        breakout: Option<Direction>,
        config: &RangeConfig,
    ) -> Option<LocalRange> {
        let (support, resistance) = (self.support?, self.resistance?);
        if support > resistance {
            trace!(support, resistance, start = self.start, "inverted range rejected");
            return None;
        }
        let precision = config.precision_for(support, resistance);
        Some(LocalRange {
            support,
            resistance,
            start: self.start,
            end,
            direction: self.direction,
            breakout,
            fibs: FibonacciTable::new(support, resistance, precision),
        })
    }
}

/// True if `close` sits back on the far side of `point`.
#[inline]
fn crosses_back(point: &ZigZagPoint, close: f64) -> bool {
    match point.direction {
        Direction::Bullish => close < point.price,
        Direction::Bearish => close > point.price,
    }
}

/// Build close-price zigzags from `bars` and derive merged ranges from them.
pub fn find_ranges<T: OHLCV>(bars: &[T], config: &RangeConfig) -> Result<Vec<LocalRange>> {
    config.validate()?;
    let zigzags = build_zigzags(bars, &config.zscore, PriceMethod::Close)?;
    Ok(find_ranges_in(bars, &zigzags, config))
}

/// Derive merged ranges from precomputed close-price `zigzags` over `bars`.
///
/// `bars` must be ordered by open time; zigzag timestamps are located in it by
/// binary search.
pub fn find_ranges_in<T: OHLCV>(
    bars: &[T],
    zigzags: &[ZigZagPoint],
    config: &RangeConfig,
) -> Vec<LocalRange> {
    let times: Vec<i64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| bar_time(bar, i))
        .collect();
    // Candles with open time in (from, to].
    let between = |from: i64, to: i64| {
        let lo = times.partition_point(|t| *t <= from);
        let hi = times.partition_point(|t| *t <= to).max(lo);
        lo..hi
    };

    let mut ranges = Vec::new();
    let mut open: Option<OpenRange> = None;

    for pair in zigzags.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        let span = between(current.timestamp, next.timestamp);
        let interval = &bars[span.clone()];

        if open.is_none() {
            let confirm = interval
                .iter()
                .zip(span.clone())
                .find(|(bar, _)| crosses_back(current, bar.close()));
            let Some((bar, index)) = confirm else {
                continue;
            };
            open = Some(OpenRange {
                start: bar_time(bar, index),
                direction: current.direction,
                support: None,
                resistance: None,
            });
        }

        if let Some(range) = open.as_mut() {
            range.absorb(current);
            if let Some(side) = range.breakout(interval) {
                let closed = open.take();
                ranges.extend(closed.and_then(|r| r.close(next.timestamp, Some(side), config)));
            }
        }
    }

    if let (Some(mut range), Some(last)) = (open, zigzags.last()) {
        range.absorb(last);
        ranges.extend(range.close(last.timestamp, None, config));
    }

    let found = ranges.len();
    let merged = merge_ranges(ranges, config);
    debug!(
        zigzags = zigzags.len(),
        found,
        merged = merged.len(),
        "range scan complete"
    );
    merged
}

/// Merge overlapping or contained ranges, in order.
///
/// A range folds into the last kept one when one of its bounds lies strictly
/// inside the kept span, or when it contains the kept range without exceeding
/// `max_containment_span` times its span. A grown range is re-checked against
/// its predecessor, so running the pass again changes nothing.
pub fn merge_ranges(ranges: Vec<LocalRange>, config: &RangeConfig) -> Vec<LocalRange> {
    let max_span = config.max_containment_span;
    let mut kept: Vec<LocalRange> = Vec::with_capacity(ranges.len());

    for range in ranges {
        match kept.last_mut() {
            Some(last) if last.should_absorb(&range, max_span) => {
                trace!(start = range.start, end = range.end, "range merged");
                last.absorb(&range, config);
            }
            _ => {
                kept.push(range);
                continue;
            }
        }

        while kept.len() >= 2 {
            let n = kept.len();
            if !kept[n - 2].should_absorb(&kept[n - 1], max_span) {
                break;
            }
            if let Some(grown) = kept.pop() {
                if let Some(prev) = kept.last_mut() {
                    prev.absorb(&grown, config);
                }
            }
        }
    }

    kept
}

//! ZigZag construction from Z-Score signals.
//!
//! Consecutive same-direction signals collapse into one extreme; a change of
//! direction flushes the extreme held so far. Output points therefore always
//! alternate.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::zscore::{detect, to_signals, ZScoreConfig};
use crate::{Direction, Result, ZigZagPoint, OHLCV};

/// Which price of a candle represents a turning point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceMethod {
    /// Closing price for both directions
    #[default]
    Close,
    /// High for bullish runs, low for bearish runs
    Extremes,
}

impl PriceMethod {
    #[inline]
    pub fn price_of<T: OHLCV>(self, bar: &T, direction: Direction) -> f64 {
        match (self, direction) {
            (PriceMethod::Close, _) => bar.close(),
            (PriceMethod::Extremes, Direction::Bullish) => bar.high(),
            (PriceMethod::Extremes, Direction::Bearish) => bar.low(),
        }
    }
}

/// Open time of the bar at `index`, falling back to the index itself.
#[inline]
pub(crate) fn bar_time<T: OHLCV>(bar: &T, index: usize) -> i64 {
    bar.timestamp().unwrap_or(index as i64)
}

/// In-progress run of same-direction signals.
struct Run {
    direction: Direction,
    price: f64,
    timestamp: i64,
}

impl Run {
    /// Strictly more extreme only; the first occurrence of a tie is kept.
    fn offer(&mut self, price: f64, timestamp: i64) {
        let better = match self.direction {
            Direction::Bullish => price > self.price,
            Direction::Bearish => price < self.price,
        };
        if better {
            self.price = price;
            self.timestamp = timestamp;
        }
    }

    fn into_point(self) -> ZigZagPoint {
        ZigZagPoint::new(self.direction, self.price, self.timestamp)
    }
}

/// Build the zigzag sequence for `bars`.
///
/// The detector always runs on closing prices; `method` only picks which price
/// of a flagged bar is recorded as the extreme.
pub fn build_zigzags<T: OHLCV>(
    bars: &[T],
    config: &ZScoreConfig,
    method: PriceMethod,
) -> Result<Vec<ZigZagPoint>> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
    let raw = detect(&closes, config)?;
    let signals = to_signals(&raw);

    let mut points = Vec::new();
    let mut run: Option<Run> = None;

    for signal in &signals {
        let bar = &bars[signal.position];
        let price = method.price_of(bar, signal.direction);
        let timestamp = bar_time(bar, signal.position);

        match run.as_mut() {
            Some(current) if current.direction == signal.direction => {
                current.offer(price, timestamp);
            }
            _ => {
                let next = Run {
                    direction: signal.direction,
                    price,
                    timestamp,
                };
                if let Some(done) = run.replace(next) {
                    points.push(done.into_point());
                }
            }
        }
    }

    if let Some(last) = run {
        points.push(last.into_point());
    }

    debug!(
        bars = bars.len(),
        signals = signals.len(),
        zigzags = points.len(),
        "zigzag build complete"
    );
    Ok(points)
}

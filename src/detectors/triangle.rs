//! Triangle consolidation recognition over a zigzag sequence.
//!
//! A candidate window starts at five points and grows one point at a time for
//! as long as it keeps satisfying the shape it was first classified as. When
//! the next point breaks the shape, the window before it is reported and the
//! scan resumes from the breaking point.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::helpers::alternates;
use crate::{
    params::{get_ratio, ParamMeta, ParameterizedDetector},
    Direction, Ratio, Result, ZigZagPoint,
};

/// Points needed before a window can be classified.
pub const MIN_TRIANGLE_POINTS: usize = 5;

/// Shape of a triangle, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriangleType {
    /// Each peak above the one before
    Ascending,
    /// Each trough below the one before
    Descending,
    /// Peaks hold within tolerance of the first peak
    Symmetrical,
}

/// Triangle matcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriangleConfig {
    /// Max relative distance of a later peak from the first one (symmetrical shape)
    pub symmetry_tolerance: Ratio,
}

impl Default for TriangleConfig {
    fn default() -> Self {
        Self {
            symmetry_tolerance: Ratio::new_const(0.05),
        }
    }
}

impl TriangleConfig {
    pub fn validate(&self) -> Result<()> {
        Ratio::new(self.symmetry_tolerance.get()).map(|_| ())
    }
}

impl ParameterizedDetector for TriangleConfig {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[ParamMeta::ratio(
            "symmetry_tolerance",
            0.05,
            (0.01, 0.15, 0.01),
            "Allowed drift of later peaks from the first peak",
        )];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            symmetry_tolerance: get_ratio(params, "symmetry_tolerance", 0.05)?,
        })
    }

    fn config_id() -> &'static str {
        "TRIANGLE"
    }
}

/// A detected triangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrianglePattern {
    pub kind: TriangleType,
    pub points: Vec<ZigZagPoint>,
    pub is_complete: bool,
    pub last_timestamp: i64,
}

impl TrianglePattern {
    fn from_points(kind: TriangleType, points: &[ZigZagPoint]) -> Self {
        Self {
            kind,
            points: points.to_vec(),
            is_complete: points.len() >= MIN_TRIANGLE_POINTS,
            last_timestamp: points.last().map_or(0, |p| p.timestamp),
        }
    }
}

fn prices(window: &[ZigZagPoint], direction: Direction) -> impl Iterator<Item = f64> + '_ {
    window
        .iter()
        .filter(move |p| p.direction == direction)
        .map(|p| p.price)
}

fn strictly_rising(window: &[ZigZagPoint], direction: Direction) -> bool {
    let seq: Vec<f64> = prices(window, direction).collect();
    seq.len() >= 2 && seq.windows(2).all(|w| w[0] < w[1])
}

fn strictly_falling(window: &[ZigZagPoint], direction: Direction) -> bool {
    let seq: Vec<f64> = prices(window, direction).collect();
    seq.len() >= 2 && seq.windows(2).all(|w| w[0] > w[1])
}

impl TriangleType {
    /// True if `window` has this shape. Non-alternating windows never match.
    pub fn matches(self, window: &[ZigZagPoint], config: &TriangleConfig) -> bool {
        if window.len() < MIN_TRIANGLE_POINTS || !alternates(window) {
            return false;
        }
        match self {
            TriangleType::Ascending => strictly_rising(window, Direction::Bullish),
            TriangleType::Descending => strictly_falling(window, Direction::Bearish),
            TriangleType::Symmetrical => {
                let mut peaks = prices(window, Direction::Bullish);
                let Some(first) = peaks.next() else {
                    return false;
                };
                let band = config.symmetry_tolerance.get() * first.abs();
                peaks.all(|p| (p - first).abs() <= band)
            }
        }
    }

    /// First shape `window` satisfies, in priority order.
    pub fn classify(window: &[ZigZagPoint], config: &TriangleConfig) -> Option<Self> {
        [
            TriangleType::Ascending,
            TriangleType::Descending,
            TriangleType::Symmetrical,
        ]
        .into_iter()
        .find(|kind| kind.matches(window, config))
    }
}

/// Find triangles with the default configuration.
pub fn find_triangle_patterns(zigzags: &[ZigZagPoint]) -> Vec<TrianglePattern> {
    find_triangle_patterns_with(zigzags, &TriangleConfig::default())
}

/// Find triangles in `zigzags`.
pub fn find_triangle_patterns_with(
    zigzags: &[ZigZagPoint],
    config: &TriangleConfig,
) -> Vec<TrianglePattern> {
    let n = zigzags.len();
    let mut patterns = Vec::new();
    let mut start = 0;

    while start + MIN_TRIANGLE_POINTS <= n {
        let mut locked: Option<TriangleType> = None;
        let mut end = start + MIN_TRIANGLE_POINTS - 1;

        loop {
            if end >= n {
                if let Some(kind) = locked {
                    patterns.push(TrianglePattern::from_points(kind, &zigzags[start..n]));
                }
                start = n;
                break;
            }

            let window = &zigzags[start..=end];
            let fits = match locked {
                None => TriangleType::classify(window, config),
                Some(kind) => kind.matches(window, config).then_some(kind),
            };

            match (locked, fits) {
                (_, Some(kind)) => {
                    locked = Some(kind);
                    end += 1;
                }
                (None, None) => {
                    start += 1;
                    break;
                }
                (Some(kind), None) => {
                    trace!(start, end, ?kind, "triangle broken");
                    patterns.push(TrianglePattern::from_points(kind, &zigzags[start..end]));
                    start = end;
                    break;
                }
            }
        }
    }

    debug!(
        zigzags = n,
        triangles = patterns.len(),
        "triangle scan complete"
    );
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Alternating sequence starting with a peak.
    fn seq(prices: &[f64]) -> Vec<ZigZagPoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let dir = if i % 2 == 0 {
                    Direction::Bullish
                } else {
                    Direction::Bearish
                };
                ZigZagPoint::new(dir, p, 100 + i as i64)
            })
            .collect()
    }

    #[test]
    fn test_classify_priority() {
        let config = TriangleConfig::default();
        // peaks 100 < 102 < 104, also within 5% of 100
        let window = seq(&[100.0, 90.0, 102.0, 80.0, 104.0]);
        assert_eq!(
            TriangleType::classify(&window, &config),
            Some(TriangleType::Ascending)
        );

        // peaks flat-ish but not rising, troughs falling
        let window = seq(&[100.0, 90.0, 100.0, 85.0, 99.0]);
        assert_eq!(
            TriangleType::classify(&window, &config),
            Some(TriangleType::Descending)
        );

        // troughs rising, peaks within tolerance but not rising
        let window = seq(&[100.0, 80.0, 98.0, 85.0, 97.0]);
        assert_eq!(
            TriangleType::classify(&window, &config),
            Some(TriangleType::Symmetrical)
        );

        // nothing holds
        let window = seq(&[100.0, 80.0, 120.0, 85.0, 90.0]);
        assert_eq!(TriangleType::classify(&window, &config), None);
    }

    #[test]
    fn test_ascending_grows_until_break() {
        // peaks rise through index 6, index 8 breaks
        let zz = seq(&[100.0, 90.0, 102.0, 80.0, 104.0, 85.0, 106.0, 70.0, 50.0, 60.0]);
        let found = find_triangle_patterns(&zz);
        assert!(!found.is_empty());
        let first = &found[0];
        assert_eq!(first.kind, TriangleType::Ascending);
        assert_eq!(first.points.len(), 8);
        assert!(first.is_complete);
        assert_eq!(first.last_timestamp, 107);
    }

    #[test]
    fn test_pattern_reaching_end_is_emitted() {
        let zz = seq(&[100.0, 90.0, 102.0, 80.0, 104.0, 85.0, 106.0]);
        let found = find_triangle_patterns(&zz);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].points.len(), 7);
        assert_eq!(found[0].last_timestamp, 106);
    }

    #[test]
    fn test_no_pattern_advances_start() {
        let zz = seq(&[100.0, 80.0, 120.0, 85.0, 90.0, 95.0]);
        let found = find_triangle_patterns(&zz);
        assert!(found.iter().all(|t| t.points.len() >= MIN_TRIANGLE_POINTS));
    }

    #[test]
    fn test_short_and_non_alternating() {
        assert!(find_triangle_patterns(&[]).is_empty());
        assert!(find_triangle_patterns(&seq(&[1.0, 2.0, 3.0, 4.0])).is_empty());

        let mut zz = seq(&[100.0, 90.0, 102.0, 80.0, 104.0]);
        zz[1].direction = Direction::Bullish;
        assert!(find_triangle_patterns(&zz).is_empty());
    }

    #[test]
    fn test_tolerance_param() {
        let mut params = HashMap::new();
        params.insert("symmetry_tolerance", 0.2);
        let config = TriangleConfig::with_params(&params).unwrap();
        let window = seq(&[100.0, 80.0, 85.0, 85.0, 90.0]);
        assert_eq!(TriangleType::classify(&window, &TriangleConfig::default()), None);
        assert_eq!(
            TriangleType::classify(&window, &config),
            Some(TriangleType::Symmetrical)
        );

        params.insert("symmetry_tolerance", 1.5);
        assert!(TriangleConfig::with_params(&params).is_err());
    }
}

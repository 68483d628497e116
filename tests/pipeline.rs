//! Integration tests for the zigscan pipeline.
//!
//! These tests drive the public API end to end: detector, zigzags, matchers
//! and the engine that ties them together.

use std::collections::HashMap;

use zigscan::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    t: i64,
}

impl TestBar {
    fn at(index: usize, c: f64) -> Self {
        Self {
            o: c,
            h: c + 1.0,
            l: c - 1.0,
            c,
            t: T0 + index as i64 * 60,
        }
    }
}

impl OHLCV for TestBar {
    fn open(&self) -> f64 {
        self.o
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        self.c
    }

    fn volume(&self) -> f64 {
        1000.0
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.t)
    }
}

const T0: i64 = 1_700_000_000;

/// Minute index of a timestamp produced by [`TestBar::at`]
fn minute(t: i64) -> i64 {
    (t - T0) / 60
}

/// One swing cycle around 100: a spike to `100 + amp`, a dip to `100 - amp`
fn cycle(base: f64, amp: f64) -> [f64; 10] {
    [
        base,
        base + 0.5,
        base - 0.5,
        base,
        base + amp,
        base,
        base + 0.5,
        base - 0.5,
        base - amp,
        base,
    ]
}

fn make_bars(closes: &[f64]) -> Vec<TestBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| TestBar::at(i, c))
        .collect()
}

/// Four cycles swinging between 120 and 80
fn make_swings() -> Vec<TestBar> {
    make_bars(&cycle(100.0, 20.0).repeat(4))
}

/// Three cycles around 100, then two around 160
fn make_breakout() -> Vec<TestBar> {
    let mut closes = cycle(100.0, 10.0).repeat(3);
    closes.extend(cycle(160.0, 10.0).repeat(2));
    make_bars(&closes)
}

fn sensitive() -> ZScoreConfig {
    ZScoreConfig::new(3, 2.0, 0.0).unwrap()
}

fn zz(direction: Direction, price: f64, timestamp: i64) -> ZigZagPoint {
    ZigZagPoint::new(direction, price, timestamp)
}

// ============================================================
// DETECTOR
// ============================================================

#[test]
fn test_flat_series_has_no_signals() {
    for price in [42.0, 0.1, 410.7445125725592, 1.0 / 3.0, 27_123.45] {
        let values = vec![price; 20];
        for (lag, threshold, influence) in [
            (1, 0.5, 0.0),
            (5, 3.0, 0.5),
            (7, 0.5, 0.5),
            (11, 0.25, 1.0),
            (19, 1.0, 1.0),
            (30, 2.0, 0.3),
        ] {
            let config = ZScoreConfig::new(lag, threshold, influence).unwrap();
            let signals = detect(&values, &config).unwrap();
            assert_eq!(signals, vec![0; 20], "price {price}, lag {lag}");
        }
    }
}

#[test]
fn test_detector_flags_spike() {
    let mut values = vec![10.0, 11.0, 10.0, 11.0, 10.0, 11.0];
    values.push(50.0);
    values.push(10.5);
    let signals = detect(&values, &ZScoreConfig::default()).unwrap();
    assert_eq!(signals.len(), values.len());
    assert_eq!(signals[6], 1);
    assert!(signals[..5].iter().all(|s| *s == 0));

    let points = to_signals(&signals);
    assert_eq!(points[0].position, 6);
    assert_eq!(points[0].direction, Direction::Bullish);
}

#[test]
fn test_detector_rejects_bad_config() {
    let config = ZScoreConfig {
        threshold: 0.0,
        ..ZScoreConfig::default()
    };
    assert!(detect(&[1.0, 2.0, 3.0], &config).is_err());
    assert!(ZScoreConfig::new(0, 3.0, 0.5).is_err());
    assert!(ZScoreConfig::new(5, 3.0, 1.5).is_err());
}

#[test]
fn test_zscore_from_params() {
    let params = HashMap::from([("lag", 3.0), ("threshold", 2.0), ("influence", 0.0)]);
    assert_eq!(ZScoreConfig::with_params(&params).unwrap(), sensitive());

    let partial = HashMap::from([("lag", 3.0), ("threshold", 2.0)]);
    assert!(matches!(
        ZScoreConfig::with_params(&partial),
        Err(PatternError::MissingParam("influence"))
    ));
}

// ============================================================
// ZIGZAGS
// ============================================================

#[test]
fn test_zigzags_follow_swings() {
    let zigzags = build_zigzags(&make_swings(), &sensitive(), PriceMethod::Close).unwrap();
    assert_eq!(zigzags.len(), 8);
    for (i, point) in zigzags.iter().enumerate() {
        if i % 2 == 0 {
            assert_eq!(point.direction, Direction::Bullish);
            assert_eq!(point.price, 120.0);
            assert_eq!(minute(point.timestamp), 4 + 10 * (i as i64 / 2));
        } else {
            assert_eq!(point.direction, Direction::Bearish);
            assert_eq!(point.price, 80.0);
            assert_eq!(minute(point.timestamp), 8 + 10 * (i as i64 / 2));
        }
    }
}

#[test]
fn test_zigzags_extremes_use_wicks() {
    let zigzags = build_zigzags(&make_swings(), &sensitive(), PriceMethod::Extremes).unwrap();
    assert_eq!(zigzags.len(), 8);
    assert_eq!(zigzags[0].price, 121.0);
    assert_eq!(zigzags[1].price, 79.0);
}

#[test]
fn test_too_short_for_zigzags() {
    let bars = make_bars(&[1.0, 2.0, 3.0]);
    assert!(build_zigzags(&bars, &sensitive(), PriceMethod::Close)
        .unwrap()
        .is_empty());
}

// ============================================================
// HARMONICS
// ============================================================

#[test]
fn test_harmonic_window_without_match() {
    let zigzags = vec![
        zz(Direction::Bullish, 100.0, 0),
        zz(Direction::Bearish, 50.0, 1),
        zz(Direction::Bullish, 150.0, 2),
        zz(Direction::Bearish, 80.0, 3),
        zz(Direction::Bullish, 130.0, 4),
    ];
    let points: &[ZigZagPoint; 5] = zigzags.as_slice().try_into().unwrap();
    let pattern = XABCDPattern::measure(points, 0).unwrap();
    assert_eq!(pattern.xab, 2.0);
    assert_eq!(pattern.abc, 0.7);
    assert_eq!(pattern.bcd, Some(0.714));
    assert_eq!(pattern.xad, Some(0.6));

    assert!(find_harmonic_patterns(&zigzags).is_empty());
}

#[test]
fn test_harmonic_developing_tail() {
    let zigzags = vec![
        zz(Direction::Bullish, 200.0, 0),
        zz(Direction::Bearish, 100.0, 1),
        zz(Direction::Bullish, 161.0, 2),
        zz(Direction::Bearish, 107.0, 3),
    ];
    assert!(find_harmonic_patterns(&zigzags).is_empty());

    let config = HarmonicConfig {
        include_developing: true,
        ..HarmonicConfig::default()
    };
    let found = find_harmonic_patterns_with(&zigzags, &config);
    assert_eq!(found.len(), TEMPLATES.len());
    for m in &found {
        assert!(m.is_developing);
        assert_eq!(m.pattern.d, None);
        assert_eq!(m.pattern.xad, None);
        assert_eq!(m.last_timestamp, 3);
        assert_eq!(m.bias(), Direction::Bearish);
    }
}

// ============================================================
// TRIANGLES
// ============================================================

#[test]
fn test_symmetrical_triangle_before_breakout() {
    let zigzags = build_zigzags(&make_breakout(), &sensitive(), PriceMethod::Close).unwrap();
    let triangles = find_triangle_patterns(&zigzags);
    assert_eq!(triangles.len(), 1);
    let triangle = &triangles[0];
    assert_eq!(triangle.kind, TriangleType::Symmetrical);
    assert_eq!(triangle.points.len(), 6);
    assert!(triangle.is_complete);
    assert_eq!(minute(triangle.last_timestamp), 28);
}

#[test]
fn test_ascending_triangle() {
    let zigzags: Vec<ZigZagPoint> = [100.0, 90.0, 110.0, 92.0, 120.0, 95.0]
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let direction = if i % 2 == 0 {
                Direction::Bullish
            } else {
                Direction::Bearish
            };
            zz(direction, p, i as i64)
        })
        .collect();
    let triangles = find_triangle_patterns(&zigzags);
    assert_eq!(triangles.len(), 1);
    assert_eq!(triangles[0].kind, TriangleType::Ascending);
    assert_eq!(triangles[0].points, zigzags);
}

// ============================================================
// RANGES
// ============================================================

#[test]
fn test_fibonacci_midpoint() {
    let fibs = FibonacciTable::new(100.0, 110.0, 0);
    assert_eq!(fibs.low_to_high.level(0.5), Some(105.0));
    assert_eq!(fibs.high_to_low.level(0.5), Some(105.0));
    assert_eq!(fibs.low_to_high.level(1.0), Some(110.0));
    assert_eq!(fibs.high_to_low.level(1.0), Some(100.0));
}

#[test]
fn test_unbroken_swing_range() {
    let ranges = find_ranges(&make_swings(), &RangeConfig::new(sensitive())).unwrap();
    assert_eq!(ranges.len(), 1);
    let range = &ranges[0];
    assert_eq!((range.support, range.resistance), (80.0, 120.0));
    assert_eq!(minute(range.start), 5);
    assert_eq!(minute(range.end), 38);
    assert_eq!(range.direction, Direction::Bullish);
    assert_eq!(range.breakout, None);
    assert_eq!(range.fibs.low_to_high.level(0.5), Some(100.0));
    assert!(range.contains_price(80.0));
    assert!(!range.contains_price(120.5));
}

#[test]
fn test_breakout_then_merged_range() {
    let ranges = find_ranges(&make_breakout(), &RangeConfig::new(sensitive())).unwrap();
    assert_eq!(ranges.len(), 2);

    let first = &ranges[0];
    assert_eq!((first.support, first.resistance), (90.0, 110.0));
    assert_eq!((minute(first.start), minute(first.end)), (5, 31));
    assert_eq!(first.breakout, Some(Direction::Bullish));

    // (150, 160.5) absorbed into the later (150, 170)
    let second = &ranges[1];
    assert_eq!((second.support, second.resistance), (150.0, 170.0));
    assert_eq!((minute(second.start), minute(second.end)), (32, 48));
    assert_eq!(second.breakout, None);
    assert_eq!(second.span(), 20.0);
    assert_eq!(second.fibs.high_to_low.level(0.5), Some(160.0));
}

// ============================================================
// ENGINE
// ============================================================

#[test]
fn test_engine_matches_stages() {
    let bars = make_breakout();
    let engine = EngineBuilder::new().zscore(sensitive()).build().unwrap();
    let scan = engine.scan(&bars).unwrap();

    let zigzags = build_zigzags(&bars, &sensitive(), PriceMethod::Close).unwrap();
    assert_eq!(scan.zigzags, zigzags);
    assert_eq!(scan.harmonics, find_harmonic_patterns(&zigzags));
    assert_eq!(scan.triangles, find_triangle_patterns(&zigzags));
    assert_eq!(
        scan.ranges,
        find_ranges(&bars, &RangeConfig::new(sensitive())).unwrap()
    );
}

#[test]
fn test_engine_ranges_stay_on_closes() {
    let bars = make_breakout();
    let engine = EngineBuilder::new()
        .zscore(sensitive())
        .price_method(PriceMethod::Extremes)
        .build()
        .unwrap();
    let scan = engine.scan(&bars).unwrap();
    assert_eq!(scan.zigzags[0].price, 111.0);
    assert_eq!(
        scan.ranges,
        find_ranges(&bars, &RangeConfig::new(sensitive())).unwrap()
    );
}

#[test]
fn test_scan_serializes() {
    let engine = EngineBuilder::new().zscore(sensitive()).build().unwrap();
    let scan = engine.scan(&make_swings()).unwrap();

    let json = serde_json::to_string(&scan).unwrap();
    let back: StructureScan = serde_json::from_str(&json).unwrap();
    assert_eq!(back, scan);

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["zigzags"][0]["direction"], "Bullish");
    assert_eq!(value["ranges"][0]["support"], 80.0);
}

#[test]
fn test_candle_from_json() {
    let json = r#"{
        "symbol": "ETHUSDT",
        "interval": "1m",
        "open": 100.0,
        "high": 101.0,
        "low": 99.0,
        "close": 100.5,
        "volume": 12.5,
        "open_time": 1700000000,
        "close_time": 1700000059
    }"#;
    let candle: Candle = serde_json::from_str(json).unwrap();
    assert_eq!(candle.timestamp(), Some(1_700_000_000));
    assert!(candle.validate().is_ok());
}

#[test]
fn test_invalid_ratio_rejected_on_deserialize() {
    let json = r#"{ "lag": 5, "threshold": 3.0, "influence": 1.5 }"#;
    assert!(serde_json::from_str::<ZScoreConfig>(json).is_err());
}

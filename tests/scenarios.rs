//! Integration tests for zonescope.
//!
//! Scenario tests for each pipeline stage plus end-to-end runs through the
//! engine, a mock data source and a closure narrative generator.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use zonescope::collab::narrate;
use zonescope::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
    d: NaiveDate,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
}

impl TestBar {
    fn new(d: NaiveDate, o: f64, h: f64, l: f64, c: f64) -> Self {
        Self { d, o, h, l, c }
    }
}

impl OHLC for TestBar {
    fn date(&self) -> NaiveDate {
        self.d
    }

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
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Consecutive daily bars starting at `start`
fn daily(start: NaiveDate, rows: &[(f64, f64, f64, f64)]) -> Vec<TestBar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| TestBar::new(start + Duration::days(i as i64), o, h, l, c))
        .collect()
}

/// Generate flat, low-volatility bars: small bodies dominated by wicks
fn make_flat(n: usize) -> Vec<TestBar> {
    (0..n)
        .map(|i| TestBar::new(date(2024, 1, 1) + Duration::days(i as i64), 100.0, 100.5, 99.5, 100.1))
        .collect()
}

/// Monthly series with one demand zone at [120, 122] formed Dec 2023 / Jan 2024
fn monthly_series() -> Vec<TestBar> {
    vec![
        TestBar::new(date(2023, 11, 1), 128.0, 129.0, 126.0, 128.5),
        TestBar::new(date(2023, 12, 1), 130.0, 130.5, 120.0, 121.0),
        TestBar::new(date(2024, 1, 1), 122.0, 135.5, 121.5, 135.0),
        TestBar::new(date(2024, 2, 1), 135.0, 140.0, 133.0, 138.0),
        TestBar::new(date(2024, 3, 1), 138.0, 142.0, 134.0, 140.0),
    ]
}

/// Daily series with one demand zone at [120.4, 120.6] formed early January
fn daily_series() -> Vec<TestBar> {
    let mut rows = vec![
        (121.5, 121.8, 121.0, 121.4),
        (121.6, 121.65, 120.4, 120.5),  // red exciting
        (120.6, 121.95, 120.55, 121.9), // green exciting
        (122.0, 123.1, 121.95, 123.0),  // follow-through
        (123.0, 123.2, 122.5, 122.8),
    ];
    rows.extend(std::iter::repeat((123.0, 124.0, 122.5, 123.5)).take(20));
    daily(date(2024, 1, 2), &rows)
}

fn demand_zone(interval: Interval, proximal: f64, distal: f64, dates: &[NaiveDate]) -> Zone {
    let last = dates.len() - 1;
    let candles = dates
        .iter()
        .enumerate()
        .map(|(i, &date)| ZoneCandle {
            date,
            role: match i {
                0 => CandleRole::First,
                i if i == last => CandleRole::Second,
                _ => CandleRole::Base,
            },
            ohlc: OhlcSnapshot {
                open: proximal,
                high: proximal + 1.0,
                low: distal,
                close: proximal + 0.5,
            },
        })
        .collect();
    Zone::new(1, ZoneKind::Demand, interval, proximal, distal, candles, 0).unwrap()
}

// ============================================================
// SCANNER SCENARIOS
// ============================================================

#[test]
fn test_flat_series_has_no_zones() {
    let engine = EngineBuilder::new().build().unwrap();
    let bars = make_flat(40);

    for interval in [Interval::OneDay, Interval::OneWeek, Interval::OneMonth] {
        assert!(engine.scan(&bars, interval, ZoneKind::Demand).unwrap().is_empty());
        assert!(engine.scan(&bars, interval, ZoneKind::Supply).unwrap().is_empty());
    }
}

#[test]
fn test_red_then_green_exciting_pair() {
    let engine = EngineBuilder::new().build().unwrap();
    let bars = daily(
        date(2024, 4, 1),
        &[
            (101.0, 102.0, 99.0, 100.5),
            (100.0, 100.5, 94.0, 95.0),
            (96.0, 102.5, 95.0, 102.0),
        ],
    );

    let zones = engine.scan(&bars, Interval::OneDay, ZoneKind::Demand).unwrap();
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0].proximal(), 96.0);
    assert_eq!(zones[0].distal(), 94.0);
    assert_eq!(zones[0].formation_dates(), &[date(2024, 4, 2), date(2024, 4, 3)]);
}

#[test]
fn test_short_series_has_no_zones() {
    let engine = EngineBuilder::new().build().unwrap();
    let bars = daily(
        date(2024, 4, 1),
        &[(100.0, 100.5, 94.0, 95.0), (96.0, 102.5, 95.0, 102.0)],
    );
    assert!(engine.scan(&bars, Interval::OneDay, ZoneKind::Demand).unwrap().is_empty());
}

#[test]
fn test_extended_interval_requires_breakout() {
    let bars = daily(
        date(2024, 4, 1),
        &[
            (101.0, 102.0, 99.0, 100.5),
            (100.0, 100.5, 94.0, 95.0),  // red exciting
            (97.5, 98.5, 97.0, 97.8),    // base, low 97
            (101.0, 101.2, 94.0, 96.2),  // gap up, closes under the base low
        ],
    );
    let engine = EngineBuilder::new().build().unwrap();

    assert_eq!(engine.scan(&bars, Interval::OneDay, ZoneKind::Demand).unwrap().len(), 1);
    assert!(engine.scan(&bars, Interval::OneMonth, ZoneKind::Demand).unwrap().is_empty());
}

#[test]
fn test_unordered_series_is_rejected() {
    let engine = EngineBuilder::new().build().unwrap();
    let mut bars = make_flat(5);
    bars.swap(1, 3);
    assert!(matches!(
        engine.scan(&bars, Interval::OneDay, ZoneKind::Demand),
        Err(ZoneError::UnorderedSeries { .. })
    ));

    let lenient = EngineBuilder::new().validate_data(false).build().unwrap();
    assert!(lenient.scan(&bars, Interval::OneDay, ZoneKind::Demand).is_ok());
}

// ============================================================
// FRESHNESS SCENARIOS
// ============================================================

#[test]
fn test_zone_on_last_candle_is_fresh() {
    let bars = daily(
        date(2024, 4, 1),
        &[
            (101.0, 102.0, 99.0, 100.5),
            (100.0, 100.5, 94.0, 95.0),
            (96.0, 102.5, 95.0, 102.0),
        ],
    );
    let engine = EngineBuilder::new().build().unwrap();
    let zones = engine.scan(&bars, Interval::OneDay, ZoneKind::Demand).unwrap();
    assert!(is_fresh(&bars, &zones[0]));
}

#[test]
fn test_engulfing_candle_spoils_zone() {
    let zone = demand_zone(Interval::OneDay, 96.0, 94.0, &[date(2024, 4, 2), date(2024, 4, 3)]);
    let later = vec![
        TestBar::new(date(2024, 4, 4), 101.0, 104.0, 100.0, 103.0),
        TestBar::new(date(2024, 4, 5), 95.0, 97.0, 93.0, 96.5),
    ];
    assert!(is_fresh(&later[..1], &zone));
    assert!(!is_fresh(&later, &zone));
}

// ============================================================
// MERGE AND RANKING SCENARIOS
// ============================================================

#[test]
fn test_daily_zone_inside_monthly_becomes_entry() {
    let monthly = demand_zone(Interval::OneMonth, 130.0, 120.0, &[date(2024, 1, 1), date(2024, 2, 1)]);
    let daily = demand_zone(Interval::OneDay, 128.0, 125.0, &[date(2024, 1, 16), date(2024, 1, 17)]);

    let mut book = ZoneBook::default();
    book.insert(IntervalZones::new(Interval::OneMonth, vec![monthly], vec![]));
    book.insert(IntervalZones::new(Interval::OneDay, vec![daily], vec![]));

    let ctx = RankingContext {
        as_of: date(2024, 3, 1),
        category: ZoneCategory::All,
        rules: MergeRules::default(),
    };
    let summary = build_summary(&book, 132.0, "TEST", &ctx);

    assert_eq!(summary.one_month_zone_range.as_deref(), Some("130.00-120.00"));
    assert_eq!(summary.entries.len(), 1);
    assert_eq!(summary.entries[0].entry, 128.0);
    assert_eq!(summary.entries[0].stop_loss, 125.0);
}

#[test]
fn test_weekly_zones_stand_in_for_missing_daily_entries() {
    let monthly = demand_zone(Interval::OneMonth, 130.0, 120.0, &[date(2024, 1, 1), date(2024, 2, 1)]);
    // daily zone far below the monthly band
    let daily = demand_zone(Interval::OneDay, 110.0, 105.0, &[date(2024, 1, 16), date(2024, 1, 17)]);
    let weekly_inside = demand_zone(Interval::OneWeek, 129.0, 126.0, &[date(2024, 6, 3), date(2024, 6, 10)]);
    // touches the band but pokes out of it
    let weekly_wide = demand_zone(Interval::OneWeek, 135.0, 118.0, &[date(2024, 6, 10), date(2024, 6, 17)]);

    let mut book = ZoneBook::default();
    book.insert(IntervalZones::new(Interval::OneMonth, vec![monthly], vec![]));
    book.insert(IntervalZones::new(Interval::OneWeek, vec![weekly_wide, weekly_inside], vec![]));
    book.insert(IntervalZones::new(Interval::OneDay, vec![daily], vec![]));

    let ctx = RankingContext {
        as_of: date(2024, 6, 28),
        category: ZoneCategory::All,
        rules: MergeRules::default(),
    };
    let summary = build_summary(&book, 132.0, "TEST", &ctx);

    assert_eq!(summary.one_month_zone_range.as_deref(), Some("130.00-120.00"));
    assert_eq!(summary.entries.len(), 1);
    assert_eq!(summary.entries[0].entry, 129.0);
    assert_eq!(summary.entries[0].stop_loss, 126.0);
}

#[test]
fn test_nearest_supply_zone_is_target() {
    let supply = |proximal: f64| {
        let candles = vec![
            ZoneCandle {
                date: date(2024, 2, 1),
                role: CandleRole::First,
                ohlc: OhlcSnapshot { open: proximal, high: proximal + 6.0, low: proximal - 1.0, close: proximal + 5.0 },
            },
            ZoneCandle {
                date: date(2024, 2, 2),
                role: CandleRole::Second,
                ohlc: OhlcSnapshot { open: proximal + 4.0, high: proximal + 4.5, low: proximal - 8.0, close: proximal - 7.0 },
            },
        ];
        Zone::new(1, ZoneKind::Supply, Interval::OneDay, proximal, proximal + 6.0, candles, 0).unwrap()
    };

    let mut book = ZoneBook::default();
    book.insert(IntervalZones::new(Interval::OneDay, vec![supply(200.0), supply(150.0)], vec![]));
    let ctx = RankingContext {
        as_of: date(2024, 3, 1),
        category: ZoneCategory::All,
        rules: MergeRules::default(),
    };

    let summary = build_summary(&book, 140.0, "TEST", &ctx);
    assert_eq!(summary.target, Some(150.0));
    assert!(summary.entries.is_empty());
    assert_eq!(summary.one_month_zone_range, None);
    assert_eq!(summary.three_month_zone_range, None);
}

// ============================================================
// END TO END
// ============================================================

#[test]
fn test_engine_merges_monthly_into_daily() {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = EngineBuilder::new().build().unwrap();
    let monthly = monthly_series();
    let daily = daily_series();

    let analysis = engine
        .analyze(&[(Interval::OneDay, daily.as_slice()), (Interval::OneMonth, monthly.as_slice())])
        .unwrap();

    let month_set = analysis.book.get(Interval::OneMonth).unwrap();
    assert_eq!(month_set.fresh.len(), 1);
    assert_eq!(month_set.fresh[0].proximal(), 122.0);
    assert_eq!(month_set.fresh[0].distal(), 120.0);

    let day_set = analysis.book.get(Interval::OneDay).unwrap();
    assert_eq!(day_set.native(ZoneCategory::Fresh).count(), 1);
    assert_eq!(day_set.fresh.len(), 2);
    assert_eq!(day_set.fresh[0].score(), 1);

    assert_eq!(analysis.last_close, 123.5);
    let summary = analysis.summary("Yahoo Finance");
    assert_eq!(summary.source_label, "Yahoo Finance");
    assert_eq!(summary.one_month_zone_range.as_deref(), Some("122.00-120.00"));
    assert_eq!(summary.three_month_zone_range, None);
    assert_eq!(summary.entries.len(), 1);
    assert_eq!(summary.entries[0].entry, 120.6);
    assert_eq!(summary.entries[0].stop_loss, 120.4);
    assert_eq!(summary.target, None);
}

#[test]
fn test_summary_below_monthly_zone_is_empty() {
    let engine = EngineBuilder::new().build().unwrap();
    let monthly = monthly_series();
    let daily = daily_series();
    let analysis = engine
        .analyze(&[(Interval::OneMonth, monthly.as_slice()), (Interval::OneDay, daily.as_slice())])
        .unwrap();

    // price under the monthly distal: the zone has not been reached
    let summary = analysis.summary_at(110.0, "X");
    assert!(summary.is_empty());
}

struct MockSource {
    bars: HashMap<Interval, Vec<Bar>>,
}

impl MarketDataSource for MockSource {
    fn fetch(&self, symbol: &str, interval: Interval, _lookback: &str) -> Result<Vec<Bar>> {
        match self.bars.get(&interval) {
            Some(bars) => Ok(bars.clone()),
            None => Err(ZoneError::DataSource {
                symbol: symbol.to_string(),
                interval,
                reason: "not available".into(),
            }),
        }
    }
}

fn to_bars(series: &[TestBar]) -> Vec<Bar> {
    series.iter().map(|b| Bar::new(b.d, b.o, b.h, b.l, b.c)).collect()
}

#[test]
fn test_analyze_symbol_skips_failed_fetches() {
    let mut bars = HashMap::new();
    bars.insert(Interval::OneMonth, to_bars(&monthly_series()));
    bars.insert(Interval::OneDay, to_bars(&daily_series()));
    bars.insert(Interval::OneWeek, Vec::new());
    let source = MockSource { bars };

    let engine = EngineBuilder::new().build().unwrap();
    let analysis = engine.analyze_symbol(&source, "ACME", "2y").unwrap();
    assert!(analysis.book.get(Interval::ThreeMonths).is_none());
    assert!(analysis.book.get(Interval::OneWeek).is_none());
    assert_eq!(analysis.summary("mock").entries.len(), 1);

    let nothing = MockSource { bars: HashMap::new() };
    assert!(matches!(
        engine.analyze_symbol(&nothing, "ACME", "2y"),
        Err(ZoneError::NoData { supplied: 0 })
    ));
}

#[test]
fn test_summary_feeds_narrative() {
    let engine = EngineBuilder::new().build().unwrap();
    let monthly = monthly_series();
    let daily = daily_series();
    let summary = engine
        .analyze(&[(Interval::OneMonth, monthly.as_slice()), (Interval::OneDay, daily.as_slice())])
        .unwrap()
        .summary("ACME");

    let generator = |prompt: &str, zones: &serde_json::Value| -> Result<String> {
        assert!(prompt.contains("User query: buy?"));
        Ok(format!("{} entries", zones["entries"].as_array().map_or(0, |e| e.len())))
    };
    assert_eq!(narrate(&generator, Some("buy?"), &summary).unwrap(), "1 entries");
}

#[test]
fn test_zone_report_lists_candles() {
    let engine = EngineBuilder::new().build().unwrap();
    let daily = daily_series();
    let zones = engine.scan(&daily, Interval::OneDay, ZoneKind::Demand).unwrap();
    let report = zones[0].to_string();
    assert!(report.contains("Date: 2024-01-03, Type: First, Open: 121.60"));
    assert!(report.contains("Date: 2024-01-04, Type: Second"));
    assert!(report.ends_with("Proximal: 120.60, Distal: 120.40, Score: 1"));
}

#[test]
fn test_scan_parallel_over_symbols() {
    let engine = EngineBuilder::new().build().unwrap();
    let monthly = monthly_series();
    let daily = daily_series();
    let series = [(Interval::OneMonth, monthly.as_slice()), (Interval::OneDay, daily.as_slice())];
    let instruments = vec![("A", &series[..]), ("B", &series[..])];

    let (ok, err) = scan_parallel(&engine, instruments);
    assert_eq!(ok.len(), 2);
    assert!(err.is_empty());
    assert_eq!(ok[0].analysis.book, ok[1].analysis.book);
}

#[test]
fn test_external_zone_data_normalizes() {
    let engine = EngineBuilder::new().build().unwrap();
    let daily = daily_series();
    let zones = engine.scan(&daily, Interval::OneDay, ZoneKind::Demand).unwrap();

    let exported = serde_json::json!({
        "1d": { "fresh": serde_json::to_value(&zones).unwrap(), "all": [{"proximal": "n/a"}] },
        "1wk": "missing"
    });
    let restored = normalize_zones(&ZoneCollection::from(exported));
    assert_eq!(restored, zones);
}

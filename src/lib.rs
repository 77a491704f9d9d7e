//! # zonescope - supply and demand zone detection
//!
//! Finds demand and supply zones in OHLC series, checks whether price has
//! revisited them, folds higher-timeframe zones into lower timeframes and
//! ranks the result into a compact, JSON-ready summary.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, NaiveDate};
//! use zonescope::prelude::*;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let daily: Vec<Bar> = (0..60)
//!     .map(|i| {
//!         let p = 100.0 + (i % 7) as f64;
//!         Bar::new(start + Duration::days(i), p, p + 2.0, p - 2.0, p + 0.5)
//!     })
//!     .collect();
//!
//! let engine = EngineBuilder::new().build().unwrap();
//! let analysis = engine.analyze(&[(Interval::OneDay, daily.as_slice())]).unwrap();
//! let summary = analysis.summary("DEMO");
//! let json = serde_json::to_string(&summary).unwrap();
//! assert!(json.contains("sourceLabel"));
//! ```

use chrono::NaiveDate;
use log::{debug, warn};

pub mod classify;
pub mod collab;
pub mod config;
pub mod freshness;
pub mod interval;
pub mod merge;
pub mod params;
pub mod raw;
pub mod scanner;
pub mod summary;
pub mod zone;

pub mod prelude {
    pub use crate::{
        // Classifier
        classify::{classify, ClassifiedCandle, ClassifierConfig},
        // Collaborators
        collab::{MarketDataSource, Message, NarrativeGenerator, NarrativeRequest, Role},
        // Configuration
        config::{ConfigFormat, ZoneConfig},
        // Freshness
        freshness::{is_fresh, retain_fresh},
        interval::{Interval, IntervalClass},
        // Merging
        merge::{
            is_contained_in, merge_higher_into_lower, select_contained, Containment,
            EntrySource, IntervalZones, MergeRules, TimeframeAccumulator, ZoneBook,
            ZoneCategory,
        },
        params::{get_count, get_multiple, get_ratio, ParamMeta, ParamType, Parameterized},
        raw::{normalize_zones, RawZone, ZoneCollection},
        // Parallel
        scan_parallel,
        scanner::{ScanRules, Scanner},
        summary::{build_summary, nearest_zone, Entry, RankingContext, Summary},
        zone::{CandleRole, OhlcSnapshot, Zone, ZoneCandle, ZoneKind},
        // Engine
        Analysis,
        Bar,
        CandleCount,
        EngineBuilder,
        Multiple,
        OHLCExt,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        ZoneEngine,
        ZoneError,
        OHLC,
    };
}

use classify::ClassifiedCandle;
use collab::MarketDataSource;
use config::ZoneConfig;
use interval::Interval;
use merge::{IntervalZones, MergeRules, TimeframeAccumulator, ZoneBook, ZoneCategory};
use scanner::Scanner;
use summary::{RankingContext, Summary};
use zone::ZoneKind;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ZoneError>;

/// Errors that can occur during zone analysis
#[derive(Debug, Clone, thiserror::Error)]
pub enum ZoneError {
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

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Config file error: {0}")]
    ConfigIo(String),

    #[error("Invalid OHLC at index {index}: {reason}")]
    InvalidOHLC { index: usize, reason: &'static str },

    #[error("Series dates not strictly ascending at index {index}")]
    UnorderedSeries { index: usize },

    #[error("Empty series for interval {interval}")]
    EmptySeries { interval: Interval },

    #[error("No usable series among {supplied} supplied")]
    NoData { supplied: usize },

    #[error("Unknown interval: {0}")]
    UnknownInterval(String),

    #[error("Interval {higher} is not coarser than {lower}")]
    IntervalOrder { lower: Interval, higher: Interval },

    #[error("Malformed zone: {0}")]
    MalformedZone(String),

    #[error("Data source failed for {symbol} {interval}: {reason}")]
    DataSource {
        symbol: String,
        interval: Interval,
        reason: String,
    },

    #[error("Narrative generation failed: {0}")]
    Narrative(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Fraction in range 0.0..=1.0 (gap thresholds)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(ZoneError::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ZoneError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Non-negative multiplier (wick size relative to body)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Multiple(f64);

impl Multiple {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(ZoneError::InvalidValue("Multiple cannot be NaN or infinite"));
        }
        if value < 0.0 {
            return Err(ZoneError::OutOfRange {
                field: "Multiple",
                value,
                min: 0.0,
                max: f64::MAX,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Multiple {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Multiple {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Multiple::new(value).map_err(serde::de::Error::custom)
    }
}

/// Candle count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CandleCount(usize);

impl CandleCount {
    /// Create a new CandleCount, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(ZoneError::InvalidValue("CandleCount must be > 0"));
        }
        Ok(Self(value))
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

impl serde::Serialize for CandleCount {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for CandleCount {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        CandleCount::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLC TRAITS
// ============================================================

/// Core dated OHLC bar trait
pub trait OHLC {
    fn date(&self) -> NaiveDate;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
}

impl<T: OHLC + ?Sized> OHLC for &T {
    fn date(&self) -> NaiveDate {
        (**self).date()
    }

    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }
}

/// Extension trait with computed properties for OHLC data
pub trait OHLCExt: OHLC {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn body_top(&self) -> f64 {
        self.open().max(self.close())
    }

    #[inline]
    fn body_bottom(&self) -> f64 {
        self.open().min(self.close())
    }

    #[inline]
    fn upper_wick(&self) -> f64 {
        self.high() - self.body_top()
    }

    #[inline]
    fn lower_wick(&self) -> f64 {
        self.body_bottom() - self.low()
    }

    /// Green candle
    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    /// Red candle
    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate OHLC data consistency; `index` is reported back in the error
    fn validate(&self, index: usize) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(ZoneError::InvalidOHLC {
                index,
                reason: "NaN in OHLC",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(ZoneError::InvalidOHLC {
                index,
                reason: "Infinite value in OHLC",
            });
        }
        if self.high() < self.low() {
            return Err(ZoneError::InvalidOHLC {
                index,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLC + ?Sized> OHLCExt for T {}

/// Validate every bar and require strictly ascending dates
pub fn validate_series<T: OHLC>(bars: &[T]) -> Result<()> {
    for (index, bar) in bars.iter().enumerate() {
        bar.validate(index)?;
        if index > 0 && bar.date() <= bars[index - 1].date() {
            return Err(ZoneError::UnorderedSeries { index });
        }
    }
    Ok(())
}

/// Plain dated OHLC bar, as delivered by a market-data source
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
        }
    }
}

impl OHLC for Bar {
    fn date(&self) -> NaiveDate {
        self.date
    }

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
}

// ============================================================
// ZONE ENGINE
// ============================================================

/// Classifies, scans, filters and merges zones across a timeframe plan
#[derive(Debug, Clone)]
pub struct ZoneEngine {
    config: ZoneConfig,
    scanner: Scanner,
    validate_data: bool,
}

impl ZoneEngine {
    #[inline]
    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Annotate bars with the derived candle features
    #[inline]
    pub fn classify<T: OHLC>(&self, bars: &[T]) -> Vec<ClassifiedCandle> {
        classify::classify(bars, &self.config.classifier)
    }

    /// Scan one interval for zones of one kind
    pub fn scan<T: OHLC>(&self, bars: &[T], interval: Interval, kind: ZoneKind) -> Result<Vec<zone::Zone>> {
        self.check_series(bars, interval)?;
        let candles = self.classify(bars);
        Ok(self.scanner.scan(&candles, interval, kind))
    }

    /// Scan one interval for both zone kinds and split off the fresh subset
    pub fn scan_interval<T: OHLC>(&self, bars: &[T], interval: Interval) -> Result<IntervalZones> {
        self.check_series(bars, interval)?;
        let candles = self.classify(bars);

        let mut all = self.scanner.scan(&candles, interval, ZoneKind::Demand);
        all.extend(self.scanner.scan(&candles, interval, ZoneKind::Supply));
        let fresh = freshness::retain_fresh(bars, &all);

        debug!(
            "{interval}: {} bars, {} zones, {} fresh",
            bars.len(),
            all.len(),
            fresh.len()
        );
        Ok(IntervalZones::new(interval, all, fresh))
    }

    /// Process every planned interval coarsest first, folding retained
    /// higher-timeframe zones into the configured target intervals.
    ///
    /// Intervals with missing, empty or invalid series are skipped. Fails
    /// only when no interval could be processed at all.
    pub fn analyze<T: OHLC>(&self, series: &[(Interval, &[T])]) -> Result<Analysis> {
        for (interval, _) in series {
            if !self.config.timeframes.contains(interval) {
                warn!("{interval} is not in the timeframe plan, ignoring");
            }
        }

        let mut accumulator = TimeframeAccumulator::new();
        let mut book = ZoneBook::default();
        let mut latest: Option<(NaiveDate, f64)> = None;

        for &interval in &self.config.timeframes {
            let Some((_, bars)) = series.iter().find(|(i, _)| *i == interval) else {
                debug!("no series supplied for {interval}");
                continue;
            };
            let scanned = match self.scan_interval(bars, interval) {
                Ok(zones) => zones,
                Err(e) => {
                    warn!("skipping {interval}: {e}");
                    continue;
                }
            };

            let (next, merged) = accumulator.absorb(scanned, &self.config.merge);
            accumulator = next;
            book.insert(merged);

            if let Some(last) = bars.last() {
                latest = Some((last.date(), last.close()));
            }
        }

        let (as_of, last_close) = latest.ok_or(ZoneError::NoData {
            supplied: series.len(),
        })?;
        Ok(Analysis {
            book,
            as_of,
            last_close,
            merge: self.config.merge.clone(),
        })
    }

    /// Fetch every planned interval from `source` and analyze the result.
    /// Failed or empty fetches are logged and skipped.
    pub fn analyze_symbol<S: MarketDataSource + ?Sized>(
        &self,
        source: &S,
        symbol: &str,
        lookback: &str,
    ) -> Result<Analysis> {
        let fetched: Vec<(Interval, Vec<Bar>)> = self
            .config
            .timeframes
            .iter()
            .filter_map(|&interval| match source.fetch(symbol, interval, lookback) {
                Ok(bars) if bars.is_empty() => {
                    warn!("{symbol} {interval}: data source returned no bars");
                    None
                }
                Ok(bars) => Some((interval, bars)),
                Err(e) => {
                    warn!("{symbol} {interval}: {e}");
                    None
                }
            })
            .collect();

        let series: Vec<(Interval, &[Bar])> = fetched
            .iter()
            .map(|(interval, bars)| (*interval, bars.as_slice()))
            .collect();
        self.analyze(&series)
    }

    fn check_series<T: OHLC>(&self, bars: &[T], interval: Interval) -> Result<()> {
        if bars.is_empty() {
            return Err(ZoneError::EmptySeries { interval });
        }
        if self.validate_data {
            validate_series(bars)?;
        }
        Ok(())
    }
}

/// Outcome of a multi-interval analysis
#[derive(Debug, Clone)]
pub struct Analysis {
    pub book: ZoneBook,
    /// Date of the last bar of the finest processed interval
    pub as_of: NaiveDate,
    /// Close of that bar, used as current price
    pub last_close: f64,
    merge: MergeRules,
}

impl Analysis {
    /// Summary of the fresh zones at the last close
    pub fn summary(&self, label: &str) -> Summary {
        self.summary_for(ZoneCategory::Fresh, self.last_close, label)
    }

    /// Summary of the fresh zones at an explicit price
    pub fn summary_at(&self, current_price: f64, label: &str) -> Summary {
        self.summary_for(ZoneCategory::Fresh, current_price, label)
    }

    pub fn summary_for(&self, category: ZoneCategory, current_price: f64, label: &str) -> Summary {
        let ctx = RankingContext {
            as_of: self.as_of,
            category,
            rules: self.merge.clone(),
        };
        summary::build_summary(&self.book, current_price, label, &ctx)
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating ZoneEngine instances
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    config: ZoneConfig,
    validate_data: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: ZoneConfig::default(),
            validate_data: true,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ZoneConfig) -> Self {
        self.config = config;
        self
    }

    pub fn classifier(mut self, classifier: classify::ClassifierConfig) -> Self {
        self.config.classifier = classifier;
        self
    }

    pub fn scan_rules(mut self, rules: scanner::ScanRules) -> Self {
        self.config.scan = rules;
        self
    }

    pub fn merge_rules(mut self, rules: MergeRules) -> Self {
        self.config.merge = rules;
        self
    }

    /// Timeframes to scan, coarsest first
    pub fn timeframes(mut self, timeframes: impl IntoIterator<Item = Interval>) -> Self {
        self.config.timeframes = timeframes.into_iter().collect();
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<ZoneEngine> {
        self.config.validate()?;
        Ok(ZoneEngine {
            scanner: Scanner::new(self.config.scan.clone()),
            config: self.config,
            validate_data: self.validate_data,
        })
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of analyzing a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub analysis: Analysis,
}

/// Error from analyzing a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: ZoneError,
}

/// Parallel analysis of multiple instruments
pub fn scan_parallel<'a, T, I>(engine: &ZoneEngine, instruments: I) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLC + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [(Interval, &'a [T])])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, series)| {
            engine
                .analyze(series)
                .map(|analysis| ScanResult {
                    symbol: symbol.to_string(),
                    analysis,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

//! Candle classification
//!
//! Annotates every bar with wick/body measurements and the base, tight and gap
//! flags the zone scanner works from. Each annotation depends only on the bar
//! itself and the close of the bar before it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{zone::ZoneKind, Multiple, OHLCExt, Ratio, OHLC};

/// Thresholds for candle classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// A candle is a base candle when either wick exceeds `body * base_wick_multiple`
    pub base_wick_multiple: Multiple,
    /// A candle is tight when both wicks stay under `body * exciting_wick_multiple`
    pub exciting_wick_multiple: Multiple,
    /// Open at or above `prev_close * (1 + gap_up_pct)` is a gap up
    pub gap_up_pct: Ratio,
    /// Open at or below `prev_close * (1 - gap_down_pct)` is a gap down
    pub gap_down_pct: Ratio,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_wick_multiple: Multiple::new_const(0.5),
            exciting_wick_multiple: Multiple::new_const(0.5),
            gap_up_pct: Ratio::new_const(0.03),
            gap_down_pct: Ratio::new_const(0.03),
        }
    }
}

/// A bar with its derived features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedCandle {
    /// Position in the source series
    pub index: usize,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub body: f64,
    pub upper_wick: f64,
    pub lower_wick: f64,
    /// Indecisive: a wick dominates the body
    pub is_base: bool,
    /// Decisive: both wicks small relative to the body
    pub is_tight: bool,
    pub is_gap_up: bool,
    pub is_gap_down: bool,
}

impl ClassifiedCandle {
    /// Gap in the direction a zone of `kind` departs (up for demand, down for supply)
    #[inline]
    pub fn gapped(&self, kind: ZoneKind) -> bool {
        match kind {
            ZoneKind::Demand => self.is_gap_up,
            ZoneKind::Supply => self.is_gap_down,
        }
    }

    /// Exciting candle: tight, or gapped in the direction of `kind`
    #[inline]
    pub fn is_exciting(&self, kind: ZoneKind) -> bool {
        self.is_tight || self.gapped(kind)
    }
}

impl OHLC for ClassifiedCandle {
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

/// Classify a whole series. The first bar never counts as a gap.
pub fn classify<T: OHLC>(bars: &[T], config: &ClassifierConfig) -> Vec<ClassifiedCandle> {
    let base = config.base_wick_multiple.get();
    let exciting = config.exciting_wick_multiple.get();
    let gap_up = 1.0 + config.gap_up_pct.get();
    let gap_down = 1.0 - config.gap_down_pct.get();

    let mut prev_close: Option<f64> = None;
    bars.iter()
        .enumerate()
        .map(|(index, bar)| {
            let body = bar.body();
            let upper_wick = bar.upper_wick();
            let lower_wick = bar.lower_wick();
            let open = bar.open();

            let candle = ClassifiedCandle {
                index,
                date: bar.date(),
                open,
                high: bar.high(),
                low: bar.low(),
                close: bar.close(),
                body,
                upper_wick,
                lower_wick,
                is_base: upper_wick > base * body || lower_wick > base * body,
                is_tight: upper_wick < exciting * body && lower_wick < exciting * body,
                is_gap_up: prev_close.is_some_and(|pc| open >= pc * gap_up),
                is_gap_down: prev_close.is_some_and(|pc| open <= pc * gap_down),
            };
            prev_close = Some(candle.close);
            candle
        })
        .collect()
}

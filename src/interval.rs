//! Timeframes a candle series can be sampled on.
//!
//! Intervals order from finest to coarsest, so `Interval::OneMonth > Interval::OneDay`.
//! String forms follow the usual market-data conventions (`"1d"`, `"1wk"`, `"1mo"`, ...).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ZoneError;

/// Candle timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1wk")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl Interval {
    /// Every supported interval, finest first
    pub const ALL: [Interval; 7] = [
        Interval::OneDay,
        Interval::FiveDays,
        Interval::OneWeek,
        Interval::OneMonth,
        Interval::ThreeMonths,
        Interval::SixMonths,
        Interval::OneYear,
    ];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneDay => "1d",
            Interval::FiveDays => "5d",
            Interval::OneWeek => "1wk",
            Interval::OneMonth => "1mo",
            Interval::ThreeMonths => "3mo",
            Interval::SixMonths => "6mo",
            Interval::OneYear => "1y",
        }
    }

    #[inline]
    pub fn is_coarser_than(self, other: Interval) -> bool {
        self > other
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str() == normalized)
            .ok_or_else(|| ZoneError::UnknownInterval(s.to_string()))
    }
}

/// Scanning class of an interval.
///
/// Extended intervals allow longer base runs and require the closing candle
/// to break out of the base range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalClass {
    Standard,
    Extended,
}

//! Zone model
//!
//! A [`Zone`] is immutable once built. The scanner is the only producer of
//! zones from price data; externally supplied zones go through
//! [`Zone::new`] (directly or via [`crate::raw::RawZone`]) and are validated
//! there, so the rest of the crate can rely on the band orientation and the
//! formation-date ordering.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{interval::Interval, raw::RawZone, Result, ZoneError, OHLC};

/// Direction of a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Origin of a rally; support
    Demand,
    /// Origin of a drop; resistance
    Supply,
}

impl ZoneKind {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneKind::Demand => "Demand",
            ZoneKind::Supply => "Supply",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a candle plays inside a zone formation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleRole {
    First,
    Base,
    Second,
}

impl fmt::Display for CandleRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CandleRole::First => "First",
            CandleRole::Base => "Base",
            CandleRole::Second => "Second",
        })
    }
}

/// OHLC prices rounded to cents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcSnapshot {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl OhlcSnapshot {
    pub fn of<T: OHLC + ?Sized>(bar: &T) -> Self {
        Self {
            open: round2(bar.open()),
            high: round2(bar.high()),
            low: round2(bar.low()),
            close: round2(bar.close()),
        }
    }

    fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite())
    }
}

/// One candle of a zone's audit trail
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneCandle {
    pub date: NaiveDate,
    pub role: CandleRole,
    pub ohlc: OhlcSnapshot,
}

/// A demand or supply zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawZone")]
pub struct Zone {
    id: u32,
    kind: ZoneKind,
    interval: Interval,
    proximal: f64,
    distal: f64,
    formation_dates: Vec<NaiveDate>,
    candles: Vec<ZoneCandle>,
    score: u32,
}

impl Zone {
    /// Build a zone from external data, checking every structural invariant.
    pub fn new(
        id: u32,
        kind: ZoneKind,
        interval: Interval,
        proximal: f64,
        distal: f64,
        candles: Vec<ZoneCandle>,
        score: u32,
    ) -> Result<Self> {
        if !proximal.is_finite() || !distal.is_finite() {
            return Err(ZoneError::MalformedZone(format!(
                "zone {id}: non-finite bounds ({proximal}, {distal})"
            )));
        }
        let inverted = match kind {
            ZoneKind::Demand => distal > proximal,
            ZoneKind::Supply => proximal > distal,
        };
        if inverted {
            return Err(ZoneError::MalformedZone(format!(
                "zone {id}: {kind} band inverted (proximal {proximal}, distal {distal})"
            )));
        }
        if candles.is_empty() {
            return Err(ZoneError::MalformedZone(format!("zone {id}: no formation candles")));
        }
        if candles.windows(2).any(|w| w[1].date <= w[0].date) {
            return Err(ZoneError::MalformedZone(format!(
                "zone {id}: formation dates not strictly increasing"
            )));
        }
        if candles.iter().any(|c| !c.ohlc.is_finite()) {
            return Err(ZoneError::MalformedZone(format!("zone {id}: non-finite candle prices")));
        }
        Ok(Self::formed(id, kind, interval, proximal, distal, candles, score))
    }

    /// Scanner-side constructor; the scanner upholds the invariants itself.
    pub(crate) fn formed(
        id: u32,
        kind: ZoneKind,
        interval: Interval,
        proximal: f64,
        distal: f64,
        candles: Vec<ZoneCandle>,
        score: u32,
    ) -> Self {
        let formation_dates = candles.iter().map(|c| c.date).collect();
        Self {
            id,
            kind,
            interval,
            proximal,
            distal,
            formation_dates,
            candles,
            score,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> ZoneKind {
        self.kind
    }

    #[inline]
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Boundary nearest to price at formation
    #[inline]
    pub fn proximal(&self) -> f64 {
        self.proximal
    }

    /// Boundary farthest from price at formation
    #[inline]
    pub fn distal(&self) -> f64 {
        self.distal
    }

    #[inline]
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn formation_dates(&self) -> &[NaiveDate] {
        &self.formation_dates
    }

    pub fn candles(&self) -> &[ZoneCandle] {
        &self.candles
    }

    /// Date of the first formation candle
    pub fn start_date(&self) -> NaiveDate {
        self.formation_dates[0]
    }

    /// Date of the closing formation candle
    pub fn end_date(&self) -> NaiveDate {
        self.formation_dates[self.formation_dates.len() - 1]
    }

    /// Price band as `(low, high)` regardless of kind
    #[inline]
    pub fn band(&self) -> (f64, f64) {
        match self.kind {
            ZoneKind::Demand => (self.distal, self.proximal),
            ZoneKind::Supply => (self.proximal, self.distal),
        }
    }

    /// True if this zone's band lies fully inside `outer`'s band
    pub fn band_within(&self, outer: &Zone) -> bool {
        let (low, high) = self.band();
        let (outer_low, outer_high) = outer.band();
        low >= outer_low && high <= outer_high
    }

    #[inline]
    pub fn distance_to(&self, price: f64) -> f64 {
        (self.proximal - price).abs()
    }

    /// Bounds finite and formation trail consistent
    pub fn is_well_formed(&self) -> bool {
        self.proximal.is_finite()
            && self.distal.is_finite()
            && !self.formation_dates.is_empty()
            && self.formation_dates.len() == self.candles.len()
    }

    /// Key used to drop the same zone arriving twice through a merge
    pub(crate) fn identity(&self) -> (ZoneKind, Interval, NaiveDate, NaiveDate, u64, u64) {
        (
            self.kind,
            self.interval,
            self.start_date(),
            self.end_date(),
            self.proximal.to_bits(),
            self.distal.to_bits(),
        )
    }
}

impl TryFrom<RawZone> for Zone {
    type Error = ZoneError;

    fn try_from(raw: RawZone) -> Result<Self> {
        raw.into_zone()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Zone {} ({}, {}):", self.id, self.kind, self.interval)?;
        for candle in &self.candles {
            let o = candle.ohlc;
            writeln!(
                f,
                "  Date: {}, Type: {}, Open: {:.2}, High: {:.2}, Low: {:.2}, Close: {:.2}",
                candle.date.format("%Y-%m-%d"),
                candle.role,
                o.open,
                o.high,
                o.low,
                o.close
            )?;
        }
        write!(
            f,
            "  Proximal: {:.2}, Distal: {:.2}, Score: {}",
            self.proximal, self.distal, self.score
        )
    }
}

/// Round to two decimals
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

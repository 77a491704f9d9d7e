//! Zone pattern scanner
//!
//! Patterns recognized (demand shown; supply is the mirror image):
//!
//! - **Two-candle**: red exciting candle followed by a green exciting candle
//!   that closes above the first candle's open.
//! - **Base run**: an exciting or gap-up first candle, one or more base
//!   candles, then a green exciting or gap-up closing candle.
//!
//! After a zone is emitted, its score counts the consecutive departure
//! candles immediately following the closing candle.

pub mod helpers;
pub mod machine;

use serde::{Deserialize, Serialize};

use crate::{
    classify::ClassifiedCandle,
    interval::{Interval, IntervalClass},
    zone::{CandleRole, OhlcSnapshot, Zone, ZoneCandle, ZoneKind},
    CandleCount,
};
use helpers::is_departure_candle;
use machine::{Formation, MachineRules};

/// Interval-dependent scanning rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRules {
    /// Longest base run on standard intervals
    pub max_base_candles: CandleCount,
    /// Longest base run on extended intervals
    pub max_base_candles_extended: CandleCount,
    /// Intervals scanned with the extended rules (longer runs, breakout check)
    pub extended_intervals: Vec<Interval>,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            max_base_candles: CandleCount::new_const(3),
            max_base_candles_extended: CandleCount::new_const(5),
            extended_intervals: vec![
                Interval::OneMonth,
                Interval::ThreeMonths,
                Interval::SixMonths,
                Interval::OneYear,
            ],
        }
    }
}

impl ScanRules {
    pub fn class_of(&self, interval: Interval) -> IntervalClass {
        if self.extended_intervals.contains(&interval) {
            IntervalClass::Extended
        } else {
            IntervalClass::Standard
        }
    }

    pub fn max_base_for(&self, interval: Interval) -> usize {
        match self.class_of(interval) {
            IntervalClass::Standard => self.max_base_candles.get(),
            IntervalClass::Extended => self.max_base_candles_extended.get(),
        }
    }

    fn machine_rules(&self, interval: Interval, kind: ZoneKind) -> MachineRules {
        MachineRules {
            kind,
            max_base: self.max_base_for(interval),
            require_breakout: self.class_of(interval) == IntervalClass::Extended,
        }
    }
}

/// Turns classified candle series into zones
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    rules: ScanRules,
}

impl Scanner {
    pub fn new(rules: ScanRules) -> Self {
        Self { rules }
    }

    #[inline]
    pub fn rules(&self) -> &ScanRules {
        &self.rules
    }

    /// Scan one classified series for zones of one kind. Ids start at 1.
    pub fn scan(&self, candles: &[ClassifiedCandle], interval: Interval, kind: ZoneKind) -> Vec<Zone> {
        let rules = self.rules.machine_rules(interval, kind);
        machine::run(candles, &rules)
            .into_iter()
            .zip(1u32..)
            .map(|(formation, id)| {
                let score = follow_through(candles, formation.close.index + 1, kind);
                build_zone(id, interval, formation, score)
            })
            .collect()
    }

    pub fn scan_demand(&self, candles: &[ClassifiedCandle], interval: Interval) -> Vec<Zone> {
        self.scan(candles, interval, ZoneKind::Demand)
    }

    pub fn scan_supply(&self, candles: &[ClassifiedCandle], interval: Interval) -> Vec<Zone> {
        self.scan(candles, interval, ZoneKind::Supply)
    }
}

/// Consecutive departure candles starting at `from`
pub fn follow_through(candles: &[ClassifiedCandle], from: usize, kind: ZoneKind) -> u32 {
    candles
        .get(from..)
        .unwrap_or_default()
        .iter()
        .take_while(|c| is_departure_candle(c, kind))
        .count() as u32
}

fn build_zone(id: u32, interval: Interval, formation: Formation, score: u32) -> Zone {
    let last = formation.bases.len() + 1;
    let candles = formation
        .candles()
        .enumerate()
        .map(|(pos, c)| ZoneCandle {
            date: c.date,
            role: match pos {
                0 => CandleRole::First,
                p if p == last => CandleRole::Second,
                _ => CandleRole::Base,
            },
            ohlc: OhlcSnapshot::of(c),
        })
        .collect();
    Zone::formed(
        id,
        formation.kind,
        interval,
        formation.proximal,
        formation.distal,
        candles,
        score,
    )
}

//! Direction-aware candle predicates shared by the scanner.
//!
//! Every rule is written once for demand; supply reads the same rule through
//! the mirror (green/red, low/high and gap-up/gap-down swapped).

use crate::{classify::ClassifiedCandle, zone::ZoneKind, OHLCExt};

/// Candle colored in the zone's departure direction (green for demand)
#[inline]
pub fn is_with_move(c: &ClassifiedCandle, kind: ZoneKind) -> bool {
    match kind {
        ZoneKind::Demand => c.is_bullish(),
        ZoneKind::Supply => c.is_bearish(),
    }
}

/// Candle colored against the departure direction (red for demand)
#[inline]
pub fn is_against_move(c: &ClassifiedCandle, kind: ZoneKind) -> bool {
    is_with_move(c, opposite(kind))
}

#[inline]
fn opposite(kind: ZoneKind) -> ZoneKind {
    match kind {
        ZoneKind::Demand => ZoneKind::Supply,
        ZoneKind::Supply => ZoneKind::Demand,
    }
}

/// Can open a general pattern: exciting or gapped
#[inline]
pub fn is_first_candle(c: &ClassifiedCandle, kind: ZoneKind) -> bool {
    c.is_exciting(kind)
}

/// Consolidation candle: base, and neither exciting nor gapped
#[inline]
pub fn is_base_candle(c: &ClassifiedCandle, kind: ZoneKind) -> bool {
    c.is_base && !c.is_exciting(kind) && !c.gapped(kind)
}

/// Confirms a pattern or extends its score: exciting in the move direction, or gapped
#[inline]
pub fn is_departure_candle(c: &ClassifiedCandle, kind: ZoneKind) -> bool {
    (c.is_exciting(kind) && is_with_move(c, kind)) || c.gapped(kind)
}

/// Opening leg of the two-candle pattern
#[inline]
pub fn is_fast_start(c: &ClassifiedCandle, kind: ZoneKind) -> bool {
    c.is_exciting(kind) && is_against_move(c, kind)
}

/// Closing leg of the two-candle pattern: exciting in the move direction and
/// closing beyond the first candle's open
#[inline]
pub fn is_fast_close(first: &ClassifiedCandle, c: &ClassifiedCandle, kind: ZoneKind) -> bool {
    let beyond = match kind {
        ZoneKind::Demand => c.close > first.open,
        ZoneKind::Supply => c.close < first.open,
    };
    c.is_exciting(kind) && is_with_move(c, kind) && beyond
}

/// Body edge facing the departure: body top for demand, body bottom for supply
#[inline]
pub fn body_edge(c: &ClassifiedCandle, kind: ZoneKind) -> f64 {
    match kind {
        ZoneKind::Demand => c.body_top(),
        ZoneKind::Supply => c.body_bottom(),
    }
}

/// Price extreme away from the departure: low for demand, high for supply
#[inline]
pub fn far_extreme(c: &ClassifiedCandle, kind: ZoneKind) -> f64 {
    match kind {
        ZoneKind::Demand => c.low,
        ZoneKind::Supply => c.high,
    }
}

/// The farther of two prices away from the departure
#[inline]
pub fn farthest(a: f64, b: f64, kind: ZoneKind) -> f64 {
    match kind {
        ZoneKind::Demand => a.min(b),
        ZoneKind::Supply => a.max(b),
    }
}

/// Whether the first candle's extreme belongs to the distal computation:
/// only when it is colored against the move and did not gap
#[inline]
pub fn first_extends_distal(first: &ClassifiedCandle, kind: ZoneKind) -> bool {
    is_against_move(first, kind) && !first.gapped(kind)
}

/// The closing candle must close past the base run's far extreme
pub fn breaks_out(close: &ClassifiedCandle, bases: &[ClassifiedCandle], kind: ZoneKind) -> bool {
    let Some(extreme) = bases
        .iter()
        .map(|b| far_extreme(b, kind))
        .reduce(|a, b| farthest(a, b, kind))
    else {
        return true;
    };
    match kind {
        ZoneKind::Demand => close.close > extreme,
        ZoneKind::Supply => close.close < extreme,
    }
}

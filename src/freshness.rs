//! Freshness evaluation
//!
//! A zone is fresh while no candle after its last formation date has traded
//! back into its band. Freshness is never stored on the zone; it is
//! recomputed against whatever series snapshot the caller passes in.

use crate::{
    zone::{Zone, ZoneKind},
    OHLC,
};

/// True if `bar`'s range overlaps the zone's band
#[inline]
pub fn revisits<T: OHLC + ?Sized>(bar: &T, zone: &Zone) -> bool {
    match zone.kind() {
        ZoneKind::Demand => bar.low() <= zone.proximal() && bar.high() >= zone.distal(),
        ZoneKind::Supply => bar.high() >= zone.proximal() && bar.low() <= zone.distal(),
    }
}

/// True if no bar dated after the zone's close revisits it.
///
/// A zone closed on the last bar of `series` is trivially fresh.
pub fn is_fresh<T: OHLC>(series: &[T], zone: &Zone) -> bool {
    let closed = zone.end_date();
    !series
        .iter()
        .filter(|bar| bar.date() > closed)
        .any(|bar| revisits(bar, zone))
}

/// Fresh subset of `zones`, in input order
pub fn retain_fresh<T: OHLC>(series: &[T], zones: &[Zone]) -> Vec<Zone> {
    zones
        .iter()
        .filter(|zone| is_fresh(series, zone))
        .cloned()
        .collect()
}

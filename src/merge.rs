//! Cross-timeframe merging
//!
//! Intervals are processed coarsest first. A [`TimeframeAccumulator`] is
//! threaded through that loop: each step stores the zones of retained
//! intervals (quarterly, monthly by default) and appends every coarser
//! retained set into the target intervals (weekly, daily). The accumulator
//! is a plain value; `absorb` consumes it and returns the next one.
//!
//! The containment rules used by ranking also live here:
//!
//! - [`is_contained_in`]: band nesting plus the formation-date window
//! - [`fallback_qualifies`]: the relaxed weekly rule used when no daily zone
//!   qualifies
//! - [`select_contained`]: primary selection with the weekly fallback

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    interval::Interval,
    zone::{Zone, ZoneKind},
    Result, ZoneError,
};

// ============================================================
// RULES
// ============================================================

/// Longest accepted fallback window, about a century
pub const MAX_FALLBACK_WINDOW_DAYS: u32 = 36_500;

/// Zone subset a consumer works from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneCategory {
    /// Every scanned zone
    All,
    /// Zones price has not revisited
    Fresh,
}

/// Which intervals feed which, and the reference timeframes used by ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeRules {
    /// Intervals whose zones are kept for appending into finer intervals
    pub retained_intervals: Vec<Interval>,
    /// Intervals that receive the retained zones
    pub target_intervals: Vec<Interval>,
    /// Recency window of the weekly fallback, in days
    pub fallback_window_days: u32,
    /// Reference timeframe of the one-month range
    pub monthly_reference: Interval,
    /// Reference timeframe of the three-month range
    pub quarterly_reference: Interval,
    /// Interval entries are drawn from
    pub entry_interval: Interval,
    /// Interval entries fall back to when no entry zone qualifies
    pub fallback_interval: Interval,
}

impl Default for MergeRules {
    fn default() -> Self {
        Self {
            retained_intervals: vec![Interval::ThreeMonths, Interval::OneMonth],
            target_intervals: vec![Interval::OneWeek, Interval::OneDay],
            fallback_window_days: 60,
            monthly_reference: Interval::OneMonth,
            quarterly_reference: Interval::ThreeMonths,
            entry_interval: Interval::OneDay,
            fallback_interval: Interval::OneWeek,
        }
    }
}

impl MergeRules {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_FALLBACK_WINDOW_DAYS).contains(&self.fallback_window_days) {
            return Err(ZoneError::OutOfRange {
                field: "merge.fallback_window_days",
                value: f64::from(self.fallback_window_days),
                min: 1.0,
                max: f64::from(MAX_FALLBACK_WINDOW_DAYS),
            });
        }
        for reference in [self.monthly_reference, self.quarterly_reference] {
            for finer in [self.entry_interval, self.fallback_interval] {
                if !reference.is_coarser_than(finer) {
                    return Err(ZoneError::IntervalOrder {
                        lower: finer,
                        higher: reference,
                    });
                }
            }
        }
        if let Some(both) = self
            .retained_intervals
            .iter()
            .find(|i| self.target_intervals.contains(i))
        {
            return Err(ZoneError::InvalidConfig(format!(
                "{both} is both retained and a merge target"
            )));
        }
        Ok(())
    }
}

// ============================================================
// ZONE SETS
// ============================================================

/// Zones of one interval, split by category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalZones {
    pub interval: Interval,
    pub all: Vec<Zone>,
    pub fresh: Vec<Zone>,
}

impl IntervalZones {
    pub fn new(interval: Interval, all: Vec<Zone>, fresh: Vec<Zone>) -> Self {
        Self {
            interval,
            all,
            fresh,
        }
    }

    #[inline]
    pub fn zones(&self, category: ZoneCategory) -> &[Zone] {
        match category {
            ZoneCategory::All => &self.all,
            ZoneCategory::Fresh => &self.fresh,
        }
    }

    pub fn demand(&self, category: ZoneCategory) -> impl Iterator<Item = &Zone> {
        self.of_kind(category, ZoneKind::Demand)
    }

    pub fn supply(&self, category: ZoneCategory) -> impl Iterator<Item = &Zone> {
        self.of_kind(category, ZoneKind::Supply)
    }

    fn of_kind(&self, category: ZoneCategory, kind: ZoneKind) -> impl Iterator<Item = &Zone> {
        self.zones(category).iter().filter(move |z| z.kind() == kind)
    }

    /// Zones formed on this set's own interval, excluding appended ones
    pub fn native(&self, category: ZoneCategory) -> impl Iterator<Item = &Zone> {
        let interval = self.interval;
        self.zones(category)
            .iter()
            .filter(move |z| z.interval() == interval)
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Merged zone sets of every processed interval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneBook {
    intervals: BTreeMap<Interval, IntervalZones>,
}

impl ZoneBook {
    pub fn insert(&mut self, zones: IntervalZones) {
        self.intervals.insert(zones.interval, zones);
    }

    pub fn get(&self, interval: Interval) -> Option<&IntervalZones> {
        self.intervals.get(&interval)
    }

    /// Zones of `interval` in `category`; empty if the interval is absent
    pub fn zones(&self, interval: Interval, category: ZoneCategory) -> &[Zone] {
        self.get(interval)
            .map(|z| z.zones(category))
            .unwrap_or_default()
    }

    /// Interval sets, coarsest first
    pub fn iter(&self) -> impl Iterator<Item = &IntervalZones> {
        self.intervals.values().rev()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

// ============================================================
// ACCUMULATOR
// ============================================================

/// Retained higher-timeframe zones, keyed by interval and category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeframeAccumulator {
    retained: BTreeMap<(Interval, ZoneCategory), Vec<Zone>>,
}

impl TimeframeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retained(&self, interval: Interval, category: ZoneCategory) -> &[Zone] {
        self.retained
            .get(&(interval, category))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Fold one freshly scanned interval into the accumulator.
    ///
    /// Returns the next accumulator and the interval's merged zone set.
    /// Only zones from strictly coarser retained intervals are appended.
    pub fn absorb(self, scanned: IntervalZones, rules: &MergeRules) -> (Self, IntervalZones) {
        let mut retained = self.retained;
        let interval = scanned.interval;

        let merged = if rules.target_intervals.contains(&interval) {
            let all = append_retained(scanned.all, &retained, interval, ZoneCategory::All);
            let fresh = append_retained(scanned.fresh, &retained, interval, ZoneCategory::Fresh);
            debug!(
                "{interval}: {} zones after merge ({} fresh)",
                all.len(),
                fresh.len()
            );
            IntervalZones::new(interval, all, fresh)
        } else {
            scanned
        };

        if rules.retained_intervals.contains(&interval) {
            let own = |category| merged.native(category).cloned().collect::<Vec<_>>();
            retained.insert((interval, ZoneCategory::All), own(ZoneCategory::All));
            retained.insert((interval, ZoneCategory::Fresh), own(ZoneCategory::Fresh));
        }

        (Self { retained }, merged)
    }
}

fn append_retained(
    lower: Vec<Zone>,
    retained: &BTreeMap<(Interval, ZoneCategory), Vec<Zone>>,
    interval: Interval,
    category: ZoneCategory,
) -> Vec<Zone> {
    retained
        .iter()
        .rev()
        .filter(|((higher, cat), _)| *cat == category && higher.is_coarser_than(interval))
        .fold(lower, |acc, (_, higher)| append_unique(acc, higher))
}

/// Append `higher` to `lower`, skipping zones already present
fn append_unique(mut lower: Vec<Zone>, higher: &[Zone]) -> Vec<Zone> {
    let mut seen: HashSet<_> = lower.iter().map(Zone::identity).collect();
    for zone in higher {
        if seen.insert(zone.identity()) {
            lower.push(zone.clone());
        }
    }
    lower
}

/// Fold `higher` zones into a lower-timeframe list.
///
/// With a `reference` zone, lower-interval zones not contained in it are
/// dropped first; zones of other intervals already in `lower` pass through.
/// Fails if `higher_interval` is not coarser than `lower_interval`.
pub fn merge_higher_into_lower(
    lower: &[Zone],
    higher: &[Zone],
    lower_interval: Interval,
    higher_interval: Interval,
    reference: Option<&Zone>,
) -> Result<Vec<Zone>> {
    if !higher_interval.is_coarser_than(lower_interval) {
        return Err(ZoneError::IntervalOrder {
            lower: lower_interval,
            higher: higher_interval,
        });
    }

    let kept = lower
        .iter()
        .filter(|z| match reference {
            Some(outer) if z.interval() == lower_interval => is_contained_in(z, outer),
            _ => true,
        })
        .cloned()
        .collect();
    Ok(append_unique(kept, higher))
}

// ============================================================
// CONTAINMENT
// ============================================================

/// `inner` nests inside `outer`: same kind, band inside band, and formed
/// within `outer`'s formation window.
pub fn is_contained_in(inner: &Zone, outer: &Zone) -> bool {
    inner.kind() == outer.kind() && inner.band_within(outer) && formed_within(inner, outer)
}

/// Formation start inside `outer`'s date span (start inclusive, end
/// exclusive), or in the same or an adjacent calendar month as either of
/// `outer`'s first two formation candles.
pub fn formed_within(inner: &Zone, outer: &Zone) -> bool {
    let start = inner.start_date();
    if outer.start_date() <= start && start < outer.end_date() {
        return true;
    }
    let month = month_index(start);
    outer
        .formation_dates()
        .iter()
        .take(2)
        .any(|&d| (month - month_index(d)).abs() <= 1)
}

#[inline]
fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// Price touched the reference: a candle low under its proximal for demand,
/// a candle high over it for supply
fn touches(zone: &Zone, reference: &Zone) -> bool {
    zone.candles().iter().any(|c| match reference.kind() {
        ZoneKind::Demand => c.ohlc.low < reference.proximal(),
        ZoneKind::Supply => c.ohlc.high > reference.proximal(),
    })
}

/// Relaxed weekly rule: formed inside the reference's date span or within
/// the recency window before `as_of`, and touched the reference band.
pub fn fallback_qualifies(zone: &Zone, reference: &Zone, as_of: NaiveDate, window_days: u32) -> bool {
    if zone.kind() != reference.kind() {
        return false;
    }
    let start = zone.start_date();
    let in_span = reference.start_date() <= start && start < reference.end_date();
    let cutoff = as_of
        .checked_sub_signed(Duration::days(i64::from(window_days)))
        .unwrap_or(NaiveDate::MIN);
    let recent = start >= cutoff;
    (in_span || recent) && touches(zone, reference)
}

/// A reference zone that price has reached. Demand zones lying entirely
/// above `price` are not actionable; supply zones always are.
#[inline]
pub fn is_actionable(zone: &Zone, price: f64) -> bool {
    match zone.kind() {
        ZoneKind::Demand => zone.distal() <= price,
        ZoneKind::Supply => true,
    }
}

/// Where the contained zones came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrySource {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Containment {
    pub source: EntrySource,
    pub zones: Vec<Zone>,
}

/// Zones from `primary` contained in `reference`; if none qualify, zones
/// from `fallback` passing the relaxed rule.
pub fn select_contained(
    primary: &[Zone],
    fallback: &[Zone],
    reference: &Zone,
    as_of: NaiveDate,
    rules: &MergeRules,
) -> Containment {
    let zones: Vec<Zone> = primary
        .iter()
        .filter(|z| is_contained_in(z, reference))
        .cloned()
        .collect();
    if !zones.is_empty() {
        return Containment {
            source: EntrySource::Primary,
            zones,
        };
    }

    let zones: Vec<Zone> = fallback
        .iter()
        .filter(|z| fallback_qualifies(z, reference, as_of, rules.fallback_window_days))
        .cloned()
        .collect();
    debug!(
        "no {} zone inside {} zone {}, {} fallback zones",
        rules.entry_interval,
        reference.interval(),
        reference.id(),
        zones.len()
    );
    Containment {
        source: EntrySource::Fallback,
        zones,
    }
}

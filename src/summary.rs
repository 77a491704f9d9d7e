//! Ranking and summary building
//!
//! From a merged [`ZoneBook`] and a current price, picks the nearest
//! actionable demand zone on each reference timeframe, the entries nested
//! inside those references, and the nearest supply zone as a target. The
//! resulting [`Summary`] is the only artifact handed to downstream
//! consumers; every number in it is finite and rounded to cents.

use std::collections::HashSet;

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    interval::Interval,
    merge::{is_actionable, select_contained, MergeRules, ZoneBook, ZoneCategory},
    zone::{round2, Zone, ZoneKind},
};

/// One candidate trade entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Proximal of the entry zone
    pub entry: f64,
    /// Distal of the entry zone
    pub stop_loss: f64,
}

/// Compact, JSON-ready digest of an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub source_label: String,
    /// `"proximal-distal"` of the selected three-month zone
    pub three_month_zone_range: Option<String>,
    /// `"proximal-distal"` of the selected one-month zone
    pub one_month_zone_range: Option<String>,
    pub entries: Vec<Entry>,
    /// Proximal of the nearest supply zone
    pub target: Option<f64>,
}

impl Summary {
    /// No reference zone and no entries
    pub fn is_empty(&self) -> bool {
        self.three_month_zone_range.is_none()
            && self.one_month_zone_range.is_none()
            && self.entries.is_empty()
    }
}

/// Inputs of the ranking besides the book and the price
#[derive(Debug, Clone, PartialEq)]
pub struct RankingContext {
    /// Date of the latest bar; anchors the fallback recency window
    pub as_of: NaiveDate,
    pub category: ZoneCategory,
    pub rules: MergeRules,
}

/// Zone whose proximal is closest to `price`. Ties go to the first zone.
pub fn nearest_zone<'a, I>(zones: I, price: f64) -> Option<&'a Zone>
where
    I: IntoIterator<Item = &'a Zone>,
{
    zones
        .into_iter()
        .filter(|z| z.distance_to(price).is_finite())
        .fold(None, |best: Option<&Zone>, z| match best {
            Some(b) if b.distance_to(price) <= z.distance_to(price) => Some(b),
            _ => Some(z),
        })
}

fn usable(zone: &Zone) -> bool {
    if zone.is_well_formed() {
        return true;
    }
    warn!(
        "dropping malformed {} zone {} on {}",
        zone.kind(),
        zone.id(),
        zone.interval()
    );
    false
}

fn reference_zone<'a>(
    book: &'a ZoneBook,
    interval: Interval,
    price: f64,
    category: ZoneCategory,
) -> Option<&'a Zone> {
    let candidates = book
        .zones(interval, category)
        .iter()
        .filter(|z| z.kind() == ZoneKind::Demand && z.interval() == interval)
        .filter(|z| usable(z))
        .filter(|z| is_actionable(z, price));
    nearest_zone(candidates, price)
}

fn native_demand(book: &ZoneBook, interval: Interval, category: ZoneCategory) -> Vec<Zone> {
    book.zones(interval, category)
        .iter()
        .filter(|z| z.kind() == ZoneKind::Demand && z.interval() == interval)
        .filter(|z| usable(z))
        .cloned()
        .collect()
}

#[inline]
fn range_label(zone: &Zone) -> String {
    format!("{:.2}-{:.2}", zone.proximal(), zone.distal())
}

/// Rank a merged book at `current_price` into a [`Summary`].
///
/// Missing reference zones are not an error: both ranges come back `None`
/// and `entries` empty.
pub fn build_summary(book: &ZoneBook, current_price: f64, label: &str, ctx: &RankingContext) -> Summary {
    let rules = &ctx.rules;
    let category = ctx.category;

    let quarterly = reference_zone(book, rules.quarterly_reference, current_price, category);
    let monthly = reference_zone(book, rules.monthly_reference, current_price, category);

    let primary = native_demand(book, rules.entry_interval, category);
    let fallback = native_demand(book, rules.fallback_interval, category);

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for reference in [monthly, quarterly].into_iter().flatten() {
        let found = select_contained(&primary, &fallback, reference, ctx.as_of, rules);
        for zone in found.zones.iter().filter(|z| z.band_within(reference)) {
            if seen.insert(zone.identity()) {
                entries.push(Entry {
                    entry: round2(zone.proximal()),
                    stop_loss: round2(zone.distal()),
                });
            }
        }
    }

    let supply = book
        .iter()
        .flat_map(|set| set.supply(category))
        .filter(|z| usable(z));
    let target = nearest_zone(supply, current_price).map(|z| round2(z.proximal()));

    Summary {
        source_label: label.to_string(),
        three_month_zone_range: quarterly.map(range_label),
        one_month_zone_range: monthly.map(range_label),
        entries,
        target,
    }
}

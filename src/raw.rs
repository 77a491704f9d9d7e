//! Externally supplied zone data
//!
//! Zone records coming from outside the scanner (saved analyses, other
//! tools, hand-written fixtures) are loosely shaped: keys vary in case,
//! prices may arrive as strings, dates may carry a time part, and the
//! collection itself may be a flat list or nested under category keys.
//! [`RawZone`] accepts all of that; converting it into a [`Zone`] is where
//! validation happens. [`normalize_zones`] flattens a whole collection and
//! drops the records that fail.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

use crate::{
    interval::Interval,
    zone::{CandleRole, OhlcSnapshot, Zone, ZoneCandle, ZoneKind},
    Result, ZoneError,
};

/// Loose zone record; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawZone {
    #[serde(alias = "zone_id", alias = "zoneId")]
    pub id: Option<u32>,
    #[serde(alias = "type", alias = "zone_type", alias = "zoneType")]
    pub kind: Option<String>,
    pub interval: Option<String>,
    pub proximal: Option<Value>,
    pub distal: Option<Value>,
    #[serde(alias = "formation_dates", alias = "dates")]
    pub formation_dates: Option<Vec<String>>,
    pub candles: Option<Vec<RawCandle>>,
    pub score: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCandle {
    #[serde(alias = "Date")]
    pub date: Option<String>,
    #[serde(alias = "Type", alias = "type")]
    pub role: Option<String>,
    #[serde(alias = "OHLC")]
    pub ohlc: Option<RawOhlc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOhlc {
    #[serde(alias = "Open")]
    pub open: Option<Value>,
    #[serde(alias = "High")]
    pub high: Option<Value>,
    #[serde(alias = "Low")]
    pub low: Option<Value>,
    #[serde(alias = "Close")]
    pub close: Option<Value>,
}

fn malformed(reason: impl Into<String>) -> ZoneError {
    ZoneError::MalformedZone(reason.into())
}

/// A finite number, or a string holding one
fn number(value: Option<&Value>, field: &str) -> Result<f64> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| malformed(format!("{field}: expected a finite number, got {value:?}")))
}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// `YYYY-MM-DD`, optionally followed by a time part
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
        .ok_or_else(|| malformed(format!("unparseable date {text:?}")))
}

fn parse_kind(text: &str) -> Result<ZoneKind> {
    match text.trim().to_ascii_lowercase().as_str() {
        "demand" => Ok(ZoneKind::Demand),
        "supply" => Ok(ZoneKind::Supply),
        _ => Err(malformed(format!("unknown zone kind {text:?}"))),
    }
}

fn parse_role(text: &str) -> Result<CandleRole> {
    match text.trim().to_ascii_lowercase().as_str() {
        "first" => Ok(CandleRole::First),
        "base" => Ok(CandleRole::Base),
        "second" => Ok(CandleRole::Second),
        _ => Err(malformed(format!("unknown candle role {text:?}"))),
    }
}

impl RawCandle {
    fn into_candle(self) -> Result<ZoneCandle> {
        let date = parse_date(self.date.as_deref().ok_or_else(|| malformed("candle without date"))?)?;
        let role = parse_role(self.role.as_deref().ok_or_else(|| malformed("candle without role"))?)?;
        let ohlc = self.ohlc.ok_or_else(|| malformed("candle without prices"))?;
        Ok(ZoneCandle {
            date,
            role,
            ohlc: OhlcSnapshot {
                open: number(ohlc.open.as_ref(), "open")?,
                high: number(ohlc.high.as_ref(), "high")?,
                low: number(ohlc.low.as_ref(), "low")?,
                close: number(ohlc.close.as_ref(), "close")?,
            },
        })
    }
}

impl RawZone {
    /// Validate and convert into a [`Zone`].
    ///
    /// Formation dates, when present, must match the candle dates.
    pub fn into_zone(self) -> Result<Zone> {
        let id = self.id.unwrap_or(0);
        let kind = parse_kind(self.kind.as_deref().ok_or_else(|| malformed("missing kind"))?)?;
        let interval: Interval = self
            .interval
            .as_deref()
            .ok_or_else(|| malformed("missing interval"))?
            .parse()?;
        let proximal = number(self.proximal.as_ref(), "proximal")?;
        let distal = number(self.distal.as_ref(), "distal")?;

        let candles = self
            .candles
            .unwrap_or_default()
            .into_iter()
            .map(RawCandle::into_candle)
            .collect::<Result<Vec<_>>>()?;

        if let Some(dates) = self.formation_dates {
            let dates = dates
                .iter()
                .map(|d| parse_date(d))
                .collect::<Result<Vec<_>>>()?;
            if !dates.iter().eq(candles.iter().map(|c| &c.date)) {
                return Err(malformed(format!(
                    "zone {id}: formation dates disagree with candle dates"
                )));
            }
        }

        Zone::new(id, kind, interval, proximal, distal, candles, self.score.unwrap_or(0))
    }
}

/// Zone data in any of the shapes it is found in
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ZoneCollection {
    /// Flat list of records
    List(Vec<Value>),
    /// One record on its own
    Record(ZoneRecord),
    /// Lists nested under keys such as interval or category
    Nested(BTreeMap<String, ZoneCollection>),
    /// Anything else; contributes no zones
    Other(Value),
}

/// An object carrying zone bounds, kept whole so its fields are not
/// mistaken for nested groups
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRecord(pub Value);

impl<'de> Deserialize<'de> for ZoneRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let is_record = value
            .as_object()
            .is_some_and(|map| map.contains_key("proximal") || map.contains_key("distal"));
        if is_record {
            Ok(ZoneRecord(value))
        } else {
            Err(de::Error::custom("object has no zone bounds"))
        }
    }
}

impl From<Value> for ZoneCollection {
    fn from(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(ZoneCollection::Other(value))
    }
}

fn record(value: &Value) -> Result<Zone> {
    let raw: RawZone = serde_json::from_value(value.clone()).map_err(|e| malformed(e.to_string()))?;
    raw.into_zone()
}

fn collect_into(collection: &ZoneCollection, out: &mut Vec<Zone>) {
    match collection {
        ZoneCollection::List(items) => {
            for item in items {
                match item {
                    Value::Array(_) => collect_into(&ZoneCollection::from(item.clone()), out),
                    _ => match record(item) {
                        Ok(zone) => out.push(zone),
                        Err(e) => warn!("dropping zone record: {e}"),
                    },
                }
            }
        },
        ZoneCollection::Record(ZoneRecord(value)) => match record(value) {
            Ok(zone) => out.push(zone),
            Err(e) => warn!("dropping zone record: {e}"),
        },
        ZoneCollection::Nested(groups) => {
            for (key, group) in groups {
                debug!("normalizing zone group {key:?}");
                collect_into(group, out);
            }
        },
        ZoneCollection::Other(Value::Null) => {},
        ZoneCollection::Other(value) => {
            warn!("ignoring zone data of unrecognized shape: {value}");
        },
    }
}

/// Flatten a collection into validated zones, dropping malformed records
pub fn normalize_zones(collection: &ZoneCollection) -> Vec<Zone> {
    let mut zones = Vec::new();
    collect_into(collection, &mut zones);
    zones
}

//! Engine configuration
//!
//! [`ZoneConfig`] gathers every threshold the pipeline uses. It loads from
//! and saves to JSON or TOML, and every load path validates before
//! returning.
//!
//! ```toml
//! timeframes = ["3mo", "1mo", "1wk", "1d"]
//!
//! [classifier]
//! base_wick_multiple = 0.5
//! gap_up_pct = 0.02
//!
//! [scan]
//! extended_intervals = ["1wk", "1mo", "3mo"]
//! ```

use std::{collections::HashMap, fs, path::Path};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    classify::ClassifierConfig,
    interval::Interval,
    merge::MergeRules,
    params::{get_count, get_multiple, get_ratio, reject_unknown, ParamMeta, Parameterized},
    scanner::ScanRules,
    Result, ZoneError,
};

/// File format of a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    /// Detect from the file extension
    Auto,
}

impl ConfigFormat {
    fn resolve(self, path: &Path) -> Result<ConfigFormat> {
        if self != ConfigFormat::Auto {
            return Ok(self);
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(ZoneError::ConfigParse(format!(
                "cannot detect config format of {}",
                path.display()
            ))),
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Intervals to process, coarsest first
    pub timeframes: Vec<Interval>,
    pub classifier: ClassifierConfig,
    pub scan: ScanRules,
    pub merge: MergeRules,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            timeframes: vec![
                Interval::ThreeMonths,
                Interval::OneMonth,
                Interval::OneWeek,
                Interval::OneDay,
            ],
            classifier: ClassifierConfig::default(),
            scan: ScanRules::default(),
            merge: MergeRules::default(),
        }
    }
}

static PARAMS: [ParamMeta; 7] = [
    ParamMeta::multiple(
        "base_wick_multiple",
        0.5,
        (0.25, 1.5, 0.25),
        "Base candle when either wick exceeds this multiple of the body",
    ),
    ParamMeta::multiple(
        "exciting_wick_multiple",
        0.5,
        (0.25, 1.0, 0.25),
        "Tight candle when both wicks stay under this multiple of the body",
    ),
    ParamMeta::ratio(
        "gap_up_pct",
        0.03,
        (0.01, 0.05, 0.01),
        "Open this fraction above the prior close is a gap up",
    ),
    ParamMeta::ratio(
        "gap_down_pct",
        0.03,
        (0.01, 0.05, 0.01),
        "Open this fraction below the prior close is a gap down",
    ),
    ParamMeta::count(
        "max_base_candles",
        3.0,
        (1.0, 6.0, 1.0),
        "Longest base run on standard intervals",
    ),
    ParamMeta::count(
        "max_base_candles_extended",
        5.0,
        (1.0, 8.0, 1.0),
        "Longest base run on extended intervals",
    ),
    ParamMeta::count(
        "fallback_window_days",
        60.0,
        (15.0, 180.0, 15.0),
        "Recency window of the weekly entry fallback",
    ),
];

impl ZoneConfig {
    /// Check the timeframe plan and the merge rules
    pub fn validate(&self) -> Result<()> {
        if self.timeframes.is_empty() {
            return Err(ZoneError::InvalidConfig("timeframes must not be empty".into()));
        }
        for pair in self.timeframes.windows(2) {
            if pair[0] == pair[1] {
                return Err(ZoneError::InvalidConfig(format!(
                    "timeframe {} listed twice",
                    pair[0]
                )));
            }
            if !pair[0].is_coarser_than(pair[1]) {
                return Err(ZoneError::InvalidConfig(format!(
                    "timeframes must run coarsest first, found {} before {}",
                    pair[0], pair[1]
                )));
            }
        }
        self.merge.validate()
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ZoneError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ZoneError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>, format: ConfigFormat) -> Result<Self> {
        let path = path.as_ref();
        let format = format.resolve(path)?;
        debug!("loading {format:?} config from {}", path.display());

        let text = fs::read_to_string(path)
            .map_err(|e| ZoneError::ConfigIo(format!("{}: {e}", path.display())))?;
        let config = match format {
            ConfigFormat::Toml => Self::from_toml_str(&text)?,
            _ => Self::from_json_str(&text)?,
        };

        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>, format: ConfigFormat) -> Result<()> {
        let path = path.as_ref();
        self.validate()?;
        let text = match format.resolve(path)? {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ZoneError::ConfigParse(e.to_string()))?
            },
            _ => serde_json::to_string_pretty(self).map_err(|e| ZoneError::ConfigParse(e.to_string()))?,
        };
        fs::write(path, text).map_err(|e| ZoneError::ConfigIo(format!("{}: {e}", path.display())))?;
        info!("saved config to {}", path.display());
        Ok(())
    }

    /// Copy of this configuration with the named parameters replaced
    pub fn override_with(&self, params: &HashMap<&str, f64>) -> Result<Self> {
        reject_unknown(params, &PARAMS)?;
        for meta in &PARAMS {
            if let Some(&value) = params.get(meta.name) {
                meta.validate(value)?;
            }
        }

        let mut config = self.clone();
        let c = &mut config.classifier;
        c.base_wick_multiple = get_multiple(params, "base_wick_multiple", c.base_wick_multiple.get())?;
        c.exciting_wick_multiple =
            get_multiple(params, "exciting_wick_multiple", c.exciting_wick_multiple.get())?;
        c.gap_up_pct = get_ratio(params, "gap_up_pct", c.gap_up_pct.get())?;
        c.gap_down_pct = get_ratio(params, "gap_down_pct", c.gap_down_pct.get())?;

        let s = &mut config.scan;
        s.max_base_candles = get_count(params, "max_base_candles", s.max_base_candles.get())?;
        s.max_base_candles_extended =
            get_count(params, "max_base_candles_extended", s.max_base_candles_extended.get())?;

        let m = &mut config.merge;
        m.fallback_window_days =
            get_count(params, "fallback_window_days", m.fallback_window_days as usize)?.get() as u32;

        config.validate()?;
        Ok(config)
    }
}

impl Parameterized for ZoneConfig {
    fn param_meta() -> &'static [ParamMeta] {
        &PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Self::default().override_with(params)
    }
}

//! Parameter metadata for the numeric configuration knobs
//!
//! This module describes every tunable threshold, enabling:
//! - Grid search over classifier and scanner settings
//! - Parameter documentation
//! - Overriding a configuration from a flat name/value map
//!
//! # Example
//!
//! ```rust
//! use zonescope::params::Parameterized;
//! use zonescope::prelude::*;
//!
//! for param in ZoneConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{CandleCount, Multiple, Ratio, Result, ZoneError};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in 0.0..=1.0 (gap thresholds)
  Ratio,
  /// Non-negative wick/body multiple
  Multiple,
  /// Positive integer (candle counts, day windows)
  Count,
}

/// Metadata for a single configuration parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "gap_up_pct")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn multiple(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Multiple, default, range, description }
  }

  pub const fn count(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Count, default, range, description }
  }

  /// All grid values from min to max inclusive
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    if step <= 0.0 || !step.is_finite() {
      return vec![min];
    }
    (0..)
      .map(|i| min + step * i as f64)
      .take_while(|v| *v <= max + step * 1e-9)
      .collect()
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if !value.is_finite() || value < min || value > max {
      return Err(ZoneError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio | ParamType::Multiple => Ok(()),
      ParamType::Count => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(ZoneError::InvalidValue("Count must be a positive integer"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED TRAIT
// ============================================================

/// Types whose numeric knobs can be listed and overridden by name
pub trait Parameterized: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Builds a value from a name/value map.
  ///
  /// Missing parameters keep their default values; unknown names are an error.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;
}

/// Fails on the first key `meta` does not describe
pub fn reject_unknown(params: &HashMap<&str, f64>, meta: &[ParamMeta]) -> Result<()> {
  match params.keys().find(|key| !meta.iter().any(|m| m.name == **key)) {
    Some(key) => Err(ZoneError::InvalidConfig(format!("unknown parameter {key:?}"))),
    None => Ok(()),
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a Multiple from params with default fallback
pub fn get_multiple(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Multiple> {
  let value = params.get(key).copied().unwrap_or(default);
  Multiple::new(value)
}

/// Helper to get a CandleCount from params with default fallback
pub fn get_count(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<CandleCount> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
    return Err(ZoneError::InvalidValue("Count must be a positive integer"));
  }
  CandleCount::new(value as usize)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_meta_constructors() {
    let ratio = ParamMeta::ratio("gap", 0.03, (0.01, 0.05, 0.01), "Gap threshold");
    let multiple = ParamMeta::multiple("wick", 0.5, (0.25, 1.0, 0.25), "Wick multiple");
    let count = ParamMeta::count("bases", 3.0, (1.0, 6.0, 1.0), "Base run length");

    assert_eq!(ratio.param_type, ParamType::Ratio);
    assert_eq!(multiple.param_type, ParamType::Multiple);
    assert_eq!(count.param_type, ParamType::Count);
    assert_eq!(count.default, 3.0);
  }

  #[test]
  fn test_generate_grid() {
    let meta = ParamMeta::multiple("wick", 0.5, (0.25, 1.0, 0.25), "Test");

    let grid = meta.generate_grid();
    assert_eq!(grid.len(), 4);
    assert!((grid[0] - 0.25).abs() < 1e-12);
    assert!((grid[3] - 1.0).abs() < 1e-12);
  }

  #[test]
  fn test_grid_with_inexact_step_reaches_max() {
    let meta = ParamMeta::ratio("gap", 0.03, (0.01, 0.05, 0.01), "Test");
    let grid = meta.generate_grid();
    assert_eq!(grid.len(), 5);
  }

  #[test]
  fn test_validate_count() {
    let meta = ParamMeta::count("bases", 3.0, (1.0, 6.0, 1.0), "Test");

    assert!(meta.validate(3.0).is_ok());
    assert!(meta.validate(6.0).is_ok());
    assert!(meta.validate(2.5).is_err());
    assert!(meta.validate(0.0).is_err());
    assert!(meta.validate(7.0).is_err());
    assert!(meta.validate(f64::NAN).is_err());
  }

  #[test]
  fn test_get_helpers() {
    let mut params = HashMap::new();
    params.insert("gap", 0.02);
    params.insert("wick", 0.75);
    params.insert("bases", 4.0);
    params.insert("bad_count", 2.5);

    assert!((get_ratio(&params, "gap", 0.03).unwrap().get() - 0.02).abs() < f64::EPSILON);
    assert!((get_ratio(&params, "other", 0.03).unwrap().get() - 0.03).abs() < f64::EPSILON);
    assert!((get_multiple(&params, "wick", 0.5).unwrap().get() - 0.75).abs() < f64::EPSILON);
    assert_eq!(get_count(&params, "bases", 3).unwrap().get(), 4);
    assert_eq!(get_count(&params, "other", 3).unwrap().get(), 3);
    assert!(get_count(&params, "bad_count", 3).is_err());
  }

  #[test]
  fn test_reject_unknown() {
    let meta = [ParamMeta::ratio("gap", 0.03, (0.01, 0.05, 0.01), "Test")];
    let mut params = HashMap::new();
    params.insert("gap", 0.02);
    assert!(reject_unknown(&params, &meta).is_ok());
    params.insert("gpa", 0.02);
    assert!(reject_unknown(&params, &meta).is_err());
  }
}

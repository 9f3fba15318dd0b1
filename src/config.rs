//! Driver configuration, mirroring the original `Processing`
//! settings block (`ordering_strategy`, `wash_rule`, date filters, filing
//! years, default fiat).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use crate::engine::Strategy;
use crate::error::{Error, Result};

fn default_fiat() -> String {
    "USD".to_owned()
}

fn deserialize_strategy<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Strategy, D::Error> {
    let raw: String = Deserialize::deserialize(d)?;
    Strategy::from_str(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_optional_ymd<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    let raw: Option<String> = Deserialize::deserialize(d)?;
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y/%m/%d")
            .map(|d| Some(d.and_hms_opt(0, 0, 0).unwrap().and_utc()))
            .map_err(serde::de::Error::custom),
    }
}

/// Recognized configuration options.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_strategy")]
    pub ordering_strategy: Strategy,
    pub wash_rule: bool,
    #[serde(default, deserialize_with = "deserialize_optional_ymd")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_ymd")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub filing_years: Vec<i32>,
    #[serde(default = "default_fiat")]
    pub default_fiat: String,
}

impl Config {
    /// Loads a YAML configuration document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::IncorrectPoolFormat {
            detail: e.to_string(),
        })
    }

    /// Whether `date` falls within the configured `[start_date, end_date]`
    /// filter (inclusive), or is always in range when a bound is unset.
    pub fn in_range(&self, date: DateTime<Utc>) -> bool {
        self.start_date.map(|start| date >= start).unwrap_or(true)
            && self.end_date.map(|end| date <= end).unwrap_or(true)
    }
}

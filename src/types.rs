use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::scale::Color;

/// A region identifier as it appears in a data source, before normalization.
///
/// Geometry files carry it as a number, statistics feeds as a (possibly
/// zero-padded) string, and either may omit it entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRegionCode {
    Number(serde_json::Number),
    Text(String),
    #[default]
    Missing,
}

impl From<u32> for RawRegionCode {
    fn from(n: u32) -> Self {
        RawRegionCode::Number(n.into())
    }
}

impl From<&str> for RawRegionCode {
    fn from(s: &str) -> Self {
        RawRegionCode::Text(s.to_string())
    }
}

impl From<String> for RawRegionCode {
    fn from(s: String) -> Self {
        RawRegionCode::Text(s)
    }
}

impl From<&CanonicalCode> for RawRegionCode {
    fn from(code: &CanonicalCode) -> Self {
        RawRegionCode::Text(code.as_str().to_string())
    }
}

impl From<Option<&serde_json::Value>> for RawRegionCode {
    fn from(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::Number(n)) => RawRegionCode::Number(n.clone()),
            Some(serde_json::Value::String(s)) => RawRegionCode::Text(s.clone()),
            _ => RawRegionCode::Missing,
        }
    }
}

/// Two-digit, zero-padded region code shared by every data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalCode(pub(crate) String);

impl CanonicalCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of normalizing a raw code. `Unknown` never compares equal to a code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegionKey {
    Code(CanonicalCode),
    Unknown,
}

impl RegionKey {
    pub fn code(&self) -> Option<&CanonicalCode> {
        match self {
            RegionKey::Code(code) => Some(code),
            RegionKey::Unknown => None,
        }
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKey::Code(code) => code.fmt(f),
            RegionKey::Unknown => f.write_str("unknown"),
        }
    }
}

/// One `(region, value)` pair returned by a statistics source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticRecord {
    #[serde(rename = "codiceRegione", alias = "regionCode", default)]
    pub region_code: RawRegionCode,
    #[serde(
        rename = "valore",
        alias = "value",
        default,
        deserialize_with = "lenient_value"
    )]
    pub value: f64,
}

impl StatisticRecord {
    pub fn new(region_code: impl Into<RawRegionCode>, value: f64) -> Self {
        Self {
            region_code: region_code.into(),
            value: sanitize_value(value),
        }
    }
}

/// Clamps a value into the domain a record may carry: finite and non-negative.
pub fn sanitize_value(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Accepts numbers, numeric strings, `null` or garbage; anything unusable is 0.
fn lenient_value<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let value = match &raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => {
            tracing::warn!(value = %raw, "non-numeric statistic value coerced to 0");
            Ok(0.0)
        }
    }
}

/// An immutable region of the loaded geometry.
#[derive(Debug, Clone)]
pub struct RegionFeature {
    pub key: RegionKey,
    pub raw_code: RawRegionCode,
    pub name: String,
    pub geometry: Option<geojson::Geometry>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// A region annotated for one render pass. The base feature is shared, never
/// modified.
#[derive(Debug, Clone)]
pub struct AnnotatedFeature {
    pub region: Arc<RegionFeature>,
    pub display_value: f64,
    pub display_color: Color,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyMode {
    #[default]
    #[serde(alias = "assoluta")]
    Absolute,
    #[serde(alias = "percentuale")]
    Percentage,
}

/// The user's current choice, already validated by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    pub profession: Option<String>,
    /// Regions to request; empty means every region in the geometry.
    #[serde(default)]
    pub region_codes: Vec<RawRegionCode>,
    #[serde(default)]
    pub frequency_mode: FrequencyMode,
}

impl Selection {
    pub fn new(profession: impl Into<String>, frequency_mode: FrequencyMode) -> Self {
        Self {
            profession: Some(profession.into()),
            region_codes: Vec::new(),
            frequency_mode,
        }
    }

    /// The selected profession, if one is set and not blank.
    pub fn active_profession(&self) -> Option<&str> {
        self.profession
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

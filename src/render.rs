use crate::data::RegionGeometry;
use crate::scale::Color;
use crate::types::{AnnotatedFeature, FrequencyMode};
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::Serialize;
use serde_json::json;

const NO_PROFESSION: &str = "Nessun lavoro selezionato";
const NOT_AVAILABLE: &str = "N.D.";
const DATA_UNAVAILABLE: &str = "Dati ISTAT non disponibili.";

/// Why a render instruction looks the way it does.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderStatus {
    /// No selection yet: every region in the neutral style.
    Neutral,
    /// Statistics joined and coloured.
    Data,
    /// The statistics fetch failed; every region in the neutral style with an
    /// "unavailable" label.
    Degraded { notice: String },
}

/// Leaflet-style path options for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSpec {
    pub fill_color: Color,
    pub weight: f64,
    pub opacity: f64,
    pub color: Color,
    pub fill_opacity: f64,
}

impl StyleSpec {
    pub fn data(fill_color: Color) -> Self {
        Self {
            fill_color,
            weight: 1.0,
            opacity: 0.3,
            color: Color::WHITE,
            fill_opacity: 0.8,
        }
    }

    pub fn neutral(no_data: Color) -> Self {
        Self {
            fill_color: no_data,
            weight: 1.0,
            opacity: 1.0,
            color: Color::WHITE,
            fill_opacity: 0.5,
        }
    }
}

/// Everything the map surface needs to draw one layer. Each instruction
/// replaces the previous one wholesale.
#[derive(Debug, Clone)]
pub struct RenderInstruction {
    pub sequence: u64,
    pub status: RenderStatus,
    pub profession: Option<String>,
    pub frequency_mode: FrequencyMode,
    pub max_value: f64,
    pub no_data: Color,
    pub features: Vec<AnnotatedFeature>,
}

impl RenderInstruction {
    pub fn data(
        sequence: u64,
        profession: &str,
        frequency_mode: FrequencyMode,
        features: Vec<AnnotatedFeature>,
        max_value: f64,
        no_data: Color,
    ) -> Self {
        Self {
            sequence,
            status: RenderStatus::Data,
            profession: Some(profession.to_string()),
            frequency_mode,
            max_value,
            no_data,
            features,
        }
    }

    pub fn neutral(sequence: u64, geometry: &RegionGeometry, no_data: Color) -> Self {
        Self {
            sequence,
            status: RenderStatus::Neutral,
            profession: None,
            frequency_mode: FrequencyMode::default(),
            max_value: 1.0,
            no_data,
            features: blank_features(geometry, no_data),
        }
    }

    pub fn degraded(
        sequence: u64,
        geometry: &RegionGeometry,
        profession: &str,
        frequency_mode: FrequencyMode,
        notice: String,
        no_data: Color,
    ) -> Self {
        Self {
            sequence,
            status: RenderStatus::Degraded { notice },
            profession: Some(profession.to_string()),
            frequency_mode,
            max_value: 1.0,
            no_data,
            features: blank_features(geometry, no_data),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, RenderStatus::Degraded { .. })
    }

    pub fn style(&self, feature: &AnnotatedFeature) -> StyleSpec {
        match self.status {
            RenderStatus::Data => StyleSpec::data(feature.display_color),
            RenderStatus::Neutral | RenderStatus::Degraded { .. } => StyleSpec::neutral(self.no_data),
        }
    }

    pub fn label(&self, feature: &AnnotatedFeature) -> String {
        let name = escape_html(&feature.region.name);
        match &self.status {
            RenderStatus::Neutral => {
                format!("<b>{name}</b><br>Occupati ({NO_PROFESSION}): {NOT_AVAILABLE}")
            }
            RenderStatus::Degraded { .. } => format!("<b>{name}</b><br>{DATA_UNAVAILABLE}"),
            RenderStatus::Data => {
                let profession = escape_html(self.profession.as_deref().unwrap_or(NO_PROFESSION));
                let value = format_it(feature.display_value);
                let suffix = match self.frequency_mode {
                    FrequencyMode::Absolute => "",
                    FrequencyMode::Percentage => "%",
                };
                format!("<b>{name}</b><br>Occupati ({profession}): {value}{suffix}")
            }
        }
    }

    /// Value shown for a canonical region code, if the region is in the layer.
    pub fn value_of(&self, code: &str) -> Option<f64> {
        self.features
            .iter()
            .find(|f| f.region.key.code().is_some_and(|c| c.as_str() == code))
            .map(|f| f.display_value)
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .features
            .iter()
            .map(|feature| {
                let mut properties = feature.region.properties.clone();
                properties.insert("code".into(), json!(feature.region.key.code()));
                properties.insert("name".into(), json!(feature.region.name));
                properties.insert("display_value".into(), json!(feature.display_value));
                properties.insert("fill_color".into(), json!(self.style(feature).fill_color));
                properties.insert("style".into(), json!(self.style(feature)));
                properties.insert("label".into(), json!(self.label(feature)));
                Feature {
                    bbox: None,
                    geometry: feature.region.geometry.clone(),
                    id: feature
                        .region
                        .key
                        .code()
                        .map(|c| geojson::feature::Id::String(c.to_string())),
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        let mut members = JsonObject::new();
        members.insert("sequence".into(), json!(self.sequence));
        members.insert("status".into(), json!(self.status));
        members.insert("profession".into(), json!(self.profession));
        members.insert("frequency_mode".into(), json!(self.frequency_mode));
        members.insert("max_value".into(), json!(self.max_value));

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(members),
        }
    }
}

impl Serialize for RenderInstruction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_feature_collection().serialize(serializer)
    }
}

fn blank_features(geometry: &RegionGeometry, no_data: Color) -> Vec<AnnotatedFeature> {
    geometry
        .features()
        .iter()
        .map(|region| AnnotatedFeature {
            region: region.clone(),
            display_value: 0.0,
            display_color: no_data,
        })
        .collect()
}

/// Formats a number the way `it-IT` does: `.` groups thousands, `,` marks
/// decimals, at most two decimals, trailing zeros dropped.
pub fn format_it(value: f64) -> String {
    if !value.is_finite() {
        return NOT_AVAILABLE.to_string();
    }
    let cents = (value.abs() * 100.0).round() as u64;
    let (int, frac) = (cents / 100, cents % 100);

    let digits = int.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if value < 0.0 && cents > 0 {
        out.push('-');
    }
    out.push_str(&grouped);
    if frac > 0 {
        let decimals = format!("{frac:02}");
        out.push(',');
        out.push_str(decimals.trim_end_matches('0'));
    }
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

use crate::config::InputConfig;
use crate::error::InitializationError;
use crate::region_code::normalize;
use crate::types::{CanonicalCode, RawRegionCode, RegionFeature};
use geojson::GeoJson;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// The region boundaries of the session, loaded once and never replaced.
#[derive(Debug, Default)]
pub struct RegionGeometry {
    features: Vec<Arc<RegionFeature>>,
    centers: HashMap<String, [f64; 2]>,
}

impl RegionGeometry {
    pub fn new(features: Vec<RegionFeature>) -> Self {
        Self {
            features: features.into_iter().map(Arc::new).collect(),
            centers: HashMap::new(),
        }
    }

    pub fn with_centers(mut self, centers: HashMap<String, [f64; 2]>) -> Self {
        self.centers = centers
            .into_iter()
            .map(|(name, center)| (name.to_lowercase(), center))
            .collect();
        self
    }

    pub fn features(&self) -> &[Arc<RegionFeature>] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Configured view centre for a region name, case-insensitive.
    pub fn center_of(&self, name: &str) -> Option<[f64; 2]> {
        self.centers.get(&name.to_lowercase()).copied()
    }

    /// Every known region code in geometry order, without duplicates.
    pub fn region_codes(&self) -> Vec<RawRegionCode> {
        let mut seen: HashSet<&CanonicalCode> = HashSet::new();
        self.features
            .iter()
            .filter_map(|f| f.key.code())
            .filter(|code| seen.insert(*code))
            .map(RawRegionCode::from)
            .collect()
    }
}

/// Loads the region boundaries and, when configured, the view-centre
/// metadata. Any failure here is fatal for the session.
pub async fn load_geometry(input: &InputConfig) -> Result<RegionGeometry, InitializationError> {
    tracing::info!(location = %input.geojson, "loading region geometry");

    let text = fetch_document(&input.geojson).await.map_err(|reason| {
        InitializationError::GeometryUnavailable {
            location: input.geojson.clone(),
            reason,
        }
    })?;
    let mut geometry = parse_geometry(&text, input)?;

    if let Some(location) = &input.coordinates {
        let centers = load_centers(location).await?;
        tracing::info!(count = centers.len(), "loaded view centres");
        geometry = geometry.with_centers(centers);
    }

    tracing::info!(regions = geometry.len(), "region geometry ready");
    Ok(geometry)
}

async fn fetch_document(location: &str) -> Result<String, String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let response = reqwest::get(location).await.map_err(|e| e.to_string())?;
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        response.text().await.map_err(|e| e.to_string())
    } else {
        tokio::fs::read_to_string(Path::new(location))
            .await
            .map_err(|e| e.to_string())
    }
}

pub fn parse_geometry(text: &str, input: &InputConfig) -> Result<RegionGeometry, InitializationError> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| InitializationError::InvalidGeometry(e.to_string()))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => {
            return Err(InitializationError::InvalidGeometry(
                "GeoJSON must be a FeatureCollection".into(),
            ))
        }
    };

    let mut features = Vec::with_capacity(collection.features.len());

    for feature in collection.features {
        let properties = feature.properties.unwrap_or_default();

        let raw_code = RawRegionCode::from(properties.get(&input.region_code_property));
        let key = normalize(&raw_code);

        let name = match properties.get(&input.region_name_property) {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => {
                tracing::warn!(code = %key, property = %input.region_name_property, "region without a name");
                key.to_string()
            }
        };

        if key.code().is_none() {
            tracing::warn!(%name, property = %input.region_code_property, "region without a code will never match statistics");
        }

        features.push(RegionFeature {
            key,
            raw_code,
            name,
            geometry: feature.geometry,
            properties,
        });
    }

    if features.is_empty() {
        return Err(InitializationError::InvalidGeometry(
            "feature collection has no regions".into(),
        ));
    }

    Ok(RegionGeometry::new(features))
}

async fn load_centers(location: &str) -> Result<HashMap<String, [f64; 2]>, InitializationError> {
    let unavailable = |reason: String| InitializationError::CoordinatesUnavailable {
        location: location.to_string(),
        reason,
    };
    let text = fetch_document(location).await.map_err(unavailable)?;
    serde_json::from_str(&text).map_err(|e| unavailable(e.to_string()))
}

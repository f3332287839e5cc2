use crate::data::RegionGeometry;
use crate::region_code::normalize_str;
use crate::types::RegionFeature;
use geo::{BoundingRect, Centroid};
use serde::Serialize;
use std::convert::TryInto;
use std::sync::Arc;

/// Where to point the map for a free-text region search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewTarget {
    pub code: Option<String>,
    pub name: String,
    /// `[lat, lon]`
    pub center: [f64; 2],
    /// `[[south, west], [north, east]]`, absent without geometry.
    pub bounds: Option<[[f64; 2]; 2]>,
}

/// Finds a region by code or by name (exact, then prefix, then substring;
/// case-insensitive) and returns its view target.
pub fn locate(geometry: &RegionGeometry, query: &str) -> Option<ViewTarget> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let needle = query.to_lowercase();
    let features = geometry.features();

    let feature = features
        .iter()
        .find(|f| f.key.code().is_some() && f.key == normalize_str(query))
        .or_else(|| find_by_name(features, |name| name == needle))
        .or_else(|| find_by_name(features, |name| name.starts_with(&needle)))
        .or_else(|| find_by_name(features, |name| name.contains(&needle)))?;

    target_for(geometry, feature)
}

fn find_by_name(
    features: &[Arc<RegionFeature>],
    matches: impl Fn(&str) -> bool,
) -> Option<&Arc<RegionFeature>> {
    features.iter().find(|f| matches(&f.name.to_lowercase()))
}

fn target_for(geometry: &RegionGeometry, feature: &RegionFeature) -> Option<ViewTarget> {
    let shape: Option<geo::Geometry<f64>> = feature.geometry.as_ref().and_then(|g| {
        g.value
            .clone()
            .try_into()
            .map_err(|e| tracing::warn!(region = %feature.name, error = ?e, "unusable region geometry"))
            .ok()
    });

    let bounds = shape.as_ref().and_then(|s| s.bounding_rect()).map(|rect| {
        [
            [rect.min().y, rect.min().x],
            [rect.max().y, rect.max().x],
        ]
    });

    let center = geometry.center_of(&feature.name).or_else(|| {
        shape
            .as_ref()
            .and_then(|s| s.centroid())
            .map(|p| [p.y(), p.x()])
    })?;

    Some(ViewTarget {
        code: feature.key.code().map(|c| c.to_string()),
        name: feature.name.clone(),
        center,
        bounds,
    })
}

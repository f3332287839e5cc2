//! Error kinds of the pipeline.
//!
//! Only [`InitializationError`] is fatal. [`SourceError`] surfaces as a batch
//! failure and is recovered by the orchestrator into a degraded render;
//! per-region and mapping failures never become errors at all (they are logged
//! and turned into zero values or empty results).

use thiserror::Error;

/// Geometry or coordinate metadata could not be loaded. Nothing can render.
#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("geometry unavailable from {location}: {reason}")]
    GeometryUnavailable { location: String, reason: String },

    #[error("invalid geometry document: {0}")]
    InvalidGeometry(String),

    #[error("coordinate metadata unavailable from {location}: {reason}")]
    CoordinatesUnavailable { location: String, reason: String },
}

/// The whole statistics fetch was rejected.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("statistics dataset unavailable: {0}")]
    DatasetUnavailable(String),

    #[error("HTTP error querying statistics service: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("statistics service unreachable for all {regions} regions")]
    AllRegionsFailed { regions: usize },
}

#[derive(Error, Debug, PartialEq)]
pub enum ScaleError {
    #[error("invalid colour: {0:?}")]
    InvalidColor(String),

    #[error("invalid breakpoint table: {0}")]
    InvalidBreakpoints(String),

    #[error("invalid intensity scale: {0}")]
    InvalidIntensity(String),
}

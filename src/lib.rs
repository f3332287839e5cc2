//! Choropleth of Italian regions coloured by employment statistics.
//!
//! The pipeline per update: fetch statistics for the selected profession,
//! optionally convert them to percentage shares, join them into the region
//! geometry by canonical region code, colour each region, and publish a
//! render instruction for the map surface.

pub mod types;
pub mod config;
pub mod error;
pub mod region_code;
pub mod data;
pub mod processing;
pub mod scale;
pub mod render;
pub mod source;
pub mod orchestrator;
pub mod view;
pub mod server;

pub use error::{InitializationError, ScaleError, SourceError};
pub use orchestrator::{MapOrchestrator, Phase};
pub use render::{RenderInstruction, RenderStatus, StyleSpec};
pub use scale::{Color, ColorScale};
pub use source::{ConfiguredSource, IstatSource, SimulatedSource, StatisticsSource};
pub use types::{FrequencyMode, RawRegionCode, Selection, StatisticRecord};

use std::collections::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

use crate::scale::{
    default_breakpoints, Breakpoint, Color, ColorScale, ContinuousScale, DiscreteScale,
};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub scale: ScaleConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Region boundaries: a local path or an http(s) URL.
    pub geojson: String,
    #[serde(default = "default_code_property")]
    pub region_code_property: String,
    #[serde(default = "default_name_property")]
    pub region_name_property: String,
    /// Optional region name → `[lat, lon]` view centres.
    pub coordinates: Option<String>,
}

fn default_code_property() -> String {
    "reg_istat_code_num".to_string()
}

fn default_name_property() -> String {
    "reg_name".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Simulated {
        dataset: PathBuf,
    },
    Istat(IstatConfig),
}

#[derive(Debug, Deserialize, Clone)]
pub struct IstatConfig {
    pub base_url: String,
    pub dataflow: String,
    /// SDMX series key with `{region}` and `{category}` placeholders.
    pub key_template: String,
    pub year: u16,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Profession name → ISTAT occupation category code.
    #[serde(default)]
    pub categories: HashMap<String, String>,
    /// Canonical region code → ISTAT territory code, when they differ.
    #[serde(default)]
    pub territories: HashMap<String, String>,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ScaleConfig {
    Discrete {
        #[serde(default = "default_no_data")]
        no_data: Color,
        #[serde(default = "default_breakpoints")]
        breakpoints: Vec<Breakpoint>,
    },
    Continuous {
        #[serde(default = "default_no_data")]
        no_data: Color,
        #[serde(default = "default_hue")]
        hue: f64,
        #[serde(default = "default_saturation")]
        saturation: f64,
        #[serde(default = "default_light")]
        light: f64,
        #[serde(default = "default_dark")]
        dark: f64,
    },
}

impl Default for ScaleConfig {
    fn default() -> Self {
        ScaleConfig::Discrete {
            no_data: default_no_data(),
            breakpoints: default_breakpoints(),
        }
    }
}

fn default_no_data() -> Color {
    Color::NO_DATA
}

fn default_hue() -> f64 {
    ContinuousScale::default().hue
}

fn default_saturation() -> f64 {
    ContinuousScale::default().saturation
}

fn default_light() -> f64 {
    ContinuousScale::default().light
}

fn default_dark() -> f64 {
    ContinuousScale::default().dark
}

impl ScaleConfig {
    pub fn build(&self) -> Result<ColorScale> {
        let scale = match self {
            ScaleConfig::Discrete { no_data, breakpoints } => {
                ColorScale::Discrete(DiscreteScale::new(breakpoints.clone(), *no_data)?)
            }
            ScaleConfig::Continuous { no_data, hue, saturation, light, dark } => {
                ColorScale::Continuous(ContinuousScale::new(*hue, *saturation, *light, *dark, *no_data)?)
            }
        };
        Ok(scale)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Initial map view handed to the rendering surface.
#[derive(Debug, Deserialize, serde::Serialize, Clone, PartialEq)]
pub struct ViewConfig {
    pub center: [f64; 2],
    pub zoom: u8,
    pub min_zoom: u8,
    /// `[[south, west], [north, east]]`
    pub bounds: [[f64; 2]; 2],
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            center: [41.9, 12.5],
            zoom: 6,
            min_zoom: 6,
            bounds: [[35.5, 6.5], [47.2, 18.5]],
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

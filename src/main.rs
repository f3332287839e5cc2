use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use occupati_map::config::AppConfig;
use occupati_map::{server, ConfiguredSource, FrequencyMode, MapOrchestrator, Selection};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute one choropleth layer and write it as GeoJSON
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Profession to map
        #[arg(short, long)]
        profession: String,
        #[arg(short, long, value_enum, default_value_t = FrequencyMode::Absolute)]
        mode: FrequencyMode,
        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Serve the map and its API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

async fn open_session(config: &AppConfig) -> Result<MapOrchestrator<ConfiguredSource>> {
    let source = ConfiguredSource::from_config(&config.source)
        .context("Failed to configure statistics source")?;
    let scale = config.scale.build().context("Invalid colour scale")?;
    let orchestrator = MapOrchestrator::initialize(&config.input, source, scale)
        .await
        .context("Failed to load region geometry")?;
    Ok(orchestrator)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { config, profession, mode, output } => {
            let app_config = AppConfig::load_from_file(config)?;
            let orchestrator = open_session(&app_config).await?;

            let selection = Selection::new(profession.as_str(), *mode);
            let layer = match orchestrator.update(&selection).await {
                Some(layer) => layer,
                None => orchestrator.current(),
            };
            if let occupati_map::RenderStatus::Degraded { notice } = &layer.status {
                eprintln!("Statistics unavailable, map rendered without data: {notice}");
            }

            let json = serde_json::to_string_pretty(&layer.to_feature_collection())?;
            match output {
                Some(path) => {
                    fs::write(path, json)
                        .with_context(|| format!("Failed to write output file: {:?}", path))?;
                    eprintln!("Layer written to {:?}", path);
                }
                None => println!("{json}"),
            }
        }
        Commands::Serve { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let orchestrator = open_session(&app_config).await?;
            server::start_server(app_config, orchestrator).await?;
        }
    }

    Ok(())
}

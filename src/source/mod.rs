//! Where the numbers come from.
//!
//! Every source answers the same question: given a profession and a list of
//! regions, which `(region, value)` records are known? Sources never fail for a
//! single region; they log it and report a zero instead. An `Err` means the
//! whole batch is unusable.

mod istat;
mod simulated;

pub use istat::IstatSource;
pub use simulated::SimulatedSource;

use std::future::Future;

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::types::{RawRegionCode, StatisticRecord};

pub trait StatisticsSource: Send + Sync {
    fn fetch_statistics(
        &self,
        profession: &str,
        region_codes: &[RawRegionCode],
    ) -> impl Future<Output = Result<Vec<StatisticRecord>, SourceError>> + Send;
}

/// The source selected in the configuration file.
#[derive(Debug)]
pub enum ConfiguredSource {
    Simulated(SimulatedSource),
    Istat(IstatSource),
}

impl ConfiguredSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        let source = match config {
            SourceConfig::Simulated { dataset } => {
                ConfiguredSource::Simulated(SimulatedSource::new(dataset))
            }
            SourceConfig::Istat(istat) => ConfiguredSource::Istat(IstatSource::new(istat.clone())?),
        };
        Ok(source)
    }
}

impl StatisticsSource for ConfiguredSource {
    async fn fetch_statistics(
        &self,
        profession: &str,
        region_codes: &[RawRegionCode],
    ) -> Result<Vec<StatisticRecord>, SourceError> {
        match self {
            ConfiguredSource::Simulated(source) => {
                source.fetch_statistics(profession, region_codes).await
            }
            ConfiguredSource::Istat(source) => source.fetch_statistics(profession, region_codes).await,
        }
    }
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;

use super::StatisticsSource;
use crate::error::SourceError;
use crate::types::{RawRegionCode, StatisticRecord};

type Dataset = HashMap<String, Vec<StatisticRecord>>;

/// Bundled dataset keyed by profession name:
///
/// ```json
/// { "Ingegnere": [ { "codiceRegione": "1", "valore": 1200 }, ... ] }
/// ```
///
/// The file is read on first use. A failed read is not cached, so the next
/// request tries again.
#[derive(Debug)]
pub struct SimulatedSource {
    path: PathBuf,
    data: OnceCell<Dataset>,
}

impl SimulatedSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            data: OnceCell::new(),
        }
    }

    /// A source over an in-memory dataset.
    pub fn from_dataset(data: HashMap<String, Vec<StatisticRecord>>) -> Self {
        Self {
            path: PathBuf::new(),
            data: OnceCell::new_with(Some(data)),
        }
    }

    async fn dataset(&self) -> Result<&Dataset, SourceError> {
        self.data
            .get_or_try_init(|| async {
                let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                    SourceError::DatasetUnavailable(format!("{}: {e}", self.path.display()))
                })?;
                let data: Dataset = serde_json::from_str(&text)?;
                tracing::info!(path = %self.path.display(), professions = data.len(), "simulated dataset loaded");
                Ok::<_, SourceError>(data)
            })
            .await
    }

    pub async fn professions(&self) -> Result<Vec<String>, SourceError> {
        let mut names: Vec<String> = self.dataset().await?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl StatisticsSource for SimulatedSource {
    /// The simulated dataset is national; `region_codes` is not used to filter.
    async fn fetch_statistics(
        &self,
        profession: &str,
        _region_codes: &[RawRegionCode],
    ) -> Result<Vec<StatisticRecord>, SourceError> {
        if profession.trim().is_empty() {
            return Ok(Vec::new());
        }

        let data = self.dataset().await.inspect_err(|e| {
            tracing::error!(error = %e, "simulated dataset could not be loaded");
        })?;

        match data.get(profession) {
            Some(records) => Ok(records.clone()),
            None => {
                tracing::warn!(%profession, "no simulated data for profession");
                Ok(Vec::new())
            }
        }
    }
}

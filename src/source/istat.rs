use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinSet;

use super::StatisticsSource;
use crate::config::IstatConfig;
use crate::error::SourceError;
use crate::region_code::normalize;
use crate::types::{RawRegionCode, RegionKey, StatisticRecord};

const SDMX_JSON: &str = "application/vnd.sdmx.data+json;version=1.0.0";

/// Live query against the ISTAT SDMX REST service.
///
/// One request per region, all in flight at once. A region that cannot be
/// answered contributes a zero record; only a service that is unreachable for
/// every region fails the batch.
#[derive(Debug, Clone)]
pub struct IstatSource {
    client: reqwest::Client,
    config: IstatConfig,
}

enum RegionOutcome {
    Value(f64),
    NoData(String),
    Unreachable(String),
}

impl IstatSource {
    pub fn new(config: IstatConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static(SDMX_JSON),
                );
                headers
            })
            .build()?;
        Ok(Self { client, config })
    }

    /// The occupation category for a profession, if one is configured.
    pub fn category_for(&self, profession: &str) -> Option<&str> {
        self.config.categories.get(profession).map(String::as_str)
    }

    fn series_url(&self, region: &str, category: &str) -> String {
        let key = self
            .config
            .key_template
            .replace("{region}", region)
            .replace("{category}", category);
        format!(
            "{}/data/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.dataflow,
            key
        )
    }

    async fn query_region(client: reqwest::Client, url: String, year: u16) -> RegionOutcome {
        let year = year.to_string();
        let request = client.get(&url).query(&[
            ("startPeriod", year.as_str()),
            ("endPeriod", year.as_str()),
            ("format", "jsondata"),
        ]);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return RegionOutcome::Unreachable(e.to_string()),
        };

        let status = response.status();
        if status.is_server_error() {
            return RegionOutcome::Unreachable(format!("HTTP {status}"));
        }
        if !status.is_success() {
            return RegionOutcome::NoData(format!("HTTP {status}"));
        }

        match response.json::<Value>().await {
            Ok(body) => match first_observation(&body) {
                Some(value) => RegionOutcome::Value(value),
                None => RegionOutcome::NoData("no observation in response".into()),
            },
            Err(e) => RegionOutcome::NoData(format!("unreadable response: {e}")),
        }
    }
}

impl StatisticsSource for IstatSource {
    async fn fetch_statistics(
        &self,
        profession: &str,
        region_codes: &[RawRegionCode],
    ) -> Result<Vec<StatisticRecord>, SourceError> {
        let Some(category) = self.category_for(profession) else {
            tracing::warn!(%profession, "no ISTAT category mapped for profession");
            return Ok(Vec::new());
        };

        let mut tasks = JoinSet::new();
        let mut requested = 0usize;
        for (index, raw) in region_codes.iter().enumerate() {
            let RegionKey::Code(code) = normalize(raw) else {
                tracing::warn!(region = ?raw, "skipping region without a code");
                continue;
            };
            let territory = self
                .config
                .territories
                .get(code.as_str())
                .map(String::as_str)
                .unwrap_or(code.as_str());
            let url = self.series_url(territory, category);
            tracing::debug!(%code, %url, "querying ISTAT");

            let client = self.client.clone();
            let year = self.config.year;
            requested += 1;
            tasks.spawn(async move {
                (index, Self::query_region(client, url, year).await)
            });
        }

        let mut slots: Vec<Option<StatisticRecord>> = vec![None; region_codes.len()];
        let mut unreachable = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, "ISTAT request task failed");
                    unreachable += 1;
                    continue;
                }
            };
            let region = region_codes[index].clone();
            let value = match outcome {
                RegionOutcome::Value(value) => value,
                RegionOutcome::NoData(reason) => {
                    tracing::warn!(region = ?region, %reason, "no ISTAT data for region, using 0");
                    0.0
                }
                RegionOutcome::Unreachable(reason) => {
                    tracing::warn!(region = ?region, %reason, "ISTAT request failed for region, using 0");
                    unreachable += 1;
                    0.0
                }
            };
            slots[index] = Some(StatisticRecord::new(region, value));
        }

        if requested > 0 && unreachable == requested {
            tracing::error!(regions = requested, "ISTAT unreachable for every region");
            return Err(SourceError::AllRegionsFailed { regions: requested });
        }

        let records: Vec<StatisticRecord> = slots.into_iter().flatten().collect();
        tracing::info!(%profession, %category, records = records.len(), "ISTAT statistics fetched");
        Ok(records)
    }
}

/// First observation of the first series of an SDMX-JSON data message.
pub(crate) fn first_observation(body: &Value) -> Option<f64> {
    let data = body.get("data").unwrap_or(body);
    let series = data.get("dataSets")?.get(0)?.get("series")?.as_object()?;
    let observations = series.values().next()?.get("observations")?.as_object()?;
    let first = observations
        .get("0")
        .or_else(|| observations.values().next())?;

    let value = match first.get(0)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

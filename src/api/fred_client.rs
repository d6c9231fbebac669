use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{ApiRateLimiter, MacroDataProvider};
use crate::models::{Config, SeriesPoint};

/// FRED series observations response
#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct FredErrorBody {
    error_message: Option<String>,
}

/// Client for the St. Louis Fed FRED API
pub struct FredClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: ApiRateLimiter,
}

impl FredClient {
    /// Fails with a `ConfigError` when no API key is configured
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_fred_api_key()?.to_string();

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("sp500-news-reaction/0.1")
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.fred_base_url.trim_end_matches('/').to_string(),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
        })
    }

    fn observations_url(&self, series_id: &str, observation_start: NaiveDate) -> Result<Url> {
        let start = observation_start.format("%Y-%m-%d").to_string();
        Url::parse_with_params(
            &format!("{}/series/observations", self.base_url),
            &[
                ("series_id", series_id),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("observation_start", start.as_str()),
            ],
        )
        .context("building FRED observations URL")
    }
}

#[async_trait]
impl MacroDataProvider for FredClient {
    async fn get_series(&self, series_id: &str, observation_start: NaiveDate) -> Result<Vec<SeriesPoint>> {
        let url = self.observations_url(series_id, observation_start)?;

        self.rate_limiter.wait().await;
        debug!("Requesting FRED series {}", series_id);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<FredErrorBody>(&body)
                .ok()
                .and_then(|b| b.error_message)
                .unwrap_or(body);
            return Err(anyhow!("FRED request for {} failed ({}): {}", series_id, status, message));
        }

        let payload: ObservationsResponse = response
            .json()
            .await
            .with_context(|| format!("decoding FRED response for {}", series_id))?;

        parse_observations(series_id, payload.observations)
    }
}

/// FRED marks missing observations with "."; those are dropped
fn parse_observations(series_id: &str, observations: Vec<Observation>) -> Result<Vec<SeriesPoint>> {
    let mut points = Vec::with_capacity(observations.len());
    for obs in observations {
        let value = obs.value.trim();
        if value == "." || value.is_empty() {
            continue;
        }
        let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d")
            .with_context(|| format!("{}: bad observation date {:?}", series_id, obs.date))?;
        let value: f64 = value
            .parse()
            .with_context(|| format!("{}: bad observation value {:?}", series_id, obs.value))?;
        points.push(SeriesPoint { date, value });
    }
    Ok(points)
}

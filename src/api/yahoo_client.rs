use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{ApiRateLimiter, MarketDataProvider};
use crate::models::{Config, SeriesPoint};

/// Yahoo Finance v8 chart API response
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

/// Daily closes from Yahoo Finance (used for ^VIX)
pub struct YahooClient {
    client: Client,
    base_url: String,
    rate_limiter: ApiRateLimiter,
}

impl YahooClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) sp500-news-reaction/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: config.yahoo_base_url.trim_end_matches('/').to_string(),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
        })
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate) -> Result<Url> {
        let start_ts = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default();
        let end_ts = Utc::now().timestamp();

        let mut url = Url::parse(&self.base_url).context("parsing Yahoo base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Yahoo base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("period1", &start_ts.to_string())
            .append_pair("period2", &end_ts.to_string())
            .append_pair("interval", "1d");
        Ok(url)
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn get_daily_closes(&self, symbol: &str, start: NaiveDate) -> Result<Vec<SeriesPoint>> {
        let url = self.chart_url(symbol, start)?;

        self.rate_limiter.wait().await;
        debug!("Requesting Yahoo chart for {}", symbol);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Yahoo reports errors inside the chart envelope, often with a 4xx status
        let parsed: ChartResponse = serde_json::from_str(&body).map_err(|e| {
            anyhow!("Yahoo response for {} not understood ({}): {}", symbol, status, e)
        })?;
        parse_chart(symbol, parsed)
    }
}

fn parse_chart(symbol: &str, response: ChartResponse) -> Result<Vec<SeriesPoint>> {
    if let Some(err) = response.chart.error {
        return Err(anyhow!("Yahoo chart error for {}: {} ({})", symbol, err.description, err.code));
    }

    let data = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| anyhow!("Yahoo returned no chart data for {}", symbol))?;

    let timestamps = data.timestamp.unwrap_or_default();
    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let points = timestamps
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            close.map(|value| SeriesPoint { date, value })
        })
        .collect();
    Ok(points)
}

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::models::SeriesPoint;

pub mod fred_client;
pub mod yahoo_client;
pub use fred_client::FredClient;
pub use yahoo_client::YahooClient;

/// Simple rate limiter for API requests: spaces calls evenly across a minute
pub struct ApiRateLimiter {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let delay_ms = if requests_per_minute > 0 {
            60_000 / requests_per_minute as u64
        } else {
            1000 // Default 1 second delay
        };

        Self {
            interval: Duration::from_millis(delay_ms),
            last_request: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Source of named macroeconomic series (FRED)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MacroDataProvider: Send + Sync {
    async fn get_series(&self, series_id: &str, observation_start: NaiveDate) -> Result<Vec<SeriesPoint>>;
}

/// Source of daily market closes (Yahoo Finance)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_daily_closes(&self, symbol: &str, start: NaiveDate) -> Result<Vec<SeriesPoint>>;
}

//! The three batch steps, each opening the store, doing its work and closing
//! the store again. Binaries call straight into these.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{FredClient, MacroDataProvider, MarketDataProvider, YahooClient};
use crate::data_collector::DataCollector;
use crate::database::{StagingStore, NEWS_RELEASES};
use crate::export;
use crate::models::Config;
use crate::tick_windows::{ExtractionReport, TickWindowExtractor};

pub const DEFAULT_LOG_FILTER: &str = "sp500_news_reaction=info";

/// Install the fmt subscriber; `RUST_LOG` overrides the default filter
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A second call (tests, umbrella binary) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Step 1 against the real FRED and Yahoo endpoints.
/// A missing FRED key fails here, before the database is opened.
pub async fn load_and_prepare(config: &Config) -> Result<()> {
    let fred = FredClient::new(config)?;
    let yahoo = YahooClient::new(config)?;
    load_and_prepare_with(config, Arc::new(fred), Arc::new(yahoo)).await
}

/// Step 1 with caller-supplied providers
pub async fn load_and_prepare_with(
    config: &Config,
    macro_provider: Arc<dyn MacroDataProvider>,
    market_provider: Arc<dyn MarketDataProvider>,
) -> Result<()> {
    config.require_fred_api_key()?;
    info!("🚀 Loading and preparing data into {}", config.database_path.display());

    let store = StagingStore::open(&config.database_path).await?;
    let collector = DataCollector::new(macro_provider, market_provider, store, config.observation_start);

    if let Err(e) = collector.load_tick_data(&config.tick_csv_path()).await {
        error!("❌ Failed to load tick_data: {:#}", e);
    }
    if let Err(e) = collector.load_news_releases(&config.news_csv_path()).await {
        error!("❌ Failed to load news_releases: {:#}", e);
    }

    collector.fetch_yield_curve().await?;
    collector.fetch_vix().await?;
    let report = collector.fetch_macro_indicators().await?;
    if !report.failed.is_empty() {
        warn!(
            "⚠️ {} indicators missing from macro_indicators: {}",
            report.failed.len(),
            report
                .failed
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    collector.create_macro_regime_labels().await?;
    collector.create_daily_macro_summary().await?;

    collector.into_store().close().await;
    Ok(())
}

/// Step 2: one CSV per non-empty (event, window width) pair
pub async fn extract_tick_windows(config: &Config) -> Result<ExtractionReport> {
    let store = StagingStore::open(&config.database_path).await?;

    let events_table = resolve_events_table(&store, &config.news_events_table).await?;
    let events = store.load_news_events(&events_table).await?;
    let ticks = store.load_tick_data().await?;
    info!("📊 {} events from {}, {} ticks", events.len(), events_table, ticks.len());

    let report = TickWindowExtractor::new(&config.tick_window_dir)
        .extract(&events, &ticks)
        .context("extracting tick windows")?;

    store.close().await;
    Ok(report)
}

/// The configured events table, or `news_releases` when it has not been built
async fn resolve_events_table(store: &StagingStore, configured: &str) -> Result<String> {
    if store.table_exists(configured).await? || configured == NEWS_RELEASES {
        return Ok(configured.to_string());
    }
    warn!("⚠️ Table '{}' not found, reading events from '{}'", configured, NEWS_RELEASES);
    Ok(NEWS_RELEASES.to_string())
}

/// Step 3: join the per-event delta tables into the final dataset
pub async fn export_analysis_dataset(config: &Config) -> Result<usize> {
    let store = StagingStore::open(&config.database_path).await?;
    let rows = export::export_analysis_dataset(&store, &config.final_dataset_path).await?;
    store.close().await;
    Ok(rows)
}

/// All three steps in order
pub async fn run_all(config: &Config) -> Result<()> {
    load_and_prepare(config).await.context("loading and preparing data")?;
    let report = extract_tick_windows(config).await.context("extracting tick windows")?;
    info!("🪟 {} window files written", report.files_written.len());
    let rows = export_analysis_dataset(config).await.context("exporting analysis dataset")?;
    info!("🏁 Pipeline finished: {} rows in {}", rows, config.final_dataset_path.display());
    Ok(())
}

//! Step 1 end to end with in-memory providers

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

use sp500_news_reaction::database::{
    StagingStore, DAILY_MACRO_SUMMARY, MACRO_INDICATORS, MARKET_REGIME, NEWS_RELEASES, TICK_DATA,
    VIX_INDEX, YIELD_CURVE,
};
use sp500_news_reaction::error::ConfigError;
use sp500_news_reaction::pipeline;

use crate::common::fixtures::{write_raw_files, StaticMacroProvider, StaticMarketProvider};
use crate::common::{logging, test_config};

const MONTHS: u32 = 24;
// 2023-01-01 through 2024-12-01
const CALENDAR_DAYS: usize = 701;

#[tokio::test]
async fn test_load_and_prepare_stages_every_table() {
    logging::init_test_logging();
    logging::log_test_step("Running step 1 against static providers");

    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), Some("test-key"));
    write_raw_files(&config.raw_data_dir).unwrap();

    pipeline::load_and_prepare_with(
        &config,
        Arc::new(StaticMacroProvider::full_catalog(MONTHS)),
        Arc::new(StaticMarketProvider),
    )
    .await
    .unwrap();

    let store = StagingStore::open(&config.database_path).await.unwrap();

    let ticks = store.load_tick_data().await.unwrap();
    assert_eq!(ticks.len(), 5);

    let news = store.load_table(NEWS_RELEASES).await.unwrap();
    assert_eq!(news.column_names(), vec!["datetime", "event", "country", "impact"]);
    assert_eq!(news.len(), 3);

    let yield_curve = store.load_table(YIELD_CURVE).await.unwrap();
    assert_eq!(yield_curve.len(), MONTHS as usize);

    let vix = store.load_table(VIX_INDEX).await.unwrap();
    assert_eq!(vix.len(), 20);

    let macro_rows = store.load_table(MACRO_INDICATORS).await.unwrap();
    assert_eq!(macro_rows.len(), 8 * MONTHS as usize);

    let summary = store.load_table(DAILY_MACRO_SUMMARY).await.unwrap();
    assert_eq!(summary.len(), CALENDAR_DAYS);
    assert_eq!(summary.column_names().first(), Some(&"date"));
    assert_eq!(summary.column_names().last(), Some(&"yield_spread"));

    let regimes = store.load_table(MARKET_REGIME).await.unwrap();
    assert_eq!(regimes.len(), 5 * CALENDAR_DAYS);

    let labels_on = |date: &str| -> Vec<(String, String)> {
        let date_idx = regimes.column_index("date").unwrap();
        let type_idx = regimes.column_index("regime_type").unwrap();
        let label_idx = regimes.column_index("regime_label").unwrap();
        regimes
            .rows
            .iter()
            .filter(|row| row[date_idx].as_str() == Some(date))
            .map(|row| (row[type_idx].render(), row[label_idx].render()))
            .collect()
    };

    assert_eq!(
        labels_on("2024-06-15"),
        vec![
            ("growth_regime".to_string(), "expansion".to_string()),
            ("policy_regime".to_string(), "neutral".to_string()),
            ("yield_curve_regime".to_string(), "normal".to_string()),
            ("sentiment_regime".to_string(), "bullish".to_string()),
            ("inflation_regime".to_string(), "high".to_string()),
        ]
    );

    // First date: no previous rate and no 12-month history yet
    let first_day = labels_on("2023-01-01");
    assert_eq!(first_day[0], ("growth_regime".to_string(), "recession".to_string()));
    assert_eq!(first_day[1], ("policy_regime".to_string(), String::new()));
    assert_eq!(first_day[2], ("yield_curve_regime".to_string(), "inverted".to_string()));
    assert_eq!(first_day[3], ("sentiment_regime".to_string(), "bearish".to_string()));
    assert_eq!(first_day[4], ("inflation_regime".to_string(), String::new()));

    store.close().await;
}

#[tokio::test]
async fn test_failing_indicator_does_not_stop_the_step() {
    logging::init_test_logging();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), Some("test-key"));
    write_raw_files(&config.raw_data_dir).unwrap();

    pipeline::load_and_prepare_with(
        &config,
        Arc::new(StaticMacroProvider::full_catalog(MONTHS).without("UNRATE")),
        Arc::new(StaticMarketProvider),
    )
    .await
    .unwrap();

    let store = StagingStore::open(&config.database_path).await.unwrap();
    let macro_rows = store.load_table(MACRO_INDICATORS).await.unwrap();
    assert_eq!(macro_rows.len(), 7 * MONTHS as usize);
    let summary = store.load_table(DAILY_MACRO_SUMMARY).await.unwrap();
    assert!(!summary.column_names().contains(&"Unemployment Rate"));
    store.close().await;
}

#[tokio::test]
async fn test_missing_raw_files_are_tolerated() {
    logging::init_test_logging();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), Some("test-key"));

    pipeline::load_and_prepare_with(
        &config,
        Arc::new(StaticMacroProvider::full_catalog(MONTHS)),
        Arc::new(StaticMarketProvider),
    )
    .await
    .unwrap();

    let store = StagingStore::open(&config.database_path).await.unwrap();
    assert!(!store.table_exists(TICK_DATA).await.unwrap());
    assert!(!store.table_exists(NEWS_RELEASES).await.unwrap());
    assert!(store.table_exists(MARKET_REGIME).await.unwrap());
    store.close().await;
}

#[tokio::test]
async fn test_yield_curve_failure_propagates() {
    logging::init_test_logging();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), Some("test-key"));

    let result = pipeline::load_and_prepare_with(
        &config,
        Arc::new(StaticMacroProvider::full_catalog(MONTHS).without("GS2")),
        Arc::new(StaticMarketProvider),
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_fred_key_fails_before_touching_the_database() {
    logging::init_test_logging();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), None);

    let err = pipeline::load_and_prepare(&config).await.unwrap_err();

    assert_matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::MissingCredential("FRED_API_KEY"))
    );
    assert!(!config.database_path.exists());

    let provider = StaticMacroProvider::full_catalog(MONTHS);
    let requests = Arc::new(provider);
    let err = pipeline::load_and_prepare_with(&config, requests.clone(), Arc::new(StaticMarketProvider))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("FRED_API_KEY"));
    assert!(requests.requests.lock().unwrap().is_empty());
    assert!(!config.database_path.exists());
}

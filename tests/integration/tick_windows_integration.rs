//! Step 2 against a staged database

use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

use sp500_news_reaction::csv_import::{read_news_releases, read_tick_data};
use sp500_news_reaction::database::{Column, SqlValue, StagedTable, StagingStore};
use sp500_news_reaction::models::Config;
use sp500_news_reaction::pipeline;

use crate::common::fixtures::write_raw_files;
use crate::common::{logging, test_config};

async fn staged_config(root: &TempDir) -> (Config, StagingStore) {
    let config = test_config(root.path(), None);
    write_raw_files(&config.raw_data_dir).unwrap();

    let store = StagingStore::open(&config.database_path).await.unwrap();
    let (ticks, _) = read_tick_data(&config.tick_csv_path()).unwrap();
    let (news, _) = read_news_releases(&config.news_csv_path()).unwrap();
    store.rebuild_tick_data(&ticks).await.unwrap();
    store.rebuild_news_releases(&news).await.unwrap();
    (config, store)
}

fn window_files(config: &Config) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(&config.tick_window_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_extract_falls_back_to_raw_news_table() {
    logging::init_test_logging();
    logging::log_test_step("news_releases_clean is absent, news_releases is used");

    let root = TempDir::new().unwrap();
    let (config, store) = staged_config(&root).await;
    store.close().await;

    let report = pipeline::extract_tick_windows(&config).await.unwrap();
    logging::log_test_data("extraction report", &report);

    assert_eq!(report.events_processed, 3);
    assert_eq!(report.empty_windows, 3);
    assert_eq!(
        window_files(&config),
        vec![
            "2024-03-08_Non-Farm_Payrolls_15m.csv",
            "2024-03-08_Non-Farm_Payrolls_1m.csv",
            "2024-03-08_Non-Farm_Payrolls_5m.csv",
            "2024-03-08_Unemployment_Rate_15m.csv",
            "2024-03-08_Unemployment_Rate_1m.csv",
            "2024-03-08_Unemployment_Rate_5m.csv",
        ]
    );

    let count_rows = |name: &str| {
        let text = fs::read_to_string(config.tick_window_dir.join(name)).unwrap();
        text.lines().count() - 1
    };
    assert_eq!(count_rows("2024-03-08_Non-Farm_Payrolls_1m.csv"), 2);
    assert_eq!(count_rows("2024-03-08_Non-Farm_Payrolls_5m.csv"), 4);
    assert_eq!(count_rows("2024-03-08_Non-Farm_Payrolls_15m.csv"), 5);

    let header = fs::read_to_string(config.tick_window_dir.join("2024-03-08_Unemployment_Rate_1m.csv")).unwrap();
    assert!(header.starts_with("datetime,bid,ask\n2024-03-08 08:30:00,5101.0,5101.25\n"));
}

#[tokio::test]
async fn test_extract_prefers_clean_news_table() {
    logging::init_test_logging();
    let root = TempDir::new().unwrap();
    let (config, store) = staged_config(&root).await;

    let mut clean = StagedTable::new(
        "news_releases_clean",
        vec![Column::text("datetime"), Column::text("event")],
    );
    clean.push_row(vec![SqlValue::text("2024-03-08 08:30:00"), SqlValue::text("Fed Chair: Powell Speaks")]);
    store.rebuild_table("news_releases_clean", &clean).await.unwrap();
    store.close().await;

    let report = pipeline::extract_tick_windows(&config).await.unwrap();

    assert_eq!(report.events_processed, 1);
    assert_eq!(
        window_files(&config),
        vec![
            "2024-03-08_Fed_Chair_Powell_Speaks_15m.csv",
            "2024-03-08_Fed_Chair_Powell_Speaks_1m.csv",
            "2024-03-08_Fed_Chair_Powell_Speaks_5m.csv",
        ]
    );
}

#[tokio::test]
async fn test_rerun_overwrites_window_files() {
    let root = TempDir::new().unwrap();
    let (config, store) = staged_config(&root).await;
    store.close().await;

    pipeline::extract_tick_windows(&config).await.unwrap();
    let second = pipeline::extract_tick_windows(&config).await.unwrap();

    assert_eq!(second.files_written.len(), 6);
    assert_eq!(window_files(&config).len(), 6);
}

//! Step 3: delta tables in the store to the final CSV

use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

use sp500_news_reaction::database::{Column, SqlValue, StagedTable, StagingStore};
use sp500_news_reaction::error::PipelineError;
use sp500_news_reaction::export::{EVENT_PRICE_DELTA_15MIN, EVENT_PRICE_DELTA_1MIN, EVENT_PRICE_DELTA_5MIN};
use sp500_news_reaction::pipeline;

use crate::common::{logging, test_config};

const EVENTS: [(&str, &str); 5] = [
    ("2024-01-05 08:30:00", "Non-Farm Payrolls"),
    ("2024-01-11 08:30:00", "CPI m/m"),
    ("2024-01-31 14:00:00", "FOMC Statement"),
    ("2024-02-02 08:30:00", "Non-Farm Payrolls"),
    ("2024-02-13 08:30:00", "CPI m/m"),
];

fn delta_table(name: &str, suffix: &str, events: &[(&str, &str)], base: f64) -> StagedTable {
    let mut table = StagedTable::new(
        name,
        vec![
            Column::text("event_datetime"),
            Column::text("event"),
            Column::real(format!("price_before_{}", suffix)),
            Column::real(format!("price_after_{}", suffix)),
            Column::real(format!("delta_{}", suffix)),
        ],
    );
    for (i, (datetime, event)) in events.iter().enumerate() {
        let before = 4800.0 + i as f64;
        let after = before + base;
        table.push_row(vec![
            SqlValue::text(*datetime),
            SqlValue::text(*event),
            SqlValue::Real(before),
            SqlValue::Real(after),
            SqlValue::Real(after - before),
        ]);
    }
    table
}

#[tokio::test]
async fn test_export_keeps_all_first_table_rows() {
    logging::init_test_logging();
    logging::log_test_step("5 one-minute rows, 3 five-minute matches, no fifteen-minute matches");

    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), None);
    let store = StagingStore::open(&config.database_path).await.unwrap();

    store
        .rebuild_table(EVENT_PRICE_DELTA_1MIN, &delta_table(EVENT_PRICE_DELTA_1MIN, "1min", &EVENTS, 1.5))
        .await
        .unwrap();
    let five_minute_events = [EVENTS[0], EVENTS[2], EVENTS[4]];
    store
        .rebuild_table(
            EVENT_PRICE_DELTA_5MIN,
            &delta_table(EVENT_PRICE_DELTA_5MIN, "5min", &five_minute_events, -2.0),
        )
        .await
        .unwrap();
    store
        .rebuild_table(
            EVENT_PRICE_DELTA_15MIN,
            &delta_table(EVENT_PRICE_DELTA_15MIN, "15min", &[("2023-12-01 08:30:00", "Non-Farm Payrolls")], 4.0),
        )
        .await
        .unwrap();
    store.close().await;

    let rows = pipeline::export_analysis_dataset(&config).await.unwrap();
    assert_eq!(rows, 5);

    let mut reader = csv::Reader::from_path(&config.final_dataset_path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(
        headers,
        vec![
            "event_datetime",
            "event",
            "price_before_1min",
            "price_after_1min",
            "delta_1min",
            "price_before_5min",
            "price_after_5min",
            "delta_5min",
            "price_before_15min",
            "price_after_15min",
            "delta_15min",
        ]
    );

    let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(records.len(), 5);
    for record in &records {
        assert_eq!(&record[8], "");
        assert_eq!(&record[9], "");
        assert_eq!(&record[10], "");
    }
    assert_eq!(&records[0][7], "-2.0");
    assert_eq!(&records[1][7], "");
    assert_eq!(&records[2][7], "-2.0");
    assert_eq!(&records[3][5], "");
    assert_eq!(&records[4][1], "CPI m/m");
}

#[tokio::test]
async fn test_export_requires_key_columns() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), None);
    let store = StagingStore::open(&config.database_path).await.unwrap();

    store
        .rebuild_table(EVENT_PRICE_DELTA_1MIN, &delta_table(EVENT_PRICE_DELTA_1MIN, "1min", &EVENTS, 1.0))
        .await
        .unwrap();
    store
        .rebuild_table(EVENT_PRICE_DELTA_5MIN, &delta_table(EVENT_PRICE_DELTA_5MIN, "5min", &EVENTS, 1.0))
        .await
        .unwrap();
    let mut keyless = StagedTable::new(EVENT_PRICE_DELTA_15MIN, vec![Column::text("event"), Column::real("delta_15min")]);
    keyless.push_row(vec![SqlValue::text("CPI m/m"), SqlValue::Real(1.0)]);
    store.rebuild_table(EVENT_PRICE_DELTA_15MIN, &keyless).await.unwrap();
    store.close().await;

    let err = pipeline::export_analysis_dataset(&config).await.unwrap_err();
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::MissingColumn { table, column }) => {
            assert_eq!(table, EVENT_PRICE_DELTA_15MIN);
            assert_eq!(column, "event_datetime");
        }
        other => panic!("expected a missing column error, got {:?}", other),
    }
    assert!(!config.final_dataset_path.exists());
}

#[tokio::test]
async fn test_export_without_delta_tables_fails() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), None);

    assert!(pipeline::export_analysis_dataset(&config).await.is_err());
    assert!(!config.final_dataset_path.exists());
    assert!(fs::metadata(root.path().join("data").join("final")).is_err());
}

#[tokio::test]
async fn test_export_reads_delta_views() {
    logging::init_test_logging();
    logging::log_test_step("Delta tables are views with untyped computed columns");

    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), None);
    let store = StagingStore::open(&config.database_path).await.unwrap();

    let mut prices = StagedTable::new(
        "event_prices",
        vec![
            Column::text("event_datetime"),
            Column::text("event"),
            Column::text("horizon"),
            Column::real("price_before"),
            Column::real("price_after"),
        ],
    );
    let observed = [
        (EVENTS[0], "1min", 4800.0, 4801.0),
        (EVENTS[1], "1min", 4810.0, 4809.5),
        (EVENTS[0], "5min", 4800.0, 4798.0),
        (EVENTS[1], "15min", 4810.0, 4812.25),
    ];
    for ((datetime, event), horizon, before, after) in observed {
        prices.push_row(vec![
            SqlValue::text(datetime),
            SqlValue::text(event),
            SqlValue::text(horizon),
            SqlValue::Real(before),
            SqlValue::Real(after),
        ]);
    }
    store.rebuild_table("event_prices", &prices).await.unwrap();

    for (view, horizon) in [
        (EVENT_PRICE_DELTA_1MIN, "1min"),
        (EVENT_PRICE_DELTA_5MIN, "5min"),
        (EVENT_PRICE_DELTA_15MIN, "15min"),
    ] {
        let sql = format!(
            "CREATE VIEW {view} AS SELECT event_datetime, event, \
             price_after - price_before AS delta_{horizon} \
             FROM event_prices WHERE horizon = '{horizon}'"
        );
        sqlx::query(&sql).execute(store.pool()).await.unwrap();
    }
    store.close().await;

    let rows = pipeline::export_analysis_dataset(&config).await.unwrap();
    assert_eq!(rows, 2);

    let text = fs::read_to_string(&config.final_dataset_path).unwrap();
    assert_eq!(
        text,
        "event_datetime,event,delta_1min,delta_5min,delta_15min\n\
         2024-01-05 08:30:00,Non-Farm Payrolls,1.0,-2.0,\n\
         2024-01-11 08:30:00,CPI m/m,-0.5,,2.25\n"
    );
}

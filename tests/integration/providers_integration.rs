//! FRED and Yahoo clients against a local mock server

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sp500_news_reaction::api::{FredClient, MacroDataProvider, MarketDataProvider, YahooClient};
use sp500_news_reaction::models::SeriesPoint;

use crate::common::{logging, test_config};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

#[tokio::test]
async fn test_fred_series_skips_missing_markers() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/series/observations"))
        .and(query_param("series_id", "GS10"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("file_type", "json"))
        .and(query_param("observation_start", "2020-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [
                {"realtime_start": "2024-01-01", "realtime_end": "2024-01-01", "date": "2020-01-01", "value": "1.88"},
                {"realtime_start": "2024-01-01", "realtime_end": "2024-01-01", "date": "2020-02-01", "value": "."},
                {"realtime_start": "2024-01-01", "realtime_end": "2024-01-01", "date": "2020-03-01", "value": "0.87"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path(), Some("test-key"));
    config.fred_base_url = server.uri();

    let points = FredClient::new(&config).unwrap().get_series("GS10", start()).await.unwrap();

    assert_eq!(
        points,
        vec![
            SeriesPoint { date: start(), value: 1.88 },
            SeriesPoint { date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(), value: 0.87 },
        ]
    );
}

#[tokio::test]
async fn test_fred_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/series/observations"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_code": 400,
            "error_message": "Bad Request.  The series does not exist."
        })))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path(), Some("test-key"));
    config.fred_base_url = server.uri();

    let err = FredClient::new(&config).unwrap().get_series("NOPE", start()).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("NOPE"));
    assert!(message.contains("The series does not exist"));
}

#[tokio::test]
async fn test_yahoo_daily_closes_skip_null_quotes() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v8/finance/chart/.*VIX$"))
        .and(query_param("interval", "1d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "^VIX"},
                    "timestamp": [1704205800, 1704292200, 1704378600],
                    "indicators": {"quote": [{"close": [13.2, null, 14.04]}]}
                }],
                "error": null
            }
        })))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path(), None);
    config.yahoo_base_url = server.uri();

    let closes = YahooClient::new(&config)
        .unwrap()
        .get_daily_closes("^VIX", start())
        .await
        .unwrap();

    assert_eq!(closes.len(), 2);
    assert_eq!(closes[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    assert_eq!(closes[0].value, 13.2);
    assert_eq!(closes[1].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
}

#[tokio::test]
async fn test_yahoo_chart_error_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        })))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path(), None);
    config.yahoo_base_url = server.uri();

    let err = YahooClient::new(&config)
        .unwrap()
        .get_daily_closes("^VIX", start())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("delisted"));
}

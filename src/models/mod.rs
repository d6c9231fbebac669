use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const GDP_GROWTH: &str = "US GDP Growth";
pub const UNEMPLOYMENT_RATE: &str = "Unemployment Rate";
pub const CPI: &str = "CPI (All Urban Consumers)";
pub const FED_FUNDS_RATE: &str = "Fed Funds Rate";
pub const M2_MONEY_SUPPLY: &str = "M2 Money Supply";
pub const TREASURY_10Y: &str = "10-Year Treasury Yield";
pub const TREASURY_2Y: &str = "2-Year Treasury Yield";
pub const CONSUMER_SENTIMENT: &str = "Consumer Sentiment (UMich)";

/// A macro series we pull from FRED and stage into `macro_indicators`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSpec {
    pub name: &'static str,
    pub code: &'static str,
    pub unit: &'static str,
    pub frequency: &'static str,
}

/// Fixed indicator catalog, in fetch order
pub const MACRO_INDICATORS: [IndicatorSpec; 8] = [
    IndicatorSpec { name: GDP_GROWTH, code: "A191RL1Q225SBEA", unit: "%", frequency: "quarterly" },
    IndicatorSpec { name: UNEMPLOYMENT_RATE, code: "UNRATE", unit: "%", frequency: "monthly" },
    IndicatorSpec { name: CPI, code: "CPIAUCSL", unit: "index", frequency: "monthly" },
    IndicatorSpec { name: FED_FUNDS_RATE, code: "FEDFUNDS", unit: "%", frequency: "daily" },
    IndicatorSpec { name: M2_MONEY_SUPPLY, code: "M2SL", unit: "USD Bn", frequency: "weekly" },
    IndicatorSpec { name: TREASURY_10Y, code: "GS10", unit: "%", frequency: "daily" },
    IndicatorSpec { name: TREASURY_2Y, code: "GS2", unit: "%", frequency: "daily" },
    IndicatorSpec { name: CONSUMER_SENTIMENT, code: "UMCSENT", unit: "index", frequency: "monthly" },
];

pub const VIX_SYMBOL: &str = "^VIX";

/// One dated value of a provider series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Long-form macro observation as staged in `macro_indicators`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorObservation {
    pub date: NaiveDate,
    pub indicator_name: String,
    pub value: f64,
    pub unit: String,
    pub frequency: String,
}

impl IndicatorObservation {
    pub fn from_point(spec: &IndicatorSpec, point: SeriesPoint) -> Self {
        Self {
            date: point.date,
            indicator_name: spec.name.to_string(),
            value: point.value,
            unit: spec.unit.to_string(),
            frequency: spec.frequency.to_string(),
        }
    }
}

/// 10y/2y treasury yields aligned on date
#[derive(Debug, Clone, PartialEq)]
pub struct YieldCurveRow {
    pub date: NaiveDate,
    pub treasury_10y: Option<f64>,
    pub treasury_2y: Option<f64>,
    pub spread: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VixRow {
    pub date: NaiveDate,
    pub vix_close: f64,
}

/// Raw bid/ask quote; either side may be blank in the source export
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickRecord {
    pub datetime: NaiveDateTime,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

/// A scheduled release the tick windows are centred on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NewsEvent {
    pub datetime: NaiveDateTime,
    pub event: String,
}

/// A row of the news CSV: the event itself plus whatever other columns the file carries
#[derive(Debug, Clone, PartialEq)]
pub struct NewsRelease {
    pub event: NewsEvent,
    pub attributes: BTreeMap<String, String>,
}

/// The five regime families derived from the daily indicator matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegimeType {
    Growth,
    Policy,
    YieldCurve,
    Sentiment,
    Inflation,
}

impl RegimeType {
    /// Long-form output order
    pub const ALL: [RegimeType; 5] = [
        RegimeType::Growth,
        RegimeType::Policy,
        RegimeType::YieldCurve,
        RegimeType::Sentiment,
        RegimeType::Inflation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeType::Growth => "growth_regime",
            RegimeType::Policy => "policy_regime",
            RegimeType::YieldCurve => "yield_curve_regime",
            RegimeType::Sentiment => "sentiment_regime",
            RegimeType::Inflation => "inflation_regime",
        }
    }
}

impl fmt::Display for RegimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegimeLabel {
    Recession,
    Expansion,
    Tightening,
    Easing,
    Inverted,
    Normal,
    Bearish,
    Bullish,
    High,
    Neutral,
}

impl RegimeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeLabel::Recession => "recession",
            RegimeLabel::Expansion => "expansion",
            RegimeLabel::Tightening => "tightening",
            RegimeLabel::Easing => "easing",
            RegimeLabel::Inverted => "inverted",
            RegimeLabel::Normal => "normal",
            RegimeLabel::Bearish => "bearish",
            RegimeLabel::Bullish => "bullish",
            RegimeLabel::High => "high",
            RegimeLabel::Neutral => "neutral",
        }
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Long-form regime row as staged in `market_regime`
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeRecord {
    pub date: NaiveDate,
    pub regime_type: RegimeType,
    pub regime_label: Option<RegimeLabel>,
}

/// Half-width of a tick window around an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowWidth {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
}

impl WindowWidth {
    pub const ALL: [WindowWidth; 3] = [
        WindowWidth::OneMinute,
        WindowWidth::FiveMinutes,
        WindowWidth::FifteenMinutes,
    ];

    pub fn minutes(&self) -> i64 {
        match self {
            WindowWidth::OneMinute => 1,
            WindowWidth::FiveMinutes => 5,
            WindowWidth::FifteenMinutes => 15,
        }
    }

    pub fn half_width(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.minutes())
    }

    pub fn tag(&self) -> &'static str {
        match self {
            WindowWidth::OneMinute => "1m",
            WindowWidth::FiveMinutes => "5m",
            WindowWidth::FifteenMinutes => "15m",
        }
    }
}

/// Configuration for the pipeline, built once per process
#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub database_path: PathBuf,
    pub raw_data_dir: PathBuf,
    pub tick_window_dir: PathBuf,
    pub final_dataset_path: PathBuf,
    pub fred_api_key: Option<String>,
    pub fred_base_url: String,
    pub yahoo_base_url: String,
    pub observation_start: NaiveDate,
    pub news_events_table: String,
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if it exists
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let project_root = PathBuf::from(var("PROJECT_ROOT").unwrap_or_else(|| ".".to_string()));
        let path_or = |key: &str, default: PathBuf| var(key).map(PathBuf::from).unwrap_or(default);

        let observation_start = match var("OBSERVATION_START") {
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                ConfigError::InvalidValue {
                    name: "OBSERVATION_START",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => default_observation_start(),
        };

        let rate_limit_per_minute: u32 = match var("RATE_LIMIT_PER_MINUTE") {
            Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    name: "RATE_LIMIT_PER_MINUTE",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => 120,
        };

        Ok(Config {
            database_path: path_or("DATABASE_PATH", project_root.join("database.db")),
            raw_data_dir: path_or("RAW_DATA_DIR", project_root.join("data").join("raw")),
            tick_window_dir: path_or("TICK_WINDOW_DIR", project_root.join("data").join("tick_windows")),
            final_dataset_path: path_or(
                "FINAL_DATASET_PATH",
                project_root.join("data").join("final").join("final_analysis_dataset.csv"),
            ),
            fred_api_key: var("FRED_API_KEY"),
            fred_base_url: var("FRED_BASE_URL")
                .unwrap_or_else(|| "https://api.stlouisfed.org/fred".to_string()),
            yahoo_base_url: var("YAHOO_BASE_URL")
                .unwrap_or_else(|| "https://query2.finance.yahoo.com".to_string()),
            observation_start,
            news_events_table: var("NEWS_EVENTS_TABLE")
                .unwrap_or_else(|| "news_releases_clean".to_string()),
            rate_limit_per_minute,
            project_root,
        })
    }

    /// The FRED credential; only the loading step needs it
    pub fn require_fred_api_key(&self) -> Result<&str, ConfigError> {
        self.fred_api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential("FRED_API_KEY"))
    }

    pub fn tick_csv_path(&self) -> PathBuf {
        self.raw_data_dir.join("tick_data.csv")
    }

    pub fn news_csv_path(&self) -> PathBuf {
        self.raw_data_dir.join("news_releases.csv")
    }

    /// Override the database location (CLI flag)
    pub fn with_database_path(mut self, path: Option<&Path>) -> Self {
        if let Some(path) = path {
            self.database_path = path.to_path_buf();
        }
        self
    }
}

fn default_observation_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).expect("2020-01-01 is a valid date")
}

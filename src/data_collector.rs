use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::analysis::{derive_market_regimes, DailyMacroSummary};
use crate::api::{MacroDataProvider, MarketDataProvider};
use crate::csv_import::{read_news_releases, read_tick_data};
use crate::database::{StagingStore, DAILY_MACRO_SUMMARY};
use crate::models::{
    IndicatorObservation, VixRow, YieldCurveRow, MACRO_INDICATORS, TREASURY_10Y, TREASURY_2Y, VIX_SYMBOL,
};

const PREVIEW_ROWS: usize = 5;

/// Outcome of a catalog-wide indicator fetch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IndicatorFetchReport {
    pub rows_stored: usize,
    pub loaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Step 1 of the pipeline: stage raw files and provider data, then derive
/// the regime and summary tables from what was staged
pub struct DataCollector {
    macro_provider: Arc<dyn MacroDataProvider>,
    market_provider: Arc<dyn MarketDataProvider>,
    store: StagingStore,
    observation_start: NaiveDate,
}

impl DataCollector {
    pub fn new(
        macro_provider: Arc<dyn MacroDataProvider>,
        market_provider: Arc<dyn MarketDataProvider>,
        store: StagingStore,
        observation_start: NaiveDate,
    ) -> Self {
        Self {
            macro_provider,
            market_provider,
            store,
            observation_start,
        }
    }

    pub fn store(&self) -> &StagingStore {
        &self.store
    }

    pub fn into_store(self) -> StagingStore {
        self.store
    }

    /// Stage the raw tick export into `tick_data`
    pub async fn load_tick_data(&self, path: &Path) -> Result<usize> {
        let (ticks, stats) = read_tick_data(path)?;
        let rows = self.store.rebuild_tick_data(&ticks).await?;
        info!("✅ tick_data loaded into database.");
        info!("🧮 Rows: {} ({} skipped)", rows, stats.rows_skipped);
        log_preview("tick_data", &ticks);
        Ok(rows)
    }

    /// Stage the raw news export into `news_releases`
    pub async fn load_news_releases(&self, path: &Path) -> Result<usize> {
        let (releases, stats) = read_news_releases(path)?;
        let rows = self.store.rebuild_news_releases(&releases).await?;
        info!("✅ news_releases loaded into database.");
        info!("🧮 Rows: {} ({} skipped)", rows, stats.rows_skipped);
        log_preview("news_releases", &releases);
        Ok(rows)
    }

    /// 10y and 2y treasury yields outer-joined on date, with their spread
    pub async fn fetch_yield_curve(&self) -> Result<usize> {
        info!("📊 Fetching yield curve since {}...", self.observation_start);
        let long = self
            .macro_provider
            .get_series(series_code(TREASURY_10Y), self.observation_start)
            .await
            .context("fetching 10-year treasury yield")?;
        let short = self
            .macro_provider
            .get_series(series_code(TREASURY_2Y), self.observation_start)
            .await
            .context("fetching 2-year treasury yield")?;

        let mut by_date: BTreeMap<NaiveDate, (Option<f64>, Option<f64>)> = BTreeMap::new();
        for point in long {
            by_date.entry(point.date).or_default().0 = Some(point.value);
        }
        for point in short {
            by_date.entry(point.date).or_default().1 = Some(point.value);
        }

        let rows: Vec<YieldCurveRow> = by_date
            .into_iter()
            .map(|(date, (treasury_10y, treasury_2y))| YieldCurveRow {
                date,
                treasury_10y,
                treasury_2y,
                spread: treasury_10y.zip(treasury_2y).map(|(l, s)| l - s),
            })
            .collect();

        let stored = self.store.rebuild_yield_curve(&rows).await?;
        info!("✅ yield_curve saved ({} rows)", stored);
        log_preview("yield_curve", &rows);
        Ok(stored)
    }

    pub async fn fetch_vix(&self) -> Result<usize> {
        info!("📊 Fetching {} daily closes since {}...", VIX_SYMBOL, self.observation_start);
        let closes = self
            .market_provider
            .get_daily_closes(VIX_SYMBOL, self.observation_start)
            .await
            .context("fetching VIX closes")?;

        let rows: Vec<VixRow> = closes
            .into_iter()
            .map(|p| VixRow {
                date: p.date,
                vix_close: p.value,
            })
            .collect();

        let stored = self.store.rebuild_vix_index(&rows).await?;
        info!("✅ vix_index saved ({} rows)", stored);
        log_preview("vix_index", &rows);
        Ok(stored)
    }

    /// Fetch every catalog indicator; a failing one is logged and left out
    pub async fn fetch_macro_indicators(&self) -> Result<IndicatorFetchReport> {
        let mut report = IndicatorFetchReport::default();
        let mut observations: Vec<IndicatorObservation> = Vec::new();

        for spec in MACRO_INDICATORS.iter() {
            match self.macro_provider.get_series(spec.code, self.observation_start).await {
                Ok(points) => {
                    debug!("{} ({}): {} observations", spec.name, spec.code, points.len());
                    observations.extend(
                        points
                            .into_iter()
                            .map(|point| IndicatorObservation::from_point(spec, point)),
                    );
                    report.loaded.push(spec.name.to_string());
                    info!("✅ {} loaded", spec.name);
                }
                Err(e) => {
                    error!("❌ Failed to load {}: {:#}", spec.name, e);
                    report.failed.push((spec.name.to_string(), format!("{:#}", e)));
                }
            }
        }

        report.rows_stored = self.store.rebuild_macro_indicators(&observations).await?;
        info!(
            "✅ All macro data saved to 'macro_indicators' table ({} rows, {} of {} indicators)",
            report.rows_stored,
            report.loaded.len(),
            MACRO_INDICATORS.len()
        );
        Ok(report)
    }

    /// Daily forward-filled regime labels from the staged indicators
    pub async fn create_macro_regime_labels(&self) -> Result<usize> {
        let observations = self.store.load_macro_indicators().await?;
        let records = derive_market_regimes(&observations).context("deriving market regimes")?;
        let stored = self.store.rebuild_market_regime(&records).await?;
        info!("✅ Daily forward-filled regime labels saved to 'market_regime' ({} rows)", stored);
        Ok(stored)
    }

    pub async fn create_daily_macro_summary(&self) -> Result<usize> {
        let observations = self.store.load_macro_indicators().await?;
        let summary = DailyMacroSummary::build(&observations).context("building daily macro summary")?;
        let table = summary.to_staged_table()?;
        let stored = self.store.rebuild_table(DAILY_MACRO_SUMMARY, &table).await?;
        info!("✅ Fully filled daily macro summary saved ({} days)", stored);
        Ok(stored)
    }
}

fn series_code(indicator_name: &str) -> &'static str {
    MACRO_INDICATORS
        .iter()
        .find(|spec| spec.name == indicator_name)
        .map(|spec| spec.code)
        .unwrap_or("")
}

fn log_preview<T: Debug>(table: &str, rows: &[T]) {
    for row in rows.iter().take(PREVIEW_ROWS) {
        debug!("{} | {:?}", table, row);
    }
}

use anyhow::{anyhow, Context, Result};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, TypeInfo, ValueRef};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::models::{
    IndicatorObservation, NewsEvent, NewsRelease, RegimeRecord, TickRecord, VixRow, YieldCurveRow,
};
use crate::utils::{format_date, format_datetime, parse_date, parse_datetime};

pub mod table;
pub use table::{Column, ColumnKind, SqlValue, StagedTable};

pub const TICK_DATA: &str = "tick_data";
pub const NEWS_RELEASES: &str = "news_releases";
pub const YIELD_CURVE: &str = "yield_curve";
pub const VIX_INDEX: &str = "vix_index";
pub const MACRO_INDICATORS: &str = "macro_indicators";
pub const MARKET_REGIME: &str = "market_regime";
pub const DAILY_MACRO_SUMMARY: &str = "daily_macro_summary";

/// The single SQLite database every step stages into.
///
/// Tables are never updated in place: each write goes through
/// [`StagingStore::rebuild_table`], which drops, recreates and refills the
/// table within one transaction so readers see either the old or the new
/// contents.
#[derive(Clone)]
pub struct StagingStore {
    pool: SqlitePool,
}

impl StagingStore {
    /// Open (or create) the database file at `database_path`
    pub async fn open(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        // One writer, one connection: steps run strictly in sequence
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(database_path)
                    .create_if_missing(true),
            )
            .await
            .with_context(|| format!("opening database {}", database_path.display()))?;

        info!("💾 Database opened at {}", database_path.display());
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Release the connection; call on the success path, drop covers the rest
    pub async fn close(self) {
        self.pool.close().await;
        info!("🔌 SQLite connection closed.");
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    /// Replace table `name` with the contents of `table`, atomically.
    ///
    /// Drop, create and fill all happen in one transaction. Nothing is
    /// renamed, so views over `name` stay valid across the rebuild.
    pub async fn rebuild_table(&self, name: &str, table: &StagedTable) -> Result<usize> {
        validate_table_name(name)?;
        table.check_row_widths()?;
        if table.columns.is_empty() {
            return Err(anyhow!("cannot rebuild '{}' without columns", name));
        }

        let column_defs = table
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.kind.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; table.columns.len()].join(", ");
        let insert_sql = format!("INSERT INTO {} VALUES ({})", name, placeholders);

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", name))
            .execute(&mut tx)
            .await
            .with_context(|| format!("dropping '{}'", name))?;
        sqlx::query(&format!("CREATE TABLE {} ({})", name, column_defs))
            .execute(&mut tx)
            .await
            .with_context(|| format!("creating '{}'", name))?;

        for row in &table.rows {
            let mut query = sqlx::query(&insert_sql);
            for value in row {
                query = bind_value(query, value);
            }
            query
                .execute(&mut tx)
                .await
                .with_context(|| format!("filling '{}'", name))?;
        }

        tx.commit().await?;

        debug!("Rebuilt '{}' with {} rows", name, table.len());
        Ok(table.len())
    }

    /// Read a whole table or view, keeping declared column order
    pub async fn load_table(&self, name: &str) -> Result<StagedTable> {
        validate_table_name(name)?;

        let info = sqlx::query("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        if info.is_empty() {
            return Err(anyhow!("table '{}' does not exist", name));
        }

        let columns: Vec<Column> = info
            .iter()
            .map(|r| {
                let declared: Option<String> = r.get("type");
                Column::new(
                    r.get::<String, _>("name"),
                    ColumnKind::from_declared(declared.as_deref().unwrap_or("")),
                )
            })
            .collect();

        let rows = sqlx::query(&format!("SELECT * FROM {}", name))
            .fetch_all(&self.pool)
            .await?;

        let mut table = StagedTable::new(name, columns);
        for row in &rows {
            let cells = (0..table.columns.len())
                .map(|i| decode_cell(row, i))
                .collect::<Result<Vec<_>>>()?;
            table.push_row(cells);
        }

        debug!("Loaded '{}' ({} rows)", name, table.len());
        Ok(table)
    }

    pub async fn rebuild_tick_data(&self, ticks: &[TickRecord]) -> Result<usize> {
        let mut table = StagedTable::new(
            TICK_DATA,
            vec![Column::text("datetime"), Column::real("bid"), Column::real("ask")],
        );
        for tick in ticks {
            table.push_row(vec![
                SqlValue::text(format_datetime(&tick.datetime)),
                SqlValue::real(tick.bid),
                SqlValue::real(tick.ask),
            ]);
        }
        self.rebuild_table(TICK_DATA, &table).await
    }

    /// `datetime` and `event` first, then every other CSV column as text
    pub async fn rebuild_news_releases(&self, releases: &[NewsRelease]) -> Result<usize> {
        let mut extra_columns: Vec<&str> = Vec::new();
        for release in releases {
            for key in release.attributes.keys() {
                if !extra_columns.contains(&key.as_str()) {
                    extra_columns.push(key);
                }
            }
        }

        let mut columns = vec![Column::text("datetime"), Column::text("event")];
        columns.extend(extra_columns.iter().map(|name| Column::text(*name)));
        let mut table = StagedTable::new(NEWS_RELEASES, columns);

        for release in releases {
            let mut row = vec![
                SqlValue::text(format_datetime(&release.event.datetime)),
                SqlValue::text(release.event.event.clone()),
            ];
            row.extend(extra_columns.iter().map(|name| {
                release
                    .attributes
                    .get(*name)
                    .map(|v| SqlValue::text(v.clone()))
                    .unwrap_or(SqlValue::Null)
            }));
            table.push_row(row);
        }
        self.rebuild_table(NEWS_RELEASES, &table).await
    }

    pub async fn rebuild_yield_curve(&self, rows: &[YieldCurveRow]) -> Result<usize> {
        let mut table = StagedTable::new(
            YIELD_CURVE,
            vec![
                Column::text("date"),
                Column::real("treasury_10y"),
                Column::real("treasury_2y"),
                Column::real("spread"),
            ],
        );
        for row in rows {
            table.push_row(vec![
                SqlValue::text(format_date(&row.date)),
                SqlValue::real(row.treasury_10y),
                SqlValue::real(row.treasury_2y),
                SqlValue::real(row.spread),
            ]);
        }
        self.rebuild_table(YIELD_CURVE, &table).await
    }

    pub async fn rebuild_vix_index(&self, rows: &[VixRow]) -> Result<usize> {
        let mut table = StagedTable::new(
            VIX_INDEX,
            vec![Column::text("date"), Column::real("vix_close")],
        );
        for row in rows {
            table.push_row(vec![
                SqlValue::text(format_date(&row.date)),
                SqlValue::real(Some(row.vix_close)),
            ]);
        }
        self.rebuild_table(VIX_INDEX, &table).await
    }

    pub async fn rebuild_macro_indicators(&self, observations: &[IndicatorObservation]) -> Result<usize> {
        let mut table = StagedTable::new(
            MACRO_INDICATORS,
            vec![
                Column::text("date"),
                Column::text("indicator_name"),
                Column::real("value"),
                Column::text("unit"),
                Column::text("frequency"),
            ],
        );
        for obs in observations {
            table.push_row(vec![
                SqlValue::text(format_date(&obs.date)),
                SqlValue::text(obs.indicator_name.clone()),
                SqlValue::real(Some(obs.value)),
                SqlValue::text(obs.unit.clone()),
                SqlValue::text(obs.frequency.clone()),
            ]);
        }
        self.rebuild_table(MACRO_INDICATORS, &table).await
    }

    pub async fn rebuild_market_regime(&self, records: &[RegimeRecord]) -> Result<usize> {
        let mut table = StagedTable::new(
            MARKET_REGIME,
            vec![
                Column::text("date"),
                Column::text("regime_type"),
                Column::text("regime_label"),
            ],
        );
        for record in records {
            table.push_row(vec![
                SqlValue::text(format_date(&record.date)),
                SqlValue::text(record.regime_type.as_str()),
                record
                    .regime_label
                    .map(|label| SqlValue::text(label.as_str()))
                    .unwrap_or(SqlValue::Null),
            ]);
        }
        self.rebuild_table(MARKET_REGIME, &table).await
    }

    /// Observations in staging order; NULL values are dropped
    pub async fn load_macro_indicators(&self) -> Result<Vec<IndicatorObservation>> {
        let rows = sqlx::query(
            "SELECT date, indicator_name, value, unit, frequency FROM macro_indicators ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .context("reading macro_indicators")?;

        let mut observations = Vec::with_capacity(rows.len());
        for r in rows {
            let Some(value) = r.get::<Option<f64>, _>("value") else {
                continue;
            };
            observations.push(IndicatorObservation {
                date: parse_date(&r.get::<String, _>("date"))?,
                indicator_name: r.get("indicator_name"),
                value,
                unit: r.get::<Option<String>, _>("unit").unwrap_or_default(),
                frequency: r.get::<Option<String>, _>("frequency").unwrap_or_default(),
            });
        }
        Ok(observations)
    }

    /// All ticks ordered by time
    pub async fn load_tick_data(&self) -> Result<Vec<TickRecord>> {
        let rows = sqlx::query("SELECT datetime, bid, ask FROM tick_data")
            .fetch_all(&self.pool)
            .await
            .context("reading tick_data")?;

        let mut ticks = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for r in &rows {
            let cells = (0..3).map(|i| decode_cell(r, i)).collect::<Result<Vec<_>>>();
            let Ok(cells) = cells else {
                skipped += 1;
                continue;
            };
            match cells[0].as_str().map(parse_datetime) {
                Some(Ok(datetime)) if price_or_null(&cells[1]) && price_or_null(&cells[2]) => {
                    ticks.push(TickRecord {
                        datetime,
                        bid: cells[1].as_f64(),
                        ask: cells[2].as_f64(),
                    })
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("⚠️ Skipped {} tick rows with unreadable timestamps or prices", skipped);
        }

        ticks.sort_by_key(|t| t.datetime);
        Ok(ticks)
    }

    /// `(datetime, event)` pairs from `table`, ordered by datetime
    pub async fn load_news_events(&self, table: &str) -> Result<Vec<NewsEvent>> {
        validate_table_name(table)?;
        let rows = sqlx::query(&format!("SELECT datetime, event FROM {}", table))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("reading {}", table))?;

        let mut events = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for r in &rows {
            // Views carry no declared types, so a cell may hold any storage class
            let (Ok(datetime), Ok(event)) = (decode_cell(r, 0), decode_cell(r, 1)) else {
                skipped += 1;
                continue;
            };
            match (datetime.as_str().map(parse_datetime), event) {
                (Some(Ok(datetime)), SqlValue::Text(event)) => events.push(NewsEvent { datetime, event }),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("⚠️ Skipped {} news rows without a usable datetime or event", skipped);
        }

        events.sort_by(|a, b| a.datetime.cmp(&b.datetime));
        Ok(events)
    }
}

/// A price cell must be numeric or NULL
fn price_or_null(cell: &SqlValue) -> bool {
    matches!(cell, SqlValue::Null | SqlValue::Integer(_) | SqlValue::Real(_))
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::Real(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
    }
}

fn decode_cell(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let type_name = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        raw.type_info().name().to_string()
    };

    Ok(match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => SqlValue::Integer(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" | "NUMERIC" => SqlValue::Real(row.try_get_unchecked::<f64, _>(index)?),
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
    })
}

/// Table names are interpolated into SQL, so only plain identifiers are accepted
fn validate_table_name(name: &str) -> Result<(), PipelineError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(PipelineError::InvalidTableName(name.to_string()))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

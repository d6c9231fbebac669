//! Final analysis dataset: the three per-event price delta tables joined
//! side by side and written as one CSV.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

use crate::database::{Column, SqlValue, StagedTable, StagingStore};
use crate::error::PipelineError;
use crate::utils::write_csv_atomically;

pub const EVENT_PRICE_DELTA_1MIN: &str = "event_price_delta_1min";
pub const EVENT_PRICE_DELTA_5MIN: &str = "event_price_delta_5min";
pub const EVENT_PRICE_DELTA_15MIN: &str = "event_price_delta_15min";

pub const DELTA_TABLES: [&str; 3] = [EVENT_PRICE_DELTA_1MIN, EVENT_PRICE_DELTA_5MIN, EVENT_PRICE_DELTA_15MIN];

/// Composite key the delta tables share
pub const EVENT_KEY: [&str; 2] = ["event_datetime", "event"];

const LEFT_SUFFIX: &str = "_x";
const RIGHT_SUFFIX: &str = "_y";

/// Left join `right` onto `left` on `keys`.
///
/// Every left row survives, in order. A left row with several matching right
/// rows fans out into one output row per match; a left row with none gets
/// NULLs. Non-key columns present on both sides are renamed with `_x` (left)
/// and `_y` (right). Keys compare by their rendered text, so a key stored as
/// TEXT in one table and as a number in another still matches.
pub fn left_join(left: &StagedTable, right: &StagedTable, keys: &[&str]) -> Result<StagedTable, PipelineError> {
    let left_keys = keys
        .iter()
        .map(|k| left.column_index(k))
        .collect::<Result<Vec<_>, _>>()?;
    let right_keys = keys
        .iter()
        .map(|k| right.column_index(k))
        .collect::<Result<Vec<_>, _>>()?;

    let right_values: Vec<usize> = (0..right.columns.len())
        .filter(|i| !right_keys.contains(i))
        .collect();

    let left_names: HashSet<&str> = left
        .columns
        .iter()
        .enumerate()
        .filter(|(i, _)| !left_keys.contains(i))
        .map(|(_, c)| c.name.as_str())
        .collect();
    let overlapping: HashSet<&str> = right_values
        .iter()
        .map(|&i| right.columns[i].name.as_str())
        .filter(|name| left_names.contains(name))
        .collect();

    let mut columns: Vec<Column> = left
        .columns
        .iter()
        .map(|c| suffixed(c, &overlapping, LEFT_SUFFIX))
        .collect();
    columns.extend(
        right_values
            .iter()
            .map(|&i| suffixed(&right.columns[i], &overlapping, RIGHT_SUFFIX)),
    );

    let mut by_key: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (r, row) in right.rows.iter().enumerate() {
        by_key.entry(key_of(row, &right_keys)).or_default().push(r);
    }

    let mut joined = StagedTable::new(left.name.clone(), columns);
    for row in &left.rows {
        match by_key.get(&key_of(row, &left_keys)) {
            Some(matches) => {
                for &r in matches {
                    let mut out = row.clone();
                    out.extend(right_values.iter().map(|&i| right.rows[r][i].clone()));
                    joined.push_row(out);
                }
            }
            None => {
                let mut out = row.clone();
                out.extend(std::iter::repeat(SqlValue::Null).take(right_values.len()));
                joined.push_row(out);
            }
        }
    }

    Ok(joined)
}

fn suffixed(column: &Column, overlapping: &HashSet<&str>, suffix: &str) -> Column {
    if overlapping.contains(column.name.as_str()) {
        Column::new(format!("{}{}", column.name, suffix), column.kind)
    } else {
        column.clone()
    }
}

fn key_of(row: &[SqlValue], key_columns: &[usize]) -> Vec<String> {
    key_columns.iter().map(|&i| row[i].render()).collect()
}

/// Chain-join the delta tables in the given order, the first one driving
pub fn merge_delta_tables(tables: &[StagedTable]) -> Result<Option<StagedTable>, PipelineError> {
    let mut iter = tables.iter();
    let Some(first) = iter.next() else {
        return Ok(None);
    };
    let mut merged = first.clone();
    for table in iter {
        merged = left_join(&merged, table, &EVENT_KEY)?;
    }
    Ok(Some(merged))
}

/// Load the delta tables from the store, join them and write `output_path`.
/// Returns the number of data rows written.
pub async fn export_analysis_dataset(store: &StagingStore, output_path: &Path) -> Result<usize> {
    let mut tables = Vec::with_capacity(DELTA_TABLES.len());
    for name in DELTA_TABLES {
        let table = store
            .load_table(name)
            .await
            .with_context(|| format!("loading '{}'", name))?;
        info!("📊 Loaded {} rows from {}", table.len(), name);
        tables.push(table);
    }

    let merged = merge_delta_tables(&tables)?.context("no delta tables to merge")?;
    let headers = merged.column_names();
    let written = write_csv_atomically(output_path, &headers, merged.rendered_rows())?;

    info!("✅ Final dataset written to {} ({} rows)", output_path.display(), written);
    Ok(written)
}

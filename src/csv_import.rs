//! Readers for the raw CSV exports dropped into the raw data directory.

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::models::{NewsEvent, NewsRelease, TickRecord};
use crate::utils::parse_datetime;

/// Counters reported after an import
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportStats {
    pub rows_read: usize,
    pub rows_skipped: usize,
}

/// Parse optional string field to f64
fn parse_optional_f64(value: Option<&str>) -> Result<Option<f64>, std::num::ParseFloatError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

/// Read tick quotes. The first line is a header whose names are ignored:
/// columns are taken positionally as datetime, bid, ask.
pub fn read_tick_data(path: &Path) -> Result<(Vec<TickRecord>, ImportStats)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut ticks = Vec::new();
    let mut stats = ImportStats::default();

    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading {} line {}", path.display(), line + 2))?;
        stats.rows_read += 1;

        match parse_tick(&record) {
            Some(tick) => ticks.push(tick),
            None => {
                stats.rows_skipped += 1;
                debug!("Skipping malformed tick row {}: {:?}", line + 2, record);
            }
        }
    }

    if stats.rows_skipped > 0 {
        warn!(
            "⚠️ {}: skipped {} of {} tick rows",
            path.display(),
            stats.rows_skipped,
            stats.rows_read
        );
    }
    Ok((ticks, stats))
}

fn parse_tick(record: &StringRecord) -> Option<TickRecord> {
    let datetime = parse_datetime(record.get(0)?).ok()?;
    let bid = parse_optional_f64(record.get(1)).ok()?;
    let ask = parse_optional_f64(record.get(2)).ok()?;
    Some(TickRecord { datetime, bid, ask })
}

/// Read news releases. Headers are trimmed and lowercased; `datetime` and
/// `event` are required, every other column is carried along as text.
pub fn read_news_releases(path: &Path) -> Result<(Vec<NewsRelease>, ImportStats)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("{} has no '{}' column (found {:?})", path.display(), name, headers))
    };
    let datetime_idx = position("datetime")?;
    let event_idx = position("event")?;

    let mut releases = Vec::new();
    let mut stats = ImportStats::default();

    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading {} line {}", path.display(), line + 2))?;
        stats.rows_read += 1;

        let datetime = record.get(datetime_idx).map(parse_datetime);
        let event = record.get(event_idx).filter(|e| !e.is_empty());
        let (Some(Ok(datetime)), Some(event)) = (datetime, event) else {
            stats.rows_skipped += 1;
            debug!("Skipping news row {} without datetime/event", line + 2);
            continue;
        };

        let attributes: BTreeMap<String, String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != datetime_idx && *i != event_idx)
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();

        releases.push(NewsRelease {
            event: NewsEvent {
                datetime,
                event: event.to_string(),
            },
            attributes,
        });
    }

    if stats.rows_skipped > 0 {
        warn!(
            "⚠️ {}: skipped {} of {} news rows",
            path.display(),
            stats.rows_skipped,
            stats.rows_read
        );
    }
    Ok((releases, stats))
}

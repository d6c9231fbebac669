use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y.%m.%d", "%m/%d/%Y"];

/// Parse the timestamp layouts found in tick and news exports.
/// A bare date is taken as midnight.
pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime, PipelineError> {
    let trimmed = raw.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    parse_date(trimmed)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| PipelineError::InvalidDatetime(raw.to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, PipelineError> {
    let trimmed = raw.trim();
    // Stored dates may carry a midnight time component
    let date_part = trimmed.split([' ', 'T']).next().unwrap_or(trimmed);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .ok_or_else(|| PipelineError::InvalidDatetime(raw.to_string()))
}

/// Canonical text form used in the store; sorts lexicographically
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// CSV text for a float; whole numbers keep one decimal place (`1.0`, not `1`)
pub fn format_real(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Every calendar day from `start` to `end`, both inclusive
pub fn calendar_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        current = current + Duration::days(1);
    }
    days
}

/// Write a CSV next to its destination and rename it into place
pub fn write_csv_atomically<H, R>(path: &Path, headers: &[H], rows: R) -> Result<usize>
where
    H: AsRef<str>,
    R: IntoIterator<Item = Vec<String>>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }

    let tmp_path = temp_path_for(path);
    let written = (|| -> Result<usize> {
        let mut writer = csv::Writer::from_path(&tmp_path)?;
        writer.write_record(headers.iter().map(|h| h.as_ref()))?;
        let mut count = 0;
        for row in rows {
            writer.write_record(&row)?;
            count += 1;
        }
        writer.flush()?;
        Ok(count)
    })();

    match written {
        Ok(count) => {
            fs::rename(&tmp_path, path)
                .with_context(|| format!("moving {} into place", path.display()))?;
            Ok(count)
        }
        Err(e) => {
            fs::remove_file(&tmp_path).ok();
            Err(e.context(format!("writing {}", path.display())))
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

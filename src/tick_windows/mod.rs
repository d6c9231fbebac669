//! Slice tick data around news events and write one CSV per non-empty
//! (event, window width) pair.

pub mod slug;

pub use slug::{sanitize_label, SlugAssignment, SlugRegistry};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{NewsEvent, TickRecord, WindowWidth};
use crate::utils::{format_date, format_datetime, format_real, write_csv_atomically};

const WINDOW_HEADERS: [&str; 3] = ["datetime", "bid", "ask"];

/// Ticks inside `[center - w, center + w]`, both bounds inclusive.
/// `ticks` must be sorted by datetime.
pub fn select_window(ticks: &[TickRecord], center: NaiveDateTime, width: WindowWidth) -> &[TickRecord] {
    let start = center - width.half_width();
    let end = center + width.half_width();
    let lo = ticks.partition_point(|t| t.datetime < start);
    let hi = ticks.partition_point(|t| t.datetime <= end);
    &ticks[lo..hi.max(lo)]
}

pub fn window_file_name(date: NaiveDate, slug: &str, width: WindowWidth) -> String {
    format!("{}_{}_{}.csv", format_date(&date), slug, width.tag())
}

/// What one extraction pass produced
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractionReport {
    pub events_processed: usize,
    pub duplicate_events: usize,
    pub empty_windows: usize,
    pub files_written: Vec<PathBuf>,
}

pub struct TickWindowExtractor {
    output_dir: PathBuf,
}

impl TickWindowExtractor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn extract(&self, events: &[NewsEvent], ticks: &[TickRecord]) -> Result<ExtractionReport> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating tick window directory {}", self.output_dir.display()))?;

        let ticks: Cow<[TickRecord]> = if ticks.windows(2).all(|w| w[0].datetime <= w[1].datetime) {
            Cow::Borrowed(ticks)
        } else {
            let mut sorted = ticks.to_vec();
            sorted.sort_by_key(|t| t.datetime);
            Cow::Owned(sorted)
        };

        let mut ordered: Vec<&NewsEvent> = events.iter().collect();
        ordered.sort();

        let mut registry = SlugRegistry::new();
        let mut report = ExtractionReport::default();

        for event in ordered {
            let slug = match registry.assign(event) {
                SlugAssignment::Fresh(slug) => slug,
                SlugAssignment::Repeat(slug) => {
                    debug!("Skipping repeated event {} at {} ({})", event.event, event.datetime, slug);
                    report.duplicate_events += 1;
                    continue;
                }
            };
            report.events_processed += 1;

            for width in WindowWidth::ALL {
                let window = select_window(&ticks, event.datetime, width);
                if window.is_empty() {
                    debug!("No ticks within {} of {} at {}", width.tag(), event.event, event.datetime);
                    report.empty_windows += 1;
                    continue;
                }

                let path = self
                    .output_dir
                    .join(window_file_name(event.datetime.date(), &slug, width));
                write_csv_atomically(&path, &WINDOW_HEADERS, window.iter().map(tick_row))?;
                debug!("Wrote {} ticks to {}", window.len(), path.display());
                report.files_written.push(path);
            }
        }

        info!(
            "✅ Extracted {} tick windows for {} events into {}",
            report.files_written.len(),
            report.events_processed,
            self.output_dir.display()
        );
        Ok(report)
    }
}

fn tick_row(tick: &TickRecord) -> Vec<String> {
    let side = |v: Option<f64>| v.map(format_real).unwrap_or_default();
    vec![format_datetime(&tick.datetime), side(tick.bid), side(tick.ask)]
}

//! Wide, date-indexed view of the long-form indicator observations.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::PipelineError;
use crate::models::{IndicatorObservation, TREASURY_10Y, TREASURY_2Y};
use crate::utils::calendar_days;

/// One column per indicator name, one row per date (ascending).
///
/// Columns are kept in name order, matching how the summary table is laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyIndicatorMatrix {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl DailyIndicatorMatrix {
    /// Pivot observations to wide form. Only dates that carry at least one
    /// value become rows; the first observation wins per (date, indicator).
    pub fn pivot(observations: &[IndicatorObservation]) -> Result<Self, PipelineError> {
        let usable: Vec<&IndicatorObservation> =
            observations.iter().filter(|o| o.value.is_finite()).collect();
        if usable.is_empty() {
            return Err(PipelineError::NoObservations);
        }

        let dates: Vec<NaiveDate> = usable
            .iter()
            .map(|o| o.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut columns: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for obs in usable {
            let column = columns
                .entry(obs.indicator_name.clone())
                .or_insert_with(|| vec![None; dates.len()]);
            let cell = &mut column[row_of[&obs.date]];
            if cell.is_none() {
                *cell = Some(obs.value);
            }
        }

        Ok(Self { dates, columns })
    }

    pub fn forward_fill(&mut self) {
        for values in self.columns.values_mut() {
            forward_fill(values);
        }
    }

    /// Reindex onto every calendar day between the first and last date and
    /// forward-fill across the introduced days
    pub fn expand_to_calendar(&self) -> Self {
        let calendar = self.calendar();
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                (name.clone(), expand_forward_filled(&self.dates, values, &calendar))
            })
            .collect();
        Self {
            dates: calendar,
            columns,
        }
    }

    /// Inclusive daily range spanned by the matrix
    pub fn calendar(&self) -> Vec<NaiveDate> {
        match (self.dates.first(), self.dates.last()) {
            (Some(first), Some(last)) => calendar_days(*first, *last),
            _ => Vec::new(),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Result<&[Option<f64>], PipelineError> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| PipelineError::MissingIndicator(name.to_string()))
    }

    /// 10-year minus 2-year treasury yield; missing where either leg is
    pub fn yield_spread(&self) -> Result<Vec<Option<f64>>, PipelineError> {
        let long = self.column(TREASURY_10Y)?;
        let short = self.column(TREASURY_2Y)?;
        Ok(long
            .iter()
            .zip(short)
            .map(|(l, s)| Some((*l)? - (*s)?))
            .collect())
    }
}

/// Carry the last present value forward over gaps; leading gaps stay empty
pub fn forward_fill<T: Clone>(values: &mut [Option<T>]) {
    let mut last: Option<T> = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(v.clone()),
            None => *value = last.clone(),
        }
    }
}

/// Place `values` (indexed by ascending `dates`) onto `calendar` and
/// forward-fill the days that had no row
pub fn expand_forward_filled<T: Clone>(
    dates: &[NaiveDate],
    values: &[Option<T>],
    calendar: &[NaiveDate],
) -> Vec<Option<T>> {
    let mut expanded = Vec::with_capacity(calendar.len());
    let mut source = dates.iter().zip(values).peekable();
    for day in calendar {
        while matches!(source.peek(), Some((d, _)) if *d < day) {
            source.next();
        }
        match source.peek() {
            Some((d, v)) if *d == day => expanded.push((*v).clone()),
            _ => expanded.push(None),
        }
    }
    forward_fill(&mut expanded);
    expanded
}

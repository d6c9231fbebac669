use chrono::NaiveDate;

use super::matrix::DailyIndicatorMatrix;
use crate::database::{Column, SqlValue, StagedTable, DAILY_MACRO_SUMMARY};
use crate::error::PipelineError;
use crate::models::IndicatorObservation;
use crate::utils::format_date;

/// Wide daily macro table: every indicator forward-filled onto every
/// calendar day, plus the 10y-2y spread
#[derive(Debug, Clone, PartialEq)]
pub struct DailyMacroSummary {
    matrix: DailyIndicatorMatrix,
    yield_spread: Vec<Option<f64>>,
}

impl DailyMacroSummary {
    pub fn build(observations: &[IndicatorObservation]) -> Result<Self, PipelineError> {
        let matrix = DailyIndicatorMatrix::pivot(observations)?.expand_to_calendar();
        let yield_spread = matrix.yield_spread()?;
        Ok(Self {
            matrix,
            yield_spread,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        self.matrix.dates()
    }

    pub fn matrix(&self) -> &DailyIndicatorMatrix {
        &self.matrix
    }

    pub fn yield_spread(&self) -> &[Option<f64>] {
        &self.yield_spread
    }

    /// `date`, indicator columns in name order, then `yield_spread`
    pub fn to_staged_table(&self) -> Result<StagedTable, PipelineError> {
        let names: Vec<&str> = self.matrix.column_names().collect();
        let columns_data = names
            .iter()
            .map(|name| self.matrix.column(name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut columns = vec![Column::text("date")];
        columns.extend(names.iter().map(|name| Column::real(*name)));
        columns.push(Column::real("yield_spread"));

        let mut table = StagedTable::new(DAILY_MACRO_SUMMARY, columns);
        for (i, date) in self.dates().iter().enumerate() {
            let mut row = Vec::with_capacity(names.len() + 2);
            row.push(SqlValue::text(format_date(date)));
            row.extend(columns_data.iter().map(|values| SqlValue::real(values[i])));
            row.push(SqlValue::real(self.yield_spread[i]));
            table.push_row(row);
        }
        Ok(table)
    }
}

use std::fmt;

use crate::error::PipelineError;
use crate::utils::format_real;

/// A single nullable cell as SQLite stores it
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// NaN and infinities have no SQLite representation and are stored as NULL
    pub fn real(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => SqlValue::Real(v),
            _ => SqlValue::Null,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        SqlValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(v) => Some(*v as f64),
            SqlValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// CSV rendering; NULL becomes an empty field
    pub fn render(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Integer(v) => v.to_string(),
            SqlValue::Real(v) => format_real(*v),
            SqlValue::Text(v) => v.clone(),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Real,
    Integer,
}

impl ColumnKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Real => "REAL",
            ColumnKind::Integer => "INTEGER",
        }
    }

    /// Map a declared column type onto a storage kind using SQLite's affinity rules
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            ColumnKind::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnKind::Real
        } else {
            ColumnKind::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Real)
    }
}

/// In-memory copy of a named table: what the store rebuilds and loads
#[derive(Debug, Clone, PartialEq)]
pub struct StagedTable {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl StagedTable {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<SqlValue>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, column: &str) -> Result<usize, PipelineError> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| PipelineError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Values of one column, top to bottom
    pub fn column_values(&self, column: &str) -> Result<Vec<&SqlValue>, PipelineError> {
        let index = self.column_index(column)?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn check_row_widths(&self) -> Result<(), PipelineError> {
        let expected = self.columns.len();
        for (row, cells) in self.rows.iter().enumerate() {
            if cells.len() != expected {
                return Err(PipelineError::RowWidth {
                    table: self.name.clone(),
                    row,
                    found: cells.len(),
                    expected,
                });
            }
        }
        Ok(())
    }

    /// Rows rendered for CSV output
    pub fn rendered_rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows
            .iter()
            .map(|row| row.iter().map(SqlValue::render).collect())
    }
}

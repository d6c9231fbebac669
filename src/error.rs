use thiserror::Error;

/// Configuration problems detected before any step touches the store or the filesystem.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0}! Add it to the environment or to a `.env` file in the project root, e.g. {0}=your_actual_key_here")]
    MissingCredential(&'static str),

    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Failures of the tabular transformations and the staging store.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("required indicator '{0}' is not present in the macro indicator set")]
    MissingIndicator(String),

    #[error("no indicator observations to derive from")]
    NoObservations,

    #[error("table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("invalid table name '{0}'")]
    InvalidTableName(String),

    #[error("row {row} of '{table}' has {found} cells, expected {expected}")]
    RowWidth {
        table: String,
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("could not parse datetime '{0}'")]
    InvalidDatetime(String),
}

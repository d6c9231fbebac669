//! Macro indicator transformations: the daily matrix, regime labels and the
//! daily summary table.

pub mod matrix;
pub mod regime;
pub mod summary;

pub use matrix::DailyIndicatorMatrix;
pub use regime::{derive_market_regimes, RegimeFrame};
pub use summary::DailyMacroSummary;

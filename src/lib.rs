pub mod analysis;
pub mod api;
pub mod csv_import;
pub mod data_collector;
pub mod database;
pub mod error;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod tick_windows;
pub mod utils;

pub use error::{ConfigError, PipelineError};
pub use models::Config;

//! Error types for factor computation.

use leadlag_data::DataError;
use leadlag_stats::StatsError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Result type for factor computation.
pub type Result<T> = std::result::Result<T, FactorError>;

/// Errors that can occur while computing the lead-lag factor.
#[derive(Debug, Error)]
pub enum FactorError {
    /// Data error
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Statistics error
    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown lead-lag measure name
    #[error("Unknown lead-lag measure: {0}")]
    UnknownMeasure(String),
}

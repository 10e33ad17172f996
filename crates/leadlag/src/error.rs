//! Errors of the pipeline layer.

use leadlag_data::DataError;
use leadlag_factors::FactorError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while configuring or running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No data directory configured or discoverable
    #[error("No data directory configured and no platform data directory available")]
    NoDataDir,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data error
    #[error(transparent)]
    Data(#[from] DataError),

    /// Factor error
    #[error(transparent)]
    Factor(#[from] FactorError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

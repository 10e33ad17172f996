#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/leadlag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod newey_west;
pub mod ols;

pub use newey_west::{NeweyWestConfig, NeweyWestTest, TTest, newey_west_ttest, two_sided_p_value};
pub use ols::projection_residuals;

use thiserror::Error;

/// Result type for statistical routines.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Errors that can occur in statistical routines
#[derive(Debug, Error)]
pub enum StatsError {
    /// Insufficient data for estimation
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Long-run variance is not positive
    #[error("Long-run variance is not positive: {0}")]
    ZeroVariance(f64),

    /// Distribution could not be constructed
    #[error("Distribution error: {0}")]
    Distribution(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },
}

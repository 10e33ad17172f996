#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/leadlag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod adjust;
pub mod config;
pub mod engine;
pub mod error;
pub mod factor;
pub mod filter;
pub mod registry;
pub mod window;

pub use adjust::{Adjustment, seasonal_adjust};
pub use config::{FilterConfig, LeadLagConfig};
pub use engine::{
    GDP_COLUMN, LLWindow, LeadLagEngine, LeadLagResult, correlation_column, difference,
    rolling_abs_correlation, shift,
};
pub use error::{FactorError, Result};
pub use factor::{LLFactor, LeadLagFactor};
pub use filter::{FilterPipeline, balance, completeness};
pub use registry::{
    LeadLagMeasure, MeasureInfo, available_measures, factor_columns, get_measure_info,
};
pub use window::{CashflowWindow, Window, WindowSummary, Windows};

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/leadlag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export main types from sub-crates
pub use leadlag_data as data;
pub use leadlag_factors as factors;
pub use leadlag_output as output;
pub use leadlag_stats as stats;

pub use config::{CacheConfig, DataConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::LeadLagPipeline;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

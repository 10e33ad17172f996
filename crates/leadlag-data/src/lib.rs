#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/leadlag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod context;
pub mod error;
pub mod feeds;
pub mod panel;
pub mod period;
pub mod schema;

pub use cache::{CachePolicy, CachedCompute, TableCache, TableFormat};
pub use context::{CashflowOptions, DataContext, FeedFiles};
pub use error::{DataError, Result};
pub use feeds::{Eligibility, decumulate, from_start_year, industry_panel};
pub use panel::{KEY_COLUMNS, PERIOD_COLUMN, PanelStore};
pub use period::{Period, parse_date};
pub use schema::{ColumnKind, ColumnSpec, TableSchema, require_columns};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

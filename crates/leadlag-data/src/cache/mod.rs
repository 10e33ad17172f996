//! Disk-backed memoization of computed tables.

pub mod format;
pub mod table;

pub use format::TableFormat;
pub use table::{CachePolicy, CachedCompute, TableCache};

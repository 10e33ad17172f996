//! Error types for data operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Spreadsheet read error
    #[error("Spreadsheet read error: {0}")]
    SpreadsheetRead(#[from] calamine::Error),

    /// Spreadsheet write error
    #[error("Spreadsheet write error: {0}")]
    SpreadsheetWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Cache artifact has an extension with no known table format
    #[error("Unsupported table format for {path}: expected .csv or .xlsx")]
    UnsupportedFormat {
        /// Offending path
        path: PathBuf,
    },

    /// Input file does not have the column count its schema requires
    #[error("Column count mismatch in {table}: expected {expected}, got {actual}")]
    ColumnCount {
        /// Schema name
        table: String,
        /// Columns required by the schema
        expected: usize,
        /// Columns present in the file
        actual: usize,
    },

    /// A required column is missing from a table
    #[error("Missing column {column} in {table}")]
    MissingColumn {
        /// Table name
        table: String,
        /// Column name
        column: String,
    },

    /// A key that must be unique appears more than once
    #[error("Duplicate key in {table}: stock {stock}, period {period}")]
    DuplicateKey {
        /// Table name
        table: String,
        /// Stock identifier
        stock: i64,
        /// Period of the duplicated record
        period: String,
    },

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Invalid period
    #[error("Invalid period: year {year}, quarter {quarter}")]
    InvalidPeriod {
        /// Year component
        year: i64,
        /// Quarter component
        quarter: i64,
    },

    /// Cache error
    #[error("Cache error: {0}")]
    Cache(String),
}

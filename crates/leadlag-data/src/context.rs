//! Shared registry of input feeds.
//!
//! A [`DataContext`] is built once per run and passed to every stage. Each feed
//! is read from disk on first access and reused afterwards.

use crate::error::Result;
use crate::feeds::{decumulate, from_start_year};
use crate::schema::TableSchema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

/// File names of the input feeds, relative to the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedFiles {
    /// Cash-flow statements
    pub cashflow: String,
    /// Industry classification change records
    pub industry: String,
    /// Market segment per stock
    pub market_type: String,
    /// Listing date per stock
    pub listing: String,
    /// Statement annotation dates
    pub disclosure: String,
    /// Quarterly GDP
    pub gdp: String,
    /// Quarterly price index
    pub inflation: String,
}

impl Default for FeedFiles {
    fn default() -> Self {
        Self {
            cashflow: "cashflow.csv".to_string(),
            industry: "industry.csv".to_string(),
            market_type: "market_type.csv".to_string(),
            listing: "listing.csv".to_string(),
            disclosure: "disclosure.csv".to_string(),
            gdp: "gdp.csv".to_string(),
            inflation: "inflation.csv".to_string(),
        }
    }
}

/// How the cash-flow feed is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CashflowOptions {
    /// Measure columns, in file order after `stock, year, quarter`
    pub measures: Vec<String>,
    /// Values are fiscal-year cumulative and must be de-cumulated
    pub cumulative: bool,
    /// Drop cash-flow and GDP rows before this year
    pub start_year: Option<i64>,
}

/// Lazily loaded input feeds.
#[derive(Debug)]
pub struct DataContext {
    dir: PathBuf,
    files: FeedFiles,
    options: CashflowOptions,
    cashflow: OnceLock<DataFrame>,
    industry: OnceLock<DataFrame>,
    market_type: OnceLock<DataFrame>,
    listing: OnceLock<DataFrame>,
    disclosure: OnceLock<DataFrame>,
    gdp: OnceLock<DataFrame>,
    inflation: OnceLock<DataFrame>,
}

fn get_or_load<'a>(
    cell: &'a OnceLock<DataFrame>,
    load: impl FnOnce() -> Result<DataFrame>,
) -> Result<&'a DataFrame> {
    if let Some(df) = cell.get() {
        return Ok(df);
    }
    let df = load()?;
    Ok(cell.get_or_init(|| df))
}

impl DataContext {
    /// Create a context over `dir`. Nothing is read until a feed is requested.
    pub fn new<P: Into<PathBuf>>(dir: P, files: FeedFiles, options: CashflowOptions) -> Self {
        Self {
            dir: dir.into(),
            files,
            options,
            cashflow: OnceLock::new(),
            industry: OnceLock::new(),
            market_type: OnceLock::new(),
            listing: OnceLock::new(),
            disclosure: OnceLock::new(),
            gdp: OnceLock::new(),
            inflation: OnceLock::new(),
        }
    }

    /// Data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cash-flow measures.
    pub fn measures(&self) -> &[String] {
        &self.options.measures
    }

    fn read(&self, schema: TableSchema, file: &str) -> Result<DataFrame> {
        let path = self.dir.join(file);
        let df = schema.read_csv(&path)?;
        info!(feed = schema.name(), path = %path.display(), rows = df.height(), "feed loaded");
        Ok(df)
    }

    /// Quarterly cash-flow statements, de-cumulated when configured and
    /// restricted to the start year.
    pub fn cashflow(&self) -> Result<&DataFrame> {
        get_or_load(&self.cashflow, || {
            let measures = &self.options.measures;
            let mut df = self.read(TableSchema::cashflow(measures), &self.files.cashflow)?;
            if self.options.cumulative {
                df = decumulate(df, measures)?;
            }
            let df = from_start_year(df, self.options.start_year)?;
            Ok(df
                .lazy()
                .sort(["stock", "year", "quarter"], Default::default())
                .collect()?)
        })
    }

    /// Industry classification change records.
    pub fn industry_changes(&self) -> Result<&DataFrame> {
        get_or_load(&self.industry, || {
            self.read(TableSchema::industry(), &self.files.industry)
        })
    }

    /// Market segment table.
    pub fn market_type(&self) -> Result<&DataFrame> {
        get_or_load(&self.market_type, || {
            self.read(TableSchema::market_type(), &self.files.market_type)
        })
    }

    /// Listing date table.
    pub fn listing(&self) -> Result<&DataFrame> {
        get_or_load(&self.listing, || {
            self.read(TableSchema::listing(), &self.files.listing)
        })
    }

    /// Disclosure annotation table.
    pub fn disclosure(&self) -> Result<&DataFrame> {
        get_or_load(&self.disclosure, || {
            self.read(TableSchema::disclosure(), &self.files.disclosure)
        })
    }

    /// Quarterly GDP, restricted to the start year.
    pub fn gdp(&self) -> Result<&DataFrame> {
        get_or_load(&self.gdp, || {
            let df = self.read(TableSchema::gdp(), &self.files.gdp)?;
            from_start_year(df, self.options.start_year)
        })
    }

    /// Quarterly price index.
    pub fn inflation(&self) -> Result<&DataFrame> {
        get_or_load(&self.inflation, || {
            self.read(TableSchema::inflation(), &self.files.inflation)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use std::fs;

    fn context(dir: &Path) -> DataContext {
        DataContext::new(
            dir,
            FeedFiles::default(),
            CashflowOptions {
                measures: vec!["EBITDA".to_string()],
                cumulative: false,
                start_year: Some(2010),
            },
        )
    }

    #[test]
    fn test_feed_is_read_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("gdp.csv"),
            "Year,Q,Value\n2009,4,90\n2010,1,100\n2010,2,110\n",
        )
        .unwrap();

        let ctx = context(dir.path());
        let first = ctx.gdp().unwrap().height();
        assert_eq!(first, 2);

        // Removing the file does not matter once the feed is loaded.
        fs::remove_file(dir.path().join("gdp.csv")).unwrap();
        assert_eq!(ctx.gdp().unwrap().height(), 2);
    }

    #[test]
    fn test_cashflow_feed_is_sorted_and_typed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("cashflow.csv"),
            "code,y,q,ebitda\n2,2010,1,5\n1,2010,2,3.5\n1,2010,1,1\n",
        )
        .unwrap();

        let ctx = context(dir.path());
        let df = ctx.cashflow().unwrap();
        let stocks: Vec<Option<i64>> = df.column("stock").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(stocks, vec![Some(1), Some(1), Some(2)]);
        assert_eq!(df.column("EBITDA").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_missing_feed_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        assert!(ctx.inflation().is_err());
    }

    #[test]
    fn test_wrong_column_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("market_type.csv"), "stock\n1\n").unwrap();
        let ctx = context(dir.path());
        assert!(matches!(
            ctx.market_type(),
            Err(DataError::ColumnCount { .. })
        ));
    }
}

//! Merged stock x quarter panel.
//!
//! The panel is the inner join of the cash-flow statements with the quarterly
//! industry classification on `(stock, year, quarter)`. Rows are sorted by
//! period and every distinct period owns one contiguous row range, so any run
//! of consecutive periods is a zero-copy slice of the frame.

use crate::error::{DataError, Result};
use crate::period::Period;
use crate::schema::require_columns;
use polars::prelude::*;
use std::collections::HashSet;
use std::ops::Range;
use tracing::info;

/// Key columns of every panel table.
pub const KEY_COLUMNS: [&str; 3] = ["stock", "year", "quarter"];

/// Dense quarter index column added to the panel, see [`Period::index`].
pub const PERIOD_COLUMN: &str = "period";

/// Period-sorted panel of cash-flow measures with industry codes.
#[derive(Debug, Clone)]
pub struct PanelStore {
    frame: DataFrame,
    measures: Vec<String>,
    periods: Vec<Period>,
    offsets: Vec<usize>,
}

impl PanelStore {
    /// Merge cash-flow statements with the quarterly industry panel.
    ///
    /// `(stock, year, quarter)` must be unique in both inputs.
    pub fn new<S: AsRef<str>>(
        cashflow: &DataFrame,
        industry: &DataFrame,
        measures: &[S],
    ) -> Result<Self> {
        let measures: Vec<String> = measures.iter().map(|m| m.as_ref().to_string()).collect();

        let mut required: Vec<&str> = KEY_COLUMNS.to_vec();
        required.extend(measures.iter().map(String::as_str));
        require_columns("cashflow", cashflow, &required)?;
        require_columns("industry", industry, &["stock", "year", "quarter", "industry_code"])?;

        check_unique("cashflow", cashflow)?;
        check_unique("industry", industry)?;

        let keys = || [col("stock"), col("year"), col("quarter")];
        let mut columns = vec![
            col("stock"),
            col("year"),
            col("quarter"),
            col(PERIOD_COLUMN),
            col("industry_code"),
        ];
        columns.extend(measures.iter().map(|m| col(m.as_str())));

        let frame = cashflow
            .clone()
            .lazy()
            .join(
                industry
                    .clone()
                    .lazy()
                    .select([col("stock"), col("year"), col("quarter"), col("industry_code")]),
                keys(),
                keys(),
                JoinArgs::new(JoinType::Inner),
            )
            .with_columns([
                (col("year") * lit(4i64) + col("quarter") - lit(1i64)).alias(PERIOD_COLUMN)
            ])
            .sort([PERIOD_COLUMN, "stock"], Default::default())
            .select(columns)
            .collect()?;

        let store = Self::from_sorted(frame, measures)?;
        info!(
            rows = store.len(),
            periods = store.periods.len(),
            "panel built"
        );
        Ok(store)
    }

    /// Index a frame already sorted by period.
    fn from_sorted(frame: DataFrame, measures: Vec<String>) -> Result<Self> {
        let years = frame.column("year")?.i64()?;
        let quarters = frame.column("quarter")?.i64()?;

        let mut periods: Vec<Period> = Vec::new();
        let mut offsets = Vec::new();
        for (row, (year, quarter)) in years.into_iter().zip(quarters).enumerate() {
            let (Some(year), Some(quarter)) = (year, quarter) else {
                return Err(DataError::Parse(format!("Null period in panel row {}", row)));
            };
            let period = Period::new(year, quarter)?;
            if periods.last() != Some(&period) {
                periods.push(period);
                offsets.push(row);
            }
        }
        offsets.push(frame.height());

        Ok(Self {
            frame,
            measures,
            periods,
            offsets,
        })
    }

    /// The full panel frame.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Cash-flow measure columns.
    pub fn measures(&self) -> &[String] {
        &self.measures
    }

    /// Distinct periods in increasing order.
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Number of panel rows.
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    /// Whether the panel has no rows.
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Row range covered by the distinct periods `range`.
    pub fn row_range(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.periods.len());
        let start = range.start.min(end);
        self.offsets[start]..self.offsets[end]
    }

    /// Zero-copy slice of the rows of the distinct periods `range`.
    pub fn slice(&self, range: Range<usize>) -> DataFrame {
        let rows = self.row_range(range);
        self.frame.slice(rows.start as i64, rows.len())
    }
}

fn check_unique(table: &str, df: &DataFrame) -> Result<()> {
    let stocks = df.column("stock")?.i64()?;
    let years = df.column("year")?.i64()?;
    let quarters = df.column("quarter")?.i64()?;

    let mut seen = HashSet::with_capacity(df.height());
    for ((stock, year), quarter) in stocks.into_iter().zip(years).zip(quarters) {
        if !seen.insert((stock, year, quarter)) {
            let period = match (year, quarter) {
                (Some(y), Some(q)) => format!("{}Q{}", y, q),
                _ => "null".to_string(),
            };
            return Err(DataError::DuplicateKey {
                table: table.to_string(),
                stock: stock.unwrap_or_default(),
                period,
            });
        }
    }
    Ok(())
}

//! Inflation and seasonal adjustment of a quarterly column.

use crate::error::Result;
use leadlag_data::require_columns;
use leadlag_stats::projection_residuals;
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Detrends one column of a `(year, quarter)` indexed table.
#[derive(Debug, Clone, Copy)]
pub struct Adjustment<'a> {
    inflation: &'a DataFrame,
}

impl<'a> Adjustment<'a> {
    /// Adjust against a `(year, quarter, inflation)` price index.
    pub const fn new(inflation: &'a DataFrame) -> Self {
        Self { inflation }
    }

    /// Inflation then seasonal adjustment of `column`.
    pub fn adjust(&self, df: DataFrame, column: &str) -> Result<DataFrame> {
        let df = self.inflation_adjust(df, column)?;
        seasonal_adjust(df, column)
    }

    /// Divide `column` by the price index. Rows without an index value are dropped.
    pub fn inflation_adjust(&self, df: DataFrame, column: &str) -> Result<DataFrame> {
        require_columns("inflation", self.inflation, &["year", "quarter", "inflation"])?;

        let original: Vec<Expr> = df
            .get_column_names()
            .into_iter()
            .map(|name| col(name.as_str()))
            .collect();

        let index = self
            .inflation
            .clone()
            .lazy()
            .select([col("year"), col("quarter"), col("inflation")])
            .filter(col("inflation").is_not_null());

        Ok(df
            .lazy()
            .join(
                index,
                [col("year"), col("quarter")],
                [col("year"), col("quarter")],
                JoinArgs::new(JoinType::Inner),
            )
            .with_columns([(col(column) / col("inflation")).alias(column)])
            .select(original)
            .collect()?)
    }
}

/// Replace `column` by its residual on quarter dummies plus its mean.
///
/// The regression uses an intercept and indicators for quarters 1, 2 and 3 over
/// all rows with a non-null target. Null targets stay null.
pub fn seasonal_adjust(mut df: DataFrame, column: &str) -> Result<DataFrame> {
    let quarters = df.column("quarter")?.i64()?;
    let values = df.column(column)?.f64()?;

    let observed: Vec<(usize, i64, f64)> = quarters
        .into_iter()
        .zip(values)
        .enumerate()
        .filter_map(|(row, (q, v))| Some((row, q?, v?)))
        .collect();
    if observed.is_empty() {
        return Ok(df);
    }

    let n = observed.len();
    let mut design = Array2::<f64>::zeros((n, 4));
    let mut target = Array1::<f64>::zeros(n);
    for (i, &(_, quarter, value)) in observed.iter().enumerate() {
        design[[i, 0]] = 1.0;
        if (1..=3).contains(&quarter) {
            design[[i, quarter as usize]] = 1.0;
        }
        target[i] = value;
    }

    let mean = target.sum() / n as f64;
    let residuals = projection_residuals(&design, &target)?;

    let mut adjusted: Vec<Option<f64>> = vec![None; df.height()];
    for (&(row, _, _), resid) in observed.iter().zip(residuals.iter()) {
        adjusted[row] = Some(resid + mean);
    }

    df.with_column(Series::new(column.into(), adjusted))?;
    Ok(df)
}

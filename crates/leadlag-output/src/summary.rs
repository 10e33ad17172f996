//! Factor summary and significance of the lead-lag columns.
//!
//! Every factor column is reduced to its cross-industry mean per period, and
//! that time series is tested against a zero mean with the Newey-West adjusted
//! t-test.

use crate::export::ExportError;
use leadlag_factors::LeadLagMeasure;
use leadlag_stats::{NeweyWestConfig, NeweyWestTest, TTest};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Test outcome for one factor column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorStatistic {
    /// Factor table column, e.g. `LL_max(EBITDA)`.
    pub column: String,

    /// Number of periods with a cross-industry mean.
    pub periods: usize,

    /// Newey-West t-test of the period means, if the series is not degenerate.
    pub test: Option<TTest>,
}

impl FactorStatistic {
    /// Create a statistic from a column's per-period means.
    pub fn from_means(column: String, means: &[f64], config: &NeweyWestConfig) -> Self {
        let test = NeweyWestTest::new(config.clone()).ttest(means).ok();
        Self {
            column,
            periods: means.len(),
            test,
        }
    }

    /// Whether the mean differs from zero at `level`.
    pub fn is_significant(&self, level: f64) -> bool {
        self.test.is_some_and(|t| t.p_value < level)
    }
}

impl fmt::Display for FactorStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.test {
            Some(t) => write!(
                f,
                "{}: mean {:.4}, t {:.3} (p = {:.4}, {} lags, {} periods)",
                self.column, t.mean, t.t_value, t.p_value, t.lags, self.periods
            ),
            None => write!(f, "{}: n/a ({} periods)", self.column, self.periods),
        }
    }
}

/// Summary of every lead-lag column of a factor table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorSummary {
    /// Name of the summarised table.
    pub name: String,

    /// First period of the table.
    pub first_period: Option<String>,

    /// Last period of the table.
    pub last_period: Option<String>,

    /// Statistics in column order.
    pub statistics: Vec<FactorStatistic>,
}

impl FactorSummary {
    /// Summarise a factor table with automatic lag selection.
    pub fn from_table(name: impl Into<String>, table: &DataFrame) -> Result<Self, ExportError> {
        Self::with_config(name, table, &NeweyWestConfig::default())
    }

    /// Summarise a factor table.
    ///
    /// Columns that are not named `<measure>(<cash flow>)` are ignored.
    pub fn with_config(
        name: impl Into<String>,
        table: &DataFrame,
        config: &NeweyWestConfig,
    ) -> Result<Self, ExportError> {
        let mut periods: Vec<&str> = table.column("period")?.str()?.into_iter().flatten().collect();
        periods.sort_unstable();

        let mut statistics = Vec::new();
        for column in table.get_column_names() {
            if LeadLagMeasure::parse_column(column.as_str()).is_none() {
                continue;
            }
            let means: Vec<f64> = period_means(table, column.as_str())?
                .into_iter()
                .map(|(_, mean)| mean)
                .collect();
            statistics.push(FactorStatistic::from_means(column.to_string(), &means, config));
        }

        Ok(Self {
            name: name.into(),
            first_period: periods.first().map(|p| p.to_string()),
            last_period: periods.last().map(|p| p.to_string()),
            statistics,
        })
    }

    /// Statistic of one column.
    pub fn get(&self, column: &str) -> Option<&FactorStatistic> {
        self.statistics.iter().find(|s| s.column == column)
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nFactor Summary: {}\n", self.name));
        if let (Some(first), Some(last)) = (&self.first_period, &self.last_period) {
            output.push_str(&format!("Period: {} to {}\n", first, last));
        }
        output.push_str(&"=".repeat(88));
        output.push('\n');
        output.push_str(&format!(
            "{:<28} {:>8} {:>12} {:>12} {:>10} {:>8} {:>6}\n",
            "Factor", "Periods", "Mean", "Std. Err.", "t", "p", "Lags"
        ));
        output.push_str(&"-".repeat(88));
        output.push('\n');

        for stat in &self.statistics {
            match &stat.test {
                Some(t) => output.push_str(&format!(
                    "{:<28} {:>8} {:>12.6} {:>12.6} {:>10.3} {:>8.4} {:>6}\n",
                    stat.column, stat.periods, t.mean, t.std_error, t.t_value, t.p_value, t.lags
                )),
                None => output.push_str(&format!(
                    "{:<28} {:>8} {:>12} {:>12} {:>10} {:>8} {:>6}\n",
                    stat.column, stat.periods, "n/a", "n/a", "n/a", "n/a", "-"
                )),
            }
        }

        output.push_str(&"=".repeat(88));
        output.push('\n');
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Factor Summary: {}\n\n", self.name));
        if let (Some(first), Some(last)) = (&self.first_period, &self.last_period) {
            output.push_str(&format!("**Period:** {} to {}\n\n", first, last));
        }
        output.push_str("| Factor | Periods | Mean | Std. Err. | t | p | Lags |\n");
        output.push_str("|--------|---------|------|-----------|---|---|------|\n");

        for stat in &self.statistics {
            match &stat.test {
                Some(t) => output.push_str(&format!(
                    "| {} | {} | {:.6} | {:.6} | {:.3} | {:.4} | {} |\n",
                    stat.column, stat.periods, t.mean, t.std_error, t.t_value, t.p_value, t.lags
                )),
                None => output.push_str(&format!(
                    "| {} | {} | n/a | n/a | n/a | n/a | - |\n",
                    stat.column, stat.periods
                )),
            }
        }

        output
    }
}

impl fmt::Display for FactorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Factor Summary: {}", self.name)?;
        for stat in &self.statistics {
            writeln!(f, "  {}", stat)?;
        }
        Ok(())
    }
}

/// Cross-industry mean of `column` per period, in period order. Nulls are skipped.
pub fn period_means(table: &DataFrame, column: &str) -> Result<Vec<(String, f64)>, ExportError> {
    let means = table
        .clone()
        .lazy()
        .filter(col(column).is_not_null())
        .group_by([col("period")])
        .agg([col(column).mean().alias("mean")])
        .sort(["period"], Default::default())
        .collect()?;

    let periods = means.column("period")?.str()?;
    let values = means.column("mean")?.f64()?;
    Ok(periods
        .into_iter()
        .zip(values)
        .filter_map(|(p, v)| Some((p?.to_string(), v?)))
        .collect())
}

//! Lead-lag estimation between industry cash flows and GDP
//!
//! For every industry of a window the engine differences the adjusted cash-flow
//! measure and GDP, shifts the cash-flow difference by every `k` in `[-J, +J]`
//! and correlates each shifted series with the GDP difference over a trailing
//! rolling window of `R` quarters:
//! ```text
//! s_k[t] = d_cf[t - k]                      (k > 0: cash flow leads GDP)
//! c_k[t] = | corr(s_k[t-R+1..=t], d_gdp[t-R+1..=t]) |
//!
//! LL_max      = argmax_k c_k               (first k on ties)
//! LL_average  = Σ_k c_k k / Σ_k c_k
//! LL_industry = Σ_k c_k k / N_k            N_k = Σ_rows c_k over the window
//! ```
//! Only rows with all `2J + 1` correlations defined are reported.

use crate::adjust::Adjustment;
use crate::config::LeadLagConfig;
use crate::error::Result;
use crate::window::CashflowWindow;
use leadlag_data::{Period, require_columns};
use polars::prelude::*;
use tracing::debug;

/// Name of the GDP column in macro and window tables.
pub const GDP_COLUMN: &str = "GDP";

/// Industry-level adjusted cash flow and GDP of one window, per measure.
///
/// Each table has columns `(industry_code, year, quarter, <measure>, GDP)`
/// sorted by industry and period.
#[derive(Debug, Clone)]
pub struct LLWindow {
    anchor: Period,
    tables: Vec<(String, DataFrame)>,
}

impl LLWindow {
    /// Aggregate, adjust and join a filtered cash-flow window with GDP.
    ///
    /// `gdp` is the adjusted `(year, quarter, GDP)` series; the inner join
    /// restricts it to the window's quarters. Every measure is summed over the
    /// stocks of an industry before adjustment.
    pub fn build(
        window: &CashflowWindow,
        gdp: &DataFrame,
        adjustment: &Adjustment<'_>,
    ) -> Result<Self> {
        require_columns("gdp", gdp, &["year", "quarter", GDP_COLUMN])?;
        let gdp = gdp.select(["year", "quarter", GDP_COLUMN])?;

        let tables = window
            .tables()
            .iter()
            .map(|(measure, df)| {
                let industry = df
                    .clone()
                    .lazy()
                    .group_by([col("industry_code"), col("year"), col("quarter")])
                    .agg([col(measure.as_str()).sum()])
                    .collect()?;
                let industry = adjustment.adjust(industry, measure)?;

                let joined = industry
                    .lazy()
                    .join(
                        gdp.clone().lazy(),
                        [col("year"), col("quarter")],
                        [col("year"), col("quarter")],
                        JoinArgs::new(JoinType::Inner),
                    )
                    .select([
                        col("industry_code"),
                        col("year"),
                        col("quarter"),
                        col(measure.as_str()),
                        col(GDP_COLUMN),
                    ])
                    .sort(["industry_code", "year", "quarter"], Default::default())
                    .collect()?;
                Ok((measure.clone(), joined))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            anchor: window.anchor(),
            tables,
        })
    }

    /// Anchor quarter of the source window.
    pub const fn anchor(&self) -> Period {
        self.anchor
    }

    /// Adjusted tables in measure order.
    pub fn tables(&self) -> &[(String, DataFrame)] {
        &self.tables
    }
}

/// Lead-lag summaries of one industry at one anchor for one measure.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadLagResult {
    /// Anchor quarter of the window
    pub period: Period,
    /// Industry classification code
    pub industry_code: i64,
    /// Cash-flow measure
    pub measure: String,
    /// Shift with the largest absolute correlation
    pub ll_max: f64,
    /// Correlation-weighted mean shift
    pub ll_average: f64,
    /// Shift weighted by each shift's share of correlation across rows
    pub ll_industry: f64,
}

const INDUSTRY: &str = "industry_code";

/// Relative slack under which two correlations count as tied.
const TIE_TOLERANCE: f64 = 1e-9;

/// Relative floor below which a rolling variance counts as zero.
const VARIANCE_TOLERANCE: f64 = 1e-12;

fn by_industry() -> [Expr; 1] {
    [col(INDUSTRY)]
}

/// First difference of `column` within each industry, keeping the name.
///
/// The first row of an industry has no predecessor and is null.
pub fn difference(column: &str) -> Expr {
    (col(column) - col(column).shift(lit(1)).over(by_industry())).alias(column)
}

/// `column[t - k]` within each industry, null outside the series.
pub fn shift(column: &str, k: i64) -> Expr {
    col(column).shift(lit(k)).over(by_industry())
}

fn trailing_mean(values: Expr, window: usize) -> Expr {
    values
        .rolling_mean(RollingOptionsFixedWindow {
            window_size: window,
            min_periods: window,
            ..Default::default()
        })
        .over(by_industry())
}

/// Absolute Pearson correlation of `x` and `y` over the trailing `window` rows
/// of each industry.
///
/// Null until `window` complete pairs are available, and where either side is
/// constant over the span.
pub fn rolling_abs_correlation(x: &str, y: &str, window: usize) -> Expr {
    let mean_x = trailing_mean(col(x), window);
    let mean_y = trailing_mean(col(y), window);
    let mean_xx = trailing_mean(col(x) * col(x), window);
    let mean_yy = trailing_mean(col(y) * col(y), window);
    let mean_xy = trailing_mean(col(x) * col(y), window);

    let var_x = mean_xx.clone() - mean_x.clone() * mean_x.clone();
    let var_y = mean_yy.clone() - mean_y.clone() * mean_y.clone();
    let cov = mean_xy - mean_x * mean_y;
    let varies = var_x
        .clone()
        .gt(mean_xx * lit(VARIANCE_TOLERANCE))
        .and(var_y.clone().gt(mean_yy * lit(VARIANCE_TOLERANCE)));

    when(varies)
        .then((cov.clone() * cov / (var_x * var_y)).sqrt())
        .otherwise(lit(NULL))
}

fn sum_exprs(exprs: impl Iterator<Item = Expr>) -> Expr {
    exprs.reduce(|a, b| a + b).unwrap_or_else(|| lit(0.0))
}

/// Computes lead-lag summaries per industry.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadLagEngine {
    config: LeadLagConfig,
}

impl LeadLagEngine {
    /// Create an engine for the given shift range and rolling length.
    pub const fn new(config: LeadLagConfig) -> Self {
        Self { config }
    }

    /// Engine configuration.
    pub const fn config(&self) -> &LeadLagConfig {
        &self.config
    }

    /// Summaries for every measure of a window.
    pub fn window(&self, window: &LLWindow) -> Result<Vec<LeadLagResult>> {
        let mut results = Vec::new();
        for (measure, table) in window.tables() {
            results.extend(self.measure(table, measure, window.anchor())?);
        }
        Ok(results)
    }

    /// Per-row absolute correlations `c_k` of one measure table.
    ///
    /// Returns `industry_code` followed by one column per shift, named
    /// `c(<k>)`, for the rows where every shift has a defined correlation.
    pub fn correlations(&self, table: &DataFrame, measure: &str) -> Result<DataFrame> {
        require_columns(measure, table, &[INDUSTRY, measure, GDP_COLUMN])?;
        let r = self.config.rolling_window;
        let shifts: Vec<i64> = self.config.shifts().collect();
        let shifted: Vec<String> = shifts.iter().map(|k| format!("{measure}({k})")).collect();
        let names: Vec<String> = shifts.iter().map(|k| correlation_column(*k)).collect();

        let defined = names
            .iter()
            .map(|c| col(c.as_str()).is_not_null())
            .reduce(Expr::and)
            .unwrap_or_else(|| lit(true));

        let mut select = vec![col(INDUSTRY)];
        select.extend(names.iter().map(|c| col(c.as_str())));

        Ok(table
            .clone()
            .lazy()
            .filter(col(INDUSTRY).is_not_null())
            .with_columns([difference(measure), difference(GDP_COLUMN)])
            .filter(col(measure).is_not_null().and(col(GDP_COLUMN).is_not_null()))
            .with_columns(
                shifts
                    .iter()
                    .zip(&shifted)
                    .map(|(k, name)| shift(measure, *k).alias(name.as_str()))
                    .collect::<Vec<_>>(),
            )
            .with_columns(
                shifted
                    .iter()
                    .zip(&names)
                    .map(|(s, c)| rolling_abs_correlation(s, GDP_COLUMN, r).alias(c.as_str()))
                    .collect::<Vec<_>>(),
            )
            .filter(defined)
            .select(select)
            .collect()?)
    }

    /// Summaries for one `(industry_code, year, quarter, <measure>, GDP)` table
    /// sorted by industry and period.
    pub fn measure(
        &self,
        table: &DataFrame,
        measure: &str,
        anchor: Period,
    ) -> Result<Vec<LeadLagResult>> {
        let shifts: Vec<i64> = self.config.shifts().collect();
        let names: Vec<String> = shifts.iter().map(|k| correlation_column(*k)).collect();
        let c = |name: &String| col(name.as_str());

        let weight = sum_exprs(names.iter().map(c));
        let weighted = sum_exprs(names.iter().zip(&shifts).map(|(n, k)| c(n) * lit(*k as f64)));
        // N_k is taken over every row of the window; a shift with N_k = 0 adds nothing.
        let industry = sum_exprs(names.iter().zip(&shifts).map(|(n, k)| {
            when(c(n).sum().gt(lit(0.0)))
                .then(c(n) * lit(*k as f64) / c(n).sum())
                .otherwise(lit(0.0))
        }));

        let rows = self
            .correlations(table, measure)?
            .lazy()
            .with_columns([
                (weighted / weight.clone()).alias("LL_average"),
                industry.alias("LL_industry"),
                weight.alias("weight"),
            ])
            .filter(col("weight").gt(lit(0.0)))
            .collect()?;

        let codes = rows.column(INDUSTRY)?.i64()?;
        let averages = rows.column("LL_average")?.f64()?;
        let industries = rows.column("LL_industry")?.f64()?;
        let columns = names
            .iter()
            .map(|n| Ok(rows.column(n)?.f64()?.clone()))
            .collect::<Result<Vec<_>>>()?;

        let mut results = Vec::with_capacity(rows.height());
        for (i, ((code, ll_average), ll_industry)) in
            codes.into_iter().zip(averages).zip(industries).enumerate()
        {
            let (Some(industry_code), Some(ll_average), Some(ll_industry)) =
                (code, ll_average, ll_industry)
            else {
                continue;
            };
            let correlations: Vec<f64> = columns
                .iter()
                .map(|c| c.get(i).unwrap_or(0.0))
                .collect();
            results.push(LeadLagResult {
                period: anchor,
                industry_code,
                measure: measure.to_string(),
                ll_max: first_argmax(&correlations, &shifts) as f64,
                ll_average,
                ll_industry,
            });
        }

        debug!(
            anchor = %anchor,
            measure,
            rows = results.len(),
            "lead-lag window"
        );
        Ok(results)
    }
}

/// Name of the correlation column for shift `k`.
pub fn correlation_column(k: i64) -> String {
    format!("c({k})")
}

/// Shift of the largest correlation; the smallest shift wins ties.
///
/// Correlations within a relative [`TIE_TOLERANCE`] of the best are tied.
fn first_argmax(correlations: &[f64], shifts: &[i64]) -> i64 {
    let mut best = 0;
    for (i, &c) in correlations.iter().enumerate() {
        let leader = correlations[best];
        if c > leader + TIE_TOLERANCE * leader.abs().max(1.0) {
            best = i;
        }
    }
    shifts[best]
}

//! The lead-lag factor table and single-column selections of it.

use crate::adjust::Adjustment;
use crate::config::{FilterConfig, LeadLagConfig};
use crate::engine::{GDP_COLUMN, LLWindow, LeadLagEngine, LeadLagResult};
use crate::error::{FactorError, Result};
use crate::filter::FilterPipeline;
use crate::registry::LeadLagMeasure;
use crate::window::{WindowSummary, Windows};
use leadlag_data::{Eligibility, PERIOD_COLUMN, PanelStore, Period};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::info;

/// Builds the factor table from a panel, the macro series and eligibility metadata.
#[derive(Debug, Clone)]
pub struct LeadLagFactor {
    measures: Vec<String>,
    lead_lag: LeadLagConfig,
    filter: FilterConfig,
}

/// Per-industry summaries of one window, one slot per measure.
type WindowRows = BTreeMap<i64, Vec<Option<[f64; 3]>>>;

impl LeadLagFactor {
    /// Create a factor over the given cash-flow measures.
    pub fn new(measures: Vec<String>, lead_lag: LeadLagConfig, filter: FilterConfig) -> Result<Self> {
        if measures.is_empty() {
            return Err(FactorError::InvalidConfig(
                "at least one cash-flow measure is required".to_string(),
            ));
        }
        lead_lag.validate()?;
        filter.validate()?;
        Ok(Self {
            measures,
            lead_lag,
            filter,
        })
    }

    /// Cash-flow measures in output order.
    pub fn measures(&self) -> &[String] {
        &self.measures
    }

    /// Shift and rolling configuration.
    pub const fn lead_lag(&self) -> &LeadLagConfig {
        &self.lead_lag
    }

    /// Eligibility rules.
    pub const fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    /// Factor table columns in order.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![PERIOD_COLUMN.to_string(), "industry_code".to_string()];
        columns.extend(crate::registry::factor_columns(&self.measures));
        columns
    }

    /// Compute the factor table.
    ///
    /// `gdp` is the raw `(year, quarter, GDP)` series; it is adjusted once over
    /// its full span before the windows are joined against it.
    pub fn compute(
        &self,
        panel: &PanelStore,
        gdp: &DataFrame,
        inflation: &DataFrame,
        eligibility: &Eligibility,
    ) -> Result<DataFrame> {
        self.compute_with(panel, gdp, inflation, eligibility, |_| {})
    }

    /// Compute the factor table, reporting each filtered window to `on_window`.
    pub fn compute_with<F>(
        &self,
        panel: &PanelStore,
        gdp: &DataFrame,
        inflation: &DataFrame,
        eligibility: &Eligibility,
        mut on_window: F,
    ) -> Result<DataFrame>
    where
        F: FnMut(&WindowSummary),
    {
        for measure in &self.measures {
            if !panel.measures().contains(measure) {
                return Err(FactorError::UnknownMeasure(measure.clone()));
            }
        }

        let filters = FilterPipeline::new(&self.filter, eligibility);
        let adjustment = Adjustment::new(inflation);
        let gdp = adjustment.adjust(gdp.clone(), GDP_COLUMN)?;
        let engine = LeadLagEngine::new(self.lead_lag);
        let windows = Windows::new(panel, self.lead_lag.window_length());
        info!(
            windows = windows.len(),
            length = windows.length(),
            measures = self.measures.len(),
            "computing lead-lag factor"
        );

        let mut output: Vec<(Period, WindowRows)> = Vec::with_capacity(windows.len());
        for window in windows {
            let window = filters.apply(window)?;
            on_window(&window.summary()?);

            let cashflow = filters.apply_cashflow(window.split(&self.measures)?)?;
            let ll_window = LLWindow::build(&cashflow, &gdp, &adjustment)?;
            let results = engine.window(&ll_window)?;
            output.push((ll_window.anchor(), self.merge(results)));
        }

        let table = self.assemble(output)?;
        info!(rows = table.height(), "lead-lag factor computed");
        Ok(table)
    }

    /// Outer join of one window's measures on industry.
    fn merge(&self, results: Vec<LeadLagResult>) -> WindowRows {
        let mut rows = WindowRows::new();
        for result in results {
            let Some(slot) = self.measures.iter().position(|m| *m == result.measure) else {
                continue;
            };
            let entry = rows
                .entry(result.industry_code)
                .or_insert_with(|| vec![None; self.measures.len()]);
            // A later row of the same industry supersedes an earlier one.
            entry[slot] = Some([result.ll_max, result.ll_average, result.ll_industry]);
        }
        rows
    }

    fn assemble(&self, output: Vec<(Period, WindowRows)>) -> Result<DataFrame> {
        let mut periods = Vec::new();
        let mut codes = Vec::new();
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); self.measures.len() * 3];

        for (anchor, rows) in output {
            for (code, slots) in rows {
                periods.push(anchor.to_string());
                codes.push(code);
                for (m, slot) in slots.iter().enumerate() {
                    for (s, column) in values[m * 3..m * 3 + 3].iter_mut().enumerate() {
                        column.push(slot.map(|v| v[s]));
                    }
                }
            }
        }

        let mut columns: Vec<Column> = vec![
            Series::new(PERIOD_COLUMN.into(), periods).into(),
            Series::new("industry_code".into(), codes).into(),
        ];
        let names = crate::registry::factor_columns(&self.measures);
        for (name, column) in names.into_iter().zip(values) {
            columns.push(Series::new(name.into(), column).into());
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// One `(measure, cash flow)` column of a factor table with its keys, nulls dropped.
#[derive(Debug, Clone)]
pub struct LLFactor {
    measure: LeadLagMeasure,
    cashflow: String,
    frame: DataFrame,
}

impl LLFactor {
    /// Select `measure(cashflow)` from a factor table.
    pub fn select(table: &DataFrame, measure: LeadLagMeasure, cashflow: &str) -> Result<Self> {
        let column = measure.column(cashflow);
        leadlag_data::require_columns("factor", table, &[PERIOD_COLUMN, "industry_code", column.as_str()])?;
        let frame = table
            .clone()
            .lazy()
            .select([col(PERIOD_COLUMN), col("industry_code"), col(column.as_str())])
            .filter(col(column.as_str()).is_not_null())
            .collect()?;
        Ok(Self {
            measure,
            cashflow: cashflow.to_string(),
            frame,
        })
    }

    /// Selected summary statistic.
    pub const fn measure(&self) -> LeadLagMeasure {
        self.measure
    }

    /// Selected cash-flow measure.
    pub fn cashflow(&self) -> &str {
        &self.cashflow
    }

    /// Name of the value column.
    pub fn column_name(&self) -> String {
        self.measure.column(&self.cashflow)
    }

    /// `(period, industry_code, value)` rows.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Take the rows.
    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Relabel every period `k` quarters later, so the factor observed at `t`
    /// is aligned with outcomes at `t + k`.
    pub fn shifted(&self, k: i64) -> Result<Self> {
        let periods = self
            .frame
            .column(PERIOD_COLUMN)?
            .str()?
            .into_iter()
            .map(|p| {
                p.map(|p| p.parse::<Period>().map(|p| p.shift(k).to_string()))
                    .transpose()
            })
            .collect::<std::result::Result<Vec<Option<String>>, _>>()?;

        let mut frame = self.frame.clone();
        frame.with_column(Series::new(PERIOD_COLUMN.into(), periods))?;
        Ok(Self {
            frame,
            ..self.clone()
        })
    }
}

//! End-to-end orchestration of feeds, cache and factor computation.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use leadlag_data::{
    CachedCompute, DataContext, Eligibility, PanelStore, Period, TableCache, TableSchema,
    industry_panel,
};
use leadlag_factors::{
    FilterPipeline, LLFactor, LeadLagFactor, LeadLagMeasure, WindowSummary, Windows,
};
use polars::prelude::*;
use tracing::info;

/// Runs the lead-lag pipeline for one configuration.
///
/// Feeds are read through a [`DataContext`]; the merged cash-flow table, the
/// quarterly industry table and the factor table are produced through a
/// [`TableCache`] rooted at the configured cache directory.
#[derive(Debug)]
pub struct LeadLagPipeline {
    config: PipelineConfig,
    context: DataContext,
    cache: TableCache,
}

impl LeadLagPipeline {
    /// Validate the configuration and resolve its directories.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let data_dir = config.data_dir()?;
        let cache = TableCache::new(config.cache_dir()?);
        let context = DataContext::new(
            &data_dir,
            config.data.files.clone(),
            config.cashflow_options(),
        );
        info!(data = %data_dir.display(), cache = %cache.root().display(), "pipeline ready");
        Ok(Self {
            config,
            context,
            cache,
        })
    }

    /// Active configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Input feeds.
    pub const fn context(&self) -> &DataContext {
        &self.context
    }

    /// Table cache.
    pub const fn cache(&self) -> &TableCache {
        &self.cache
    }

    /// Quarterly cash-flow table `(stock, year, quarter, <measures...>)`.
    pub fn cashflow(&self) -> Result<DataFrame> {
        let compute = CachedCompute::new(
            &self.config.cache.cashflow,
            self.config.cache.policy(),
            || Ok::<_, PipelineError>(self.context.cashflow()?.clone()),
        );
        let df = compute.call(&self.cache)?;
        Ok(TableSchema::cashflow(&self.config.measures).apply(df)?)
    }

    /// Quarterly industry classification `(stock, year, quarter, industry_code)`
    /// up to the last cash-flow quarter.
    pub fn industry(&self) -> Result<DataFrame> {
        let compute = CachedCompute::new(
            &self.config.cache.industry,
            self.config.cache.policy(),
            || {
                let last = last_period(&self.cashflow()?)?;
                let changes = self.context.industry_changes()?;
                Ok::<_, PipelineError>(industry_panel(changes, last)?)
            },
        );
        let df = compute.call(&self.cache)?;
        Ok(df
            .lazy()
            .select([
                col("stock").cast(DataType::Int64),
                col("year").cast(DataType::Int64),
                col("quarter").cast(DataType::Int64),
                col("industry_code").cast(DataType::Int64),
            ])
            .collect()?)
    }

    /// Panel of cash flows with industry codes.
    pub fn panel(&self) -> Result<PanelStore> {
        Ok(PanelStore::new(
            &self.cashflow()?,
            &self.industry()?,
            &self.config.measures,
        )?)
    }

    /// Eligibility metadata for the configured filters. Unneeded feeds are not read.
    pub fn eligibility(&self) -> Result<Eligibility> {
        let filter = &self.config.filter;
        let mut eligibility = Eligibility::new();
        if filter.needs_market_types() {
            eligibility = eligibility.with_market_types(self.context.market_type()?)?;
        }
        if filter.needs_listings() {
            eligibility = eligibility.with_listings(self.context.listing()?)?;
        }
        if filter.needs_annotations() {
            eligibility = eligibility.with_annotations(self.context.disclosure()?)?;
        }
        Ok(eligibility)
    }

    /// The configured factor.
    pub fn factor(&self) -> Result<LeadLagFactor> {
        Ok(LeadLagFactor::new(
            self.config.measures.clone(),
            self.config.lead_lag,
            self.config.filter.clone(),
        )?)
    }

    /// The lead-lag factor table.
    pub fn lead_lag(&self) -> Result<DataFrame> {
        self.lead_lag_with(|_| {})
    }

    /// The lead-lag factor table, reporting each computed window to `on_window`.
    ///
    /// `on_window` is not called when the table is served from the cache.
    pub fn lead_lag_with<F>(&self, on_window: F) -> Result<DataFrame>
    where
        F: FnMut(&WindowSummary),
    {
        let df = self.cache.get_or_compute(
            &self.config.cache.lead_lag,
            self.config.cache.policy(),
            || {
                let panel = self.panel()?;
                let eligibility = self.eligibility()?;
                Ok::<_, PipelineError>(self.factor()?.compute_with(
                    &panel,
                    self.context.gdp()?,
                    self.context.inflation()?,
                    &eligibility,
                    on_window,
                )?)
            },
        )?;
        self.typed_factor_table(df)
    }

    /// One column of the factor table with its keys, nulls dropped.
    pub fn select(&self, measure: LeadLagMeasure, cashflow: &str) -> Result<LLFactor> {
        Ok(LLFactor::select(&self.lead_lag()?, measure, cashflow)?)
    }

    /// Size of every filtered window, without running the engine.
    pub fn window_summaries(&self) -> Result<Vec<WindowSummary>> {
        let panel = self.panel()?;
        let eligibility = self.eligibility()?;
        let filters = FilterPipeline::new(&self.config.filter, &eligibility);
        Windows::new(&panel, self.config.lead_lag.window_length())
            .map(|window| Ok(filters.apply(window)?.summary()?))
            .collect()
    }

    fn typed_factor_table(&self, df: DataFrame) -> Result<DataFrame> {
        let columns = self.factor()?.columns();
        let exprs: Vec<Expr> = columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let dtype = match i {
                    0 => DataType::String,
                    1 => DataType::Int64,
                    _ => DataType::Float64,
                };
                col(name.as_str()).cast(dtype)
            })
            .collect();
        Ok(df.lazy().select(exprs).collect()?)
    }
}

fn last_period(cashflow: &DataFrame) -> Result<Period> {
    let years = cashflow.column("year")?.i64()?;
    let quarters = cashflow.column("quarter")?.i64()?;
    let mut last: Option<Period> = None;
    for (year, quarter) in years.into_iter().zip(quarters) {
        if let (Some(year), Some(quarter)) = (year, quarter) {
            let period = Period::new(year, quarter)?;
            last = Some(last.map_or(period, |p| p.max(period)));
        }
    }
    last.ok_or_else(|| PipelineError::InvalidConfig("cash-flow feed has no quarters".to_string()))
}

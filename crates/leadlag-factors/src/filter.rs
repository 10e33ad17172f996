//! Eligibility filters for a window.
//!
//! Rules run in a fixed order: market segment, disclosure delay and listing
//! age on the whole window, then completeness and balance on each measure
//! table. Every rule is idempotent and an empty result is valid.

use crate::config::FilterConfig;
use crate::error::Result;
use crate::window::{CashflowWindow, Window};
use chrono::Duration;
use leadlag_data::Eligibility;
use polars::prelude::*;
use tracing::debug;

/// Left-join `metadata` on `keys` and keep the rows where `predicate` holds.
///
/// Rows without metadata see nulls, fail the predicate and are dropped. The
/// window's columns and row order are preserved.
fn retain_joined(
    df: &DataFrame,
    metadata: &DataFrame,
    keys: &[&str],
    predicate: Expr,
) -> Result<DataFrame> {
    let original: Vec<Expr> = df
        .get_column_names()
        .into_iter()
        .map(|name| col(name.as_str()))
        .collect();
    let on: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let mut args = JoinArgs::new(JoinType::Left);
    args.maintain_order = MaintainOrderJoin::Left;

    Ok(df
        .clone()
        .lazy()
        .join(metadata.clone().lazy(), on.clone(), on, args)
        .filter(predicate)
        .select(original)
        .collect()?)
}

/// Configured eligibility rules bound to their metadata.
#[derive(Debug, Clone, Copy)]
pub struct FilterPipeline<'a> {
    config: &'a FilterConfig,
    eligibility: &'a Eligibility,
}

impl<'a> FilterPipeline<'a> {
    /// Bind rules to metadata.
    pub const fn new(config: &'a FilterConfig, eligibility: &'a Eligibility) -> Self {
        Self {
            config,
            eligibility,
        }
    }

    /// Market segment, disclosure delay and listing rules, in that order.
    pub fn apply(&self, window: Window) -> Result<Window> {
        let window = self.market_segment(window)?;
        let window = self.disclosure_delay(window)?;
        self.unlisted(window)
    }

    /// Completeness and, when configured, balance on every measure table.
    pub fn apply_cashflow(&self, window: CashflowWindow) -> Result<CashflowWindow> {
        let length = window.periods().len();
        let balanced = self.config.balanced;
        window.try_map(|measure, df| {
            let df = completeness(&df, measure)?;
            if balanced {
                balance(&df, length)
            } else {
                Ok(df)
            }
        })
    }

    /// Keep stocks whose market segment is allowed. Stocks without a known
    /// segment are dropped.
    pub fn market_segment(&self, window: Window) -> Result<Window> {
        let Some(allowed) = &self.config.market_segments else {
            return Ok(window);
        };

        let allowed = Series::new("allowed".into(), allowed.clone());
        let df = retain_joined(
            window.frame(),
            self.eligibility.market_types(),
            &["stock"],
            col("market_type").is_in(lit(allowed)),
        )?;
        debug!(anchor = %window.anchor(), rows = df.height(), "market segment filter");
        Ok(window.with_frame(df))
    }

    /// Drop statements annotated later than the anchor quarter end plus the
    /// allowed delay. Statements without an annotation date are dropped.
    pub fn disclosure_delay(&self, window: Window) -> Result<Window> {
        let Some(days) = self.config.max_disclosure_delay_days else {
            return Ok(window);
        };
        let deadline = window.anchor().end_date() + Duration::days(days);

        let df = retain_joined(
            window.frame(),
            self.eligibility.annotations(),
            &["stock", "year", "quarter"],
            col("annotation_date").lt_eq(lit(deadline.to_string())),
        )?;

        debug!(anchor = %window.anchor(), rows = df.height(), %deadline, "disclosure delay filter");
        Ok(window.with_frame(df))
    }

    /// Drop quarters at or before a stock's listing quarter. Stocks without a
    /// listing date are dropped.
    pub fn unlisted(&self, window: Window) -> Result<Window> {
        if !self.config.drop_unlisted {
            return Ok(window);
        }

        let period = col("year") * lit(4i64) + col("quarter") - lit(1i64);
        let df = retain_joined(
            window.frame(),
            self.eligibility.listings(),
            &["stock"],
            period.gt(col("listing_period")),
        )?;

        debug!(anchor = %window.anchor(), rows = df.height(), "unlisted filter");
        Ok(window.with_frame(df))
    }
}

/// Drop every record of a stock that has a null `measure` or a null industry
/// code anywhere in the table.
pub fn completeness(df: &DataFrame, measure: &str) -> Result<DataFrame> {
    Ok(df
        .clone()
        .lazy()
        .filter(
            (col(measure).null_count().over([col("stock")])
                + col("industry_code").null_count().over([col("stock")]))
            .eq(lit(0)),
        )
        .collect()?)
}

/// Drop every stock with fewer than `length` records.
pub fn balance(df: &DataFrame, length: usize) -> Result<DataFrame> {
    Ok(df
        .clone()
        .lazy()
        .filter(
            col("stock")
                .len()
                .over([col("stock")])
                .gt_eq(lit(length as i64)),
        )
        .collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadlag_data::Period;

    fn period(i: i64) -> Period {
        Period::new(2010, 1).unwrap().shift(i)
    }

    /// Stocks 1..=3 over four quarters; stock 3 misses its last quarter and
    /// stock 2 has a null measure in the second quarter.
    fn window() -> Window {
        let mut stock = Vec::new();
        let mut year = Vec::new();
        let mut quarter = Vec::new();
        let mut code = Vec::new();
        let mut value = Vec::new();
        for i in 0..4 {
            for s in 1..=3i64 {
                if s == 3 && i == 3 {
                    continue;
                }
                let p = period(i);
                stock.push(s);
                year.push(i64::from(p.year()));
                quarter.push(i64::from(p.quarter()));
                code.push(Some(s * 10));
                value.push(if s == 2 && i == 1 { None } else { Some(1.0) });
            }
        }
        let df = DataFrame::new(vec![
            Series::new("stock".into(), stock).into(),
            Series::new("year".into(), year).into(),
            Series::new("quarter".into(), quarter).into(),
            Series::new("industry_code".into(), code).into(),
            Series::new("EBITDA".into(), value).into(),
        ])
        .unwrap();
        Window::new((0..4).map(period).collect(), df).unwrap()
    }

    fn stocks(df: &DataFrame) -> Vec<i64> {
        let mut s: Vec<i64> = df.column("stock").unwrap().i64().unwrap().into_iter().flatten().collect();
        s.sort_unstable();
        s.dedup();
        s
    }

    fn eligibility() -> Eligibility {
        let market = DataFrame::new(vec![
            Series::new("stock".into(), [1i64, 2]).into(),
            Series::new("market_type".into(), [1i64, 4]).into(),
        ])
        .unwrap();
        let listing = DataFrame::new(vec![
            Series::new("stock".into(), [1i64, 2]).into(),
            Series::new("listing_date".into(), ["2005-01-10", "2010-05-04"]).into(),
        ])
        .unwrap();
        let mut a_stock = Vec::new();
        let mut a_year = Vec::new();
        let mut a_quarter = Vec::new();
        let mut a_date = Vec::new();
        for i in 0..4 {
            let p = period(i);
            for s in [1i64, 3] {
                a_stock.push(s);
                a_year.push(i64::from(p.year()));
                a_quarter.push(i64::from(p.quarter()));
                // Stock 3 files its third-quarter statement very late.
                let delay = if s == 3 && i == 2 { 400 } else { 30 };
                a_date.push((p.end_date() + Duration::days(delay)).to_string());
            }
        }
        let disclosure = DataFrame::new(vec![
            Series::new("stock".into(), a_stock).into(),
            Series::new("year".into(), a_year).into(),
            Series::new("quarter".into(), a_quarter).into(),
            Series::new("annotation_date".into(), a_date).into(),
        ])
        .unwrap();

        Eligibility::new()
            .with_market_types(&market)
            .unwrap()
            .with_listings(&listing)
            .unwrap()
            .with_annotations(&disclosure)
            .unwrap()
    }

    #[test]
    fn test_unconfigured_rules_keep_everything() {
        let config = FilterConfig::default();
        let eligibility = Eligibility::new();
        let pipeline = FilterPipeline::new(&config, &eligibility);
        let filtered = pipeline.apply(window()).unwrap();
        assert_eq!(filtered.frame().height(), 11);
    }

    #[test]
    fn test_market_segment_drops_unknown_stocks() {
        let config = FilterConfig {
            market_segments: Some(vec![1, 4]),
            ..Default::default()
        };
        let eligibility = eligibility();
        let pipeline = FilterPipeline::new(&config, &eligibility);

        let filtered = pipeline.market_segment(window()).unwrap();
        assert_eq!(stocks(filtered.frame()), vec![1, 2]);

        let config = FilterConfig {
            market_segments: Some(vec![4]),
            ..Default::default()
        };
        let pipeline = FilterPipeline::new(&config, &eligibility);
        let filtered = pipeline.market_segment(window()).unwrap();
        assert_eq!(stocks(filtered.frame()), vec![2]);
    }

    #[test]
    fn test_disclosure_delay() {
        let config = FilterConfig {
            max_disclosure_delay_days: Some(120),
            ..Default::default()
        };
        let eligibility = eligibility();
        let pipeline = FilterPipeline::new(&config, &eligibility);

        let filtered = pipeline.disclosure_delay(window()).unwrap();
        // Stock 2 has no annotations, stock 3 loses its late quarter.
        assert_eq!(stocks(filtered.frame()), vec![1, 3]);
        assert_eq!(filtered.frame().height(), 4 + 2);
    }

    #[test]
    fn test_disclosure_deadline_is_inclusive() {
        let deadline = period(3).end_date() + Duration::days(10);
        let mut a_stock = Vec::new();
        let mut a_year = Vec::new();
        let mut a_quarter = Vec::new();
        let mut a_date = Vec::new();
        for i in 0..4 {
            let p = period(i);
            for (s, date) in [(1i64, deadline), (2, deadline + Duration::days(1))] {
                a_stock.push(s);
                a_year.push(i64::from(p.year()));
                a_quarter.push(i64::from(p.quarter()));
                a_date.push(date.to_string());
            }
        }
        let disclosure = DataFrame::new(vec![
            Series::new("stock".into(), a_stock).into(),
            Series::new("year".into(), a_year).into(),
            Series::new("quarter".into(), a_quarter).into(),
            Series::new("annotation_date".into(), a_date).into(),
        ])
        .unwrap();
        let eligibility = Eligibility::new().with_annotations(&disclosure).unwrap();
        let config = FilterConfig {
            max_disclosure_delay_days: Some(10),
            ..Default::default()
        };
        let pipeline = FilterPipeline::new(&config, &eligibility);

        let filtered = pipeline.disclosure_delay(window()).unwrap();
        assert_eq!(stocks(filtered.frame()), vec![1]);
        assert_eq!(filtered.frame().height(), 4);
    }

    #[test]
    fn test_unlisted_drops_listing_quarter() {
        let config = FilterConfig {
            drop_unlisted: true,
            ..Default::default()
        };
        let eligibility = eligibility();
        let pipeline = FilterPipeline::new(&config, &eligibility);

        let filtered = pipeline.unlisted(window()).unwrap();
        // Stock 2 listed in 2010Q2 keeps only 2010Q3 and 2010Q4.
        assert_eq!(filtered.frame().height(), 4 + 2);
        assert_eq!(stocks(filtered.frame()), vec![1, 2]);
    }

    #[test]
    fn test_completeness_drops_whole_stock() {
        let df = completeness(window().frame(), "EBITDA").unwrap();
        assert_eq!(stocks(&df), vec![1, 3]);
        assert_eq!(df.height(), 7);
    }

    #[test]
    fn test_balance_requires_every_quarter() {
        let df = balance(window().frame(), 4).unwrap();
        assert_eq!(stocks(&df), vec![1, 2]);
    }

    #[test]
    fn test_rules_are_idempotent() {
        let config = FilterConfig {
            market_segments: Some(vec![1, 4]),
            max_disclosure_delay_days: Some(120),
            drop_unlisted: true,
            balanced: true,
        };
        let eligibility = eligibility();
        let pipeline = FilterPipeline::new(&config, &eligibility);

        let once = pipeline.apply(window()).unwrap();
        let twice = pipeline.apply(once.clone()).unwrap();
        assert!(once.frame().equals_missing(twice.frame()));

        let df = completeness(window().frame(), "EBITDA").unwrap();
        let again = completeness(&df, "EBITDA").unwrap();
        assert!(df.equals_missing(&again));

        let df = balance(window().frame(), 4).unwrap();
        let again = balance(&df, 4).unwrap();
        assert!(df.equals_missing(&again));
    }

    #[test]
    fn test_empty_window_is_valid() {
        let config = FilterConfig {
            market_segments: Some(vec![99]),
            balanced: true,
            ..Default::default()
        };
        let eligibility = eligibility();
        let pipeline = FilterPipeline::new(&config, &eligibility);

        let filtered = pipeline.apply(window()).unwrap();
        assert_eq!(filtered.frame().height(), 0);
        let cashflow = pipeline
            .apply_cashflow(filtered.split(&["EBITDA"]).unwrap())
            .unwrap();
        assert_eq!(cashflow.get("EBITDA").unwrap().height(), 0);
    }
}

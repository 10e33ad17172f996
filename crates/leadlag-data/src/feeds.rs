//! Feed preprocessing: cash-flow de-cumulation, industry forward fill and
//! stock eligibility metadata.

use crate::error::Result;
use crate::period::{Period, parse_date};
use crate::schema::require_columns;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;

/// Convert fiscal-year cumulative measures into quarterly flows.
///
/// Within each `(stock, year)` the first quarter is kept and every later quarter
/// becomes the difference to the preceding quarter. A quarter whose predecessor
/// is missing from the table has no recoverable flow and becomes null.
pub fn decumulate<S: AsRef<str>>(df: DataFrame, measures: &[S]) -> Result<DataFrame> {
    let by = || [col("stock"), col("year")];
    let contiguous = col("quarter")
        .shift(lit(1))
        .over(by())
        .eq(col("quarter") - lit(1));

    let exprs: Vec<Expr> = measures
        .iter()
        .map(|m| {
            let m = m.as_ref();
            when(col("quarter").eq(lit(1)))
                .then(col(m))
                .when(contiguous.clone())
                .then(col(m) - col(m).shift(lit(1)).over(by()))
                .otherwise(lit(NULL))
                .alias(m)
        })
        .collect();

    Ok(df
        .lazy()
        .sort(["stock", "year", "quarter"], Default::default())
        .with_columns(exprs)
        .collect()?)
}

/// Keep rows whose `year` is at or after `start_year`.
pub fn from_start_year(df: DataFrame, start_year: Option<i64>) -> Result<DataFrame> {
    match start_year {
        Some(year) => Ok(df.lazy().filter(col("year").gt_eq(lit(year))).collect()?),
        None => Ok(df),
    }
}

/// Expand industry change records into a quarterly classification panel.
///
/// Each stock gets one row per quarter from the quarter of its first change up
/// to `last`. The code in force for a quarter is the latest change dated on or
/// before the quarter end.
pub fn industry_panel(changes: &DataFrame, last: Period) -> Result<DataFrame> {
    require_columns("industry", changes, &["stock", "industry_code", "implement_date"])?;

    let stocks = changes.column("stock")?.i64()?;
    let codes = changes.column("industry_code")?.i64()?;
    let dates = changes.column("implement_date")?.str()?;

    let mut history: BTreeMap<i64, Vec<(NaiveDate, Option<i64>)>> = BTreeMap::new();
    for ((stock, code), date) in stocks.into_iter().zip(codes).zip(dates) {
        let (Some(stock), Some(date)) = (stock, date) else {
            continue;
        };
        history
            .entry(stock)
            .or_default()
            .push((parse_date(date)?, code));
    }

    let mut out_stock = Vec::new();
    let mut out_year = Vec::new();
    let mut out_quarter = Vec::new();
    let mut out_code = Vec::new();

    for (stock, mut records) in history {
        // Stable sort: of two changes on one date the later record wins.
        records.sort_by_key(|(date, _)| *date);
        let Some(&(first, _)) = records.first() else {
            continue;
        };

        let mut period = Period::containing(first);
        let mut next = 0;
        let mut current = None;
        while period <= last {
            let end = period.end_date();
            while let Some(&(date, code)) = records.get(next) {
                if date > end {
                    break;
                }
                current = code;
                next += 1;
            }
            out_stock.push(stock);
            out_year.push(i64::from(period.year()));
            out_quarter.push(i64::from(period.quarter()));
            out_code.push(current);
            period = period.shift(1);
        }
    }

    Ok(DataFrame::new(vec![
        Series::new("stock".into(), out_stock).into(),
        Series::new("year".into(), out_year).into(),
        Series::new("quarter".into(), out_quarter).into(),
        Series::new("industry_code".into(), out_code).into(),
    ])?)
}

/// Per-stock metadata consulted by the eligibility filters.
///
/// Each feed is held as a frame keyed by `stock` (annotations by
/// `stock, year, quarter`). A stock absent from a frame is unknown to that
/// feed. Of repeated keys the last record wins.
#[derive(Debug, Clone)]
pub struct Eligibility {
    market_types: DataFrame,
    listings: DataFrame,
    annotations: DataFrame,
}

impl Default for Eligibility {
    fn default() -> Self {
        Self::new()
    }
}

fn empty(columns: &[(&str, DataType)]) -> DataFrame {
    DataFrame::new(
        columns
            .iter()
            .map(|(name, dtype)| Series::new_empty((*name).into(), dtype).into())
            .collect(),
    )
    .unwrap_or_default()
}

fn last_per_key(df: DataFrame, keys: &[&str]) -> Result<DataFrame> {
    let subset = keys.iter().map(|k| (*k).into()).collect();
    Ok(df
        .lazy()
        .unique_stable(Some(subset), UniqueKeepStrategy::Last)
        .collect()?)
}

impl Eligibility {
    /// Empty metadata: every stock is unknown.
    pub fn new() -> Self {
        Self {
            market_types: empty(&[("stock", DataType::Int64), ("market_type", DataType::Int64)]),
            listings: empty(&[("stock", DataType::Int64), ("listing_period", DataType::Int64)]),
            annotations: empty(&[
                ("stock", DataType::Int64),
                ("year", DataType::Int64),
                ("quarter", DataType::Int64),
                ("annotation_date", DataType::String),
            ]),
        }
    }

    /// Load market segments from a `(stock, market_type)` table.
    pub fn with_market_types(mut self, df: &DataFrame) -> Result<Self> {
        require_columns("market_type", df, &["stock", "market_type"])?;
        let df = df
            .clone()
            .lazy()
            .select([
                col("stock").cast(DataType::Int64),
                col("market_type").cast(DataType::Int64),
            ])
            .drop_nulls(None)
            .collect()?;
        self.market_types = last_per_key(df, &["stock"])?;
        Ok(self)
    }

    /// Load listing quarters from a `(stock, listing_date)` table.
    ///
    /// The listing quarter is stored as its period index.
    pub fn with_listings(mut self, df: &DataFrame) -> Result<Self> {
        require_columns("listing", df, &["stock", "listing_date"])?;
        let stocks = df.column("stock")?.i64()?;
        let dates = df.column("listing_date")?.str()?;

        let mut out_stock = Vec::new();
        let mut out_period = Vec::new();
        for (stock, date) in stocks.into_iter().zip(dates) {
            if let (Some(stock), Some(date)) = (stock, date) {
                out_stock.push(stock);
                out_period.push(Period::containing(parse_date(date)?).index());
            }
        }

        let df = DataFrame::new(vec![
            Series::new("stock".into(), out_stock).into(),
            Series::new("listing_period".into(), out_period).into(),
        ])?;
        self.listings = last_per_key(df, &["stock"])?;
        Ok(self)
    }

    /// Load statement annotation dates from a `(stock, year, quarter, annotation_date)` table.
    ///
    /// Dates are normalised to ISO-8601 text so they order lexically.
    pub fn with_annotations(mut self, df: &DataFrame) -> Result<Self> {
        require_columns("disclosure", df, &["stock", "year", "quarter", "annotation_date"])?;
        let stocks = df.column("stock")?.i64()?;
        let years = df.column("year")?.i64()?;
        let quarters = df.column("quarter")?.i64()?;
        let dates = df.column("annotation_date")?.str()?;

        let mut out_stock = Vec::new();
        let mut out_year = Vec::new();
        let mut out_quarter = Vec::new();
        let mut out_date = Vec::new();
        for (((stock, year), quarter), date) in
            stocks.into_iter().zip(years).zip(quarters).zip(dates)
        {
            if let (Some(stock), Some(year), Some(quarter), Some(date)) = (stock, year, quarter, date)
            {
                let period = Period::new(year, quarter)?;
                out_stock.push(stock);
                out_year.push(i64::from(period.year()));
                out_quarter.push(i64::from(period.quarter()));
                out_date.push(parse_date(date)?.to_string());
            }
        }

        let df = DataFrame::new(vec![
            Series::new("stock".into(), out_stock).into(),
            Series::new("year".into(), out_year).into(),
            Series::new("quarter".into(), out_quarter).into(),
            Series::new("annotation_date".into(), out_date).into(),
        ])?;
        self.annotations = last_per_key(df, &["stock", "year", "quarter"])?;
        Ok(self)
    }

    /// `(stock, market_type)`, one row per stock.
    pub const fn market_types(&self) -> &DataFrame {
        &self.market_types
    }

    /// `(stock, listing_period)`, one row per stock.
    pub const fn listings(&self) -> &DataFrame {
        &self.listings
    }

    /// `(stock, year, quarter, annotation_date)`, one row per statement.
    pub const fn annotations(&self) -> &DataFrame {
        &self.annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cumulative() -> DataFrame {
        DataFrame::new(vec![
            Series::new("stock".into(), [1i64, 1, 1, 1, 2, 2]).into(),
            Series::new("year".into(), [2010i64, 2010, 2010, 2010, 2010, 2010]).into(),
            Series::new("quarter".into(), [4i64, 2, 1, 3, 1, 3]).into(),
            Series::new("EBITDA".into(), [60.0f64, 25.0, 10.0, 45.0, 10.0, 30.0]).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_decumulate_differences_within_fiscal_year() {
        let df = decumulate(cumulative(), &["EBITDA"]).unwrap();
        let values: Vec<Option<f64>> = df.column("EBITDA").unwrap().f64().unwrap().into_iter().collect();

        assert_eq!(values[..4], [Some(10.0), Some(15.0), Some(20.0), Some(15.0)]);
        // Stock 2 has no second quarter, so its third-quarter flow is unknown.
        assert_eq!(values[4], Some(10.0));
        assert_eq!(values[5], None);
    }

    #[test]
    fn test_decumulate_restarts_each_year() {
        let df = DataFrame::new(vec![
            Series::new("stock".into(), [1i64, 1]).into(),
            Series::new("year".into(), [2010i64, 2011]).into(),
            Series::new("quarter".into(), [4i64, 1]).into(),
            Series::new("EBITDA".into(), [100.0f64, 30.0]).into(),
        ])
        .unwrap();

        let df = decumulate(df, &["EBITDA"]).unwrap();
        let values = df.column("EBITDA").unwrap().f64().unwrap();
        assert_relative_eq!(values.get(1).unwrap(), 30.0);
    }

    #[test]
    fn test_from_start_year() {
        let df = from_start_year(cumulative(), Some(2011)).unwrap();
        assert_eq!(df.height(), 0);
        let df = from_start_year(cumulative(), None).unwrap();
        assert_eq!(df.height(), 6);
    }

    #[test]
    fn test_industry_panel_forward_fills_changes() {
        let changes = DataFrame::new(vec![
            Series::new("stock".into(), [1i64, 1, 2]).into(),
            Series::new("industry_code".into(), [66i64, 70, 13]).into(),
            Series::new("industry_name".into(), ["a", "b", "c"]).into(),
            Series::new("implement_date".into(), ["2010-02-15", "2010-08-01", "2010/12/31"]).into(),
        ])
        .unwrap();

        let last = Period::new(2011, 1).unwrap();
        let panel = industry_panel(&changes, last).unwrap();

        // Stock 1: 2010Q1..2011Q1, stock 2: 2010Q4..2011Q1.
        assert_eq!(panel.height(), 5 + 2);
        let codes: Vec<Option<i64>> = panel
            .column("industry_code")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            codes,
            vec![Some(66), Some(66), Some(70), Some(70), Some(70), Some(13), Some(13)]
        );
    }

    #[test]
    fn test_eligibility_frames() {
        let market = DataFrame::new(vec![
            Series::new("stock".into(), [1i64, 2, 2]).into(),
            Series::new("market_type".into(), [Some(1i64), Some(3), Some(4)]).into(),
        ])
        .unwrap();
        let listing = DataFrame::new(vec![
            Series::new("stock".into(), [1i64]).into(),
            Series::new("listing_date".into(), ["2009-05-20"]).into(),
        ])
        .unwrap();
        let disclosure = DataFrame::new(vec![
            Series::new("stock".into(), [1i64]).into(),
            Series::new("year".into(), [2010i64]).into(),
            Series::new("quarter".into(), [1i64]).into(),
            Series::new("annotation_date".into(), ["2010/4/28"]).into(),
        ])
        .unwrap();

        let eligibility = Eligibility::new()
            .with_market_types(&market)
            .unwrap()
            .with_listings(&listing)
            .unwrap()
            .with_annotations(&disclosure)
            .unwrap();

        // The later record of stock 2 wins.
        let market = eligibility.market_types();
        assert_eq!(market.height(), 2);
        let types: Vec<Option<i64>> = market.column("market_type").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(types, vec![Some(1), Some(4)]);

        let listings = eligibility.listings();
        assert_eq!(
            listings.column("listing_period").unwrap().i64().unwrap().get(0),
            Some(Period::new(2009, 2).unwrap().index())
        );

        let annotations = eligibility.annotations();
        assert_eq!(annotations.height(), 1);
        assert_eq!(
            annotations.column("annotation_date").unwrap().str().unwrap().get(0),
            Some("2010-04-28")
        );
    }

    #[test]
    fn test_empty_eligibility_has_typed_frames() {
        let eligibility = Eligibility::default();
        assert_eq!(eligibility.market_types().height(), 0);
        assert_eq!(eligibility.listings().width(), 2);
        assert_eq!(
            eligibility.annotations().column("annotation_date").unwrap().dtype(),
            &DataType::String
        );
    }
}

//! Rolling windows of consecutive quarters over the panel.

use crate::error::Result;
use leadlag_data::{KEY_COLUMNS, PanelStore, Period};
use polars::prelude::*;
use std::collections::HashSet;
use std::fmt;

/// `W` consecutive quarters of panel rows, labelled by the last quarter.
#[derive(Debug, Clone)]
pub struct Window {
    anchor: Period,
    periods: Vec<Period>,
    frame: DataFrame,
}

impl Window {
    /// Create a window. `periods` must be non-empty and increasing.
    pub fn new(periods: Vec<Period>, frame: DataFrame) -> Option<Self> {
        let anchor = *periods.last()?;
        Some(Self {
            anchor,
            periods,
            frame,
        })
    }

    /// Last quarter of the window, which labels its output.
    pub const fn anchor(&self) -> Period {
        self.anchor
    }

    /// Quarters covered by the window.
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Panel rows inside the window.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Same quarters with a replaced row set.
    pub fn with_frame(self, frame: DataFrame) -> Self {
        Self { frame, ..self }
    }

    /// Observation, stock and industry counts.
    pub fn summary(&self) -> Result<WindowSummary> {
        summarize(self.anchor, &self.frame)
    }

    /// Split into one narrowed table per measure.
    pub fn split<S: AsRef<str>>(&self, measures: &[S]) -> Result<CashflowWindow> {
        let tables = measures
            .iter()
            .map(|m| {
                let m = m.as_ref();
                let mut columns: Vec<&str> = KEY_COLUMNS.to_vec();
                columns.push("industry_code");
                columns.push(m);
                Ok((m.to_string(), self.frame.select(columns)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CashflowWindow {
            anchor: self.anchor,
            periods: self.periods.clone(),
            tables,
        })
    }
}

/// Per-measure tables `(stock, year, quarter, industry_code, <measure>)` of one window.
///
/// The tables are owned and independent of the window they came from.
#[derive(Debug, Clone)]
pub struct CashflowWindow {
    anchor: Period,
    periods: Vec<Period>,
    tables: Vec<(String, DataFrame)>,
}

impl CashflowWindow {
    /// Anchor quarter.
    pub const fn anchor(&self) -> Period {
        self.anchor
    }

    /// Quarters covered by the window.
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Measure tables in configuration order.
    pub fn tables(&self) -> &[(String, DataFrame)] {
        &self.tables
    }

    /// Table of one measure.
    pub fn get(&self, measure: &str) -> Option<&DataFrame> {
        self.tables
            .iter()
            .find(|(name, _)| name == measure)
            .map(|(_, df)| df)
    }

    /// Replace every measure table through `f`.
    pub fn try_map<F>(self, mut f: F) -> Result<Self>
    where
        F: FnMut(&str, DataFrame) -> Result<DataFrame>,
    {
        let tables = self
            .tables
            .into_iter()
            .map(|(name, df)| {
                let df = f(&name, df)?;
                Ok((name, df))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tables, ..self })
    }

    /// Counts per measure table.
    pub fn summaries(&self) -> Result<Vec<(String, WindowSummary)>> {
        self.tables
            .iter()
            .map(|(name, df)| Ok((name.clone(), summarize(self.anchor, df)?)))
            .collect()
    }
}

/// Size of a window's row set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSummary {
    /// Anchor quarter
    pub anchor: Period,
    /// Rows
    pub observations: usize,
    /// Distinct stocks
    pub stocks: usize,
    /// Distinct non-null industry codes
    pub industries: usize,
}

impl fmt::Display for WindowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} observations, {} stocks, {} industries",
            self.anchor, self.observations, self.stocks, self.industries
        )
    }
}

fn summarize(anchor: Period, df: &DataFrame) -> Result<WindowSummary> {
    let stocks: HashSet<i64> = df.column("stock")?.i64()?.into_iter().flatten().collect();
    let industries: HashSet<i64> = df
        .column("industry_code")?
        .i64()?
        .into_iter()
        .flatten()
        .collect();
    Ok(WindowSummary {
        anchor,
        observations: df.height(),
        stocks: stocks.len(),
        industries: industries.len(),
    })
}

/// Lazy sequence of windows over a panel, in increasing anchor order.
///
/// Each step advances a frame of `length` consecutive distinct quarters by one
/// quarter and yields a zero-copy slice of the panel rows inside it.
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    panel: &'a PanelStore,
    length: usize,
    start: usize,
}

impl<'a> Windows<'a> {
    /// Windows of `length` quarters. Empty when the panel has fewer quarters.
    pub const fn new(panel: &'a PanelStore, length: usize) -> Self {
        Self {
            panel,
            length,
            start: 0,
        }
    }

    /// Window length in quarters.
    pub const fn length(&self) -> usize {
        self.length
    }

    fn remaining(&self) -> usize {
        if self.length == 0 {
            return 0;
        }
        let total = self.panel.periods().len();
        (total + 1).saturating_sub(self.start + self.length)
    }
}

impl Iterator for Windows<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining() == 0 {
            return None;
        }
        let range = self.start..self.start + self.length;
        let periods = self.panel.periods()[range.clone()].to_vec();
        let frame = self.panel.slice(range);
        self.start += 1;
        Window::new(periods, frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Windows<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two stocks in two industries over `quarters` quarters from 2010Q1.
    fn panel(quarters: i64) -> PanelStore {
        let mut stock = Vec::new();
        let mut year = Vec::new();
        let mut quarter = Vec::new();
        let mut value = Vec::new();
        let mut code = Vec::new();
        for i in 0..quarters {
            let p = Period::new(2010, 1).unwrap().shift(i);
            for s in [1i64, 2] {
                stock.push(s);
                year.push(i64::from(p.year()));
                quarter.push(i64::from(p.quarter()));
                value.push(i as f64 * s as f64);
                code.push(s * 10);
            }
        }
        let cashflow = DataFrame::new(vec![
            Series::new("stock".into(), stock.clone()).into(),
            Series::new("year".into(), year.clone()).into(),
            Series::new("quarter".into(), quarter.clone()).into(),
            Series::new("EBITDA".into(), value).into(),
        ])
        .unwrap();
        let industry = DataFrame::new(vec![
            Series::new("stock".into(), stock).into(),
            Series::new("year".into(), year).into(),
            Series::new("quarter".into(), quarter).into(),
            Series::new("industry_code".into(), code).into(),
        ])
        .unwrap();
        PanelStore::new(&cashflow, &industry, &["EBITDA"]).unwrap()
    }

    #[test]
    fn test_every_window_has_full_length() {
        let panel = panel(8);
        let windows = Windows::new(&panel, 5);
        assert_eq!(windows.len(), 4);

        let anchors: Vec<Period> = windows
            .map(|w| {
                assert_eq!(w.periods().len(), 5);
                assert_eq!(w.frame().height(), 10);
                w.anchor()
            })
            .collect();

        let first = Period::new(2010, 1).unwrap();
        assert_eq!(anchors, (4..8).map(|i| first.shift(i)).collect::<Vec<_>>());
    }

    #[test]
    fn test_too_few_periods_is_empty() {
        let panel = panel(4);
        assert_eq!(Windows::new(&panel, 5).count(), 0);
        assert_eq!(Windows::new(&panel, 0).count(), 0);
    }

    #[test]
    fn test_summary_and_split() {
        let panel = panel(6);
        let window = Windows::new(&panel, 5).next().unwrap();

        let summary = window.summary().unwrap();
        assert_eq!(summary.observations, 10);
        assert_eq!(summary.stocks, 2);
        assert_eq!(summary.industries, 2);
        assert_eq!(
            summary.to_string(),
            "2011Q1: 10 observations, 2 stocks, 2 industries"
        );

        let cashflow = window.split(&["EBITDA"]).unwrap();
        drop(window);
        let table = cashflow.get("EBITDA").unwrap();
        assert_eq!(table.width(), 5);
        assert!(cashflow.get("EBIT").is_none());
    }
}

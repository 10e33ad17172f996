//! Fiscal quarter arithmetic.
//!
//! A [`Period`] is a `(year, quarter)` pair ordered by calendar time. Each period
//! maps onto a dense quarter index (`year * 4 + quarter - 1`), which makes
//! shifting by `k` quarters an integer addition and trivially reversible.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A fiscal quarter.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("{year}Q{quarter}")]
pub struct Period {
    year: i32,
    quarter: u8,
}

impl Period {
    /// Create a period, validating the quarter.
    pub fn new(year: i64, quarter: i64) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(DataError::InvalidPeriod { year, quarter });
        }
        let year = i32::try_from(year).map_err(|_| DataError::InvalidPeriod { year, quarter })?;
        Ok(Self {
            year,
            quarter: quarter as u8,
        })
    }

    /// Rebuild a period from its dense quarter index.
    pub const fn from_index(index: i64) -> Self {
        Self {
            year: index.div_euclid(4) as i32,
            quarter: (index.rem_euclid(4) + 1) as u8,
        }
    }

    /// Dense quarter index, `year * 4 + quarter - 1`.
    pub const fn index(&self) -> i64 {
        self.year as i64 * 4 + self.quarter as i64 - 1
    }

    /// Calendar year.
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Quarter within the year, 1..=4.
    pub const fn quarter(&self) -> u8 {
        self.quarter
    }

    /// Move `k` quarters forward (negative `k` moves backward).
    pub const fn shift(&self, k: i64) -> Self {
        Self::from_index(self.index() + k)
    }

    /// Period containing a calendar date.
    pub fn containing(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            year: date.year(),
            quarter: (date.month0() / 3 + 1) as u8,
        }
    }

    /// Last calendar day of the quarter.
    pub fn end_date(&self) -> NaiveDate {
        let (month, day) = match self.quarter {
            1 => (3, 31),
            2 => (6, 30),
            3 => (9, 30),
            _ => (12, 31),
        };
        NaiveDate::from_ymd_opt(self.year, month, day).unwrap_or(NaiveDate::MAX)
    }
}

impl FromStr for Period {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (year, quarter) = s
            .split_once(['Q', 'q'])
            .ok_or_else(|| DataError::Parse(format!("Invalid period: {}", s)))?;
        let year: i64 = year
            .trim_end_matches('-')
            .parse()
            .map_err(|_| DataError::Parse(format!("Invalid period year: {}", s)))?;
        let quarter: i64 = quarter
            .parse()
            .map_err(|_| DataError::Parse(format!("Invalid period quarter: {}", s)))?;
        Self::new(year, quarter)
    }
}

/// Parse a calendar date in `YYYY-MM-DD` or `YYYY/MM/DD` form, ignoring any time suffix.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let date = s.trim().split([' ', 'T']).next().unwrap_or_default();
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
        .ok_or_else(|| DataError::Parse(format!("Invalid date: {}", s)))
}

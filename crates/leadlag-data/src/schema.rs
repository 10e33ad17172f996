//! Typed schema descriptors for positional input files.
//!
//! Source files carry their columns in a fixed order but with unreliable
//! headers. A [`TableSchema`] names and types every column by position; reading
//! a file through a schema fails fast when the column count differs.

use crate::error::{DataError, Result};
use polars::prelude::*;
use std::path::Path;

/// Logical type of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// 64-bit integer identifiers and calendar components
    Int,
    /// 64-bit float measures
    Float,
    /// Free text, including dates parsed downstream
    Text,
}

impl ColumnKind {
    /// Polars data type the column is cast to.
    pub fn dtype(&self) -> DataType {
        match self {
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Text => DataType::String,
        }
    }
}

/// A named, typed column at a fixed position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name after loading
    pub name: String,
    /// Column type after loading
    pub kind: ColumnKind,
}

impl ColumnSpec {
    /// Integer column.
    pub fn int(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Int,
        }
    }

    /// Float column.
    pub fn float(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Float,
        }
    }

    /// Text column.
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Text,
        }
    }
}

/// Ordered column layout of an input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Create a schema from its columns in file order.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Cash-flow statements: `stock, year, quarter` followed by one float column per measure.
    pub fn cashflow<S: AsRef<str>>(measures: &[S]) -> Self {
        let mut columns = vec![
            ColumnSpec::int("stock"),
            ColumnSpec::int("year"),
            ColumnSpec::int("quarter"),
        ];
        columns.extend(measures.iter().map(|m| ColumnSpec::float(m.as_ref())));
        Self::new("cashflow", columns)
    }

    /// Industry classification change records.
    pub fn industry() -> Self {
        Self::new(
            "industry",
            vec![
                ColumnSpec::int("stock"),
                ColumnSpec::int("industry_code"),
                ColumnSpec::text("industry_name"),
                ColumnSpec::text("implement_date"),
            ],
        )
    }

    /// Market segment code per stock.
    pub fn market_type() -> Self {
        Self::new(
            "market_type",
            vec![ColumnSpec::int("stock"), ColumnSpec::int("market_type")],
        )
    }

    /// Listing date per stock.
    pub fn listing() -> Self {
        Self::new(
            "listing",
            vec![ColumnSpec::int("stock"), ColumnSpec::text("listing_date")],
        )
    }

    /// Public annotation date of each quarterly statement.
    pub fn disclosure() -> Self {
        Self::new(
            "disclosure",
            vec![
                ColumnSpec::int("stock"),
                ColumnSpec::int("year"),
                ColumnSpec::int("quarter"),
                ColumnSpec::text("annotation_date"),
            ],
        )
    }

    /// Quarterly GDP.
    pub fn gdp() -> Self {
        Self::new(
            "gdp",
            vec![
                ColumnSpec::int("year"),
                ColumnSpec::int("quarter"),
                ColumnSpec::float("GDP"),
            ],
        )
    }

    /// Quarterly price index, already scaled to a fraction.
    pub fn inflation() -> Self {
        Self::new(
            "inflation",
            vec![
                ColumnSpec::int("year"),
                ColumnSpec::int("quarter"),
                ColumnSpec::float("inflation"),
            ],
        )
    }

    /// Schema name, used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in file order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Column names in file order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Rename and cast a raw frame positionally.
    pub fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        if df.width() != self.columns.len() {
            return Err(DataError::ColumnCount {
                table: self.name.clone(),
                expected: self.columns.len(),
                actual: df.width(),
            });
        }

        let exprs: Vec<Expr> = df
            .get_column_names()
            .into_iter()
            .zip(&self.columns)
            .map(|(raw, spec)| {
                col(raw.as_str())
                    .cast(spec.kind.dtype())
                    .alias(spec.name.as_str())
            })
            .collect();

        Ok(df.lazy().select(exprs).collect()?)
    }

    /// Read a headered CSV file through this schema.
    pub fn read_csv(&self, path: &Path) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        self.apply(df)
    }
}

/// Fail with [`DataError::MissingColumn`] unless every column is present.
pub fn require_columns(table: &str, df: &DataFrame, columns: &[&str]) -> Result<()> {
    let present = df.get_column_names();
    for column in columns {
        if !present.iter().any(|name| name.as_str() == *column) {
            return Err(DataError::MissingColumn {
                table: table.to_string(),
                column: (*column).to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_renames_positionally() {
        let df = DataFrame::new(vec![
            Series::new("Stkcd".into(), [1i64, 2]).into(),
            Series::new("Accper".into(), [2010i64, 2010]).into(),
            Series::new("Q".into(), [1i64, 2]).into(),
            Series::new("EBITDA value".into(), [1.5f64, 2.5]).into(),
        ])
        .unwrap();

        let schema = TableSchema::cashflow(&["EBITDA"]);
        let df = schema.apply(df).unwrap();

        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["stock", "year", "quarter", "EBITDA"]);
        assert_eq!(df.column("EBITDA").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_apply_casts_integers_to_float() {
        let df = DataFrame::new(vec![
            Series::new("a".into(), [2010i64]).into(),
            Series::new("b".into(), [1i64]).into(),
            Series::new("c".into(), [100i64]).into(),
        ])
        .unwrap();

        let df = TableSchema::gdp().apply(df).unwrap();
        let gdp = df.column("GDP").unwrap().f64().unwrap();
        assert_eq!(gdp.get(0), Some(100.0));
    }

    #[test]
    fn test_column_count_mismatch() {
        let df = DataFrame::new(vec![
            Series::new("a".into(), [1i64]).into(),
            Series::new("b".into(), [1i64]).into(),
        ])
        .unwrap();

        let err = TableSchema::gdp().apply(df).unwrap_err();
        assert!(matches!(
            err,
            DataError::ColumnCount {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_require_columns() {
        let df = DataFrame::new(vec![Series::new("stock".into(), [1i64]).into()]).unwrap();
        assert!(require_columns("t", &df, &["stock"]).is_ok());
        assert!(matches!(
            require_columns("t", &df, &["stock", "year"]),
            Err(DataError::MissingColumn { .. })
        ));
    }
}

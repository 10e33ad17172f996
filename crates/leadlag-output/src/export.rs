//! Export of factor tables and summaries.
//!
//! Factor tables are flattened into long `(period, industry_code, factor,
//! value)` records for CSV and JSON export; summaries export one record per
//! factor column.

use crate::summary::FactorSummary;
use leadlag_factors::LeadLagMeasure;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Format for a file extension.
    pub fn from_extension(extension: &str) -> Result<Self, ExportError> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// One factor value of one industry at one period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorRecord {
    /// Anchor period, e.g. `2012Q1`.
    pub period: String,

    /// Industry classification code.
    pub industry_code: i64,

    /// Factor column, e.g. `LL_max(EBITDA)`.
    pub factor: String,

    /// Factor value.
    pub value: f64,
}

/// Flatten the lead-lag columns of a factor table. Null values are skipped.
pub fn factor_records(table: &DataFrame) -> Result<Vec<FactorRecord>, ExportError> {
    let periods = table.column("period")?.str()?;
    let codes = table.column("industry_code")?.i64()?;

    let mut records = Vec::new();
    for column in table.get_column_names() {
        if LeadLagMeasure::parse_column(column.as_str()).is_none() {
            continue;
        }
        let values = table.column(column.as_str())?.f64()?;
        for ((period, code), value) in periods.into_iter().zip(codes).zip(values) {
            if let (Some(period), Some(industry_code), Some(value)) = (period, code, value) {
                records.push(FactorRecord {
                    period: period.to_string(),
                    industry_code,
                    factor: column.to_string(),
                    value,
                });
            }
        }
    }
    Ok(records)
}

/// Flattened factor statistic for CSV export.
#[derive(Debug, Serialize, Deserialize)]
struct StatisticFlat {
    factor: String,
    periods: usize,
    mean: Option<f64>,
    std_error: Option<f64>,
    t_value: Option<f64>,
    p_value: Option<f64>,
    lags: Option<usize>,
}

impl FactorSummary {
    fn to_flat_records(&self) -> Vec<StatisticFlat> {
        self.statistics
            .iter()
            .map(|s| StatisticFlat {
                factor: s.column.clone(),
                periods: s.periods,
                mean: s.test.map(|t| t.mean),
                std_error: s.test.map(|t| t.std_error),
                t_value: s.test.map(|t| t.t_value),
                p_value: s.test.map(|t| t.p_value),
                lags: s.test.map(|t| t.lags),
            })
            .collect()
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn csv_string<T: Serialize>(records: impl IntoIterator<Item = T>) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

impl Exporter for Vec<FactorRecord> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(self),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for FactorSummary {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(self.to_flat_records()),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataFrame {
        DataFrame::new(vec![
            Series::new("period".into(), ["2012Q1", "2012Q1", "2012Q2"]).into(),
            Series::new("industry_code".into(), [1i64, 2, 1]).into(),
            Series::new("LL_max(EBITDA)".into(), [Some(1.0), None, Some(-2.0)]).into(),
            Series::new("LL_average(EBITDA)".into(), [0.25, 0.5, -0.75]).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_factor_records_skip_nulls() {
        let records = factor_records(&table()).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(
            records[0],
            FactorRecord {
                period: "2012Q1".to_string(),
                industry_code: 1,
                factor: "LL_max(EBITDA)".to_string(),
                value: 1.0,
            }
        );
        assert!(records.iter().all(|r| r.factor != "industry_code"));
    }

    #[test]
    fn test_records_export_csv() {
        let csv = factor_records(&table())
            .unwrap()
            .export_to_string(ExportFormat::Csv)
            .unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("period,industry_code,factor,value"));
        assert!(csv.contains("2012Q2,1,LL_max(EBITDA),-2.0"));
    }

    #[test]
    fn test_records_export_json() {
        let json = factor_records(&table())
            .unwrap()
            .export_to_string(ExportFormat::Json)
            .unwrap();
        assert!(json.contains("\"LL_average(EBITDA)\""));
        let parsed: Vec<FactorRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 5);
    }

    #[test]
    fn test_summary_export_csv() {
        let summary = FactorSummary::from_table("test", &table()).unwrap();
        let csv = summary.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.starts_with("factor,periods,mean,std_error,t_value,p_value,lags"));
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_extension("CSV").unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_extension("json").unwrap().extension(), "json");
        assert!(ExportFormat::from_extension("xml").is_err());
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factor.csv");
        factor_records(&table())
            .unwrap()
            .export_to_file(&path, ExportFormat::Csv)
            .unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("LL_max(EBITDA)"));
    }
}

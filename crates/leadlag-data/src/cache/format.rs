//! On-disk table formats for cache artifacts.

use crate::error::{DataError, Result};
use calamine::{Data, Reader, open_workbook_auto};
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::path::Path;

/// File format of a persisted table, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// Excel workbook, first worksheet, header row.
    Xlsx,
}

impl TableFormat {
    /// Determine the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => Ok(Self::Xlsx),
            _ => Err(DataError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// File extension for this format.
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    /// Load a table.
    pub fn read(&self, path: &Path) -> Result<DataFrame> {
        match self {
            Self::Csv => read_csv(path),
            Self::Xlsx => read_xlsx(path),
        }
    }

    /// Persist a table, overwriting any existing file.
    pub fn write(&self, df: &DataFrame, path: &Path) -> Result<()> {
        match self {
            Self::Csv => write_csv(df, path),
            Self::Xlsx => write_xlsx(df, path),
        }
    }
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    Ok(CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?)
}

fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    let mut df = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    Ok(())
}

fn write_xlsx(df: &DataFrame, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (j, column) in df.get_columns().iter().enumerate() {
        let col_idx = u16::try_from(j)
            .map_err(|_| DataError::Cache(format!("Too many columns for xlsx: {}", j)))?;
        worksheet.write_string(0, col_idx, column.name().as_str())?;

        if is_numeric(column.dtype()) {
            let values = column.cast(&DataType::Float64)?;
            for (i, value) in values.f64()?.into_iter().enumerate() {
                if let Some(v) = value {
                    worksheet.write_number(i as u32 + 1, col_idx, v)?;
                }
            }
        } else {
            let values = column.cast(&DataType::String)?;
            for (i, value) in values.str()?.into_iter().enumerate() {
                if let Some(v) = value {
                    worksheet.write_string(i as u32 + 1, col_idx, v)?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn read_xlsx(path: &Path) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DataError::Cache(format!("No worksheet in {}", path.display())))??;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let names: Vec<String> = header.iter().map(|cell| cell.to_string()).collect();
    let body: Vec<&[Data]> = rows.collect();

    let columns = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let cells: Vec<Option<&Data>> = body
                .iter()
                .map(|row| row.get(j).filter(|cell| !matches!(cell, Data::Empty)))
                .collect();
            cells_to_column(name, &cells)
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Numeric columns become `Int64` when every value is integral, `Float64` otherwise.
fn cells_to_column(name: &str, cells: &[Option<&Data>]) -> Column {
    let numbers: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(Data::Int(v)) => Some(Some(*v as f64)),
            Some(Data::Float(v)) => Some(Some(*v)),
            Some(_) => None,
        })
        .collect();

    match numbers {
        Some(values) if values.iter().flatten().all(|v| v.fract() == 0.0) => {
            let ints: Vec<Option<i64>> = values.iter().map(|v| v.map(|x| x as i64)).collect();
            Series::new(name.into(), ints).into()
        }
        Some(values) => Series::new(name.into(), values).into(),
        None => {
            let strings: Vec<Option<String>> = cells
                .iter()
                .map(|cell| cell.map(|c| c.to_string()))
                .collect();
            Series::new(name.into(), strings).into()
        }
    }
}

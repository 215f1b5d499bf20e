//! Zero-coupon inflation swap quotes exported from Bloomberg.
//!
//! The export holds a `Dates` column and one column per ticker
//! (`USSWIT2 BGN Curncy`, ...) quoted in percent. It comes as a workbook
//! (sheet `Data`, five rows of preamble), parquet or CSV. Terminal access is
//! outside the pipeline; the file is dropped into the manual data directory.

use crate::{
    ArbError, Result, Settings,
    frame::{DATE_CANDIDATES, date_column, normalize_date_column, parse_day, rename_columns},
    io::{find_input, read_parquet},
    tenor::SWAP_TICKERS,
};
use calamine::{Data, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{info, warn};

/// Base name of the swap export, without extension.
pub const SWAPS_STEM: &str = "treasury_inflation_swaps";

/// Worksheet of the workbook export holding the quotes.
pub const WORKBOOK_SHEET: &str = "Data";

/// Rows above the header row in the workbook export.
pub const WORKBOOK_SKIP_ROWS: usize = 5;

/// Spreadsheet column letters used as headers by the workbook export.
const WORKBOOK_COLUMNS: [(&str, &str); 5] = [
    ("H", "inf_swap_2y"),
    ("K", "inf_swap_5y"),
    ("L", "inf_swap_10y"),
    ("M", "inf_swap_20y"),
    ("N", "inf_swap_30y"),
];

fn build_frame(
    headers: &[String],
    dates: Vec<Option<NaiveDate>>,
    values: Vec<Vec<Option<f64>>>,
    date_idx: usize,
) -> Result<DataFrame> {
    let mut columns = vec![date_column(dates)?];
    for (i, (name, column)) in headers.iter().zip(values).enumerate() {
        if i != date_idx && !name.is_empty() {
            columns.push(Column::new(name.as_str().into(), column));
        }
    }
    standardize_swaps(DataFrame::new(columns)?)
}

fn date_index(headers: &[String]) -> Result<usize> {
    headers
        .iter()
        .position(|h| DATE_CANDIDATES.contains(&h.as_str()))
        .ok_or_else(|| ArbError::MissingColumn("Dates".into()))
}

/// Parse the CSV export into `date` plus `inf_swap_*` decimals.
pub fn parse_swaps_csv(bytes: &[u8]) -> Result<DataFrame> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let date_idx = date_index(&headers)?;

    let mut dates = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        dates.push(record.get(date_idx).and_then(parse_day));
        for (i, column) in values.iter_mut().enumerate() {
            column.push(record.get(i).and_then(|v| v.trim().parse::<f64>().ok()));
        }
    }
    build_frame(&headers, dates, values, date_idx)
}

/// Excel serial day number to a calendar date (1900 date system).
fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30).map(|base| base + Duration::days(serial.trunc() as i64))
}

fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => dt.as_datetime().map(|d| d.date()),
        Data::Float(f) => excel_serial_date(*f),
        Data::Int(i) => excel_serial_date(*i as f64),
        Data::String(s) | Data::DateTimeIso(s) => parse_day(s),
        _ => None,
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse the workbook export: sheet `Data`, header on the sixth row.
pub fn parse_swaps_workbook(bytes: &[u8]) -> Result<DataFrame> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| ArbError::Parse(format!("swap workbook: {e}")))?;
    let range = workbook
        .worksheet_range(WORKBOOK_SHEET)
        .map_err(|e| ArbError::Parse(format!("swap workbook sheet {WORKBOOK_SHEET}: {e}")))?;

    // the range starts at the first used cell, not at A1
    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut rows = range.rows().skip(WORKBOOK_SKIP_ROWS.saturating_sub(first_row));

    let header = rows
        .next()
        .ok_or_else(|| ArbError::Parse("swap workbook has no header row".into()))?;
    let headers: Vec<String> = header.iter().map(|c| c.to_string().trim().to_string()).collect();
    let date_idx = date_index(&headers)?;

    let mut dates = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];
    for row in rows {
        dates.push(row.get(date_idx).and_then(cell_date));
        for (i, column) in values.iter_mut().enumerate() {
            column.push(row.get(i).and_then(cell_number));
        }
    }
    build_frame(&headers, dates, values, date_idx)
}

/// Rename tickers, convert percent to decimal and keep only swap columns.
pub fn standardize_swaps(df: DataFrame) -> Result<DataFrame> {
    let df = normalize_date_column(df)?;
    let renames: Vec<(&str, &str)> = SWAP_TICKERS
        .iter()
        .chain(WORKBOOK_COLUMNS.iter())
        .filter(|(source, name)| {
            df.get_column_index(source).is_some() && df.get_column_index(name).is_none()
        })
        .copied()
        .collect();
    let df = rename_columns(&df, &renames)?;

    let swap_cols: Vec<&str> = SWAP_TICKERS
        .iter()
        .map(|(_, name)| *name)
        .filter(|name| df.get_column_index(name).is_some())
        .collect();
    if swap_cols.is_empty() {
        warn!("inflation swap data has no recognised tenor columns");
    }

    let mut exprs = vec![col("date")];
    exprs.extend(
        swap_cols
            .iter()
            .map(|name| (col(*name).cast(DataType::Float64) / lit(100.0)).alias(*name)),
    );

    let result = df
        .lazy()
        .select(exprs)
        .sort(["date"], SortMultipleOptions::default())
        .collect()?;
    Ok(result)
}

/// Load the swap export from the manual-data, data or output directory.
///
/// Formats are tried in order: workbook, parquet, CSV.
pub fn load_swaps(settings: &Settings) -> Result<DataFrame> {
    let dirs: [&Path; 3] = [&settings.manual_data_dir, &settings.data_dir, &settings.output_dir];

    if let Ok(path) = find_input(&format!("{SWAPS_STEM}.xlsx"), &dirs) {
        info!(path = %path.display(), "loading inflation swaps");
        return parse_swaps_workbook(&std::fs::read(&path)?);
    }
    if let Ok(path) = find_input(&format!("{SWAPS_STEM}.parquet"), &dirs) {
        info!(path = %path.display(), "loading inflation swaps");
        return standardize_swaps(read_parquet(&path)?);
    }
    let path = find_input(&format!("{SWAPS_STEM}.csv"), &dirs)?;
    info!(path = %path.display(), "loading inflation swaps");
    parse_swaps_csv(&std::fs::read(&path)?)
}

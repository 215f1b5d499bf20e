//! DataFrame helpers shared by the sources and measures.
//!
//! Inputs arrive from several writers (the Fed CSV, pandas-written parquet
//! files with the date in the index, Bloomberg exports), so every frame is
//! first brought to a common shape: a `date` column of type `Date` followed by
//! the data columns.

use crate::{ArbError, Result};
use chrono::NaiveDate;
use polars::prelude::*;

/// Column names that may hold the observation date, in lookup order.
pub const DATE_CANDIDATES: [&str; 5] = ["date", "Date", "Dates", "index", "__index_level_0__"];

/// Parse a calendar date in any of the layouts found in the inputs.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    // "2024-01-02 00:00:00", "2024-01-02T00:00:00"
    raw.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// Days since the Unix epoch, the physical representation of a polars `Date`.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    date.signed_duration_since(NaiveDate::default()).num_days() as i32
}

/// Inverse of [`days_since_epoch`].
pub fn date_from_days(days: i32) -> NaiveDate {
    NaiveDate::default() + chrono::Duration::days(i64::from(days))
}

/// Build a `date` column from parsed calendar dates.
pub fn date_column(dates: Vec<Option<NaiveDate>>) -> Result<Column> {
    let days: Vec<Option<i32>> = dates.into_iter().map(|d| d.map(days_since_epoch)).collect();
    Ok(Column::new("date".into(), days).cast(&DataType::Date)?)
}

/// Bring the date column to the front as `date: Date` and drop undated rows.
pub fn normalize_date_column(df: DataFrame) -> Result<DataFrame> {
    let name = DATE_CANDIDATES
        .iter()
        .find(|c| df.get_column_index(c).is_some())
        .ok_or_else(|| ArbError::MissingColumn("date".into()))?;

    let source = df.column(name)?;
    let dates = match source.dtype() {
        DataType::Date => source.clone(),
        DataType::Datetime(_, _) => source.cast(&DataType::Date)?,
        DataType::String => {
            let parsed = source.str()?.into_iter().map(|v| v.and_then(parse_day)).collect();
            date_column(parsed)?
        }
        other => {
            return Err(ArbError::Parse(format!(
                "column {name} has type {other}, expected a date"
            )));
        }
    }
    .with_name("date".into());

    let mut columns = Vec::with_capacity(df.width());
    columns.push(dates);
    columns.extend(
        df.get_columns()
            .iter()
            .filter(|c| c.name().as_str() != *name)
            .cloned(),
    );

    let result = DataFrame::new(columns)?
        .lazy()
        .filter(col("date").is_not_null())
        .collect()?;
    Ok(result)
}

/// Rename columns by rebuilding the frame, so lazy queries on the result
/// resolve the new names.
pub fn rename_columns(df: &DataFrame, renames: &[(&str, &str)]) -> Result<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(|c| match renames.iter().find(|(old, _)| *old == c.name().as_str()) {
            Some((_, new)) => c.clone().with_name((*new).into()),
            None => c.clone(),
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Rename the first alias present in `df` to `target`.
///
/// Returns whether any alias was found.
pub fn rename_first_present(df: &mut DataFrame, aliases: &[String], target: &str) -> Result<bool> {
    let Some(alias) = aliases.iter().find(|a| df.get_column_index(a).is_some()) else {
        return Ok(false);
    };
    if alias != target {
        *df = rename_columns(df, &[(alias.as_str(), target)])?;
    }
    Ok(true)
}

/// Fail with [`ArbError::MissingColumn`] on the first absent column.
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    match columns.iter().find(|c| df.get_column_index(c).is_none()) {
        Some(missing) => Err(ArbError::MissingColumn((*missing).to_string())),
        None => Ok(()),
    }
}

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    /// Column name
    pub name: String,
    /// Non-null observations
    pub count: usize,
    /// Null observations
    pub nulls: usize,
    /// Sample mean
    pub mean: Option<f64>,
    /// Sample standard deviation (ddof = 1)
    pub std: Option<f64>,
    /// Minimum
    pub min: Option<f64>,
    /// Median
    pub median: Option<f64>,
    /// Maximum
    pub max: Option<f64>,
}

/// Compute [`ColumnStats`] for each requested column.
pub fn describe(df: &DataFrame, columns: &[&str]) -> Result<Vec<ColumnStats>> {
    require_columns(df, columns)?;
    columns
        .iter()
        .map(|name| -> Result<ColumnStats> {
            let values = df.column(name)?.cast(&DataType::Float64)?;
            let ca = values.f64()?;
            Ok(ColumnStats {
                name: (*name).to_string(),
                count: ca.len() - ca.null_count(),
                nulls: ca.null_count(),
                mean: ca.mean(),
                std: ca.std(1),
                min: ca.min(),
                median: ca.median(),
                max: ca.max(),
            })
        })
        .collect()
}

//! Kenneth French data library portfolios.
//!
//! Each dataset is a zip archive holding one CSV file. The file starts with a
//! free-text description, followed by blank-line separated tables: a title
//! line, a header row whose first cell is empty, then one row per period keyed
//! by `YYYYMM` (monthly) or `YYYY` (annual). Every table is stored as its own
//! parquet file, `{dataset}_sheet{index}.parquet`.

use crate::{
    ArbError, Result,
    frame::{date_column, parse_day},
    io::write_parquet,
    sources::Fetch,
};
use chrono::NaiveDate;
use polars::prelude::*;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Base URL of the library's CSV archives.
pub const FRENCH_BASE_URL: &str = "https://mba.tuck.dartmouth.edu/pages/faculty/ken.french/ftp";

/// Portfolio datasets pulled by default.
pub const FRENCH_DATASETS: [&str; 3] = ["6_Portfolios_2x3", "25_Portfolios_5x5", "100_Portfolios_10x10"];

/// Sentinels the library uses for missing returns.
const MISSING_SENTINELS: [f64; 2] = [-99.99, -999.0];

/// URL of the zipped CSV for `dataset`.
pub fn dataset_url(dataset: &str) -> String {
    format!("{FRENCH_BASE_URL}/{dataset}_CSV.zip")
}

/// File name of table `index` of `dataset`.
pub fn table_file_name(dataset: &str, index: usize) -> String {
    format!("{}_sheet{index}.parquet", dataset.replace('/', "_"))
}

/// One table of a dataset.
#[derive(Debug, Clone)]
pub struct FrenchTable {
    /// Title line, e.g. `Average Value Weighted Returns -- Monthly`
    pub title: String,
    /// `date` plus one column per portfolio
    pub frame: DataFrame,
}

/// A parsed dataset.
#[derive(Debug, Clone)]
pub struct FrenchDataset {
    /// Free-text description preceding the first table
    pub description: String,
    /// Tables in file order
    pub tables: Vec<FrenchTable>,
}

/// Extract the single CSV member of a library archive.
pub fn extract_csv(archive: &[u8]) -> Result<String> {
    let mut zip = ::zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| ArbError::Parse(format!("French data archive: {e}")))?;
    if zip.is_empty() {
        return Err(ArbError::Parse("French data archive is empty".into()));
    }
    let mut member = zip
        .by_index(0)
        .map_err(|e| ArbError::Parse(format!("French data archive: {e}")))?;
    let mut bytes = Vec::new();
    member.read_to_end(&mut bytes)?;
    // files are Latin-1 in places
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Period key to the first day of the period.
fn period_start(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match raw.len() {
        4 => NaiveDate::from_ymd_opt(raw.parse().ok()?, 1, 1),
        6 => NaiveDate::from_ymd_opt(raw[..4].parse().ok()?, raw[4..].parse().ok()?, 1),
        8 => parse_day(raw),
        _ => None,
    }
}

fn parse_value(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    if MISSING_SENTINELS.iter().any(|s| (value - s).abs() < 1e-9) {
        None
    } else {
        Some(value)
    }
}

/// Parse one blank-line separated block into a table, if it holds one.
fn parse_block(lines: &[&str]) -> Result<Option<FrenchTable>> {
    let text = lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut title = Vec::new();
    let mut header: Option<Vec<String>> = None;
    let mut dates = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = Vec::new();

    for record in reader.records() {
        let record = record?;
        if header.is_none() {
            if record.len() > 1 && record.get(0).is_some_and(str::is_empty) {
                let names: Vec<String> = record.iter().skip(1).map(str::to_string).collect();
                values = vec![Vec::new(); names.len()];
                header = Some(names);
            } else {
                title.push(record.iter().collect::<Vec<_>>().join(","));
            }
            continue;
        }

        let Some(date) = record.get(0).and_then(period_start) else {
            continue;
        };
        dates.push(Some(date));
        for (i, column) in values.iter_mut().enumerate() {
            column.push(record.get(i + 1).and_then(parse_value));
        }
    }

    let Some(names) = header else {
        return Ok(None);
    };
    let mut columns = vec![date_column(dates)?];
    for (name, column) in names.iter().zip(values) {
        columns.push(Column::new(name.as_str().into(), column));
    }
    Ok(Some(FrenchTable {
        title: title.join(" ").trim().to_string(),
        frame: DataFrame::new(columns)?,
    }))
}

/// Split a library CSV into its description and tables.
pub fn parse_french_csv(text: &str) -> Result<FrenchDataset> {
    let mut blocks: Vec<Vec<&str>> = vec![Vec::new()];
    for line in text.lines() {
        if line.trim().is_empty() {
            if blocks.last().is_some_and(|b| !b.is_empty()) {
                blocks.push(Vec::new());
            }
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }

    let mut description = Vec::new();
    let mut tables = Vec::new();
    for block in blocks.iter().filter(|b| !b.is_empty()) {
        match parse_block(block)? {
            Some(table) => tables.push(table),
            None if tables.is_empty() => description.extend(block.iter().map(|l| l.trim())),
            None => debug!(lines = block.len(), "skipping trailing text block"),
        }
    }

    if tables.is_empty() {
        return Err(ArbError::Parse("French data file has no tables".into()));
    }
    Ok(FrenchDataset {
        description: description.join("\n"),
        tables,
    })
}

/// Keep rows dated within `[start, end]`.
fn restrict(df: &DataFrame, start: NaiveDate, end: NaiveDate) -> Result<DataFrame> {
    let start = crate::frame::days_since_epoch(start);
    let end = crate::frame::days_since_epoch(end);
    let days = col("date").cast(DataType::Int32);
    Ok(df
        .clone()
        .lazy()
        .filter(days.clone().gt_eq(lit(start)).and(days.lt_eq(lit(end))))
        .collect()?)
}

/// Download `dataset`, store each table within `[start, end]` under
/// `data_dir`, and return the written paths.
pub fn pull_french(
    fetcher: &dyn Fetch,
    dataset: &str,
    data_dir: &Path,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PathBuf>> {
    let url = dataset_url(dataset);
    info!(dataset, url = %url, "pulling Ken French portfolios");
    let parsed = parse_french_csv(&extract_csv(&fetcher.fetch(&url)?)?)?;

    parsed
        .tables
        .iter()
        .enumerate()
        .map(|(index, table)| {
            let df = restrict(&table.frame, start, end)?;
            let path = data_dir.join(table_file_name(dataset, index));
            write_parquet(&df, &path)?;
            debug!(dataset, index, title = %table.title, rows = df.height(), "saved table");
            Ok(path)
        })
        .collect()
}

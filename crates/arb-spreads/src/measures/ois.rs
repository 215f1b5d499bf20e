//! 3-month OIS rate, the risk-free benchmark for the equity spot-futures basis.

use crate::{
    ArbError, Result, Settings,
    frame::{date_from_days, describe, normalize_date_column},
    io::read_parquet,
    measures::{Measure, MeasureCategory},
};
use polars::prelude::*;
use std::path::PathBuf;
use tracing::{info, warn};

/// Bloomberg ticker of the 3-month USD OIS rate.
pub const OIS_3M_TICKER: &str = "USSOC CMPN Curncy";

/// Bloomberg field holding the closing value.
pub const PX_LAST: &str = "PX_LAST";

/// Bloomberg history export shared by the equity spot inputs.
pub const BLOOMBERG_FILE: &str = "bloomberg_historical_data.parquet";

/// File name of the cleaned series inside the processed directory.
pub const OUTPUT_FILE: &str = "cleaned_ois_rates.csv";

/// Output column name.
pub const OIS_3M: &str = "OIS_3M";

/// Names a (ticker, field) pair can take once a two-level header is flattened.
fn ticker_aliases(ticker: &str, field: &str) -> [String; 4] {
    [
        format!("('{ticker}', '{field}')"),
        format!("{ticker}_{field}"),
        format!("{ticker}|{field}"),
        ticker.to_string(),
    ]
}

/// 3-month OIS rate as a decimal, with missing quotes removed.
///
/// # Required Columns
/// - `date`
/// - `OIS_3M`: rate in percent, as loaded from the Bloomberg export
#[derive(Debug, Clone, Copy, Default)]
pub struct Ois3m;

impl Ois3m {
    /// Resolve the Bloomberg export, preferring the input directory.
    fn input_path(settings: &Settings) -> PathBuf {
        let primary = settings.input_dir.join(BLOOMBERG_FILE);
        if primary.is_file() {
            primary
        } else {
            settings.manual_data_dir.join(BLOOMBERG_FILE)
        }
    }

    /// Pick the OIS column out of a Bloomberg export.
    pub fn select_rate(df: DataFrame) -> Result<LazyFrame> {
        let df = normalize_date_column(df)?;
        let column = ticker_aliases(OIS_3M_TICKER, PX_LAST)
            .into_iter()
            .find(|name| df.get_column_index(name).is_some())
            .ok_or_else(|| ArbError::MissingColumn(format!("{OIS_3M_TICKER} {PX_LAST}")))?;

        Ok(df.lazy().select([
            col("date"),
            col(column).cast(DataType::Float64).alias(OIS_3M),
        ]))
    }
}

fn log_summary(df: &DataFrame) -> Result<()> {
    let (rows, cols) = df.shape();
    info!(rows, cols, "OIS data summary");

    for stats in describe(df, &[OIS_3M])? {
        info!(
            column = %stats.name,
            count = stats.count,
            nulls = stats.nulls,
            mean = ?stats.mean,
            std = ?stats.std,
            min = ?stats.min,
            median = ?stats.median,
            max = ?stats.max,
            "descriptive statistics"
        );
    }

    let head = df.head(Some(5));
    let dates = head.column("date")?.date()?;
    let rates = head.column(OIS_3M)?.f64()?;
    for (day, rate) in dates.into_iter().zip(rates.into_iter()) {
        if let (Some(day), Some(rate)) = (day, rate) {
            info!(date = %date_from_days(day), rate, "head");
        }
    }
    Ok(())
}

impl Measure for Ois3m {
    fn name(&self) -> &str {
        "ois_3m"
    }

    fn description(&self) -> &str {
        "3-month OIS rate (USSOC CMPN Curncy PX_LAST) as a decimal"
    }

    fn category(&self) -> MeasureCategory {
        MeasureCategory::RiskFreeRate
    }

    fn required_columns(&self) -> Vec<String> {
        vec!["date".to_string(), OIS_3M.to_string()]
    }

    fn summary_columns(&self) -> Vec<String> {
        vec![OIS_3M.to_string()]
    }

    fn output_path(&self, settings: &Settings) -> PathBuf {
        settings.processed_dir.join(OUTPUT_FILE)
    }

    fn input_paths(&self, settings: &Settings) -> Vec<PathBuf> {
        vec![Self::input_path(settings)]
    }

    fn load(&self, settings: &Settings) -> Result<LazyFrame> {
        let path = Self::input_path(settings);
        if !settings.input_dir.join(BLOOMBERG_FILE).is_file() {
            warn!(path = %path.display(), "primary Bloomberg export not found, using cached copy");
        }
        if !path.is_file() {
            return Err(ArbError::MissingInput {
                name: BLOOMBERG_FILE.to_string(),
                searched: vec![settings.input_dir.join(BLOOMBERG_FILE), path],
            });
        }
        info!(path = %path.display(), "loading OIS data");
        Self::select_rate(read_parquet(&path)?)
    }

    fn compute(&self, data: &LazyFrame, _workers: usize) -> Result<DataFrame> {
        let result = data
            .clone()
            .select([
                col("date"),
                (col(OIS_3M).cast(DataType::Float64) / lit(100.0)).alias(OIS_3M),
            ])
            .filter(col(OIS_3M).is_finite().fill_null(lit(false)))
            .sort(["date"], SortMultipleOptions::default())
            .collect()?;

        log_summary(&result)?;
        Ok(result)
    }
}

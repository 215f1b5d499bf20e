//! Federal Reserve zero-coupon yield curves.
//!
//! The Board publishes the Gürkaynak, Sack and Wright fitted curves as CSV:
//! a free-text preamble, then a header row starting with `Date`, then one row
//! per business day. Yields are continuously compounded, in percent, and `NA`
//! marks maturities that were not fitted on that day.

use crate::{
    ArbError, Result,
    frame::{date_column, parse_day},
    io::write_parquet,
    sources::Fetch,
};
use derive_more::Display;
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// One of the two published Fed curves.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FedCurve {
    /// Nominal Treasury curve (FEDS 2006-28)
    #[display("nominal")]
    Nominal,
    /// TIPS real curve (FEDS 2008-05)
    #[display("tips")]
    Tips,
}

impl FedCurve {
    /// Both curves.
    pub const ALL: [Self; 2] = [Self::Nominal, Self::Tips];

    /// Download location.
    pub const fn url(self) -> &'static str {
        match self {
            Self::Nominal => "https://www.federalreserve.gov/data/yield-curve-tables/feds200628.csv",
            Self::Tips => "https://www.federalreserve.gov/data/yield-curve-tables/feds200805.csv",
        }
    }

    /// Prefix of the zero-coupon yield columns kept from the file.
    pub const fn column_prefix(self) -> &'static str {
        match self {
            Self::Nominal => "SVENY",
            Self::Tips => "TIPSY",
        }
    }

    /// File name of the stored curve inside the data directory.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Nominal => "fed_yield_curve.parquet",
            Self::Tips => "fed_tips_yield_curve.parquet",
        }
    }
}

/// Parse a Fed curve CSV into `date` plus the curve's yield columns.
pub fn parse_curve_csv(curve: FedCurve, bytes: &[u8]) -> Result<DataFrame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut records = reader.records();

    let header = loop {
        match records.next() {
            Some(record) => {
                let record = record?;
                if record.get(0).map(str::trim) == Some("Date") {
                    break record;
                }
            }
            None => {
                return Err(ArbError::Parse(format!(
                    "{curve} curve: no header row starting with Date"
                )));
            }
        }
    };

    let selected: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .filter(|(_, name)| name.trim().starts_with(curve.column_prefix()))
        .map(|(i, name)| (i, name.trim().to_string()))
        .collect();
    if selected.is_empty() {
        return Err(ArbError::Parse(format!(
            "{curve} curve: no {}* columns in header",
            curve.column_prefix()
        )));
    }

    let mut dates = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); selected.len()];
    for record in records {
        let record = record?;
        let Some(date) = record.get(0).and_then(parse_day) else {
            continue;
        };
        dates.push(Some(date));
        for ((idx, _), column) in selected.iter().zip(values.iter_mut()) {
            column.push(record.get(*idx).and_then(|v| v.trim().parse::<f64>().ok()));
        }
    }

    let mut columns = Vec::with_capacity(selected.len() + 1);
    columns.push(date_column(dates)?);
    for ((_, name), column) in selected.into_iter().zip(values) {
        columns.push(Column::new(name.into(), column));
    }

    let df = DataFrame::new(columns)?
        .lazy()
        .sort(["date"], SortMultipleOptions::default())
        .collect()?;
    Ok(df)
}

/// Download `curve`, store it under `data_dir` and return it.
pub fn pull_curve(fetcher: &dyn Fetch, curve: FedCurve, data_dir: &Path) -> Result<DataFrame> {
    info!(%curve, url = curve.url(), "pulling Fed yield curve");
    let bytes = fetcher.fetch(curve.url())?;
    let df = parse_curve_csv(curve, &bytes)?;

    let path = data_dir.join(curve.file_name());
    write_parquet(&df, &path)?;
    info!(%curve, rows = df.height(), path = %path.display(), "saved yield curve");
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::date_from_days;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    const NOMINAL: &str = "\
Note: Gurkaynak, Sack, and Wright (2007),,,
\"The U.S. Treasury Yield Curve: 1961 to the Present\",,,
,,,
Date,BETA0,SVENY01,SVENY02
1961-06-14,3.9173,2.9825,3.3771
1961-06-15,NA,2.9941,NA
not a date,1,1,1
";

    const TIPS: &str = "\
Series notes
Date,BETA0,TIPSY02,TIPSY05,TIPSY10,TIPSY20
2024-01-03,1.1,1.9,1.7,1.8,1.9
2024-01-02,1.0,1.8,1.6,1.7,1.8
";

    struct StaticFetch(HashMap<&'static str, &'static str>);

    impl Fetch for StaticFetch {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.0
                .get(url)
                .map(|body| body.as_bytes().to_vec())
                .ok_or_else(|| ArbError::Http(format!("HTTP 404 Not Found for {url}")))
        }
    }

    #[test]
    fn test_parse_nominal_skips_preamble_and_keeps_prefix() {
        let df = parse_curve_csv(FedCurve::Nominal, NOMINAL.as_bytes()).unwrap();

        assert_eq!(df.height(), 2);
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["date", "SVENY01", "SVENY02"]);

        let y2 = df.column("SVENY02").unwrap().f64().unwrap();
        assert_relative_eq!(y2.get(0).unwrap(), 3.3771);
        assert_eq!(y2.get(1), None);
    }

    #[test]
    fn test_parse_tips_sorts_by_date() {
        let df = parse_curve_csv(FedCurve::Tips, TIPS.as_bytes()).unwrap();

        let first = df.column("date").unwrap().date().unwrap().get(0).unwrap();
        assert_eq!(date_from_days(first), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(df.width(), 5);
    }

    #[test]
    fn test_parse_without_header_fails() {
        let err = parse_curve_csv(FedCurve::Tips, b"just,some\ntext,here\n").unwrap_err();
        assert!(matches!(err, ArbError::Parse(_)));

        let err = parse_curve_csv(FedCurve::Tips, NOMINAL.as_bytes()).unwrap_err();
        assert!(matches!(err, ArbError::Parse(_)));
    }

    #[test]
    fn test_pull_curve_writes_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFetch(HashMap::from([(FedCurve::Tips.url(), TIPS)]));

        let df = pull_curve(&fetcher, FedCurve::Tips, dir.path()).unwrap();
        let stored = crate::io::read_parquet(&dir.path().join(FedCurve::Tips.file_name())).unwrap();
        assert!(stored.equals_missing(&df));

        let err = pull_curve(&fetcher, FedCurve::Nominal, dir.path()).unwrap_err();
        assert!(matches!(err, ArbError::Http(_)));
    }
}

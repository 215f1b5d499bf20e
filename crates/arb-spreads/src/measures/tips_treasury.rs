//! TIPS-Treasury arbitrage spread.
//!
//! A TIPS bond plus a zero-coupon inflation swap replicates a nominal
//! zero-coupon Treasury. The synthetic nominal rate is
//!
//! `tips_treas_rf = 1e4 * (exp(real_cc + ln(1 + inf_swap)) - 1)`
//!
//! in basis points, and the spread against the cash Treasury is
//!
//! `arb = tips_treas_rf - nom_zc`, with `nom_zc = 1e4 * (exp(SVENY / 100) - 1)`.
//!
//! A positive spread means the synthetic Treasury yields more than the cash
//! one, i.e. TIPS are cheap relative to nominals.

use crate::{
    ArbError, Result, Settings,
    frame::{normalize_date_column, rename_first_present},
    io::{find_input, read_parquet},
    measures::{Measure, MeasureCategory},
    partition::map_partitions,
    sources::{FedCurve, load_swaps, swaps::SWAPS_STEM},
    tenor::Tenor,
};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the computed series inside the data directory.
pub const OUTPUT_FILE: &str = "tips_treasury_implied_rf.parquet";

/// Number of tenors that must all be missing before a date is dropped.
const MAX_MISSING_TENORS: i32 = Tenor::ALL.len() as i32;

/// TIPS-Treasury arbitrage spread at the 2, 5, 10 and 20 year tenors.
///
/// # Required Columns
/// - `date`
/// - `real_cc{2,5,10,20}`: TIPS real yields, decimal
/// - `nom_zc{2,5,10,20}`: nominal zero-coupon yields, basis points
/// - `inf_swap_{2,5,10,20}y` (optional): inflation swap rates, decimal;
///   an absent tenor is treated as a zero swap rate
///
/// # Returns
/// DataFrame with `date`, `real_cc*`, `nom_zc*`, `tips_treas_*_rf`, `arb_*`.
/// Dates on which every tenor's synthetic rate is missing are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TipsTreasury;

/// Convert the Fed nominal curve to annually compounded basis points.
pub fn process_nominal(df: DataFrame) -> Result<LazyFrame> {
    let mut df = normalize_date_column(df)?;
    let mut exprs = vec![col("date")];
    for tenor in Tenor::ALL {
        if !rename_first_present(&mut df, &tenor.sveny_aliases(), &tenor.sveny())? {
            return Err(ArbError::MissingColumn(tenor.sveny()));
        }
        exprs.push(
            (lit(1e4) * ((col(tenor.sveny()).cast(DataType::Float64) / lit(100.0)).exp() - lit(1.0)))
                .alias(tenor.nom_zc()),
        );
    }
    Ok(df.lazy().select(exprs))
}

/// Convert the Fed TIPS curve from percent to decimal real yields.
pub fn process_tips(df: DataFrame) -> Result<LazyFrame> {
    let mut df = normalize_date_column(df)?;
    let mut exprs = vec![col("date")];
    for tenor in Tenor::ALL {
        if !rename_first_present(&mut df, &tenor.tipsy_aliases(), &tenor.tipsy())? {
            return Err(ArbError::MissingColumn(tenor.tipsy()));
        }
        exprs.push((col(tenor.tipsy()).cast(DataType::Float64) / lit(100.0)).alias(tenor.real_cc()));
    }
    Ok(df.lazy().select(exprs))
}

/// Inner-join TIPS, nominal and swap data on `date`.
pub fn merge_inputs(tips: LazyFrame, nominal: LazyFrame, swaps: LazyFrame) -> LazyFrame {
    tips.join(
        nominal,
        [col("date")],
        [col("date")],
        JoinArgs::new(JoinType::Inner),
    )
    .join(
        swaps,
        [col("date")],
        [col("date")],
        JoinArgs::new(JoinType::Inner),
    )
    .sort(["date"], SortMultipleOptions::default())
}

fn curve_path(settings: &Settings, curve: FedCurve) -> Result<PathBuf> {
    find_input(
        curve.file_name(),
        &[settings.data_dir.as_path(), settings.manual_data_dir.as_path()],
    )
}

/// Synthetic rate, spread and missing flag for each tenor.
///
/// `has_swap` reports whether the swap column for a tenor is present.
fn tenor_exprs(has_swap: impl Fn(Tenor) -> bool) -> (Vec<Expr>, Vec<Expr>) {
    let mut rates = Vec::with_capacity(Tenor::ALL.len());
    let mut derived = Vec::with_capacity(2 * Tenor::ALL.len());
    for tenor in Tenor::ALL {
        let swap = if has_swap(tenor) {
            col(tenor.inf_swap()).cast(DataType::Float64)
        } else {
            lit(0.0)
        };
        rates.push(
            (lit(1e4) * ((col(tenor.real_cc()) + swap.log1p()).exp() - lit(1.0)))
                .alias(tenor.tips_treas_rf()),
        );
        derived.push((col(tenor.tips_treas_rf()) - col(tenor.nom_zc())).alias(tenor.arb()));
        derived.push(
            col(tenor.tips_treas_rf())
                .is_finite()
                .fill_null(lit(false))
                .not()
                .cast(DataType::Int32)
                .alias(tenor.missing_flag()),
        );
    }
    (rates, derived)
}

fn output_columns() -> Vec<Expr> {
    let mut columns = vec![col("date")];
    columns.extend(Tenor::ALL.iter().map(|t| col(t.real_cc())));
    columns.extend(Tenor::ALL.iter().map(|t| col(t.nom_zc())));
    columns.extend(Tenor::ALL.iter().map(|t| col(t.tips_treas_rf())));
    columns.extend(Tenor::ALL.iter().map(|t| col(t.arb())));
    columns
}

impl Measure for TipsTreasury {
    fn name(&self) -> &str {
        "tips_treasury"
    }

    fn description(&self) -> &str {
        "TIPS plus inflation swap implied risk-free rate minus nominal Treasury zero yield, in bps"
    }

    fn category(&self) -> MeasureCategory {
        MeasureCategory::ArbitrageSpread
    }

    fn required_columns(&self) -> Vec<String> {
        let mut columns = vec!["date".to_string()];
        columns.extend(Tenor::ALL.iter().map(|t| t.real_cc()));
        columns.extend(Tenor::ALL.iter().map(|t| t.nom_zc()));
        columns
    }

    fn summary_columns(&self) -> Vec<String> {
        Tenor::ALL.iter().map(|t| t.arb()).collect()
    }

    fn output_path(&self, settings: &Settings) -> PathBuf {
        settings.data_dir.join(OUTPUT_FILE)
    }

    fn input_paths(&self, settings: &Settings) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = FedCurve::ALL
            .iter()
            .map(|curve| {
                curve_path(settings, *curve)
                    .unwrap_or_else(|_| settings.data_dir.join(curve.file_name()))
            })
            .collect();
        let swap_dirs: [&Path; 3] = [&settings.manual_data_dir, &settings.data_dir, &settings.output_dir];
        let swaps = find_input(&format!("{SWAPS_STEM}.parquet"), &swap_dirs)
            .or_else(|_| find_input(&format!("{SWAPS_STEM}.csv"), &swap_dirs))
            .unwrap_or_else(|_| settings.manual_data_dir.join(format!("{SWAPS_STEM}.csv")));
        paths.push(swaps);
        paths
    }

    fn load(&self, settings: &Settings) -> Result<LazyFrame> {
        let nominal = process_nominal(read_parquet(&curve_path(settings, FedCurve::Nominal)?)?)?;
        let tips = process_tips(read_parquet(&curve_path(settings, FedCurve::Tips)?)?)?;
        let swaps = load_swaps(settings)?;
        info!(swap_rows = swaps.height(), "merging TIPS, nominal and swap data");
        Ok(merge_inputs(tips, nominal, swaps.lazy()))
    }

    fn compute(&self, data: &LazyFrame, workers: usize) -> Result<DataFrame> {
        let merged = data.clone().collect()?;
        let (rates, derived) = tenor_exprs(|t| merged.get_column_index(&t.inf_swap()).is_some());

        let computed = map_partitions(merged, workers, |part| {
            Ok(part
                .lazy()
                .with_columns(rates.clone())
                .with_columns(derived.clone())
                .collect()?)
        })?;

        let miss_count = Tenor::ALL
            .iter()
            .map(|t| col(t.missing_flag()))
            .reduce(|acc, flag| acc + flag)
            .unwrap_or_else(|| lit(0));

        let before = computed.height();
        let result = computed
            .lazy()
            .filter(miss_count.lt(lit(MAX_MISSING_TENORS)))
            .select(output_columns())
            .collect()?;
        info!(
            rows = result.height(),
            dropped = before - result.height(),
            "computed TIPS-Treasury spreads"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{date_column, date_from_days};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn dates(days: &[u32]) -> Column {
        date_column(
            days.iter()
                .map(|d| NaiveDate::from_ymd_opt(2024, 1, *d))
                .collect(),
        )
        .unwrap()
    }

    fn nominal() -> DataFrame {
        DataFrame::new(vec![
            dates(&[2, 3, 4]),
            Column::new("SVENY02".into(), [4.0, 4.1, 4.2]),
            Column::new("SVENY05".into(), [3.9, 4.0, 4.1]),
            Column::new("SVENY10".into(), [4.0, 4.0, 4.0]),
            Column::new("Treasury_SF_20Y".into(), [4.3, 4.3, 4.3]),
        ])
        .unwrap()
    }

    fn tips() -> DataFrame {
        DataFrame::new(vec![
            dates(&[2, 3, 5]),
            Column::new("TIPSY02".into(), [Some(1.8), None, Some(1.9)]),
            Column::new("TIPSY05".into(), [Some(1.7), None, Some(1.8)]),
            Column::new("TIPSY10".into(), [Some(1.8), None, Some(1.8)]),
            Column::new("TIPSY20".into(), [Some(2.0), None, Some(2.0)]),
        ])
        .unwrap()
    }

    fn swaps() -> DataFrame {
        DataFrame::new(vec![
            dates(&[2, 3, 4, 5]),
            Column::new("inf_swap_2y".into(), [0.024, 0.025, 0.025, 0.025]),
            Column::new("inf_swap_5y".into(), [0.023, 0.023, 0.023, 0.023]),
            Column::new("inf_swap_10y".into(), [0.024, 0.024, 0.024, 0.024]),
        ])
        .unwrap()
    }

    fn merged() -> LazyFrame {
        merge_inputs(
            process_tips(tips()).unwrap(),
            process_nominal(nominal()).unwrap(),
            swaps().lazy(),
        )
    }

    fn value(df: &DataFrame, column: &str, row: usize) -> f64 {
        df.column(column).unwrap().f64().unwrap().get(row).unwrap()
    }

    fn days_of(df: &DataFrame) -> Vec<NaiveDate> {
        let dates = df.column("date").unwrap().date().unwrap();
        (0..dates.len()).filter_map(|i| dates.get(i)).map(date_from_days).collect()
    }

    #[test]
    fn test_nominal_zero_coupon_bps() {
        let df = process_nominal(nominal()).unwrap().collect().unwrap();
        assert_relative_eq!(value(&df, "nom_zc2", 0), 1e4 * (0.04_f64.exp() - 1.0), epsilon = 1e-9);
        assert_relative_eq!(value(&df, "nom_zc20", 0), 1e4 * (0.043_f64.exp() - 1.0), epsilon = 1e-9);
    }

    #[test]
    fn test_missing_curve_column() {
        let df = nominal().drop("SVENY05").unwrap();
        match process_nominal(df) {
            Err(ArbError::MissingColumn(name)) => assert_eq!(name, "SVENY05"),
            Err(other) => panic!("expected MissingColumn, got {other}"),
            Ok(_) => panic!("expected MissingColumn"),
        }
    }

    #[test]
    fn test_merge_is_inner_on_date() {
        let df = merged().collect().unwrap();
        // Jan 2 and Jan 3 are present in all three inputs
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_merge_sorts_by_date() {
        let df = merge_inputs(
            process_tips(tips().reverse()).unwrap(),
            process_nominal(nominal().reverse()).unwrap(),
            swaps().reverse().lazy(),
        )
        .collect()
        .unwrap();

        assert_eq!(
            days_of(&df),
            [NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()]
        );
    }

    /// Merged input with a given real yield on every tenor of each row.
    fn merged_with_real(real: &[[f64; 4]]) -> LazyFrame {
        let days: Vec<u32> = (2..2 + real.len() as u32).collect();
        let mut columns = vec![dates(&days)];
        for (i, tenor) in Tenor::ALL.iter().enumerate() {
            let values: Vec<f64> = real.iter().map(|row| row[i]).collect();
            columns.push(Column::new(tenor.real_cc().into(), values));
            columns.push(Column::new(tenor.nom_zc().into(), vec![400.0; real.len()]));
        }
        DataFrame::new(columns).unwrap().lazy()
    }

    #[test]
    fn test_non_finite_rate_counts_as_missing() {
        let inf = f64::INFINITY;
        let nan = f64::NAN;
        let data = merged_with_real(&[
            [0.018, 0.017, 0.018, 0.020],
            [inf, nan, inf, nan],
            [nan, 0.017, 0.018, 0.020],
        ]);

        let result = TipsTreasury.compute(&data, 2).unwrap();

        // the all non-finite row is dropped, the partial one kept
        assert_eq!(result.height(), 2);
        assert_eq!(days_of(&result)[1], NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert!(!value(&result, "tips_treas_2_rf", 1).is_finite());
        assert!(value(&result, "tips_treas_5_rf", 1).is_finite());
    }

    #[test]
    fn test_spread_formula() {
        let result = TipsTreasury.compute(&merged(), 1).unwrap();

        // Jan 3 has no TIPS yields at any tenor and is dropped
        assert_eq!(result.height(), 1);

        let rf2 = 1e4 * ((0.018 + 0.024_f64.ln_1p()).exp() - 1.0);
        let nom2 = 1e4 * (0.04_f64.exp() - 1.0);
        assert_relative_eq!(value(&result, "tips_treas_2_rf", 0), rf2, epsilon = 1e-9);
        assert_relative_eq!(value(&result, "arb_2", 0), rf2 - nom2, epsilon = 1e-9);

        // No 20y swap column: treated as a zero swap rate
        let rf20 = 1e4 * (0.02_f64.exp() - 1.0);
        assert_relative_eq!(value(&result, "tips_treas_20_rf", 0), rf20, epsilon = 1e-9);
    }

    #[test]
    fn test_output_column_order() {
        let result = TipsTreasury.compute(&merged(), 2).unwrap();
        let names: Vec<&str> = result.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            [
                "date", "real_cc2", "real_cc5", "real_cc10", "real_cc20", "nom_zc2", "nom_zc5",
                "nom_zc10", "nom_zc20", "tips_treas_2_rf", "tips_treas_5_rf", "tips_treas_10_rf",
                "tips_treas_20_rf", "arb_2", "arb_5", "arb_10", "arb_20",
            ]
        );
    }

    #[test]
    fn test_partial_tenor_row_is_kept() {
        let mut tips = tips();
        tips.with_column(Column::new(
            "TIPSY10".into(),
            [Some(1.8), Some(1.85), Some(1.8)],
        ))
        .unwrap();
        let data = merge_inputs(
            process_tips(tips).unwrap(),
            process_nominal(nominal()).unwrap(),
            swaps().lazy(),
        );

        let result = TipsTreasury.compute(&data, 4).unwrap();

        assert_eq!(result.height(), 2);
        let arb2 = result.column("arb_2").unwrap().f64().unwrap();
        assert_eq!(arb2.get(1), None);
        assert!(arb2.get(0).is_some());
    }

    #[test]
    fn test_partitioning_does_not_change_result() {
        let single = TipsTreasury.compute(&merged(), 1).unwrap();
        let parallel = TipsTreasury.compute(&merged(), 8).unwrap();
        assert!(single.equals_missing(&parallel));
    }

    #[test]
    fn test_run_reads_inputs_and_writes_output() {
        use std::collections::HashMap;

        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_string_lossy().to_string();
        let vars = HashMap::from([
            ("LOCAL_BASE_DIR".to_string(), base),
            ("ARB_WORKERS".to_string(), "2".to_string()),
        ]);
        let settings = Settings::from_lookup(|k| vars.get(k).cloned()).unwrap();
        settings.create_dirs().unwrap();

        crate::io::write_parquet(&nominal(), &settings.data_dir.join(FedCurve::Nominal.file_name()))
            .unwrap();
        crate::io::write_parquet(&tips(), &settings.data_dir.join(FedCurve::Tips.file_name()))
            .unwrap();
        crate::io::write_parquet(
            &swaps(),
            &settings.manual_data_dir.join("treasury_inflation_swaps.parquet"),
        )
        .unwrap();

        let result = TipsTreasury.run(&settings).unwrap();
        assert_eq!(result.height(), 1);

        let stored = TipsTreasury.load_output(&settings).unwrap();
        assert!(stored.equals_missing(&result));
        assert_eq!(TipsTreasury.input_paths(&settings).len(), 3);
        assert!(TipsTreasury.input_paths(&settings).iter().all(|p| p.is_file()));
    }
}

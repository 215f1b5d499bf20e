//! CLI for the arb-spreads research pipeline.
//!
//! Discovers and computes measures, downloads source data, publishes summary
//! tables and runs the task graph.

use anyhow::{Context, bail};
use arb_spreads::{
    MeasureCategory, MeasureRegistry, RunOptions, Settings, TableFormat, default_graph,
    publish_summary,
    sources::{FRENCH_DATASETS, FedCurve, HttpFetcher, pull_cip_workbook, pull_curve, pull_french},
};
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, prelude::*};

/// Log file written under `TEMP_DIR` next to the console output.
const LOG_FILE: &str = "arb-spreads.log";

#[derive(Parser)]
#[command(name = "arb-spreads")]
#[command(about = "Fixed-income arbitrage spreads from market data", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all available measures
    List,
    /// Show information about a specific measure
    Info {
        /// Measure name
        measure: String,
    },
    /// Create the configured data and output directories
    Setup,
    /// Download source data
    Pull {
        /// Which source to download
        #[arg(value_enum, default_value_t = PullTarget::All)]
        target: PullTarget,
    },
    /// Compute a measure and store its output
    Compute {
        /// Measure name
        measure: String,
        /// Number of partitions to compute in parallel
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Write summary tables for a computed measure
    Report {
        /// Measure name
        measure: String,
        /// Table format; all formats when omitted
        #[arg(long, value_enum)]
        format: Vec<Format>,
    },
    /// Run tasks and their dependencies; all tasks when none are given
    Run {
        /// Task names
        tasks: Vec<String>,
        /// Run tasks even if they are up to date
        #[arg(long)]
        force: bool,
    },
    /// List pipeline tasks
    Tasks,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PullTarget {
    /// Fed nominal yield curve
    Nominal,
    /// Fed TIPS yield curve
    Tips,
    /// Ken French portfolio returns
    French,
    /// CIP deviations workbook
    Cip,
    All,
}

impl PullTarget {
    fn curves(self) -> &'static [FedCurve] {
        match self {
            Self::Nominal => &[FedCurve::Nominal],
            Self::Tips => &[FedCurve::Tips],
            Self::All => &FedCurve::ALL,
            Self::French | Self::Cip => &[],
        }
    }

    fn french(self) -> bool {
        matches!(self, Self::French | Self::All)
    }

    fn cip(self) -> bool {
        matches!(self, Self::Cip | Self::All)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Latex,
    Markdown,
    Html,
}

impl From<Format> for TableFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Latex => Self::Latex,
            Format::Markdown => Self::Markdown,
            Format::Html => Self::Html,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let loaded = Settings::from_env();
    let _guard = init_tracing(loaded.as_ref().ok().map(|s| s.temp_dir.as_path()));

    let registry = MeasureRegistry::with_defaults();
    match cli.command {
        Commands::List => print!("{}", measure_listing(&registry)),
        Commands::Info { measure } => show_measure_info(&registry, &measure)?,
        Commands::Setup => {
            let settings = loaded?;
            settings.create_dirs()?;
            for dir in settings.dirs() {
                println!("{}", dir.display());
            }
        }
        Commands::Pull { target } => {
            let settings = loaded?;
            settings.create_dirs()?;
            let fetcher = HttpFetcher::new()?;
            for curve in target.curves() {
                pull_curve(&fetcher, *curve, &settings.data_dir)
                    .with_context(|| format!("pulling the {curve} yield curve"))?;
            }
            if target.french() {
                for dataset in FRENCH_DATASETS {
                    pull_french(&fetcher, dataset, &settings.data_dir, settings.start_date, settings.end_date)
                        .with_context(|| format!("pulling Ken French {dataset}"))?;
                }
            }
            if target.cip() {
                pull_cip_workbook(&fetcher, &settings.manual_data_dir).context("pulling the CIP workbook")?;
            }
        }
        Commands::Compute { measure, workers } => {
            let mut settings = loaded?;
            if let Some(workers) = workers {
                if workers == 0 {
                    bail!("--workers must be at least 1");
                }
                settings.workers = workers;
            }
            let measure = lookup(&registry, &measure)?;
            let result = measure.run(&settings)?;
            println!("{}", result.head(Some(10)));
            println!("{} rows written to {}", result.height(), measure.output_path(&settings).display());
        }
        Commands::Report { measure, format } => {
            let settings = loaded?;
            let measure = lookup(&registry, &measure)?;
            let formats: Vec<TableFormat> = if format.is_empty() {
                TableFormat::ALL.to_vec()
            } else {
                format.into_iter().map(TableFormat::from).collect()
            };
            for path in publish_summary(measure.as_ref(), &settings, &formats)? {
                println!("{}", path.display());
            }
        }
        Commands::Run { tasks, force } => {
            let settings = loaded?;
            let graph = default_graph(&settings);
            let summary = graph.run(&settings, &tasks, RunOptions { force, progress: true })?;
            info!(
                executed = summary.executed.len(),
                skipped = summary.skipped.len(),
                "pipeline finished"
            );
            for name in &summary.executed {
                println!("ran      {name}");
            }
            for name in &summary.skipped {
                println!("skipped  {name}");
            }
        }
        Commands::Tasks => {
            let settings = loaded?;
            for task in default_graph(&settings).iter() {
                println!("{:<28}{}", task.name, task.doc);
            }
        }
    }
    Ok(())
}

/// Console logging on stderr, plus a plain-text log file under `log_dir`
/// when one is given and writable. The returned guard flushes the file on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let (file_layer, guard) = match log_dir.and_then(file_writer) {
        Some((writer, guard)) => (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard)),
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    if log_dir.is_some() && guard.is_none() {
        warn!("log directory is not writable; logging to stderr only");
    }
    guard
}

fn file_writer(dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir).ok()?;
    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    Some(tracing_appender::non_blocking(appender))
}

fn lookup(registry: &MeasureRegistry, name: &str) -> anyhow::Result<std::sync::Arc<dyn arb_spreads::Measure>> {
    match registry.get(name) {
        Some(measure) => Ok(measure),
        None => bail!(
            "measure '{name}' not found; available: {}",
            registry.names().join(", ")
        ),
    }
}

/// All available measures grouped by category.
fn measure_listing(registry: &MeasureRegistry) -> String {
    let mut out = format!("Available Measures ({} total)\n\n", registry.len());
    for category in MeasureCategory::ALL {
        let mut measures = registry.by_category(category);
        if measures.is_empty() {
            continue;
        }
        measures.sort_by(|a, b| a.name().cmp(b.name()));
        let _ = writeln!(out, "{category}:");
        for measure in measures {
            let _ = writeln!(out, "  {} - {}", measure.name(), measure.description());
        }
        out.push('\n');
    }
    out
}

/// Show detailed information about a specific measure.
fn show_measure_info(registry: &MeasureRegistry, name: &str) -> anyhow::Result<()> {
    let all_info = registry.all_info();
    let Some(info) = all_info.iter().find(|m| m.name == name) else {
        bail!("measure '{name}' not found; available: {}", registry.names().join(", "));
    };

    println!("Measure: {}", info.name);
    println!("Category: {}", info.category);
    println!("Description: {}", info.description);
    println!("Required columns:");
    for col in &info.required_columns {
        println!("  - {col}");
    }
    if info.category == MeasureCategory::ArbitrageSpread {
        println!("Units: basis points");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_all_measures_have_info() {
        let registry = MeasureRegistry::with_defaults();
        let all_info = registry.all_info();

        assert_eq!(all_info.len(), registry.len());
        for info in all_info {
            assert!(!info.name.is_empty());
            assert!(!info.description.is_empty());
            assert!(!info.required_columns.is_empty());
        }
    }

    #[test]
    fn test_parse_report_formats() {
        let cli = Cli::try_parse_from(["arb-spreads", "report", "ois_3m", "--format", "latex", "--format", "html"])
            .unwrap();
        match cli.command {
            Commands::Report { measure, format } => {
                assert_eq!(measure, "ois_3m");
                assert_eq!(format, [Format::Latex, Format::Html]);
            }
            _ => panic!("expected report"),
        }
    }

    #[test]
    fn test_parse_pull_and_run() {
        let cli = Cli::try_parse_from(["arb-spreads", "pull", "tips"]).unwrap();
        assert!(matches!(cli.command, Commands::Pull { target: PullTarget::Tips }));

        let cli = Cli::try_parse_from(["arb-spreads", "pull"]).unwrap();
        assert!(matches!(cli.command, Commands::Pull { target: PullTarget::All }));

        let cli = Cli::try_parse_from(["arb-spreads", "run", "ois_tables", "--force"]).unwrap();
        match cli.command {
            Commands::Run { tasks, force } => {
                assert_eq!(tasks, ["ois_tables"]);
                assert!(force);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_lookup_unknown_measure() {
        let registry = MeasureRegistry::with_defaults();
        let err = lookup(&registry, "cip").unwrap_err();
        assert!(err.to_string().contains("tips_treasury"));
    }

    #[test]
    fn test_listing_groups_by_category() {
        let listing = measure_listing(&MeasureRegistry::with_defaults());

        assert!(listing.starts_with("Available Measures (2 total)"));
        let spread = listing.find("Arbitrage spread:").unwrap();
        let tips = listing.find("  tips_treasury - ").unwrap();
        let rates = listing.find("Risk-free rate:").unwrap();
        let ois = listing.find("  ois_3m - ").unwrap();
        assert!(spread < tips && tips < rates && rates < ois);
    }

    #[test]
    fn test_parse_extra_pull_targets() {
        let cli = Cli::try_parse_from(["arb-spreads", "pull", "french"]).unwrap();
        assert!(matches!(cli.command, Commands::Pull { target: PullTarget::French }));

        assert!(PullTarget::Cip.curves().is_empty());
        assert!(PullTarget::Cip.cip() && !PullTarget::Cip.french());
        assert!(PullTarget::All.french() && PullTarget::All.cip());
        assert_eq!(PullTarget::All.curves().len(), 2);
        assert!(!PullTarget::Tips.french() && !PullTarget::Tips.cip());
    }

    #[test]
    fn test_file_log_is_flushed_on_guard_drop() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("tmp");
        let (mut writer, guard) = file_writer(&log_dir).unwrap();
        writer.write_all(b"pipeline finished\n").unwrap();
        drop(writer);
        drop(guard);

        let written = std::fs::read_to_string(log_dir.join(LOG_FILE)).unwrap();
        assert_eq!(written, "pipeline finished\n");
    }
}

//! Derived series computed by the pipeline.
//!
//! Every series implements [`Measure`]: it knows how to load its inputs from
//! the configured directories, compute its output frame, and where that
//! output lives. The [`MeasureRegistry`] makes them discoverable by name.

pub mod ois;
pub mod tips_treasury;

pub use ois::Ois3m;
pub use tips_treasury::TipsTreasury;

use crate::{
    Result, Settings,
    frame::{normalize_date_column, require_columns},
    io,
};
use derive_more::Display;
use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Measure category for grouping related series.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureCategory {
    /// Arbitrage spread between a synthetic and a cash rate
    #[display("Arbitrage spread")]
    ArbitrageSpread,
    /// Benchmark risk-free rate series
    #[display("Risk-free rate")]
    RiskFreeRate,
}

impl MeasureCategory {
    /// Every category, in listing order.
    pub const ALL: [Self; 2] = [Self::ArbitrageSpread, Self::RiskFreeRate];
}

/// A series derived from market data.
pub trait Measure: Send + Sync + std::fmt::Debug {
    /// Unique identifier, snake_case.
    fn name(&self) -> &str;

    /// Human-readable description of what this series measures.
    fn description(&self) -> &str;

    /// Category for grouping.
    fn category(&self) -> MeasureCategory;

    /// Columns [`Measure::compute`] expects in its input.
    fn required_columns(&self) -> Vec<String>;

    /// Columns of the output summarised in reports.
    fn summary_columns(&self) -> Vec<String>;

    /// Where the computed series is stored.
    fn output_path(&self, settings: &Settings) -> PathBuf;

    /// Input files read by [`Measure::load`], for dependency tracking.
    fn input_paths(&self, settings: &Settings) -> Vec<PathBuf>;

    /// Load and align the inputs.
    fn load(&self, settings: &Settings) -> Result<LazyFrame>;

    /// Compute the output from aligned inputs, using up to `workers` partitions.
    fn compute(&self, data: &LazyFrame, workers: usize) -> Result<DataFrame>;

    /// Load, check, compute and store.
    fn run(&self, settings: &Settings) -> Result<DataFrame> {
        let data = self.load(settings)?.collect()?;
        let required = self.required_columns();
        let required: Vec<&str> = required.iter().map(String::as_str).collect();
        require_columns(&data, &required)?;

        let result = self.compute(&data.lazy(), settings.workers)?;
        let path = self.output_path(settings);
        write_output(&result, &path)?;
        info!(measure = self.name(), rows = result.height(), path = %path.display(), "saved");
        Ok(result)
    }

    /// Read back a previously stored output.
    fn load_output(&self, settings: &Settings) -> Result<DataFrame> {
        read_output(&self.output_path(settings))
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn write_output(df: &DataFrame, path: &Path) -> Result<()> {
    if is_csv(path) {
        io::write_csv(df, path)
    } else {
        io::write_parquet(df, path)
    }
}

fn read_output(path: &Path) -> Result<DataFrame> {
    let df = if is_csv(path) {
        io::read_csv(path)?
    } else {
        io::read_parquet(path)?
    };
    normalize_date_column(df)
}

/// Metadata for measure introspection.
#[derive(Debug, Clone)]
pub struct MeasureInfo {
    /// Measure name (unique identifier)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Measure category
    pub category: MeasureCategory,
    /// Required input columns
    pub required_columns: Vec<String>,
}

/// Registry for measure discovery.
#[derive(Debug, Default)]
pub struct MeasureRegistry {
    measures: HashMap<String, Arc<dyn Measure>>,
}

impl MeasureRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            measures: HashMap::new(),
        }
    }

    /// Register all standard measures.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TipsTreasury::default()));
        registry.register(Arc::new(Ois3m::default()));
        registry
    }

    /// Register a measure, replacing any with the same name.
    pub fn register(&mut self, measure: Arc<dyn Measure>) {
        self.measures.insert(measure.name().to_string(), measure);
    }

    /// Get a measure by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Measure>> {
        self.measures.get(name).cloned()
    }

    /// Get measures by category.
    pub fn by_category(&self, category: MeasureCategory) -> Vec<&dyn Measure> {
        self.measures
            .values()
            .filter(|m| m.category() == category)
            .map(|m| m.as_ref())
            .collect()
    }

    /// Get all measure metadata, sorted by name.
    pub fn all_info(&self) -> Vec<MeasureInfo> {
        let mut info: Vec<MeasureInfo> = self
            .measures
            .values()
            .map(|m| MeasureInfo {
                name: m.name().to_string(),
                description: m.description().to_string(),
                category: m.category(),
                required_columns: m.required_columns(),
            })
            .collect();
        info.sort_by(|a, b| a.name.cmp(&b.name));
        info
    }

    /// Get all measure names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.measures.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered measures.
    pub fn len(&self) -> usize {
        self.measures.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let registry = MeasureRegistry::with_defaults();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), ["ois_3m", "tips_treasury"]);
        assert!(registry.get("tips_treasury").is_some());
        assert!(registry.get("cip").is_none());
    }

    #[test]
    fn test_by_category() {
        let registry = MeasureRegistry::with_defaults();

        let spreads = registry.by_category(MeasureCategory::ArbitrageSpread);
        assert_eq!(spreads.len(), 1);
        assert_eq!(spreads[0].name(), "tips_treasury");

        let rates = registry.by_category(MeasureCategory::RiskFreeRate);
        assert_eq!(rates[0].name(), "ois_3m");
    }

    #[test]
    fn test_all_info_complete() {
        let registry = MeasureRegistry::with_defaults();
        for info in registry.all_info() {
            assert!(!info.name.is_empty());
            assert!(!info.description.is_empty());
            assert!(!info.required_columns.is_empty());
        }
    }

    #[test]
    fn test_output_format_by_extension() {
        assert!(is_csv(Path::new("/tmp/cleaned_ois_rates.csv")));
        assert!(!is_csv(Path::new("/tmp/tips_treasury_implied_rf.parquet")));
    }
}

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod frame;
pub mod io;
pub mod measures;
pub mod partition;
pub mod pipeline;
pub mod report;
pub mod settings;
pub mod sources;
pub mod tenor;

// Re-export core types
pub use error::{ArbError, Result};
pub use measures::{Measure, MeasureCategory, MeasureInfo, MeasureRegistry, Ois3m, TipsTreasury};
pub use partition::map_partitions;
pub use pipeline::{RunOptions, RunSummary, Task, TaskGraph, default_graph};
pub use report::{SummaryTable, TableFormat, publish_summary};
pub use settings::Settings;
pub use tenor::Tenor;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Raw market data sources.
//!
//! Downloads go through the [`Fetch`] trait so parsers can be exercised on
//! fixture bytes without the network.

pub mod cip;
pub mod fed;
pub mod french;
pub mod http;
pub mod swaps;

pub use cip::{CIP_FILE, pull_cip_workbook};
pub use fed::{FedCurve, parse_curve_csv, pull_curve};
pub use french::{FRENCH_DATASETS, parse_french_csv, pull_french, table_file_name};
pub use http::{Fetch, HttpFetcher};
pub use swaps::{load_swaps, parse_swaps_csv, parse_swaps_workbook};

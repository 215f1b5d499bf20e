//! Covered interest parity workbook.
//!
//! The CIP deviations are published as a ready-made workbook; the pipeline
//! only mirrors it into the manual data directory.

use crate::{ArbError, Result, sources::Fetch};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Published location of the workbook.
pub const CIP_URL: &str = "https://raw.githubusercontent.com/Kunj121/CIP_DATA/main/CIP_2025%20(1).xlsx";

/// File name inside the manual data directory.
pub const CIP_FILE: &str = "CIP_2025.xlsx";

/// Zip local file header; every xlsx package starts with it.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Download the workbook into `manual_dir` and return its path.
///
/// A body that is not a zip package (an error page, say) is rejected and
/// nothing is written.
pub fn pull_cip_workbook(fetcher: &dyn Fetch, manual_dir: &Path) -> Result<PathBuf> {
    info!(url = CIP_URL, "downloading CIP workbook");
    let bytes = fetcher.fetch(CIP_URL)?;
    if !bytes.starts_with(ZIP_MAGIC) {
        return Err(ArbError::Parse(format!(
            "{CIP_URL} did not return an xlsx workbook ({} bytes)",
            bytes.len()
        )));
    }

    fs::create_dir_all(manual_dir)?;
    let path = manual_dir.join(CIP_FILE);
    let tmp = manual_dir.join(format!("{CIP_FILE}.tmp"));
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, &path)?;
    info!(path = %path.display(), bytes = bytes.len(), "saved CIP workbook");
    Ok(path)
}

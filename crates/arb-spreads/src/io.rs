//! File I/O for pipeline artifacts.
//!
//! Writes go to a `.tmp` sibling first and are renamed into place, so a failed
//! run never leaves a truncated artifact that a later task would treat as
//! up to date.

use crate::{ArbError, Result};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read a parquet file into memory.
pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = fs::File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    debug!(path = %path.display(), rows = df.height(), cols = df.width(), "read parquet");
    Ok(df)
}

/// Read a CSV file with a header row.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    debug!(path = %path.display(), rows = df.height(), cols = df.width(), "read csv");
    Ok(df)
}

/// Write `df` as snappy-compressed parquet, creating parent directories as
/// needed.
pub fn write_parquet(df: &DataFrame, path: &Path) -> Result<()> {
    write_atomic(path, |file| {
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut df.clone())?;
        Ok(())
    })
}

/// Write `df` as CSV with a header row.
pub fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
    write_atomic(path, |file| {
        CsvWriter::new(file)
            .include_header(true)
            .finish(&mut df.clone())?;
        Ok(())
    })
}

fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(fs::File) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let file = fs::File::create(&tmp_path)?;
    if let Err(e) = write(file) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })?;

    debug!(path = %path.display(), "wrote artifact");
    Ok(())
}

/// Return the first `dir/name` that exists.
pub fn find_input(name: &str, dirs: &[&Path]) -> Result<PathBuf> {
    let searched: Vec<PathBuf> = dirs.iter().map(|d| d.join(name)).collect();
    searched
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| ArbError::MissingInput {
            name: name.to_string(),
            searched,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df![
            "x" => [1.5, 2.5],
            "label" => ["a", "b"],
        ]
        .unwrap()
    }

    #[test]
    fn test_parquet_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sample.parquet");

        write_parquet(&sample(), &path).unwrap();
        let loaded = read_parquet(&path).unwrap();

        assert!(loaded.equals(&sample()));
        assert!(!path.with_extension("parquet.tmp").exists());
    }

    #[test]
    fn test_parquet_is_snappy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.parquet");
        write_parquet(&sample(), &path).unwrap();

        let mut reader = ParquetReader::new(fs::File::open(&path).unwrap());
        let metadata = reader.get_metadata().unwrap();
        let codecs: Vec<String> = metadata
            .row_groups
            .iter()
            .flat_map(|rg| rg.parquet_columns().iter())
            .map(|chunk| format!("{:?}", chunk.compression()))
            .collect();

        assert_eq!(codecs.len(), 2);
        assert!(codecs.iter().all(|c| c == "Snappy"), "{codecs:?}");
    }

    #[test]
    fn test_csv_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv");

        write_csv(&sample(), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();

        assert_eq!(text.lines().next(), Some("x,label"));
        assert_eq!(text.lines().count(), 3);

        let loaded = read_csv(&path).unwrap();
        assert_eq!(loaded.shape(), (2, 2));
    }

    #[test]
    fn test_find_input_order_and_miss() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("swaps.csv"), "Dates\n").unwrap();

        let found = find_input("swaps.csv", &[first.path(), second.path()]).unwrap();
        assert_eq!(found, second.path().join("swaps.csv"));

        fs::write(first.path().join("swaps.csv"), "Dates\n").unwrap();
        let found = find_input("swaps.csv", &[first.path(), second.path()]).unwrap();
        assert_eq!(found, first.path().join("swaps.csv"));

        match find_input("other.csv", &[first.path(), second.path()]) {
            Err(ArbError::MissingInput { searched, .. }) => assert_eq!(searched.len(), 2),
            other => panic!("expected MissingInput, got {other:?}"),
        }
    }
}

//! Project configuration.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file in the working directory. Every key has a default so a fresh checkout
//! runs without any configuration. Relative directories are resolved against
//! the project base directory.

use crate::{ArbError, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default sample start date.
pub const DEFAULT_START_DATE: &str = "1913-01-01";
/// Default sample end date.
pub const DEFAULT_END_DATE: &str = "2024-01-01";

/// Resolved project settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Project root; relative directories resolve against it
    pub base_dir: PathBuf,
    /// First date of the analysis sample
    pub start_date: NaiveDate,
    /// Last date of the analysis sample
    pub end_date: NaiveDate,
    /// Pulled and derived datasets
    pub data_dir: PathBuf,
    /// Hand-supplied inputs such as Bloomberg exports
    pub manual_data_dir: PathBuf,
    /// Reports and rendered tables
    pub output_dir: PathBuf,
    /// Copies of artifacts meant for publication
    pub publish_dir: PathBuf,
    /// Raw equity-spot inputs
    pub input_dir: PathBuf,
    /// Cleaned equity-spot outputs
    pub processed_dir: PathBuf,
    /// Scratch space
    pub temp_dir: PathBuf,
    /// Report root
    pub reports_dir: PathBuf,
    /// Figures
    pub plots_dir: PathBuf,
    /// Tables
    pub tables_dir: PathBuf,
    /// Number of partitions evaluated in parallel
    pub workers: usize,
}

impl Settings {
    /// Load settings from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| keys.iter().find_map(|k| lookup(k).filter(|v| !v.is_empty()));

        let base_dir = match get(&["LOCAL_BASE_DIR"]) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };
        let base_dir = if base_dir.is_absolute() {
            base_dir
        } else {
            std::env::current_dir()?.join(base_dir)
        };

        let dir = |keys: &[&str], default: &str| {
            let raw = get(keys).unwrap_or_else(|| default.to_string());
            resolve(&base_dir, Path::new(&raw))
        };

        let start_date = parse_date("START_DATE", get(&["START_DATE"]), DEFAULT_START_DATE)?;
        let end_date = parse_date("END_DATE", get(&["END_DATE"]), DEFAULT_END_DATE)?;
        if start_date > end_date {
            return Err(ArbError::InvalidDateRange {
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        }

        let workers = match get(&["ARB_WORKERS"]) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) => return Err(ArbError::Config("ARB_WORKERS must be at least 1".into())),
                Ok(n) => n,
                Err(e) => {
                    return Err(ArbError::Config(format!("ARB_WORKERS={raw:?}: {e}")));
                }
            },
            None => std::thread::available_parallelism().map_or(1, |n| n.get()),
        };

        Ok(Self {
            data_dir: dir(&["LOCAL_DATA_DIR"], "_data"),
            manual_data_dir: dir(&["MANUAL_DATA_DIR", "LOCAL_MANUAL_DATA_DIR"], "data_manual"),
            output_dir: dir(&["OUTPUT_DIR"], "_output"),
            publish_dir: dir(&["PUBLISH_DIR", "LOCAL_PUBLISH_DIR"], "_output/publish"),
            input_dir: dir(&["INPUT_DIR", "LOCAL_INPUT_DIR"], "_data/input"),
            processed_dir: dir(&["PROCESSED_DIR", "LOCAL_PROCESSED_DIR"], "_data/processed"),
            temp_dir: dir(&["TEMP_DIR", "LOCAL_TEMP_DIR"], "_output/temp"),
            reports_dir: dir(&["REPORTS_DIR"], "reports"),
            plots_dir: dir(&["PLOTS_DIR"], "reports/plots"),
            tables_dir: dir(&["TABLES_DIR"], "reports/tables"),
            base_dir,
            start_date,
            end_date,
            workers,
        })
    }

    /// All configured directories.
    pub fn dirs(&self) -> [&Path; 10] {
        [
            &self.data_dir,
            &self.manual_data_dir,
            &self.output_dir,
            &self.publish_dir,
            &self.input_dir,
            &self.processed_dir,
            &self.temp_dir,
            &self.reports_dir,
            &self.plots_dir,
            &self.tables_dir,
        ]
    }

    /// Create every configured directory that does not exist yet.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in self.dirs() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Location of the pipeline state file.
    pub fn state_file(&self) -> PathBuf {
        self.base_dir.join(".arb-spreads-state.json")
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn parse_date(key: &str, raw: Option<String>, default: &str) -> Result<NaiveDate> {
    let raw = raw.unwrap_or_else(|| default.to_string());
    // Accept a trailing time component, e.g. "2024-01-01 00:00:00".
    let day = raw.trim().get(..10).unwrap_or(raw.trim());
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| ArbError::Config(format!("{key}={raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults_resolve_against_base_dir() {
        let s = settings(&[("LOCAL_BASE_DIR", "/srv/project")]).unwrap();

        assert_eq!(s.base_dir, PathBuf::from("/srv/project"));
        assert_eq!(s.data_dir, PathBuf::from("/srv/project/_data"));
        assert_eq!(s.manual_data_dir, PathBuf::from("/srv/project/data_manual"));
        assert_eq!(s.processed_dir, PathBuf::from("/srv/project/_data/processed"));
        assert_eq!(s.start_date, NaiveDate::from_ymd_opt(1913, 1, 1).unwrap());
        assert_eq!(s.end_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(s.workers >= 1);
    }

    #[test]
    fn test_absolute_override_and_alias() {
        let s = settings(&[
            ("LOCAL_BASE_DIR", "/srv/project"),
            ("LOCAL_DATA_DIR", "/mnt/data"),
            ("LOCAL_MANUAL_DATA_DIR", "manual"),
            ("ARB_WORKERS", "3"),
        ])
        .unwrap();

        assert_eq!(s.data_dir, PathBuf::from("/mnt/data"));
        assert_eq!(s.manual_data_dir, PathBuf::from("/srv/project/manual"));
        assert_eq!(s.workers, 3);
    }

    #[test]
    fn test_date_with_time_component() {
        let s = settings(&[
            ("LOCAL_BASE_DIR", "/srv/project"),
            ("END_DATE", "2025-03-31 00:00:00"),
        ])
        .unwrap();
        assert_eq!(s.end_date, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = settings(&[
            ("LOCAL_BASE_DIR", "/srv/project"),
            ("START_DATE", "2024-01-01"),
            ("END_DATE", "2020-01-01"),
        ])
        .unwrap_err();
        assert!(matches!(err, ArbError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_bad_worker_count_rejected() {
        for raw in ["0", "many"] {
            let err = settings(&[("LOCAL_BASE_DIR", "/srv/project"), ("ARB_WORKERS", raw)])
                .unwrap_err();
            assert!(matches!(err, ArbError::Config(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn test_create_dirs_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_string_lossy().to_string();
        let s = settings(&[("LOCAL_BASE_DIR", base.as_str())]).unwrap();

        s.create_dirs().unwrap();
        s.create_dirs().unwrap();

        for dir in s.dirs() {
            assert!(dir.is_dir(), "{} missing", dir.display());
        }
    }
}

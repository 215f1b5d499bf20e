//! Persisted record of the inputs each task last ran against.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::warn;

/// Size and modification time of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSignature {
    /// Length in bytes
    pub len: u64,
    /// Modification time, nanoseconds since the Unix epoch
    pub modified_ns: u64,
}

impl FileSignature {
    /// Signature of `path`, or `None` if it cannot be read.
    pub fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        let modified = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
        Some(Self {
            len: meta.len(),
            modified_ns: u64::try_from(modified.as_nanos()).unwrap_or(u64::MAX),
        })
    }
}

/// What a task ran against.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TaskRecord {
    deps: BTreeMap<PathBuf, FileSignature>,
    #[serde(default)]
    config: BTreeMap<String, String>,
}

/// Dependency signatures and configuration values recorded per task after a
/// successful run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    tasks: BTreeMap<String, TaskRecord>,
}

impl TaskState {
    /// Load state from `path`; a missing or unreadable file yields empty state.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring corrupt pipeline state");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist state to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Record the current signatures of `deps` and the `config` values for `task`.
    pub fn record(&mut self, task: &str, deps: &[PathBuf], config: &BTreeMap<String, String>) {
        let deps = deps
            .iter()
            .filter_map(|dep| FileSignature::of(dep).map(|sig| (dep.clone(), sig)))
            .collect();
        self.tasks.insert(
            task.to_string(),
            TaskRecord {
                deps,
                config: config.clone(),
            },
        );
    }

    /// Whether every dependency and config value still matches what was
    /// recorded for `task`.
    pub fn unchanged(&self, task: &str, deps: &[PathBuf], config: &BTreeMap<String, String>) -> bool {
        let Some(recorded) = self.tasks.get(task) else {
            return false;
        };
        recorded.config == *config
            && deps.iter().all(|dep| match FileSignature::of(dep) {
                Some(current) => recorded.deps.get(dep) == Some(&current),
                None => false,
            })
    }

    /// Drop the record for `task`.
    pub fn forget(&mut self, task: &str) {
        self.tasks.remove(task);
    }
}

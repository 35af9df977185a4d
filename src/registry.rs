//! Registry of watched paths with their flags and statistics.
//!
//! The registry is the in-memory owner of every [`WatchedPath`]. It is shared
//! between the supervisor (monitoring flags), the event publisher (stats) and
//! the command surface (add/remove/list).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

/// Per-path counters, serialized with the keys the settings UI expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStats {
    #[serde(default)]
    pub files_organized: u64,
    #[serde(default)]
    pub last_organized: Option<String>,
    #[serde(default)]
    pub monitoring_since: Option<String>,
}

/// A configured root directory eligible for organize and monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedPath {
    pub id: String,
    pub path: PathBuf,
    pub name: String,
    #[serde(default)]
    pub is_monitoring: bool,
    #[serde(default)]
    pub auto_organize: bool,
    #[serde(default)]
    pub stats: PathStats,
}

/// Stable id for a directory: first 12 hex digits of the SHA-256 of its path.
pub fn path_id(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    digest
        .iter()
        .take(6)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

/// Thread-safe store of watched paths keyed by id, in insertion order.
#[derive(Debug, Default)]
pub struct PathRegistry {
    entries: RwLock<IndexMap<String, WatchedPath>>,
}

impl PathRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load persisted entries.
    ///
    /// Monitoring is never resumed from persisted state: every entry starts
    /// Stopped with `monitoringSince` cleared.
    pub fn from_paths(paths: impl IntoIterator<Item = WatchedPath>) -> EngineResult<Self> {
        let registry = Self::new();
        for mut entry in paths {
            entry.is_monitoring = false;
            entry.stats.monitoring_since = None;
            registry.insert(entry)?;
        }
        Ok(registry)
    }

    /// Register a directory. The path is canonicalized and must be a directory.
    pub fn add(&self, path: &Path, name: Option<&str>) -> EngineResult<WatchedPath> {
        let canonical = path
            .canonicalize()
            .map_err(|e| EngineError::from_io(path, e))?;
        if !canonical.is_dir() {
            return Err(EngineError::config(format!(
                "{} is not a directory",
                canonical.display()
            )));
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => canonical
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| canonical.display().to_string()),
        };

        let entry = WatchedPath {
            id: path_id(&canonical),
            path: canonical,
            name,
            is_monitoring: false,
            auto_organize: false,
            stats: PathStats::default(),
        };
        self.insert(entry.clone())?;
        Ok(entry)
    }

    /// Insert a fully formed entry, rejecting duplicate ids and directories.
    pub fn insert(&self, entry: WatchedPath) -> EngineResult<()> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries
            .values()
            .find(|e| e.id == entry.id || e.path == entry.path)
        {
            return Err(EngineError::DuplicatePath {
                path: entry.path,
                id: existing.id.clone(),
            });
        }
        entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Remove a path from the registry.
    pub fn remove(&self, id: &str) -> Option<WatchedPath> {
        self.entries.write().shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<WatchedPath> {
        self.entries.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Entry whose root is `path` (compared after canonicalization when possible).
    pub fn find_by_path(&self, path: &Path) -> Option<WatchedPath> {
        let wanted = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.entries
            .read()
            .values()
            .find(|e| e.path == wanted)
            .cloned()
    }

    /// Look up by id first, then by directory.
    pub fn resolve(&self, id_or_path: &str) -> Option<WatchedPath> {
        self.get(id_or_path)
            .or_else(|| self.find_by_path(Path::new(id_or_path)))
    }

    /// Snapshot of every entry in insertion order.
    pub fn list(&self) -> Vec<WatchedPath> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Flip the monitoring flag, stamping or clearing `monitoringSince`.
    pub fn set_monitoring(&self, id: &str, active: bool) -> EngineResult<WatchedPath> {
        self.modify(id, |entry| {
            entry.is_monitoring = active;
            entry.stats.monitoring_since = active.then(|| timestamp(Utc::now()));
        })
    }

    pub fn set_auto_organize(&self, id: &str, enabled: bool) -> EngineResult<WatchedPath> {
        self.modify(id, |entry| entry.auto_organize = enabled)
    }

    /// Count `moved` files against `id` and stamp `lastOrganized`.
    ///
    /// Returns false when the id is not registered (e.g. removed mid-run).
    pub fn record_organized(&self, id: &str, moved: u64, at: DateTime<Utc>) -> bool {
        let mut entries = self.entries.write();
        match entries.get_mut(id) {
            Some(entry) => {
                entry.stats.files_organized += moved;
                entry.stats.last_organized = Some(timestamp(at));
                true
            }
            None => false,
        }
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut WatchedPath)) -> EngineResult<WatchedPath> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownPath { id: id.to_string() })?;
        f(entry);
        Ok(entry.clone())
    }
}

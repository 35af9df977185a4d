//! Conflict-safe file moves.
//!
//! Every move made by the engine, whether from a batch organize, a watcher, or
//! an undo, goes through [`MoveEngine`]. The engine never overwrites an
//! existing file: when the wanted name is taken it appends ` (1)`, ` (2)`, ...
//! before the extension until a free name is found or the attempt budget runs
//! out.
//!
//! Name resolution and placement for one destination directory happen under a
//! per-directory mutex. Placement itself is no-clobber (hard link, then unlink
//! the source) so a file that appears from outside the engine between the
//! check and the move is not overwritten either; the search simply continues.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Result of a single move through the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    /// Where the file ended up.
    pub resolved_path: PathBuf,
    /// True when a ` (n)` suffix had to be added.
    pub renamed: bool,
}

/// A classified file that was moved into its category folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub original_path: PathBuf,
    pub resolved_destination_path: PathBuf,
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

impl MoveOutcome {
    pub fn new(original_path: PathBuf, result: &MoveResult, category: impl Into<String>) -> Self {
        Self {
            original_path,
            resolved_destination_path: result.resolved_path.clone(),
            category: category.into(),
            timestamp: Utc::now(),
        }
    }
}

/// `name (n).ext` for attempt `n`; attempt 0 is the name unchanged.
///
/// The suffix goes before the last extension, so `a.tar.gz` becomes
/// `a.tar (1).gz`. Names without an extension (including dot-files such as
/// `.env`) get the suffix at the end.
pub fn candidate_name(file_name: &OsStr, attempt: usize) -> OsString {
    if attempt == 0 {
        return file_name.to_os_string();
    }
    let path = Path::new(file_name);
    let stem = path.file_stem().unwrap_or(file_name);
    let mut name = stem.to_os_string();
    name.push(format!(" ({attempt})"));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// First free destination for `file_name` in `dest_dir`.
///
/// Pure over the occupancy predicate: callers pass a directory snapshot or a
/// live existence check. Returns `None` once `max_attempts` names were taken.
pub fn resolve_destination(
    dest_dir: &Path,
    file_name: &OsStr,
    max_attempts: usize,
    mut is_taken: impl FnMut(&Path) -> bool,
) -> Option<PathBuf> {
    (0..max_attempts)
        .map(|attempt| dest_dir.join(candidate_name(file_name, attempt)))
        .find(|candidate| !is_taken(candidate))
}

/// Paths the engine wrote recently, so watchers can ignore their own echo.
#[derive(Debug)]
struct RecentWrites {
    window: Duration,
    entries: Mutex<HashMap<PathBuf, Instant>>,
}

impl RecentWrites {
    fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn record(&self, path: PathBuf) {
        let mut entries = self.entries.lock();
        self.prune(&mut entries);
        entries.insert(path, Instant::now());
    }

    fn forget(&self, path: &Path) {
        self.entries.lock().remove(path);
    }

    fn contains(&self, path: &Path) -> bool {
        let mut entries = self.entries.lock();
        self.prune(&mut entries);
        entries.contains_key(path)
    }

    fn prune(&self, entries: &mut HashMap<PathBuf, Instant>) {
        let window = self.window;
        entries.retain(|_, at| at.elapsed() < window);
    }
}

/// Moves files without ever overwriting, serialized per destination directory.
#[derive(Debug)]
pub struct MoveEngine {
    dir_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    recent: RecentWrites,
    max_attempts: usize,
}

impl MoveEngine {
    pub fn new(max_attempts: usize, suppress_window: Duration) -> Self {
        Self {
            dir_locks: DashMap::new(),
            recent: RecentWrites::new(suppress_window),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.max_collision_attempts,
            Duration::from_millis(config.suppress_ms),
        )
    }

    /// Move `source` into `dest_dir`, keeping its file name when free.
    pub fn move_into(&self, source: &Path, dest_dir: &Path) -> EngineResult<MoveResult> {
        let file_name = source.file_name().ok_or_else(|| EngineError::Io {
            path: source.to_path_buf(),
            source: io::Error::new(ErrorKind::InvalidInput, "path has no file name"),
        })?;
        self.move_as(source, dest_dir, file_name)
    }

    /// Move `source` into `dest_dir` under `file_name` (or a suffixed variant).
    ///
    /// Used by undo to put a file back under its original name.
    pub fn move_as(
        &self,
        source: &Path,
        dest_dir: &Path,
        file_name: &OsStr,
    ) -> EngineResult<MoveResult> {
        let metadata = fs::symlink_metadata(source).map_err(|e| EngineError::from_io(source, e))?;
        if metadata.is_dir() {
            return Err(EngineError::Io {
                path: source.to_path_buf(),
                source: io::Error::new(ErrorKind::InvalidInput, "only files can be moved"),
            });
        }

        fs::create_dir_all(dest_dir).map_err(|e| EngineError::from_io(dest_dir, e))?;
        let dest_dir = dest_dir
            .canonicalize()
            .map_err(|e| EngineError::from_io(dest_dir, e))?;

        let lock = self.lock_for(&dest_dir);
        let result = {
            let _guard = lock.lock();
            self.place_unique(source, &dest_dir, file_name)
        };
        self.release_lock(&dest_dir, lock);
        result
    }

    /// Pick a free name in `dest_dir` and put `source` there.
    ///
    /// Caller holds the lock for `dest_dir`.
    fn place_unique(
        &self,
        source: &Path,
        dest_dir: &Path,
        file_name: &OsStr,
    ) -> EngineResult<MoveResult> {
        // Already where it should be
        let source_dir = source.parent().and_then(|p| p.canonicalize().ok());
        if source_dir.as_deref() == Some(dest_dir) && source.file_name() == Some(file_name) {
            return Ok(MoveResult {
                resolved_path: dest_dir.join(file_name),
                renamed: false,
            });
        }

        let mut raced: HashSet<PathBuf> = HashSet::new();
        loop {
            let candidate = resolve_destination(dest_dir, file_name, self.max_attempts, |p| {
                raced.contains(p) || fs::symlink_metadata(p).is_ok()
            })
            .ok_or_else(|| EngineError::CollisionExhausted {
                dir: dest_dir.to_path_buf(),
                name: file_name.to_string_lossy().to_string(),
                attempts: self.max_attempts,
            })?;

            // Recorded before the file appears so watchers never see it unmarked
            self.recent.record(candidate.clone());
            match place(source, &candidate) {
                Ok(()) => {
                    let renamed = candidate.file_name() != Some(file_name);
                    crate::debug_event!(
                        "mover",
                        "moved",
                        "{} -> {}",
                        source.display(),
                        candidate.display()
                    );
                    return Ok(MoveResult {
                        resolved_path: candidate,
                        renamed,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    // Someone outside the engine took the name meanwhile
                    crate::debug_event!("mover", "raced", "{}", candidate.display());
                    self.recent.forget(&candidate);
                    raced.insert(candidate);
                }
                Err(e) => {
                    self.recent.forget(&candidate);
                    return Err(EngineError::from_io(source, e));
                }
            }
        }
    }

    /// Whether `path` was written by this engine within the suppression window.
    pub fn recently_written(&self, path: &Path) -> bool {
        self.recent.contains(path)
    }

    fn lock_for(&self, dir: &Path) -> Arc<Mutex<()>> {
        self.dir_locks
            .entry(dir.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map's lock for `dir` once no other move holds a handle to it.
    fn release_lock(&self, dir: &Path, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.dir_locks
            .remove_if(dir, |_, held| Arc::strong_count(held) == 1);
    }
}

/// Put `source` at `target` without overwriting.
///
/// Hard link + unlink fails with `AlreadyExists` when `target` is taken.
/// Filesystems without hard links fall back to rename (the caller holds the
/// directory lock and checked the name), and cross-device moves to an
/// exclusive-create copy.
fn place(source: &Path, target: &Path) -> io::Result<()> {
    match fs::hard_link(source, target) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(source) {
                let _ = fs::remove_file(target);
                return Err(e);
            }
            Ok(())
        }
        Err(e) if matches!(e.kind(), ErrorKind::AlreadyExists | ErrorKind::NotFound) => Err(e),
        Err(_) => match fs::rename(source, target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::CrossesDevices => copy_then_remove(source, target),
            Err(e) => Err(e),
        },
    }
}

fn copy_then_remove(source: &Path, target: &Path) -> io::Result<()> {
    let mut reader = File::open(source)?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    drop(writer);
    if let Err(e) = copied {
        let _ = fs::remove_file(target);
        return Err(e);
    }

    if let Ok(meta) = reader.metadata() {
        let _ = fs::set_permissions(target, meta.permissions());
    }

    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(target);
        return Err(e);
    }
    Ok(())
}

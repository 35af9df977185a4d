//! Watcher for a single monitored directory.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::debouncer::Debouncer;
use crate::error::{EngineError, EngineResult};
use crate::events::MoveSource;
use crate::organizer::BatchOrganizer;

/// Handle to a running [`DirectoryWatcher`] task.
#[derive(Debug)]
pub struct WatchHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Ask the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the watcher and wait until the OS watch is released.
    ///
    /// A move already in progress is allowed to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("[watcher] task ended abnormally: {e}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Non-recursive watch over one root that organizes files once they settle.
pub struct DirectoryWatcher {
    path_id: String,
    root: PathBuf,
    organizer: BatchOrganizer,
    debouncer: Debouncer,
    /// Declared before `_watcher` so it drops first and unblocks the callback.
    events: mpsc::Receiver<notify::Result<Event>>,
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Register the OS watch for `root`.
    ///
    /// Fails with `WatchSetupFailed` when `root` is not a directory or the
    /// platform refuses the watch.
    pub fn new(
        path_id: impl Into<String>,
        root: impl Into<PathBuf>,
        organizer: BatchOrganizer,
    ) -> EngineResult<Self> {
        let root = root.into();
        let setup_failed = |reason: String| EngineError::WatchSetupFailed {
            path: root.clone(),
            reason,
        };

        if !root.is_dir() {
            return Err(setup_failed("not an existing directory".to_string()));
        }

        let config = organizer.config();
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let debouncer = Debouncer::new(std::time::Duration::from_millis(config.debounce_ms));

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })
        .map_err(|e| setup_failed(e.to_string()))?;
        watcher
            .watch(&root, RecursiveMode::NonRecursive)
            .map_err(|e| setup_failed(e.to_string()))?;

        Ok(Self {
            path_id: path_id.into(),
            root,
            organizer,
            debouncer,
            events: rx,
            _watcher: watcher,
        })
    }

    /// Run the watcher on the current Tokio runtime.
    ///
    /// `on_fatal` is invoked from the task, after the OS watch has been
    /// dropped, if the watcher ends with an error rather than a stop request.
    pub fn spawn(self, on_fatal: impl FnOnce(EngineError) + Send + 'static) -> WatchHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = self.run(token).await {
                on_fatal(e);
            }
        });
        WatchHandle { cancel, task }
    }

    async fn run(mut self, cancel: CancellationToken) -> EngineResult<()> {
        crate::log_event!("watcher", "started", "{}", self.root.display());

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                received = self.events.recv() => match received {
                    Some(Ok(event)) => self.handle_event(event)?,
                    Some(Err(e)) => {
                        self.ensure_root()?;
                        tracing::warn!("[watcher] {}: {e}", self.root.display());
                    }
                    None => {
                        return Err(EngineError::WatchSetupFailed {
                            path: self.root.clone(),
                            reason: "event stream closed".to_string(),
                        });
                    }
                },

                ready = self.debouncer.ready(), if self.debouncer.has_pending() => {
                    for path in ready {
                        self.organize(path).await?;
                    }
                }
            }
        }

        crate::log_event!("watcher", "stopped", "{}", self.root.display());
        Ok(())
    }

    fn ensure_root(&self) -> EngineResult<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(EngineError::WatchSetupFailed {
                path: self.root.clone(),
                reason: "watched directory was removed".to_string(),
            })
        }
    }

    fn handle_event(&mut self, event: Event) -> EngineResult<()> {
        if event.paths.iter().any(|p| p == &self.root) {
            self.ensure_root()?;
        }

        match event.kind {
            EventKind::Create(_) => {
                for path in &event.paths {
                    self.track(path);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [from, to, ..] = event.paths.as_slice() {
                    self.untrack(from);
                    self.track(to);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
                for path in &event.paths {
                    self.untrack(path);
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                for path in &event.paths {
                    if path.exists() {
                        self.track(path);
                    } else {
                        self.untrack(path);
                    }
                }
            }
            EventKind::Modify(_) => {
                for path in &event.paths {
                    self.debouncer.touch(path);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Start debouncing a file that appeared directly under the root.
    fn track(&mut self, path: &Path) {
        if path.parent() != Some(self.root.as_path()) {
            return;
        }
        if self.organizer.mover().recently_written(path) {
            crate::debug_event!("watcher", "suppressed", "{}", path.display());
            return;
        }
        let Ok(meta) = path.symlink_metadata() else {
            return;
        };
        if !meta.is_file() {
            return;
        }
        let ignored = path
            .file_name()
            .map(|n| self.organizer.config().is_ignored(&n.to_string_lossy()))
            .unwrap_or(true);
        if ignored {
            crate::debug_event!("watcher", "ignored", "{}", path.display());
            return;
        }

        crate::debug_event!("watcher", "pending", "{}", path.display());
        self.debouncer.record(path.to_path_buf());
    }

    fn untrack(&mut self, path: &Path) {
        if self.debouncer.remove(path) {
            crate::debug_event!("watcher", "dropped", "{}", path.display());
        }
    }

    async fn organize(&self, path: PathBuf) -> EngineResult<()> {
        self.ensure_root()?;
        if self.organizer.mover().recently_written(&path) {
            crate::debug_event!("watcher", "suppressed", "{}", path.display());
            return Ok(());
        }

        let organizer = self.organizer.clone();
        let root = self.root.clone();
        let path_id = self.path_id.clone();
        let file = path.clone();
        let result = tokio::task::spawn_blocking(move || {
            organizer.organize_file(&root, Some(path_id.as_str()), &file, MoveSource::Monitoring)
        })
        .await;

        match result {
            Ok(Ok(Some(outcome))) => crate::log_event!(
                "watcher",
                "organized",
                "{} -> {}",
                path.display(),
                outcome.resolved_destination_path.display()
            ),
            Ok(Ok(None)) => {}
            Ok(Err(EngineError::NotFound { .. })) => {
                crate::debug_event!("watcher", "gone before move", "{}", path.display());
            }
            Ok(Err(e)) => {
                tracing::warn!("[watcher] {}: {e}", path.display());
                self.organizer.publisher().publish_failure(
                    Some(self.path_id.as_str()),
                    &path,
                    &e.to_string(),
                );
            }
            Err(e) => tracing::error!("[watcher] move task failed: {e}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{CategoryClassifier, CategoryRules};
    use crate::config::EngineConfig;
    use crate::events::{EngineEvent, EventPublisher};
    use crate::mover::MoveEngine;
    use crate::registry::PathRegistry;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn organizer() -> BatchOrganizer {
        let mut rules = CategoryRules::new("Other");
        rules.add_category("Images", ["jpg"]).unwrap();
        let config = Arc::new(EngineConfig {
            debounce_ms: 100,
            ..EngineConfig::default()
        });
        BatchOrganizer::new(
            Arc::new(CategoryClassifier::new(rules)),
            Arc::new(MoveEngine::from_config(&config)),
            EventPublisher::new(Arc::new(PathRegistry::new()), 16),
            config,
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_new_file_is_organized() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let organizer = organizer();
        let mut rx = organizer.publisher().subscribe();

        let watcher = DirectoryWatcher::new("p1", &root, organizer).unwrap();
        let handle = watcher.spawn(|e| panic!("unexpected fatal error: {e}"));

        fs::write(root.join("shot.jpg"), "jpg").unwrap();

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            EngineEvent::FileOrganized { source, details, .. } => {
                assert_eq!(source, MoveSource::Monitoring);
                assert_eq!(details.actual_file_name, "shot.jpg");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(root.join("Images").join("shot.jpg").exists());

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_missing_root_fails_setup() {
        let temp = TempDir::new().unwrap();
        let err = DirectoryWatcher::new("p1", temp.path().join("nope"), organizer())
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::WatchSetupFailed { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_joins_task() {
        let temp = TempDir::new().unwrap();
        let watcher = DirectoryWatcher::new("p1", temp.path(), organizer()).unwrap();
        let handle = watcher.spawn(|_| {});
        assert!(!handle.is_finished());
        timeout(Duration::from_secs(2), handle.stop()).await.unwrap();
    }
}

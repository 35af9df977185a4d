//! Command surface over the organizer components.
//!
//! [`Engine`] wires the classifier, registry, mover, publisher and supervisor
//! together and is what front ends (the CLI, a settings UI) talk to. Blocking
//! filesystem work is pushed onto Tokio's blocking pool.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::category::{CategoryClassifier, CategoryRules};
use crate::config::Settings;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventPublisher};
use crate::library::Library;
use crate::mover::MoveEngine;
use crate::organizer::{BatchOrganizer, OrganizeReport};
use crate::registry::{PathRegistry, WatchedPath};
use crate::watcher::{MonitorState, MonitorSupervisor};

/// Result of putting a moved file back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoOutcome {
    pub resolved_path: PathBuf,
    /// True when the original name was taken and a ` (n)` suffix was used.
    pub renamed: bool,
}

pub struct Engine {
    settings: Settings,
    classifier: Arc<CategoryClassifier>,
    registry: Arc<PathRegistry>,
    organizer: BatchOrganizer,
    supervisor: MonitorSupervisor,
}

impl Engine {
    /// Build an engine from settings, a validated rule table and the known paths.
    pub fn new(settings: Settings, rules: CategoryRules, registry: PathRegistry) -> Self {
        let config = Arc::new(settings.engine.clone());
        let registry = Arc::new(registry);
        let classifier = Arc::new(CategoryClassifier::new(rules));
        let mover = Arc::new(MoveEngine::from_config(&config));
        let publisher = EventPublisher::new(Arc::clone(&registry), config.event_capacity);
        let organizer = BatchOrganizer::new(
            Arc::clone(&classifier),
            mover,
            publisher,
            Arc::clone(&config),
        );
        let supervisor = MonitorSupervisor::new(Arc::clone(&registry), organizer.clone());

        Self {
            settings,
            classifier,
            registry,
            organizer,
            supervisor,
        }
    }

    /// Build an engine from the persisted library document.
    pub fn from_library(settings: Settings, library: &Library) -> EngineResult<Self> {
        let rules = library.rules(&settings.engine.fallback_category)?;
        let registry = library.registry()?;
        Ok(Self::new(settings, rules, registry))
    }

    /// Current state as a library document, ready to be saved.
    pub fn library(&self) -> Library {
        Library {
            categories: self.classifier.snapshot().to_map(),
            paths: self.registry.list(),
            ..Library::with_defaults(&self.settings.engine.fallback_category)
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ---- organize / undo ----

    /// Organize the direct children of `path`.
    ///
    /// When `path` is a registered root, its stats are updated as files move.
    pub async fn organize(&self, path: impl AsRef<Path>) -> EngineResult<OrganizeReport> {
        let root = path.as_ref().to_path_buf();
        let path_id = self.registry.find_by_path(&root).map(|entry| entry.id);
        self.organize_blocking(root, path_id).await
    }

    /// Organize a registered path by id.
    pub async fn organize_id(&self, path_id: &str) -> EngineResult<OrganizeReport> {
        let entry = self.path(path_id)?;
        self.organize_blocking(entry.path, Some(entry.id)).await
    }

    async fn organize_blocking(
        &self,
        root: PathBuf,
        path_id: Option<String>,
    ) -> EngineResult<OrganizeReport> {
        let organizer = self.organizer.clone();
        tokio::task::spawn_blocking(move || organizer.organize(&root, path_id.as_deref()))
            .await
            .map_err(|e| EngineError::config(format!("organize task failed: {e}")))?
    }

    /// Move `source_path` back to `target_path`.
    ///
    /// If `target_path` is occupied the file is restored under a suffixed
    /// name and `renamed` is set. Never overwrites.
    pub async fn undo_move(
        &self,
        source_path: impl AsRef<Path>,
        target_path: impl AsRef<Path>,
    ) -> EngineResult<UndoOutcome> {
        let source = source_path.as_ref().to_path_buf();
        let target = target_path.as_ref().to_path_buf();
        let (Some(dir), Some(name)) = (target.parent(), target.file_name()) else {
            return Err(EngineError::config(format!(
                "undo target {} has no file name",
                target.display()
            )));
        };
        let dir = dir.to_path_buf();
        let name = name.to_os_string();

        let mover = Arc::clone(self.organizer.mover());
        let result = tokio::task::spawn_blocking(move || mover.move_as(&source, &dir, &name))
            .await
            .map_err(|e| EngineError::config(format!("undo task failed: {e}")))??;

        crate::log_event!(
            "undo",
            "restored",
            "{}{}",
            result.resolved_path.display(),
            if result.renamed { " (renamed)" } else { "" }
        );
        Ok(UndoOutcome {
            resolved_path: result.resolved_path,
            renamed: result.renamed,
        })
    }

    // ---- monitoring ----

    /// Flip monitoring for `path_id`; returns true when now monitoring.
    pub async fn toggle_monitoring(&self, path_id: &str) -> EngineResult<bool> {
        Ok(self.supervisor.toggle(path_id).await?.is_active())
    }

    pub fn start_monitoring(&self, path_id: &str) -> EngineResult<MonitorState> {
        self.supervisor.start(path_id)
    }

    pub async fn stop_monitoring(&self, path_id: &str) -> EngineResult<MonitorState> {
        self.supervisor.stop(path_id).await
    }

    pub fn monitor_state(&self, path_id: &str) -> MonitorState {
        self.supervisor.state(path_id)
    }

    /// When the current watcher for `path_id` was started, if one is live.
    pub fn monitoring_since(&self, path_id: &str) -> Option<DateTime<Utc>> {
        self.supervisor.started_at(path_id)
    }

    /// Number of live watchers.
    pub fn active_watchers(&self) -> usize {
        self.supervisor.active_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.organizer.publisher().subscribe()
    }

    /// Stop every watcher and wait for them to exit.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }

    // ---- watched paths ----

    pub fn add_path(&self, path: impl AsRef<Path>, name: Option<&str>) -> EngineResult<WatchedPath> {
        let entry = self.registry.add(path.as_ref(), name)?;
        crate::log_event!("paths", "added", "{} {}", entry.id, entry.path.display());
        Ok(entry)
    }

    /// Remove a path, stopping its watcher first.
    pub async fn remove_path(&self, path_id: &str) -> EngineResult<WatchedPath> {
        self.supervisor.stop(path_id).await?;
        self.registry
            .remove(path_id)
            .ok_or_else(|| EngineError::UnknownPath {
                id: path_id.to_string(),
            })
    }

    pub fn set_auto_organize(&self, path_id: &str, enabled: bool) -> EngineResult<WatchedPath> {
        self.registry.set_auto_organize(path_id, enabled)
    }

    pub fn path(&self, path_id: &str) -> EngineResult<WatchedPath> {
        self.registry
            .get(path_id)
            .ok_or_else(|| EngineError::UnknownPath {
                id: path_id.to_string(),
            })
    }

    /// Look a path up by id or by directory.
    pub fn resolve_path(&self, id_or_path: &str) -> Option<WatchedPath> {
        self.registry.resolve(id_or_path)
    }

    pub fn paths(&self) -> Vec<WatchedPath> {
        self.registry.list()
    }

    // ---- category rules ----

    pub fn classify(&self, file_name: &str) -> String {
        self.classifier.classify(file_name)
    }

    pub fn rules(&self) -> CategoryRules {
        self.classifier.snapshot()
    }

    pub fn add_category(&self, name: &str, extensions: &[String]) -> EngineResult<()> {
        self.classifier
            .update(|rules| rules.add_category(name, extensions))
    }

    pub fn set_extensions(&self, name: &str, extensions: &[String]) -> EngineResult<()> {
        self.classifier
            .update(|rules| rules.set_extensions(name, extensions))
    }

    pub fn remove_category(&self, name: &str) -> EngineResult<bool> {
        self.classifier.update(|rules| rules.remove_category(name))
    }

    pub fn add_extension(&self, category: &str, extension: &str) -> EngineResult<()> {
        self.classifier
            .update(|rules| rules.add_extension(category, extension))
    }

    pub fn remove_extension(&self, category: &str, extension: &str) -> EngineResult<bool> {
        self.classifier
            .update(|rules| rules.remove_extension(category, extension))
    }
}

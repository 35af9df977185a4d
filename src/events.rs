//! Outbound notifications and stat updates.
//!
//! Every moved file, whether from a batch organize or a watcher, goes through
//! [`EventPublisher::publish`]. It updates the owning path's stats first, then
//! broadcasts a `file-organized` event to whoever subscribed. Delivery is best
//! effort: a slow subscriber lags and loses events, the engine never waits.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::mover::MoveOutcome;
use crate::registry::PathRegistry;

/// Who triggered a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveSource {
    Manual,
    Monitoring,
}

/// Payload of a `file-organized` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOrganizedEvent {
    /// Name the file had before the move
    pub file_name: String,
    /// Name it has now; differs when a ` (n)` suffix was added
    pub actual_file_name: String,
    pub category: String,
    /// RFC 3339
    pub timestamp: String,
    /// Watched root the file was organized in
    pub folder_path: PathBuf,
    pub original_path: PathBuf,
    pub moved_to_path: PathBuf,
}

impl FileOrganizedEvent {
    pub fn from_outcome(outcome: &MoveOutcome, folder_path: &Path) -> Self {
        let name_of = |p: &Path| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        };
        Self {
            file_name: name_of(&outcome.original_path),
            actual_file_name: name_of(&outcome.resolved_destination_path),
            category: outcome.category.clone(),
            timestamp: outcome.timestamp.to_rfc3339(),
            folder_path: folder_path.to_path_buf(),
            original_path: outcome.original_path.clone(),
            moved_to_path: outcome.resolved_destination_path.clone(),
        }
    }
}

/// Undo-history record derived from a single move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub original_path: PathBuf,
    pub resolved_destination_path: PathBuf,
    pub category: String,
    pub timestamp: String,
    pub source: MoveSource,
}

impl HistoryEntry {
    pub fn from_outcome(outcome: &MoveOutcome, source: MoveSource) -> Self {
        Self {
            original_path: outcome.original_path.clone(),
            resolved_destination_path: outcome.resolved_destination_path.clone(),
            category: outcome.category.clone(),
            timestamp: outcome.timestamp.to_rfc3339(),
            source,
        }
    }
}

/// Everything the engine tells its subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    FileOrganized {
        path_id: Option<String>,
        source: MoveSource,
        #[serde(flatten)]
        details: FileOrganizedEvent,
    },
    OrganizeFailed {
        path_id: Option<String>,
        file: PathBuf,
        error: String,
    },
    MonitoringStopped {
        path_id: String,
        reason: String,
    },
}

impl EngineEvent {
    pub fn path_id(&self) -> Option<&str> {
        match self {
            EngineEvent::FileOrganized { path_id, .. }
            | EngineEvent::OrganizeFailed { path_id, .. } => path_id.as_deref(),
            EngineEvent::MonitoringStopped { path_id, .. } => Some(path_id),
        }
    }
}

/// Broadcasts engine events and keeps per-path stats current.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<EngineEvent>,
    registry: Arc<PathRegistry>,
}

impl EventPublisher {
    pub fn new(registry: Arc<PathRegistry>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, registry }
    }

    /// Record a moved file and notify subscribers.
    ///
    /// `path_id` is `None` for organize runs on directories that are not
    /// registered; those still produce an event but touch no stats.
    pub fn publish(
        &self,
        path_id: Option<&str>,
        folder_path: &Path,
        outcome: &MoveOutcome,
        source: MoveSource,
    ) {
        if let Some(id) = path_id {
            self.registry.record_organized(id, 1, outcome.timestamp);
        }
        self.send(EngineEvent::FileOrganized {
            path_id: path_id.map(str::to_string),
            source,
            details: FileOrganizedEvent::from_outcome(outcome, folder_path),
        });
    }

    pub fn publish_failure(&self, path_id: Option<&str>, file: &Path, error: &str) {
        self.send(EngineEvent::OrganizeFailed {
            path_id: path_id.map(str::to_string),
            file: file.to_path_buf(),
            error: error.to_string(),
        });
    }

    pub fn publish_stopped(&self, path_id: &str, reason: &str) {
        self.send(EngineEvent::MonitoringStopped {
            path_id: path_id.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Subscribe to every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: EngineEvent) {
        match self.sender.send(event) {
            Ok(count) => crate::debug_event!("events", "sent", "to {count} subscribers"),
            // No receivers, this is fine
            Err(_) => crate::debug_event!("events", "dropped", "no subscribers"),
        }
    }
}

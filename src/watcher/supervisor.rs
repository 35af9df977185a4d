//! Start/stop lifecycle of per-path watchers.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::directory::{DirectoryWatcher, WatchHandle};
use crate::error::{EngineError, EngineResult};
use crate::organizer::BatchOrganizer;
use crate::registry::PathRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Stopped,
    Active,
}

impl MonitorState {
    pub fn is_active(self) -> bool {
        self == MonitorState::Active
    }
}

/// A live watcher bound to one watched path.
#[derive(Debug)]
pub struct MonitorSession {
    pub path_id: String,
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Distinguishes this session from a later one for the same path.
    generation: u64,
    handle: WatchHandle,
}

/// Owns every [`MonitorSession`], at most one per path id.
///
/// Must be used from within a Tokio runtime: starting a path spawns its
/// watcher task on the current runtime.
pub struct MonitorSupervisor {
    sessions: Arc<DashMap<String, MonitorSession>>,
    registry: Arc<PathRegistry>,
    organizer: BatchOrganizer,
    generation: AtomicU64,
}

impl MonitorSupervisor {
    pub fn new(registry: Arc<PathRegistry>, organizer: BatchOrganizer) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            registry,
            organizer,
            generation: AtomicU64::new(0),
        }
    }

    /// Start monitoring `path_id`. Starting an active path is a no-op.
    pub fn start(&self, path_id: &str) -> EngineResult<MonitorState> {
        let entry = self
            .registry
            .get(path_id)
            .ok_or_else(|| EngineError::UnknownPath {
                id: path_id.to_string(),
            })?;

        let Entry::Vacant(slot) = self.sessions.entry(path_id.to_string()) else {
            return Ok(MonitorState::Active);
        };

        let watcher = DirectoryWatcher::new(path_id, entry.path.clone(), self.organizer.clone())?;
        self.registry.set_monitoring(path_id, true)?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let handle = watcher.spawn(self.fatal_handler(path_id, generation));

        slot.insert(MonitorSession {
            path_id: path_id.to_string(),
            root: entry.path.clone(),
            started_at: Utc::now(),
            generation,
            handle,
        });

        crate::log_event!("supervisor", "started", "{path_id} {}", entry.path.display());
        Ok(MonitorState::Active)
    }

    /// Stop monitoring `path_id`. Stopping a stopped path is a no-op.
    ///
    /// Returns once the watcher task has exited and its OS watch is released.
    pub async fn stop(&self, path_id: &str) -> EngineResult<MonitorState> {
        let session = self.sessions.remove(path_id).map(|(_, s)| s);
        if session.is_none() && !self.registry.contains(path_id) {
            return Err(EngineError::UnknownPath {
                id: path_id.to_string(),
            });
        }

        if let Some(session) = session {
            session.handle.stop().await;
            crate::log_event!("supervisor", "stopped", "{path_id}");
        }
        if self.registry.contains(path_id) {
            self.registry.set_monitoring(path_id, false)?;
        }
        Ok(MonitorState::Stopped)
    }

    /// Flip the state of `path_id` and return the new one.
    pub async fn toggle(&self, path_id: &str) -> EngineResult<MonitorState> {
        if self.is_active(path_id) {
            self.stop(path_id).await
        } else {
            self.start(path_id)
        }
    }

    pub fn state(&self, path_id: &str) -> MonitorState {
        if self.is_active(path_id) {
            MonitorState::Active
        } else {
            MonitorState::Stopped
        }
    }

    pub fn is_active(&self, path_id: &str) -> bool {
        self.sessions.contains_key(path_id)
    }

    /// Number of live watcher handles.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.key().clone()).collect()
    }

    /// When `path_id` started being monitored, if it is.
    pub fn started_at(&self, path_id: &str) -> Option<DateTime<Utc>> {
        self.sessions.get(path_id).map(|s| s.started_at)
    }

    /// Stop every session and wait for all watchers to exit.
    pub async fn shutdown(&self) {
        let ids = self.active_ids();
        for id in ids {
            if let Err(e) = self.stop(&id).await {
                tracing::warn!("[supervisor] stopping {id}: {e}");
            }
        }
        crate::log_event!("supervisor", "shutdown");
    }

    /// Cleanup run from a watcher task that ended with an error.
    ///
    /// Only the session that spawned the watcher is removed, so a fresh start
    /// of the same path is not torn down by a stale failure.
    fn fatal_handler(
        &self,
        path_id: &str,
        generation: u64,
    ) -> impl FnOnce(EngineError) + Send + 'static {
        let sessions = Arc::clone(&self.sessions);
        let registry = Arc::clone(&self.registry);
        let publisher = self.organizer.publisher().clone();
        let path_id = path_id.to_string();

        move |error| {
            tracing::error!("[supervisor] watcher for {path_id} failed: {error}");
            let removed = sessions
                .remove_if(&path_id, |_, session| session.generation == generation)
                .is_some();
            if removed {
                let _ = registry.set_monitoring(&path_id, false);
                publisher.publish_stopped(&path_id, &error.to_string());
            }
        }
    }
}

impl Drop for MonitorSupervisor {
    fn drop(&mut self) {
        for session in self.sessions.iter() {
            session.handle.cancel();
        }
    }
}

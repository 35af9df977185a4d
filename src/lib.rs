//! Rule-based file organizer for many independently monitored folders.
//!
//! Files are classified by extension into category folders directly under a
//! watched root, either on demand ([`Engine::organize`]) or continuously
//! while monitoring is on ([`Engine::toggle_monitoring`]). Moves never
//! overwrite and can be undone.

pub mod logging;

pub mod category;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod library;
pub mod mover;
pub mod organizer;
pub mod registry;
pub mod watcher;

pub use category::{CategoryClassifier, CategoryRules};
pub use config::{EngineConfig, Settings};
pub use engine::{Engine, UndoOutcome};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventPublisher, FileOrganizedEvent, HistoryEntry, MoveSource};
pub use library::Library;
pub use mover::{MoveEngine, MoveOutcome, MoveResult};
pub use organizer::{BatchOrganizer, FileFailure, OrganizeReport};
pub use registry::{PathRegistry, PathStats, WatchedPath};
pub use watcher::{MonitorState, MonitorSupervisor};

//! Continuous monitoring of watched paths.
//!
//! # Architecture
//!
//! ```text
//! MonitorSupervisor
//!   - DashMap<path id, MonitorSession>
//!         |
//!    +----------+----------+
//!    |          |          |
//! DirectoryWatcher (one tokio task per active path)
//!   - notify::RecommendedWatcher (non-recursive)
//!   - bounded mpsc from the OS callback
//!   - Debouncer (DelayQueue, one deadline per pending file)
//!   - BatchOrganizer::organize_file on stable files
//! ```

mod debouncer;
mod directory;
mod supervisor;

pub use debouncer::Debouncer;
pub use directory::{DirectoryWatcher, WatchHandle};
pub use supervisor::{MonitorSession, MonitorState, MonitorSupervisor};

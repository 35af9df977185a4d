//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod categories;
pub mod classify;
pub mod init;
pub mod organize;
pub mod paths;
pub mod undo;
pub mod watch;

use anyhow::{Result, bail};
use sortify::{Engine, WatchedPath};

/// Registered path named by id or directory.
pub(crate) fn resolve_target(engine: &Engine, target: &str) -> Result<WatchedPath> {
    match engine.resolve_path(target) {
        Some(entry) => Ok(entry),
        None => bail!("'{target}' is not a registered path id or folder (see `sortify paths list`)"),
    }
}

//! Error taxonomy shared by every engine component.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by classification, moving, and monitoring.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Extension '{extension}' is declared by both '{existing}' and '{conflicting}'")]
    ClassificationAmbiguity {
        extension: String,
        existing: String,
        conflicting: String,
    },

    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("No free name for '{name}' in {} after {attempts} attempts", dir.display())]
    CollisionExhausted {
        dir: PathBuf,
        name: String,
        attempts: usize,
    },

    #[error("Cannot watch {}: {reason}", path.display())]
    WatchSetupFailed { path: PathBuf, reason: String },

    #[error("Unknown watched path id '{id}'")]
    UnknownPath { id: String },

    #[error("Directory {} is already registered as '{id}'", path.display())]
    DuplicatePath { path: PathBuf, id: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Map an I/O error on `path` into the taxonomy.
    ///
    /// `NotFound` and `PermissionDenied` get their own variants so callers can
    /// surface them without inspecting the underlying error.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => EngineError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => EngineError::PermissionDenied { path },
            _ => EngineError::Io { path, source },
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        EngineError::Config {
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_io_maps_kinds() {
        let err = EngineError::from_io("/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, EngineError::NotFound { .. }));

        let err = EngineError::from_io("/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, EngineError::PermissionDenied { .. }));

        let err = EngineError::from_io("/x", io::Error::other("disk on fire"));
        assert!(matches!(err, EngineError::Io { .. }));
        assert!(err.to_string().contains("disk on fire"));
    }
}

//! Command-line front end for the organizer engine.
//!
//! Provides argument parsing and command dispatch.

pub mod args;
pub mod commands;

pub use args::{CategoryAction, Cli, Commands, PathAction};

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use sortify::{Engine, Library, Settings};

/// Settings and file locations resolved from the global flags.
pub struct Context {
    pub settings: Settings,
    pub library_path: PathBuf,
}

impl Context {
    pub fn load(config: Option<&Path>, library: Option<&Path>) -> Result<Self> {
        let settings = match config {
            Some(path) => Settings::load_from(path),
            None => Settings::load(),
        }
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;

        let library_path = library
            .map(Path::to_path_buf)
            .unwrap_or_else(|| settings.library_path());

        Ok(Self {
            settings,
            library_path,
        })
    }

    pub fn library(&self) -> Result<Library> {
        Library::load_or_init(&self.library_path, &self.settings.engine.fallback_category)
            .with_context(|| format!("loading {}", self.library_path.display()))
    }

    /// Engine over the current library document.
    pub fn engine(&self) -> Result<Engine> {
        let library = self.library()?;
        Engine::from_library(self.settings.clone(), &library)
            .with_context(|| format!("invalid library {}", self.library_path.display()))
    }

    /// Persist rules, paths and stats back to the library document.
    pub fn save(&self, engine: &Engine) -> Result<()> {
        engine
            .library()
            .save(&self.library_path)
            .with_context(|| format!("saving {}", self.library_path.display()))
    }
}

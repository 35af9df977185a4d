//! Configuration module for the organizer engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.sortify/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SORTIFY_` and use double
//! underscores to separate nested levels:
//! - `SORTIFY_ENGINE__DEBOUNCE_MS=250` sets `engine.debounce_ms`
//! - `SORTIFY_ENGINE__MOVE_UNMATCHED=true` sets `engine.move_unmatched`
//! - `SORTIFY_LOGGING__DEFAULT=debug` sets `logging.default`
//!
//! Category rules and the watched-path list are not settings; they live in the
//! JSON library document (see [`crate::library`]).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".sortify";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Location of the categories/paths document.
    /// Defaults to `<config dir>/sortify/library.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_path: Option<PathBuf>,

    /// Engine tuning
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Quiet interval a new file must be stable for before it is moved
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound on ` (n)` suffixes tried before giving up
    #[serde(default = "default_max_collision_attempts")]
    pub max_collision_attempts: usize,

    /// Category returned for unknown extensions
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,

    /// Move files that land in the fallback category as well
    #[serde(default = "default_false")]
    pub move_unmatched: bool,

    /// Skip dot-files
    #[serde(default = "default_true")]
    pub skip_hidden: bool,

    /// Suffixes of files that are still being downloaded
    #[serde(default = "default_ignore_suffixes")]
    pub ignore_suffixes: Vec<String>,

    /// How long the engine's own writes are ignored by watchers
    #[serde(default = "default_suppress_ms")]
    pub suppress_ms: u64,

    /// Capacity of the per-path OS event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Capacity of the outbound event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Logging configuration.
///
/// `default` sets the global level, `modules` overrides it per target.
/// `RUST_LOG` takes precedence over both.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_debounce_ms() -> u64 {
    1000
}
fn default_max_collision_attempts() -> usize {
    1000
}
fn default_fallback_category() -> String {
    "Other".to_string()
}
fn default_ignore_suffixes() -> Vec<String> {
    vec![
        ".tmp".to_string(),
        ".part".to_string(),
        ".crdownload".to_string(),
        ".download".to_string(),
    ]
}
fn default_suppress_ms() -> u64 {
    5000
}
fn default_channel_capacity() -> usize {
    100
}
fn default_event_capacity() -> usize {
    256
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            library_path: None,
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_collision_attempts: default_max_collision_attempts(),
            fallback_category: default_fallback_category(),
            move_unmatched: false,
            skip_hidden: true,
            ignore_suffixes: default_ignore_suffixes(),
            suppress_ms: default_suppress_ms(),
            channel_capacity: default_channel_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Whether a file name should never be touched by organize or monitoring.
    pub fn is_ignored(&self, file_name: &str) -> bool {
        if self.skip_hidden && file_name.starts_with('.') {
            return true;
        }
        let lower = file_name.to_lowercase();
        self.ignore_suffixes
            .iter()
            .any(|suffix| lower.ends_with(&suffix.to_lowercase()))
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscore stays
            .merge(Env::prefixed("SORTIFY_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find `.sortify/settings.toml` searching from the current directory up
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(SETTINGS_FILE));
            }
        }

        None
    }

    /// Resolved location of the JSON library document
    pub fn library_path(&self) -> PathBuf {
        if let Some(ref path) = self.library_path {
            return path.clone();
        }
        match dirs::config_dir() {
            Some(dir) => dir.join("sortify").join("library.json"),
            None => PathBuf::from("sortify_library.json"),
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `.sortify/` in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.engine.debounce_ms, 1000);
        assert_eq!(settings.engine.max_collision_attempts, 1000);
        assert_eq!(settings.engine.fallback_category, "Other");
        assert!(!settings.engine.move_unmatched);
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
library_path = "/tmp/lib.json"

[engine]
debounce_ms = 250
fallback_category = "Misc"
ignore_suffixes = [".partial"]

[logging]
default = "info"

[logging.modules]
watcher = "debug"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.engine.debounce_ms, 250);
        assert_eq!(settings.engine.fallback_category, "Misc");
        assert_eq!(settings.engine.ignore_suffixes, vec![".partial"]);
        assert_eq!(settings.library_path(), PathBuf::from("/tmp/lib.json"));
        assert_eq!(settings.logging.default, "info");
        assert_eq!(settings.logging.modules["watcher"], "debug");
        // Untouched values keep their defaults
        assert_eq!(settings.engine.max_collision_attempts, 1000);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.engine.debounce_ms = 42;
        settings.engine.move_unmatched = true;
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.engine.debounce_ms, 42);
        assert!(loaded.engine.move_unmatched);
    }

    #[test]
    fn test_is_ignored() {
        let engine = EngineConfig::default();
        assert!(engine.is_ignored(".DS_Store"));
        assert!(engine.is_ignored("movie.mkv.part"));
        assert!(engine.is_ignored("setup.EXE.crdownload"));
        assert!(!engine.is_ignored("photo.jpg"));

        let engine = EngineConfig {
            skip_hidden: false,
            ..EngineConfig::default()
        };
        assert!(!engine.is_ignored(".bashrc"));
    }
}

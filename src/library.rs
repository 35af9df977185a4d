//! The persisted `{ categories, paths }` document.
//!
//! This is the JSON shared with the settings front end:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "categories": { "Images": [".jpg", ".png"], "Other": [] },
//!   "paths": [{ "id": "...", "path": "/home/me/Downloads", "name": "Downloads",
//!               "isMonitoring": false, "autoOrganize": true, "stats": { ... } }]
//! }
//! ```
//!
//! It is re-read on every start. `isMonitoring` is written for the front end
//! but never used to resume monitoring.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::category::CategoryRules;
use crate::error::{EngineError, EngineResult};
use crate::registry::{PathRegistry, WatchedPath};

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub categories: IndexMap<String, Vec<String>>,

    #[serde(default)]
    pub paths: Vec<WatchedPath>,
}

impl Library {
    /// Default category set with `fallback` as the catch-all.
    pub fn with_defaults(fallback: &str) -> Self {
        let table: [(&str, &[&str]); 10] = [
            (
                "Images",
                &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp", ".tiff", ".ico"],
            ),
            (
                "Documents",
                &[".pdf", ".doc", ".docx", ".txt", ".rtf", ".pages", ".odt", ".epub"],
            ),
            ("Spreadsheets", &[".xls", ".xlsx", ".csv", ".numbers", ".ods"]),
            ("Presentations", &[".ppt", ".pptx", ".key", ".odp"]),
            (
                "Audio",
                &[".mp3", ".wav", ".aac", ".flac", ".m4a", ".ogg", ".wma"],
            ),
            (
                "Video",
                &[".mp4", ".avi", ".mov", ".mkv", ".wmv", ".flv", ".webm", ".m4v"],
            ),
            ("Archives", &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"]),
            ("Programs", &[".dmg", ".pkg", ".app", ".exe", ".deb", ".rpm"]),
            (
                "Code",
                &[".py", ".js", ".html", ".css", ".java", ".cpp", ".c", ".php", ".rb", ".go", ".rs"],
            ),
            ("Fonts", &[".ttf", ".otf", ".woff", ".woff2"]),
        ];

        let mut categories: IndexMap<String, Vec<String>> = table
            .iter()
            .map(|(name, exts)| {
                (
                    name.to_string(),
                    exts.iter().map(|e| e.to_string()).collect(),
                )
            })
            .collect();
        categories.insert(fallback.to_string(), Vec::new());

        Self {
            version: default_version(),
            description: Some("Category rules and watched folders".to_string()),
            categories,
            paths: Vec::new(),
        }
    }

    /// Read the library at `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub fn load_or_init(path: &Path, fallback: &str) -> EngineResult<Self> {
        if !path.exists() {
            let library = Self::with_defaults(fallback);
            library.save(path)?;
            crate::log_event!("library", "created", "{}", path.display());
            return Ok(library);
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| EngineError::from_io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            EngineError::config(format!("cannot parse {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| EngineError::from_io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::config(format!("cannot serialize library: {e}")))?;
        fs::write(path, json).map_err(|e| EngineError::from_io(path, e))
    }

    /// Validated rule table. Duplicate extensions are rejected here.
    pub fn rules(&self, fallback: &str) -> EngineResult<CategoryRules> {
        CategoryRules::from_map(&self.categories, fallback)
    }

    /// Registry seeded from the stored paths, all Stopped.
    pub fn registry(&self) -> EngineResult<PathRegistry> {
        PathRegistry::from_paths(self.paths.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid_rules() {
        let library = Library::with_defaults("Other");
        let rules = library.rules("Other").unwrap();
        assert_eq!(rules.classify("song.MP3"), "Audio");
        assert_eq!(rules.classify("font.woff2"), "Fonts");
        assert_eq!(rules.classify("mystery.bin"), "Other");
        assert_eq!(rules.to_map().last().unwrap().0, "Other");
    }

    #[test]
    fn test_load_or_init_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cfg").join("library.json");

        let created = Library::load_or_init(&path, "Other").unwrap();
        assert!(path.exists());

        let loaded = Library::load_or_init(&path, "Other").unwrap();
        assert_eq!(created, loaded);
    }

    #[test]
    fn test_parse_front_end_document() {
        let json = r#"{
            "categories": { "Pics": ["JPG", "png"], "Other": [] },
            "paths": [{
                "id": "p1", "path": "/data/in", "name": "In",
                "isMonitoring": true, "autoOrganize": false,
                "stats": { "filesOrganized": 3, "lastOrganized": null, "monitoringSince": null }
            }]
        }"#;
        let library: Library = serde_json::from_str(json).unwrap();
        assert_eq!(library.version, "1.0");

        let rules = library.rules("Other").unwrap();
        assert_eq!(rules.classify("a.jpg"), "Pics");

        let registry = library.registry().unwrap();
        let entry = registry.get("p1").unwrap();
        assert!(!entry.is_monitoring);
        assert_eq!(entry.stats.files_organized, 3);
    }

    #[test]
    fn test_duplicate_extension_is_rejected() {
        let json = r#"{ "categories": { "A": [".txt"], "B": ["TXT"] } }"#;
        let library: Library = serde_json::from_str(json).unwrap();
        assert!(matches!(
            library.rules("Other"),
            Err(EngineError::ClassificationAmbiguity { .. })
        ));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("library.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Library::load(&path),
            Err(EngineError::Config { .. })
        ));
    }
}

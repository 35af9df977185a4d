//! One-shot classify-and-move over a directory.
//!
//! Only the immediate children of the root are considered. Category folders
//! are directories, so their contents are never revisited and a second run
//! over an organized root moves nothing.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::category::CategoryClassifier;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventPublisher, MoveSource};
use crate::mover::{MoveEngine, MoveOutcome};

/// A file the run could not move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Aggregated result of an organize run. Partial success is normal.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizeReport {
    pub moved_count: usize,
    pub skipped_count: usize,
    pub outcomes: Vec<MoveOutcome>,
    pub failures: Vec<FileFailure>,
}

impl OrganizeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Classifies and moves files, shared by batch runs and watchers.
#[derive(Debug, Clone)]
pub struct BatchOrganizer {
    classifier: Arc<CategoryClassifier>,
    mover: Arc<MoveEngine>,
    publisher: EventPublisher,
    config: Arc<EngineConfig>,
}

impl BatchOrganizer {
    pub fn new(
        classifier: Arc<CategoryClassifier>,
        mover: Arc<MoveEngine>,
        publisher: EventPublisher,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            classifier,
            mover,
            publisher,
            config,
        }
    }

    pub fn mover(&self) -> &Arc<MoveEngine> {
        &self.mover
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Organize every eligible file directly under `root`.
    ///
    /// Fails as a whole only when `root` itself cannot be listed. Per-file
    /// errors are collected in [`OrganizeReport::failures`].
    pub fn organize(&self, root: &Path, path_id: Option<&str>) -> EngineResult<OrganizeReport> {
        let root = root
            .canonicalize()
            .map_err(|e| EngineError::from_io(root, e))?;
        let entries = fs::read_dir(&root).map_err(|e| EngineError::from_io(&root, e))?;

        let mut files = Vec::new();
        let mut report = OrganizeReport::default();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.failures.push(FileFailure {
                        path: root.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            // file_type() does not follow symlinks
            match entry.file_type() {
                Ok(kind) if kind.is_file() => files.push(entry.path()),
                Ok(_) => {}
                Err(e) => report.failures.push(FileFailure {
                    path: entry.path(),
                    error: e.to_string(),
                }),
            }
        }
        files.sort();

        crate::log_event!(
            "organize",
            "start",
            "{} candidate files in {}",
            files.len(),
            root.display()
        );

        for file in files {
            match self.organize_file(&root, path_id, &file, MoveSource::Manual) {
                Ok(Some(outcome)) => {
                    report.moved_count += 1;
                    report.outcomes.push(outcome);
                }
                Ok(None) => report.skipped_count += 1,
                Err(e) => {
                    tracing::warn!("[organize] {}: {e}", file.display());
                    report.failures.push(FileFailure {
                        path: file,
                        error: e.to_string(),
                    });
                }
            }
        }

        crate::log_event!(
            "organize",
            "done",
            "moved {} skipped {} failed {}",
            report.moved_count,
            report.skipped_count,
            report.failures.len()
        );
        Ok(report)
    }

    /// Classify one file under `root` and move it into its category folder.
    ///
    /// Returns `Ok(None)` when the file is deliberately left alone (hidden,
    /// still downloading, or unmatched with `move_unmatched` off). A moved file
    /// is published before this returns.
    pub fn organize_file(
        &self,
        root: &Path,
        path_id: Option<&str>,
        file: &Path,
        source: MoveSource,
    ) -> EngineResult<Option<MoveOutcome>> {
        let Some(file_name) = file.file_name().map(|n| n.to_string_lossy().to_string()) else {
            return Ok(None);
        };
        if self.config.is_ignored(&file_name) {
            crate::debug_event!("organize", "ignored", "{file_name}");
            return Ok(None);
        }

        let category = self.classifier.classify(&file_name);
        if self.classifier.is_fallback(&category) && !self.config.move_unmatched {
            crate::debug_event!("organize", "unmatched", "{file_name}");
            return Ok(None);
        }

        let result = self.mover.move_into(file, &root.join(&category))?;
        let outcome = MoveOutcome::new(file.to_path_buf(), &result, category);
        self.publisher.publish(path_id, root, &outcome, source);
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryRules;
    use crate::registry::PathRegistry;
    use tempfile::TempDir;

    fn organizer(config: EngineConfig) -> BatchOrganizer {
        let mut rules = CategoryRules::new(config.fallback_category.clone());
        rules.add_category("Images", ["jpg", "png"]).unwrap();
        rules.add_category("Documents", ["pdf"]).unwrap();
        let config = Arc::new(config);
        BatchOrganizer::new(
            Arc::new(CategoryClassifier::new(rules)),
            Arc::new(MoveEngine::from_config(&config)),
            EventPublisher::new(Arc::new(PathRegistry::new()), 16),
            config,
        )
    }

    #[test]
    fn test_organize_skips_dirs_hidden_and_partial() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("a.jpg"), "a").unwrap();
        fs::write(root.join("b.pdf"), "b").unwrap();
        fs::write(root.join(".hidden.jpg"), "h").unwrap();
        fs::write(root.join("big.pdf.part"), "p").unwrap();
        fs::write(root.join("c.unknown"), "c").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("d.jpg"), "d").unwrap();

        let report = organizer(EngineConfig::default())
            .organize(root, None)
            .unwrap();

        assert_eq!(report.moved_count, 2);
        assert_eq!(report.skipped_count, 3);
        assert!(report.is_clean());
        assert!(root.join("Images").join("a.jpg").exists());
        assert!(root.join("Documents").join("b.pdf").exists());
        assert!(root.join(".hidden.jpg").exists());
        assert!(root.join("big.pdf.part").exists());
        assert!(root.join("c.unknown").exists());
        assert!(root.join("sub").join("d.jpg").exists());
    }

    #[test]
    fn test_move_unmatched_uses_fallback_folder() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.xyz"), "n").unwrap();

        let config = EngineConfig {
            move_unmatched: true,
            ..EngineConfig::default()
        };
        let report = organizer(config).organize(temp.path(), None).unwrap();

        assert_eq!(report.moved_count, 1);
        assert_eq!(report.outcomes[0].category, "Other");
        assert!(temp.path().join("Other").join("notes.xyz").exists());
    }

    #[test]
    fn test_one_failure_keeps_earlier_moves() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("a.jpg"), "a").unwrap();
        fs::write(root.join("b.pdf"), "b").unwrap();
        fs::write(root.join("c.png"), "c").unwrap();
        // A plain file where the category folder should go
        fs::write(root.join("Documents"), "not a folder").unwrap();

        let report = organizer(EngineConfig::default())
            .organize(root, None)
            .unwrap();

        assert_eq!(report.moved_count, 2);
        assert!(!report.is_clean());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].path.file_name().unwrap(),
            std::ffi::OsStr::new("b.pdf")
        );
        assert!(root.join("Images").join("a.jpg").exists());
        assert!(root.join("Images").join("c.png").exists());
        assert!(root.join("b.pdf").exists());
        assert!(root.join("Documents").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_is_reported_per_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("a.jpg"), "a").unwrap();
        fs::write(root.join("b.pdf"), "b").unwrap();
        let images = root.join("Images");
        fs::create_dir(&images).unwrap();
        fs::set_permissions(&images, fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users ignore the mode bits
        if fs::write(images.join(".check"), "").is_ok() {
            return;
        }

        let report = organizer(EngineConfig::default())
            .organize(root, None)
            .unwrap();
        fs::set_permissions(&images, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(report.moved_count, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.starts_with("Permission denied"));
        assert!(root.join("a.jpg").exists());
        assert!(root.join("Documents").join("b.pdf").exists());
    }

    #[test]
    fn test_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let err = organizer(EngineConfig::default())
            .organize(&temp.path().join("gone"), None)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("real.jpg");
        fs::write(&target, "r").unwrap();
        let inbox = temp.path().join("inbox");
        fs::create_dir(&inbox).unwrap();
        std::os::unix::fs::symlink(&target, inbox.join("link.jpg")).unwrap();

        let report = organizer(EngineConfig::default())
            .organize(&inbox, None)
            .unwrap();
        assert_eq!(report.moved_count, 0);
        assert!(inbox.join("link.jpg").symlink_metadata().is_ok());
    }
}

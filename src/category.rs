//! Extension-based category rules and the classifier built on them.
//!
//! A rule table maps each category (which doubles as a folder name) to a set
//! of normalized extensions such as `.jpg`. Every extension belongs to at most
//! one category; declaring it twice is rejected with
//! [`EngineError::ClassificationAmbiguity`] rather than resolved by order.
//!
//! ```
//! use sortify::category::{CategoryClassifier, CategoryRules};
//!
//! let mut rules = CategoryRules::new("Other");
//! rules.add_category("Images", ["jpg", ".PNG"]).unwrap();
//! let classifier = CategoryClassifier::new(rules);
//!
//! assert_eq!(classifier.classify("holiday.JPG"), "Images");
//! assert_eq!(classifier.classify("notes.txt"), "Other");
//! assert_eq!(classifier.classify(".bashrc"), "Other");
//! ```

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{EngineError, EngineResult};

static EXTENSION_FORMAT: OnceLock<Regex> = OnceLock::new();

fn extension_format() -> &'static Regex {
    EXTENSION_FORMAT.get_or_init(|| Regex::new(r"^\.[A-Za-z0-9]+$").expect("static regex"))
}

/// Lower-case the extension and make sure it carries a leading dot.
///
/// Returns `ConfigError` when the result does not match `^\.[A-Za-z0-9]+$`.
pub fn normalize_extension(raw: &str) -> EngineResult<String> {
    let trimmed = raw.trim();
    let dotted = if trimmed.starts_with('.') {
        trimmed.to_lowercase()
    } else {
        format!(".{}", trimmed.to_lowercase())
    };

    if extension_format().is_match(&dotted) {
        Ok(dotted)
    } else {
        Err(EngineError::config(format!("invalid extension '{raw}'")))
    }
}

/// Extension of a file name as used for lookup: text after the last `.`,
/// lower-cased, with a leading dot.
///
/// Hidden files without a further dot (`.bashrc`) and names ending in a dot
/// have no extension.
pub fn extension_of(file_name: &str) -> Option<String> {
    let idx = file_name.rfind('.')?;
    if idx == 0 {
        return None;
    }
    let ext = &file_name[idx + 1..];
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_lowercase()))
}

fn validate_category_name(name: &str) -> EngineResult<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(EngineError::config(format!(
            "category name '{name}' cannot be used as a folder name"
        )));
    }
    Ok(())
}

/// Category name → extension set, plus the reverse index used for lookup.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    categories: IndexMap<String, IndexSet<String>>,
    by_extension: HashMap<String, String>,
    fallback: String,
}

impl CategoryRules {
    /// Empty rule table with the given fallback category.
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            categories: IndexMap::new(),
            by_extension: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    /// Build rules from the persisted `{ name: [ext, ...] }` shape.
    ///
    /// An entry for the fallback category is accepted only when it is empty.
    pub fn from_map(
        map: &IndexMap<String, Vec<String>>,
        fallback: impl Into<String>,
    ) -> EngineResult<Self> {
        let mut rules = Self::new(fallback);
        validate_category_name(&rules.fallback)?;
        for (name, extensions) in map {
            if *name == rules.fallback {
                if !extensions.is_empty() {
                    return Err(EngineError::config(format!(
                        "fallback category '{name}' cannot own extensions"
                    )));
                }
                continue;
            }
            rules.add_category(name, extensions)?;
        }
        Ok(rules)
    }

    /// Back to the persisted shape. The fallback category is listed last with
    /// no extensions.
    pub fn to_map(&self) -> IndexMap<String, Vec<String>> {
        let mut map: IndexMap<String, Vec<String>> = self
            .categories
            .iter()
            .map(|(name, exts)| (name.clone(), exts.iter().cloned().collect()))
            .collect();
        map.insert(self.fallback.clone(), Vec::new());
        map
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Configured categories in declaration order (fallback excluded).
    pub fn categories(&self) -> impl Iterator<Item = (&str, &IndexSet<String>)> {
        self.categories.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains_category(&self, name: &str) -> bool {
        name == self.fallback || self.categories.contains_key(name)
    }

    /// Category that owns `extension` (any case, dot optional).
    pub fn category_for_extension(&self, extension: &str) -> Option<&str> {
        let ext = normalize_extension(extension).ok()?;
        self.by_extension.get(&ext).map(String::as_str)
    }

    /// Map a file name to its category, or the fallback.
    pub fn classify(&self, file_name: &str) -> &str {
        extension_of(file_name)
            .and_then(|ext| self.by_extension.get(&ext))
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// Normalize and check a batch of extensions for use by `category`.
    fn checked_extensions<I, S>(&self, category: &str, extensions: I) -> EngineResult<IndexSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = IndexSet::new();
        for raw in extensions {
            let ext = normalize_extension(raw.as_ref())?;
            if let Some(owner) = self.category_for_extension(&ext)
                && owner != category
            {
                return Err(EngineError::ClassificationAmbiguity {
                    existing: owner.to_string(),
                    extension: ext,
                    conflicting: category.to_string(),
                });
            }
            normalized.insert(ext);
        }
        Ok(normalized)
    }

    /// Add a new category. Fails if the name is taken or any extension is
    /// invalid or already claimed.
    pub fn add_category<I, S>(&mut self, name: &str, extensions: I) -> EngineResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_category_name(name)?;
        if self.contains_category(name) {
            return Err(EngineError::config(format!("category '{name}' already exists")));
        }
        let normalized = self.checked_extensions(name, extensions)?;
        for ext in &normalized {
            self.by_extension.insert(ext.clone(), name.to_string());
        }
        self.categories.insert(name.to_string(), normalized);
        Ok(())
    }

    /// Replace the extension list of an existing category.
    pub fn set_extensions<I, S>(&mut self, name: &str, extensions: I) -> EngineResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.categories.contains_key(name) {
            return Err(EngineError::config(format!("unknown category '{name}'")));
        }
        let normalized = self.checked_extensions(name, extensions)?;
        self.by_extension.retain(|_, owner| owner != name);
        for ext in &normalized {
            self.by_extension.insert(ext.clone(), name.to_string());
        }
        self.categories.insert(name.to_string(), normalized);
        Ok(())
    }

    /// Delete a category. The fallback category cannot be removed.
    pub fn remove_category(&mut self, name: &str) -> EngineResult<bool> {
        if name == self.fallback {
            return Err(EngineError::config(format!(
                "fallback category '{name}' cannot be removed"
            )));
        }
        match self.categories.shift_remove(name) {
            Some(extensions) => {
                for ext in extensions {
                    self.by_extension.remove(&ext);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Add one extension to an existing category.
    pub fn add_extension(&mut self, category: &str, extension: &str) -> EngineResult<()> {
        if !self.categories.contains_key(category) {
            return Err(EngineError::config(format!("unknown category '{category}'")));
        }
        let normalized = self.checked_extensions(category, [extension])?;
        if let Some(set) = self.categories.get_mut(category) {
            for ext in normalized {
                self.by_extension.insert(ext.clone(), category.to_string());
                set.insert(ext);
            }
        }
        Ok(())
    }

    /// Remove one extension from a category. Returns whether it was present.
    pub fn remove_extension(&mut self, category: &str, extension: &str) -> EngineResult<bool> {
        let ext = normalize_extension(extension)?;
        let Some(set) = self.categories.get_mut(category) else {
            return Err(EngineError::config(format!("unknown category '{category}'")));
        };
        if set.shift_remove(&ext) {
            self.by_extension.remove(&ext);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Thread-safe classifier shared by the batch organizer and every watcher.
///
/// Rule mutations take the write lock and are visible to the next
/// classification on any task.
#[derive(Debug)]
pub struct CategoryClassifier {
    rules: RwLock<CategoryRules>,
}

impl CategoryClassifier {
    pub fn new(rules: CategoryRules) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Category for `file_name`, falling back when the extension is unknown.
    pub fn classify(&self, file_name: &str) -> String {
        self.rules.read().classify(file_name).to_string()
    }

    pub fn fallback(&self) -> String {
        self.rules.read().fallback().to_string()
    }

    /// Whether `category` names the fallback category.
    pub fn is_fallback(&self, category: &str) -> bool {
        self.rules.read().fallback() == category
    }

    /// Copy of the current rule table.
    pub fn snapshot(&self) -> CategoryRules {
        self.rules.read().clone()
    }

    /// Apply a mutation under the write lock.
    ///
    /// The closure runs against a copy; the live table is only replaced when
    /// it returns `Ok`, so a rejected mutation leaves the rules untouched.
    pub fn update<T>(
        &self,
        mutate: impl FnOnce(&mut CategoryRules) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut guard = self.rules.write();
        let mut draft = guard.clone();
        let value = mutate(&mut draft)?;
        *guard = draft;
        Ok(value)
    }
}

//! Module traversal.
//!
//! Walks one unpack directory and turns every module file into a
//! [`ModuleUnit`]. Each first-level entry of the root is handled by its own
//! task; the walk below a first-level directory runs sequentially inside that
//! task. A failure anywhere in a first-level subtree drops that subtree's
//! results and is logged, so [`ModuleTraverser::traverse`] never fails.

use harvest_core::{Error, ModuleUnit, Result, TraversalConfig};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Derives the canonical identifier of a module from its path relative to
/// the unpack root.
///
/// Every occurrence of a container marker is removed, then the module
/// suffix, then path separators become `.` and one leading `.` is trimmed.
/// Only the path is inspected, never the file content.
///
/// # Examples
///
/// ```
/// use harvest_core::TraversalConfig;
/// use harvest_loader::derive_identifier;
///
/// let config = TraversalConfig::default();
/// assert_eq!(derive_identifier("a/b/Foo.class", &config), "a.b.Foo");
/// assert_eq!(derive_identifier("BOOT-INF/classes/com/x/Y.class", &config), "com.x.Y");
/// ```
#[must_use]
pub fn derive_identifier(relative: &str, config: &TraversalConfig) -> String {
    let mut name = relative.replace('\\', "/");
    for marker in &config.container_markers {
        if name.contains(marker.as_str()) {
            name = name.replace(marker.as_str(), "");
        }
    }

    let name = name.strip_suffix(&config.module_suffix).unwrap_or(&name);
    let dotted = name.replace('/', ".");
    match dotted.strip_prefix('.') {
        Some(trimmed) => trimmed.to_string(),
        None => dotted,
    }
}

/// Finds module files below one unpack directory.
#[derive(Debug, Clone)]
pub struct ModuleTraverser {
    root: PathBuf,
    config: TraversalConfig,
}

impl ModuleTraverser {
    /// Creates a traverser rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if `root` is not a directory or the
    /// configuration is invalid.
    pub fn new(root: impl Into<PathBuf>, config: TraversalConfig) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::ConfigError {
                message: format!("traversal root is not a directory: {}", root.display()),
            });
        }
        config.validate()?;
        Ok(Self { root, config })
    }

    /// Root directory of the traversal.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collects every module unit below the root.
    ///
    /// Units are returned in task completion order. A first-level file that
    /// is a module gets an empty identifier since it has no containing
    /// package path.
    #[must_use]
    pub fn traverse(&self) -> Vec<ModuleUnit> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Could not list {}: {e}", self.root.display());
                return Vec::new();
            }
        };

        let (tx, rx) = crossbeam_channel::unbounded();
        rayon::scope(|scope| {
            for entry in entries {
                let path = match entry {
                    Ok(entry) => entry.path(),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable entry in {}: {e}", self.root.display());
                        continue;
                    }
                };

                let tx = tx.clone();
                scope.spawn(move |_| {
                    // Receiver is alive until after the scope ends
                    let _ = tx.send(self.traverse_entry(&path));
                });
            }
        });
        drop(tx);

        let units: Vec<ModuleUnit> = rx.into_iter().flatten().collect();
        tracing::debug!("Found {} modules below {}", units.len(), self.root.display());
        units
    }

    fn traverse_entry(&self, path: &Path) -> Vec<ModuleUnit> {
        if path.is_file() {
            return path
                .file_name()
                .filter(|name| self.config.is_module_file(name))
                .map(|_| vec![ModuleUnit::new(path, "")])
                .unwrap_or_default();
        }

        if !path.is_dir() {
            return Vec::new();
        }

        match self.walk_subtree(path) {
            Ok(units) => units,
            Err(e) => {
                tracing::warn!(
                    "Dropping results below {} after traversal failure: {e}",
                    path.display()
                );
                Vec::new()
            }
        }
    }

    /// Sequential walk of one first-level directory.
    fn walk_subtree(&self, subtree: &Path) -> std::result::Result<Vec<ModuleUnit>, walkdir::Error> {
        let mut units = Vec::new();
        for entry in WalkDir::new(subtree).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() || !self.config.is_module_file(entry.file_name()) {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let identifier = derive_identifier(&relative.to_string_lossy(), &self.config);
            units.push(ModuleUnit::new(entry.path(), identifier));
        }
        Ok(units)
    }
}

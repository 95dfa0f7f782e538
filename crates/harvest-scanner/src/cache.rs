//! Persistent scan cache.
//!
//! [`ScanCache`] maps each plugin directory to the package states found in
//! it. [`CacheFile`] reads it wholly at start-up and overwrites it wholly
//! after every scan attempt; there are no incremental writes and no
//! inter-process locking (a single writer process is assumed).
//!
//! # File Format
//!
//! ```json
//! {
//!   "formatVersion": "1",
//!   "writtenAt": "2026-01-15T10:30:00Z",
//!   "directories": [
//!     {
//!       "directory": "/opt/app/plugins",
//!       "packages": [
//!         {
//!           "archivePath": "/opt/app/plugins/metrics.jar",
//!           "contentHash": "9f86d0…",
//!           "unpackDirectory": "/var/lib/harvest/KMS-Plugin-metrics"
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use harvest_core::{ContentHash, Error, PackageState, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Current cache file format version.
pub const FORMAT_VERSION: &str = "1";

/// In-memory mapping from plugin directory to its package states.
///
/// # Examples
///
/// ```
/// use harvest_core::{ContentHash, PackageState};
/// use harvest_scanner::ScanCache;
/// use std::collections::HashSet;
///
/// let mut cache = ScanCache::default();
/// let state = PackageState::extracted("/p/a.jar", ContentHash::new("aa"), "/b/KMS-Plugin-a");
/// cache.replace_directory("/p", HashSet::from([state]));
///
/// assert_eq!(cache.len(), 1);
/// assert!(cache.find_by_hash(&ContentHash::new("aa")).is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanCache {
    directories: BTreeMap<PathBuf, HashSet<PackageState>>,
}

impl ScanCache {
    /// Returns `true` if no directory has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// Total number of package states across directories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directories.values().map(HashSet::len).sum()
    }

    /// Discards every recorded directory.
    pub fn clear(&mut self) {
        self.directories.clear();
    }

    /// Replaces the states recorded for `directory`.
    pub fn replace_directory(&mut self, directory: impl Into<PathBuf>, states: HashSet<PackageState>) {
        self.directories.insert(directory.into(), states);
    }

    /// States recorded for one directory.
    #[must_use]
    pub fn directory(&self, directory: &Path) -> Option<&HashSet<PackageState>> {
        self.directories.get(directory)
    }

    /// Recorded plugin directories.
    pub fn directories(&self) -> impl Iterator<Item = &Path> {
        self.directories.keys().map(PathBuf::as_path)
    }

    /// Every state across all directories.
    pub fn iter(&self) -> impl Iterator<Item = &PackageState> {
        self.directories.values().flat_map(HashSet::iter)
    }

    /// First state whose archive has the given file name.
    #[must_use]
    pub fn find_by_name(&self, file_name: &OsStr) -> Option<&PackageState> {
        self.iter().find(|state| state.file_name() == Some(file_name))
    }

    /// First state whose content hash equals `hash`.
    #[must_use]
    pub fn find_by_hash(&self, hash: &ContentHash) -> Option<&PackageState> {
        self.iter().find(|state| state.content_hash() == Some(hash))
    }
}

/// Serialized form of the whole cache.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheDocument {
    format_version: String,
    written_at: DateTime<Utc>,
    directories: Vec<DirectoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DirectoryEntry {
    directory: PathBuf,
    packages: Vec<PackageState>,
}

/// Durable storage for a [`ScanCache`].
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    /// Creates a handle for the cache file at `path`. Nothing is read yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cache, creating an empty file if none exists.
    ///
    /// An absent or zero-length file yields an empty cache.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be created or read
    /// - [`Error::SerializationError`] if a non-empty file cannot be parsed
    ///   or has an unsupported format version
    pub fn load(&self) -> Result<ScanCache> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.create_empty()?;
                return Ok(ScanCache::default());
            }
            Err(e) => return Err(Error::io("read cache file", &self.path, e)),
        };

        if content.trim().is_empty() {
            tracing::debug!("Cache file {} is empty", self.path.display());
            return Ok(ScanCache::default());
        }

        let document: CacheDocument =
            serde_json::from_str(&content).map_err(|e| Error::SerializationError {
                message: format!("failed to parse cache file {}", self.path.display()),
                source: Some(e),
            })?;

        if document.format_version != FORMAT_VERSION {
            return Err(Error::SerializationError {
                message: format!(
                    "unsupported cache format version: {} (expected {FORMAT_VERSION})",
                    document.format_version
                ),
                source: None,
            });
        }

        let mut cache = ScanCache::default();
        for entry in document.directories {
            cache.replace_directory(entry.directory, entry.packages.into_iter().collect());
        }

        tracing::info!(
            "Loaded scan cache from {} ({} packages)",
            self.path.display(),
            cache.len()
        );
        Ok(cache)
    }

    /// Overwrites the cache file with the full contents of `cache`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn save(&self, cache: &ScanCache) -> Result<()> {
        let document = CacheDocument {
            format_version: FORMAT_VERSION.to_string(),
            written_at: Utc::now(),
            directories: cache
                .directories
                .iter()
                .map(|(directory, states)| {
                    let mut packages: Vec<PackageState> = states.iter().cloned().collect();
                    packages.sort_by(|a, b| a.archive().cmp(b.archive()));
                    DirectoryEntry {
                        directory: directory.clone(),
                        packages,
                    }
                })
                .collect(),
        };

        let json = serde_json::to_string_pretty(&document).map_err(|e| Error::SerializationError {
            message: "failed to serialize scan cache".to_string(),
            source: Some(e),
        })?;
        fs::write(&self.path, json).map_err(|e| Error::io("write cache file", &self.path, e))?;

        tracing::debug!(
            "Wrote scan cache to {} ({} packages)",
            self.path.display(),
            cache.len()
        );
        Ok(())
    }

    fn create_empty(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                tracing::error!("Could not create cache directory {}", parent.display());
                Error::io("create cache directory", parent, e)
            })?;
        }
        fs::write(&self.path, b"").map_err(|e| {
            tracing::error!(
                "Could not create fresh cache file {}. Filesystem corrupt or not enough permissions?",
                self.path.display()
            );
            Error::io("create cache file", &self.path, e)
        })?;
        tracing::debug!("Created empty cache file {}", self.path.display());
        Ok(())
    }
}

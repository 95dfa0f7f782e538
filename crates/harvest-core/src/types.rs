//! Domain types for plugin harvesting.
//!
//! # Examples
//!
//! ```
//! use harvest_core::{ContentHash, PackageState};
//!
//! let mut state = PackageState::discovered("plugins/metrics.jar");
//! state.set_content_hash(ContentHash::new("9f86d081"));
//! state.mark_extracted("/var/harvest/KMS-Plugin-metrics").unwrap();
//!
//! assert!(state.is_extracted());
//! assert_eq!(state.content_hash().map(ContentHash::as_str), Some("9f86d081"));
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Lowercase hex digest of an archive's bytes.
///
/// # Examples
///
/// ```
/// use harvest_core::ContentHash;
///
/// let hash = ContentHash::new("abc123");
/// assert_eq!(hash.as_str(), "abc123");
/// assert_eq!(hash.to_string(), "abc123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Creates a content hash from its hex representation.
    #[inline]
    #[must_use]
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Returns the hex digest as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a scan treats previously cached state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanMode {
    /// Trust the cache and reuse unchanged archives.
    #[default]
    SkipAlreadyScanned,
    /// Discard the cache and re-extract every archive.
    Force,
}

/// Lifecycle of a discovered archive.
///
/// An unpack directory can only exist together with the hash of the bytes
/// that were unpacked into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageStatus {
    /// Discovered, not hashed yet.
    Pending,
    /// Content hash computed, not (yet) extracted.
    Hashed {
        /// Digest of the archive bytes
        content_hash: ContentHash,
    },
    /// Successfully unpacked.
    Extracted {
        /// Digest of the archive bytes that were unpacked
        content_hash: ContentHash,
        /// Directory holding the unpacked tree
        unpack_dir: PathBuf,
    },
}

/// State of one discovered archive.
///
/// Two states are equal when they refer to the same archive and either both
/// lack an unpack directory or both have the same one. The content hash does
/// not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PackageRecord", into = "PackageRecord")]
pub struct PackageState {
    archive: PathBuf,
    status: PackageStatus,
}

impl PackageState {
    /// Creates the state of a freshly discovered archive.
    #[must_use]
    pub fn discovered(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            status: PackageStatus::Pending,
        }
    }

    /// Creates the state of an archive that has been unpacked.
    #[must_use]
    pub fn extracted(
        archive: impl Into<PathBuf>,
        content_hash: ContentHash,
        unpack_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            archive: archive.into(),
            status: PackageStatus::Extracted {
                content_hash,
                unpack_dir: unpack_dir.into(),
            },
        }
    }

    /// Path of the archive file.
    #[must_use]
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// File name of the archive, used to match archives across scans.
    #[must_use]
    pub fn file_name(&self) -> Option<&OsStr> {
        self.archive.file_name()
    }

    /// Current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> &PackageStatus {
        &self.status
    }

    /// Content hash, if computed.
    #[must_use]
    pub const fn content_hash(&self) -> Option<&ContentHash> {
        match &self.status {
            PackageStatus::Pending => None,
            PackageStatus::Hashed { content_hash }
            | PackageStatus::Extracted { content_hash, .. } => Some(content_hash),
        }
    }

    /// Unpack directory, if extraction succeeded.
    #[must_use]
    pub fn unpack_dir(&self) -> Option<&Path> {
        match &self.status {
            PackageStatus::Extracted { unpack_dir, .. } => Some(unpack_dir),
            _ => None,
        }
    }

    /// Returns `true` once the archive has been unpacked.
    #[must_use]
    pub const fn is_extracted(&self) -> bool {
        matches!(self.status, PackageStatus::Extracted { .. })
    }

    /// Records the content hash. A previous unpack directory is forgotten,
    /// since it belongs to the old content.
    pub fn set_content_hash(&mut self, content_hash: ContentHash) {
        self.status = PackageStatus::Hashed { content_hash };
    }

    /// Records a successful extraction into `unpack_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateError`] if the content hash has not been
    /// computed yet.
    pub fn mark_extracted(&mut self, unpack_dir: impl Into<PathBuf>) -> Result<()> {
        let Some(content_hash) = self.content_hash().cloned() else {
            return Err(Error::state(format!(
                "cannot mark {} as extracted before hashing it",
                self.archive.display()
            )));
        };
        self.status = PackageStatus::Extracted {
            content_hash,
            unpack_dir: unpack_dir.into(),
        };
        Ok(())
    }
}

impl PartialEq for PackageState {
    fn eq(&self, other: &Self) -> bool {
        self.archive == other.archive && self.unpack_dir() == other.unpack_dir()
    }
}

impl Eq for PackageState {}

impl Hash for PackageState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.archive.hash(state);
        self.unpack_dir().hash(state);
    }
}

/// On-disk form of a [`PackageState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageRecord {
    archive_path: PathBuf,
    #[serde(default)]
    content_hash: Option<ContentHash>,
    #[serde(default)]
    unpack_directory: Option<PathBuf>,
}

impl From<PackageState> for PackageRecord {
    fn from(state: PackageState) -> Self {
        let (content_hash, unpack_directory) = match state.status {
            PackageStatus::Pending => (None, None),
            PackageStatus::Hashed { content_hash } => (Some(content_hash), None),
            PackageStatus::Extracted {
                content_hash,
                unpack_dir,
            } => (Some(content_hash), Some(unpack_dir)),
        };
        Self {
            archive_path: state.archive,
            content_hash,
            unpack_directory,
        }
    }
}

impl TryFrom<PackageRecord> for PackageState {
    type Error = String;

    fn try_from(record: PackageRecord) -> std::result::Result<Self, Self::Error> {
        let status = match (record.content_hash, record.unpack_directory) {
            (None, None) => PackageStatus::Pending,
            (Some(content_hash), None) => PackageStatus::Hashed { content_hash },
            (Some(content_hash), Some(unpack_dir)) => PackageStatus::Extracted {
                content_hash,
                unpack_dir,
            },
            (None, Some(_)) => {
                return Err(format!(
                    "package record for {} has an unpack directory but no content hash",
                    record.archive_path.display()
                ));
            }
        };
        Ok(Self {
            archive: record.archive_path,
            status,
        })
    }
}

/// A loadable file discovered inside an unpacked archive.
///
/// Ordered by path, then identifier, so collections of units iterate
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleUnit {
    path: PathBuf,
    identifier: String,
}

impl ModuleUnit {
    /// Creates a module unit.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, identifier: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            identifier: identifier.into(),
        }
    }

    /// Path of the file on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Canonical dot-delimited identifier (empty for files at the unpack root).
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_ignores_hash_without_unpack_dir() {
        let mut a = PackageState::discovered("p/a.jar");
        a.set_content_hash(ContentHash::new("111"));
        let b = PackageState::discovered("p/a.jar");
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_uses_unpack_dir() {
        let a = PackageState::extracted("p/a.jar", ContentHash::new("1"), "/u/A");
        let b = PackageState::extracted("p/a.jar", ContentHash::new("2"), "/u/A");
        let c = PackageState::extracted("p/a.jar", ContentHash::new("1"), "/u/B");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, PackageState::discovered("p/a.jar"));
    }

    #[test]
    fn test_hash_is_consistent_with_equality() {
        let mut set = HashSet::new();
        set.insert(PackageState::extracted("p/a.jar", ContentHash::new("1"), "/u/A"));
        set.insert(PackageState::extracted("p/a.jar", ContentHash::new("2"), "/u/A"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_mark_extracted_requires_hash() {
        let mut state = PackageState::discovered("p/a.jar");
        let err = state.mark_extracted("/u/A").unwrap_err();
        assert!(err.is_state_error());

        state.set_content_hash(ContentHash::new("abc"));
        state.mark_extracted("/u/A").unwrap();
        assert_eq!(state.unpack_dir(), Some(Path::new("/u/A")));
        assert_eq!(state.content_hash(), Some(&ContentHash::new("abc")));
    }

    #[test]
    fn test_record_format() {
        let state = PackageState::extracted("p/a.jar", ContentHash::new("abc"), "/u/A");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["archivePath"], "p/a.jar");
        assert_eq!(json["contentHash"], "abc");
        assert_eq!(json["unpackDirectory"], "/u/A");
    }

    #[test]
    fn test_record_without_hash_but_with_dir_is_rejected() {
        let json = r#"{"archivePath":"p/a.jar","contentHash":null,"unpackDirectory":"/u/A"}"#;
        assert!(serde_json::from_str::<PackageState>(json).is_err());
    }

    #[test]
    fn test_pending_record_roundtrip() {
        let json = r#"{"archivePath":"p/a.jar"}"#;
        let state: PackageState = serde_json::from_str(json).unwrap();
        assert_eq!(state.status(), &PackageStatus::Pending);
    }

    #[test]
    fn test_scan_mode_default() {
        assert_eq!(ScanMode::default(), ScanMode::SkipAlreadyScanned);
    }

    #[test]
    fn test_module_units_order_by_path() {
        let mut units = [
            ModuleUnit::new("/r/b/B.class", "b.B"),
            ModuleUnit::new("/r/a/A.class", "a.A"),
        ];
        units.sort();
        assert_eq!(units[0].identifier(), "a.A");
    }
}

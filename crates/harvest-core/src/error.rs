//! Error types for archive plugin harvesting.
//!
//! Every crate in the workspace reports failures through [`Error`], so a
//! caller of [`PluginLoader::load`] sees scanning, extraction and definition
//! failures through one type with enough context (archive, directory,
//! operation) to diagnose them.
//!
//! [`PluginLoader::load`]: https://docs.rs/harvest-loader
//!
//! # Examples
//!
//! ```
//! use harvest_core::{Error, Result};
//! use std::path::Path;
//!
//! fn register(dir: &Path) -> Result<()> {
//!     if !dir.is_dir() {
//!         return Err(Error::ConfigError {
//!             message: format!("not a directory: {}", dir.display()),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! let err = register(Path::new("/definitely/not/here")).unwrap_err();
//! assert!(err.is_config_error());
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Boxed error type used at capability boundaries (host definer, hashing).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for plugin harvesting.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    ///
    /// Raised when a directory registration is invalid or configuration
    /// values are out of range.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },

    /// Filesystem operation failed.
    #[error("I/O error while trying to {operation} {}: {source}", path.display())]
    Io {
        /// Short name of the attempted operation (e.g. "create cache file")
        operation: &'static str,
        /// Path the operation was applied to
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A module unit on disk is shorter than its declared size.
    #[error("Corrupt unit found: {} (read {read} of {expected} bytes)", path.display())]
    CorruptUnit {
        /// Path of the corrupt file
        path: PathBuf,
        /// Size reported by file metadata
        expected: u64,
        /// Number of bytes actually read
        read: u64,
    },

    /// Archive extraction failed.
    ///
    /// Wraps the underlying cause: archive corruption, an unsafe entry name,
    /// or a failure reported by a worker task.
    #[error("Failed to unpack {}: {message}", archive.display())]
    UnpackingError {
        /// Archive (or plugin directory, for batch failures) being processed
        archive: PathBuf,
        /// Description of the failure
        message: String,
        /// Underlying error cause
        #[source]
        source: Option<BoxError>,
    },

    /// An API was called out of its required lifecycle order.
    #[error("Invalid state: {message}")]
    StateError {
        /// Description of the lifecycle violation
        message: String,
    },

    /// Serialization/deserialization of the scan cache failed.
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Description of the serialization failure
        message: String,
        /// Underlying serde error
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The host code-loading primitive rejected a module.
    #[error("Failed to define module '{identifier}'")]
    ModuleDefinition {
        /// Canonical identifier passed to the host
        identifier: String,
        /// Error reported by the host
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Builds an [`Error::Io`] for `operation` applied to `path`.
    ///
    /// # Examples
    ///
    /// ```
    /// use harvest_core::Error;
    ///
    /// let err = Error::io(
    ///     "read",
    ///     "/tmp/missing",
    ///     std::io::Error::from(std::io::ErrorKind::NotFound),
    /// );
    /// assert!(err.is_io_error());
    /// assert!(err.to_string().contains("/tmp/missing"));
    /// ```
    #[must_use]
    pub fn io(operation: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Builds an [`Error::StateError`].
    #[must_use]
    pub fn state(message: impl Into<String>) -> Self {
        Self::StateError {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a configuration error.
    ///
    /// # Examples
    ///
    /// ```
    /// use harvest_core::Error;
    ///
    /// let err = Error::ConfigError {
    ///     message: "worker_threads must be positive".to_string(),
    /// };
    /// assert!(err.is_config_error());
    /// ```
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }

    /// Returns `true` for filesystem failures, including corrupt units.
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::CorruptUnit { .. })
    }

    /// Returns `true` if this is an extraction failure.
    #[must_use]
    pub const fn is_unpacking_error(&self) -> bool {
        matches!(self, Self::UnpackingError { .. })
    }

    /// Returns `true` if an API was called out of order.
    ///
    /// # Examples
    ///
    /// ```
    /// use harvest_core::Error;
    ///
    /// let err = Error::state("scanner is not initialized");
    /// assert!(err.is_state_error());
    /// ```
    #[must_use]
    pub const fn is_state_error(&self) -> bool {
        matches!(self, Self::StateError { .. })
    }
}

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_config_error_detection() {
        let err = Error::ConfigError {
            message: "Invalid configuration".to_string(),
        };
        assert!(err.is_config_error());
        assert!(!err.is_io_error());
    }

    #[test]
    fn test_corrupt_unit_is_io_error() {
        let err = Error::CorruptUnit {
            path: PathBuf::from("a/B.class"),
            expected: 10,
            read: 3,
        };
        assert!(err.is_io_error());
        assert!(err.to_string().contains("Corrupt unit found"));
    }

    #[test]
    fn test_io_error_display_names_operation_and_path() {
        let err = Error::io(
            "delete unpack directory",
            "/base/KMS-Plugin-x",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        let display = err.to_string();
        assert!(display.contains("delete unpack directory"));
        assert!(display.contains("/base/KMS-Plugin-x"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_unpacking_error_keeps_source() {
        let inner = Error::io(
            "write entry",
            "/x",
            std::io::Error::from(std::io::ErrorKind::WriteZero),
        );
        let err = Error::UnpackingError {
            archive: PathBuf::from("plugins/a.jar"),
            message: "extraction task failed".to_string(),
            source: Some(Box::new(inner)),
        };
        assert!(err.is_unpacking_error());
        assert!(err.source().is_some());
        assert!(err.to_string().contains("plugins/a.jar"));
    }

    #[test]
    fn test_state_error_detection() {
        let err = Error::state("Hasn't scanned yet");
        assert!(err.is_state_error());
        assert!(!err.is_unpacking_error());
    }
}

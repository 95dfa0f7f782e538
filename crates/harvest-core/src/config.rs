//! Configuration types for scanning and traversal.
//!
//! Both types derive `serde` traits with field defaults so an embedding
//! application can keep them in its own configuration file and override only
//! what it needs.
//!
//! # Examples
//!
//! ```
//! use harvest_core::{ScannerConfig, TraversalConfig};
//!
//! let scanner = ScannerConfig::new("/var/lib/harvest");
//! assert_eq!(scanner.worker_threads, 4);
//! assert_eq!(scanner.cache_path().file_name().unwrap(), "plugins.cache");
//!
//! let traversal = TraversalConfig::default();
//! assert_eq!(traversal.module_suffix, ".class");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Default width of the extraction worker pool.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Configuration for the package scanner.
///
/// `base_dir` holds the persisted cache file and every unpack directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Directory holding the cache file and unpacked archives.
    pub base_dir: PathBuf,

    /// Number of concurrent extraction workers.
    /// Default: 4
    pub worker_threads: usize,

    /// File extensions (without the dot) recognized as archives.
    /// Default: `["jar", "war"]`
    pub archive_extensions: Vec<String>,

    /// Prefix of every unpack directory name.
    /// Default: `"KMS-Plugin-"`
    pub unpack_prefix: String,

    /// File name of the persisted cache inside `base_dir`.
    /// Default: `"plugins.cache"`
    pub cache_file_name: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            worker_threads: DEFAULT_WORKER_THREADS,
            archive_extensions: vec!["jar".to_string(), "war".to_string()],
            unpack_prefix: "KMS-Plugin-".to_string(),
            cache_file_name: "plugins.cache".to_string(),
        }
    }
}

impl ScannerConfig {
    /// Creates a default configuration rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use harvest_core::ScannerConfig;
    ///
    /// let config = ScannerConfig::builder("/tmp/harvest")
    ///     .worker_threads(16)
    ///     .archive_extensions(["jar"])
    ///     .build();
    ///
    /// assert_eq!(config.worker_threads, 16);
    /// assert_eq!(config.archive_extensions, vec!["jar".to_string()]);
    /// ```
    #[must_use]
    pub fn builder(base_dir: impl Into<PathBuf>) -> ScannerConfigBuilder {
        ScannerConfigBuilder {
            config: Self::new(base_dir),
        }
    }

    /// Location of the persisted scan cache.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.base_dir.join(&self.cache_file_name)
    }

    /// Unpack directory for an archive with the given base name.
    ///
    /// # Examples
    ///
    /// ```
    /// use harvest_core::ScannerConfig;
    /// use std::path::Path;
    ///
    /// let config = ScannerConfig::new("/base");
    /// assert_eq!(
    ///     config.unpack_dir_for("metrics"),
    ///     Path::new("/base/KMS-Plugin-metrics")
    /// );
    /// ```
    #[must_use]
    pub fn unpack_dir_for(&self, archive_base_name: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}{archive_base_name}", self.unpack_prefix))
    }

    /// Returns `true` if `path` carries one of the archive extensions.
    #[must_use]
    pub fn is_archive(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.archive_extensions.iter().any(|e| e == ext))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if:
    /// - `worker_threads` is zero
    /// - no archive extension is configured
    /// - the cache file name is empty or contains a path separator
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(config_error("worker_threads must be greater than zero"));
        }

        if self.archive_extensions.is_empty() {
            return Err(config_error("at least one archive extension is required"));
        }

        if self.cache_file_name.is_empty()
            || self.cache_file_name.contains('/')
            || self.cache_file_name.contains('\\')
        {
            return Err(config_error(
                "cache_file_name must be a plain, non-empty file name",
            ));
        }

        Ok(())
    }
}

/// Builder for [`ScannerConfig`].
#[derive(Debug, Clone)]
pub struct ScannerConfigBuilder {
    config: ScannerConfig,
}

impl ScannerConfigBuilder {
    /// Sets the extraction pool width.
    #[must_use]
    pub const fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    /// Replaces the recognized archive extensions.
    #[must_use]
    pub fn archive_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.archive_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the unpack directory prefix.
    #[must_use]
    pub fn unpack_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.unpack_prefix = prefix.into();
        self
    }

    /// Sets the cache file name.
    #[must_use]
    pub fn cache_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.cache_file_name = name.into();
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ScannerConfig {
        self.config
    }
}

/// Configuration for module traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Packaging path prefixes removed before identifier derivation.
    /// Default: `["BOOT-INF/classes/", "META-INF/"]`
    pub container_markers: Vec<String>,

    /// Suffix of loadable module files.
    /// Default: `".class"`
    pub module_suffix: String,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            container_markers: vec!["BOOT-INF/classes/".to_string(), "META-INF/".to_string()],
            module_suffix: ".class".to_string(),
        }
    }
}

impl TraversalConfig {
    /// Returns `true` if `file_name` names a loadable module.
    #[must_use]
    pub fn is_module_file(&self, file_name: &OsStr) -> bool {
        file_name
            .to_str()
            .is_some_and(|name| name.ends_with(&self.module_suffix))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the module suffix or a container
    /// marker is empty.
    pub fn validate(&self) -> Result<()> {
        if self.module_suffix.is_empty() {
            return Err(config_error("module_suffix cannot be empty"));
        }

        if self.container_markers.iter().any(String::is_empty) {
            return Err(config_error("container markers cannot be empty"));
        }

        Ok(())
    }
}

fn config_error(message: &str) -> Error {
    Error::ConfigError {
        message: message.to_string(),
    }
}

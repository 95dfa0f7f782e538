//! Plugin loading.
//!
//! [`PluginLoader`] refreshes the unpacked archives with a
//! [`PackageScanner`], traverses every unpack directory and defines each
//! discovered module through the host's [`ModuleDefiner`].

use crate::traverser::ModuleTraverser;
use harvest_core::traits::ModuleDefiner;
use harvest_core::{Error, ModuleUnit, Result, ScanMode, ScannerConfig, TraversalConfig};
use harvest_scanner::PackageScanner;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Scans plugin directories and loads every module they contain.
///
/// The loader owns its scanner. Each [`load`](Self::load) call rescans with
/// [`ScanMode::SkipAlreadyScanned`], so unchanged archives are not unpacked
/// again.
#[derive(Debug)]
pub struct PluginLoader<D> {
    scanner: PackageScanner,
    traversal: TraversalConfig,
    definer: D,
}

impl<D: ModuleDefiner> PluginLoader<D> {
    /// Creates a loader with a fresh scanner over `directories`.
    ///
    /// The scanner is initialized (loading any persisted cache) and every
    /// directory is registered before this returns.
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigError`] if a configuration is invalid or a directory
    ///   does not exist
    /// - [`Error::Io`] / [`Error::SerializationError`] if the scan cache
    ///   cannot be bootstrapped
    pub fn new<I, P>(
        config: ScannerConfig,
        traversal: TraversalConfig,
        directories: I,
        definer: D,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut scanner = PackageScanner::new(config)?;
        scanner.initialize()?;
        for directory in directories {
            scanner.add_directory(directory)?;
        }
        Self::with_scanner(scanner, traversal, definer)
    }

    /// Creates a loader around an already initialized scanner.
    ///
    /// Use this to install a custom hasher or observer on the scanner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the traversal configuration is invalid.
    pub fn with_scanner(scanner: PackageScanner, traversal: TraversalConfig, definer: D) -> Result<Self> {
        traversal.validate()?;
        Ok(Self {
            scanner,
            traversal,
            definer,
        })
    }

    /// The underlying scanner.
    #[must_use]
    pub const fn scanner(&self) -> &PackageScanner {
        &self.scanner
    }

    /// Scans, traverses and defines every module.
    ///
    /// Units are deduplicated by path and identifier and defined in sorted
    /// order. Any failure ends the whole call; modules defined before it are
    /// not rolled back.
    ///
    /// # Errors
    ///
    /// - any error of [`PackageScanner::scan`]
    /// - [`Error::ConfigError`] if an unpack directory vanished before traversal
    /// - [`Error::Io`] / [`Error::CorruptUnit`] if a module file cannot be read
    ///   completely
    /// - [`Error::ModuleDefinition`] if the host rejects a module
    pub fn load(&mut self) -> Result<Vec<D::Handle>> {
        self.scanner.scan(ScanMode::SkipAlreadyScanned)?;

        let unpack_dirs: Vec<PathBuf> = self
            .scanner
            .stream_all()?
            .filter_map(|state| state.unpack_dir().map(Path::to_path_buf))
            .collect();

        let mut units = BTreeSet::new();
        for dir in &unpack_dirs {
            let traverser = ModuleTraverser::new(dir, self.traversal.clone())?;
            units.extend(traverser.traverse());
        }
        tracing::info!(
            "Loading {} modules from {} unpack directories",
            units.len(),
            unpack_dirs.len()
        );

        let mut handles = Vec::with_capacity(units.len());
        for unit in units {
            let bytes = read_unit(&unit)?;
            let handle = self
                .definer
                .define_module(unit.identifier(), bytes)
                .map_err(|source| Error::ModuleDefinition {
                    identifier: unit.identifier().to_string(),
                    source,
                })?;
            tracing::debug!("Defined module '{}' from {}", unit.identifier(), unit.path().display());
            handles.push(handle);
        }

        Ok(handles)
    }
}

/// Reads a module file completely.
fn read_unit(unit: &ModuleUnit) -> Result<Vec<u8>> {
    let path = unit.path();
    let mut file = File::open(path).map_err(|e| Error::io("open module", path, e))?;
    let expected = file
        .metadata()
        .map_err(|e| Error::io("stat module", path, e))?
        .len();

    let mut bytes = Vec::with_capacity(usize::try_from(expected).unwrap_or_default());
    let read = file
        .read_to_end(&mut bytes)
        .map_err(|e| Error::io("read module", path, e))?;

    let read = u64::try_from(read).unwrap_or(u64::MAX);
    if read < expected {
        return Err(Error::CorruptUnit {
            path: path.to_path_buf(),
            expected,
            read,
        });
    }
    Ok(bytes)
}

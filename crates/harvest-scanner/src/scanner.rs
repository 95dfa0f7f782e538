//! Package scanner.
//!
//! Provides [`PackageScanner`], which discovers archives in registered plugin
//! directories, detects changes against the persisted [`ScanCache`] and
//! unpacks new or changed archives on a bounded worker pool.

use crate::cache::{CacheFile, ScanCache};
use crate::checksum::Blake3Hasher;
use crate::extract::ArchiveExtractor;
use harvest_core::traits::{ContentHasher, NoopObserver, ScanObserver};
use harvest_core::{ContentHash, Error, PackageState, Result, ScanMode, ScannerConfig};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

/// Counts of what one scan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Archives unpacked during this scan
    pub extracted: usize,
    /// Unchanged archives reused from the cache
    pub reused: usize,
    /// Changed archives whose previous unpack directory was deleted
    pub replaced: usize,
}

/// An archive queued for extraction.
#[derive(Debug)]
struct ExtractionJob {
    archive: PathBuf,
    content_hash: ContentHash,
}

/// Discovers, diffs and unpacks plugin archives.
///
/// # Lifecycle
///
/// 1. [`new`](Self::new) with a [`ScannerConfig`]
/// 2. [`initialize`](Self::initialize) to load the persisted cache
/// 3. [`add_directory`](Self::add_directory) for every plugin directory
/// 4. [`scan`](Self::scan), then [`get_all`](Self::get_all) /
///    [`stream_all`](Self::stream_all)
///
/// # Concurrency
///
/// Extraction tasks of one directory run concurrently on a pool of
/// `worker_threads` threads. The in-memory cache is only touched by the
/// calling thread between batches; every task owns its archive and target
/// directory exclusively.
///
/// # Examples
///
/// ```no_run
/// use harvest_core::stats::ScanCounters;
/// use harvest_core::{ScanMode, ScannerConfig};
/// use harvest_scanner::PackageScanner;
/// use std::sync::Arc;
/// use std::thread;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let counters = Arc::new(ScanCounters::new());
/// let mut scanner = PackageScanner::new(ScannerConfig::new("/var/lib/harvest"))?
///     .with_observer(counters.clone());
///
/// scanner.initialize()?;
/// scanner.add_directory("/opt/app/plugins")?;
/// scanner.scan(ScanMode::Force)?;
///
/// println!("{} archives unpacked", counters.snapshot().archives_extracted);
/// # Ok(())
/// # }
/// ```
pub struct PackageScanner {
    config: ScannerConfig,
    directories: Vec<PathBuf>,
    cache: ScanCache,
    cache_file: CacheFile,
    extractor: ArchiveExtractor,
    hasher: Arc<dyn ContentHasher>,
    observer: Arc<dyn ScanObserver>,
    pool: rayon::ThreadPool,
    initialized: bool,
    has_scanned: bool,
}

impl fmt::Debug for PackageScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageScanner")
            .field("config", &self.config)
            .field("directories", &self.directories)
            .field("cached_packages", &self.cache.len())
            .field("initialized", &self.initialized)
            .field("has_scanned", &self.has_scanned)
            .finish_non_exhaustive()
    }
}

impl PackageScanner {
    /// Creates a scanner with the Blake3 hasher and no observer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the configuration is invalid or the
    /// worker pool cannot be built.
    pub fn new(config: ScannerConfig) -> Result<Self> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|index| format!("harvest-unpack-{index}"))
            .build()
            .map_err(|e| Error::ConfigError {
                message: format!("failed to build extraction pool: {e}"),
            })?;

        Ok(Self {
            cache_file: CacheFile::new(config.cache_path()),
            extractor: ArchiveExtractor::new(&config),
            config,
            directories: Vec::new(),
            cache: ScanCache::default(),
            hasher: Arc::new(Blake3Hasher),
            observer: Arc::new(NoopObserver),
            pool,
            initialized: false,
            has_scanned: false,
        })
    }

    /// Replaces the content hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Installs an observer notified of scan progress.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Scanner configuration.
    #[must_use]
    pub const fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Registered plugin directories, in registration order.
    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// In-memory cache, as loaded by [`initialize`](Self::initialize) and
    /// updated by each scan.
    #[must_use]
    pub const fn cache(&self) -> &ScanCache {
        &self.cache
    }

    /// Registers a plugin directory. Registering the same directory twice
    /// has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if `directory` is not a directory.
    pub fn add_directory(&mut self, directory: impl AsRef<Path>) -> Result<()> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(Error::ConfigError {
                message: format!("not a directory: {}", directory.display()),
            });
        }

        if !self.directories.iter().any(|d| d == directory) {
            tracing::debug!("Registered plugin directory {}", directory.display());
            self.directories.push(directory.to_path_buf());
        }
        Ok(())
    }

    /// Loads the persisted cache, creating the base directory and an empty
    /// cache file if needed. Must be called before [`scan`](Self::scan).
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the base directory or cache file cannot be created
    /// - [`Error::SerializationError`] if an existing cache file is corrupt
    pub fn initialize(&mut self) -> Result<()> {
        fs::create_dir_all(&self.config.base_dir)
            .map_err(|e| Error::io("create base directory", &self.config.base_dir, e))?;

        self.cache = self.cache_file.load()?;
        self.initialized = true;
        Ok(())
    }

    /// Scans every registered directory.
    ///
    /// The full cache is written to disk after the attempt whether it
    /// succeeded, failed or panicked.
    ///
    /// # Errors
    ///
    /// - [`Error::StateError`] if [`initialize`](Self::initialize) was not called
    /// - [`Error::UnpackingError`] if any extraction of a directory batch fails
    ///   or two archives of one directory map to the same unpack directory
    /// - [`Error::Io`] if hashing, deleting an outdated unpack directory or
    ///   writing the cache fails
    pub fn scan(&mut self, mode: ScanMode) -> Result<ScanReport> {
        if !self.initialized {
            return Err(Error::state(
                "Scanner is not initialized, call initialize() first",
            ));
        }

        let outcome = {
            let mut guard = PersistOnUnwind { scanner: self };
            guard.scanner.scan_directories(mode)
        };
        let persisted = self.cache_file.save(&self.cache);

        let report = match (outcome, persisted) {
            (Ok(report), Ok(())) => report,
            (Err(scan_err), Err(save_err)) => {
                tracing::error!("Failed to persist scan cache after failed scan: {save_err}");
                return Err(scan_err);
            }
            (Err(err), Ok(())) | (Ok(_), Err(err)) => return Err(err),
        };

        self.has_scanned = true;
        tracing::info!(
            "Scan finished: {} extracted, {} reused, {} replaced",
            report.extracted,
            report.reused,
            report.replaced
        );
        Ok(report)
    }

    /// Every cached package state across directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateError`] before the first successful scan.
    pub fn get_all(&self) -> Result<HashSet<PackageState>> {
        Ok(self.stream_all()?.cloned().collect())
    }

    /// Iterates every cached package state across directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateError`] before the first successful scan.
    pub fn stream_all(&self) -> Result<impl Iterator<Item = &PackageState>> {
        if !self.has_scanned {
            return Err(Error::state("Hasn't scanned yet"));
        }
        Ok(self.cache.iter())
    }

    fn scan_directories(&mut self, mode: ScanMode) -> Result<ScanReport> {
        if mode == ScanMode::Force {
            tracing::info!("Forced scan, discarding {} cached packages", self.cache.len());
            self.cache.clear();
        }

        let mut report = ScanReport::default();
        for directory in self.directories.clone() {
            let states = self.scan_directory(&directory, &mut report)?;
            self.cache.replace_directory(directory, states);
        }
        Ok(report)
    }

    fn scan_directory(&self, directory: &Path, report: &mut ScanReport) -> Result<HashSet<PackageState>> {
        let mut states = HashSet::new();
        let mut jobs = Vec::new();
        // Unpack directory -> archive that owns it in this batch
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

        for archive in self.list_archives(directory)? {
            let content_hash = self.hasher.hash_file(&archive)?;

            let by_name = archive
                .file_name()
                .and_then(|name| self.cache.find_by_name(name));
            let by_hash = self.cache.find_by_hash(&content_hash);

            match (by_name, by_hash) {
                (Some(named), Some(hashed)) => {
                    let cached = if named.content_hash() == Some(&content_hash) {
                        named
                    } else {
                        hashed
                    };
                    if cached.unpack_dir().is_some_and(Path::is_dir) {
                        tracing::info!(
                            "Skipping file {}. Hasn't changed since last scan. Use ScanMode::Force to force",
                            archive.display()
                        );
                        self.observer.archive_skipped(&archive);
                        // Reused directories may be shared, but never written
                        if let Some(dir) = cached.unpack_dir() {
                            claimed.entry(dir.to_path_buf()).or_insert_with(|| archive.clone());
                        }
                        states.insert(cached.clone());
                        report.reused += 1;
                        continue;
                    }
                    tracing::warn!(
                        "Unpack directory of unchanged {} is missing, extracting again",
                        archive.display()
                    );
                }
                (Some(named), None) => {
                    if let Some(old_dir) = named.unpack_dir() {
                        tracing::info!(
                            "{} changed since last scan, replacing {}",
                            archive.display(),
                            old_dir.display()
                        );
                        self.remove_unpack_dir(old_dir)?;
                        report.replaced += 1;
                    }
                }
                _ => {}
            }

            let target = self.extractor.target_for(&archive)?;
            claim_target(&mut claimed, target.clone(), &archive)?;
            if target.exists() {
                tracing::warn!("Removing stale unpack directory {}", target.display());
                self.remove_unpack_dir(&target)?;
            }

            jobs.push(ExtractionJob {
                archive,
                content_hash,
            });
        }

        let extracted = self.run_extractions(directory, jobs)?;
        report.extracted += extracted.len();
        states.extend(extracted);
        Ok(states)
    }

    /// Archive files directly inside `directory`, sorted by path.
    fn list_archives(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Plugin directory {} disappeared", directory.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::io("list plugin directory", directory, e)),
        };

        let mut archives = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| Error::io("list plugin directory", directory, e))?
                .path();
            if path.is_file() && self.config.is_archive(&path) {
                archives.push(path);
            }
        }
        archives.sort();
        Ok(archives)
    }

    /// Runs one directory batch on the pool and collects results as tasks
    /// complete. The first failure aborts the batch; side effects of tasks
    /// that already succeeded are kept.
    fn run_extractions(&self, directory: &Path, jobs: Vec<ExtractionJob>) -> Result<Vec<PackageState>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let submitted = jobs.len();
        let (tx, rx) = crossbeam_channel::unbounded();
        let extractor = &self.extractor;
        let observer = self.observer.as_ref();

        self.pool.scope(|scope| {
            for job in jobs {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = extract_job(extractor, observer, job);
                    // The receiver outlives the scope, so sending cannot fail
                    let _ = tx.send(result);
                });
            }
        });
        drop(tx);

        let mut extracted = Vec::with_capacity(submitted);
        let mut first_failure = None;
        for result in rx {
            match result {
                Ok(state) => extracted.push(state),
                Err(err) => {
                    tracing::error!("Extraction in {} failed: {err}", directory.display());
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }

        if let Some(err) = first_failure {
            return Err(Error::UnpackingError {
                archive: directory.to_path_buf(),
                message: format!(
                    "extraction batch aborted ({} of {submitted} archives unpacked)",
                    extracted.len()
                ),
                source: Some(Box::new(err)),
            });
        }

        Ok(extracted)
    }

    fn remove_unpack_dir(&self, dir: &Path) -> Result<()> {
        match fs::remove_dir_all(dir) {
            Ok(()) => {
                tracing::debug!("Deleted unpack directory {}", dir.display());
                self.observer.unpack_dir_removed(dir);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io("delete unpack directory", dir, e)),
        }
    }
}

/// Reserves `target` for extracting `archive`, failing if another archive of
/// the same batch is reused from or extracted into it.
fn claim_target(claimed: &mut HashMap<PathBuf, PathBuf>, target: PathBuf, archive: &Path) -> Result<()> {
    if let Some(owner) = claimed.get(&target) {
        return Err(Error::UnpackingError {
            archive: archive.to_path_buf(),
            message: format!(
                "unpack directory {} is already used by {}",
                target.display(),
                owner.display()
            ),
            source: None,
        });
    }
    claimed.insert(target, archive.to_path_buf());
    Ok(())
}

/// Writes the cache if a scan unwinds, so a panicking worker or hasher does
/// not lose the states recorded by earlier batches.
struct PersistOnUnwind<'a> {
    scanner: &'a mut PackageScanner,
}

impl Drop for PersistOnUnwind<'_> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        if let Err(err) = self.scanner.cache_file.save(&self.scanner.cache) {
            tracing::error!("Failed to persist scan cache while unwinding: {err}");
        }
    }
}

fn extract_job(
    extractor: &ArchiveExtractor,
    observer: &dyn ScanObserver,
    job: ExtractionJob,
) -> Result<PackageState> {
    let mut state = PackageState::discovered(&job.archive);
    state.set_content_hash(job.content_hash);

    let summary = extractor.extract(&job.archive, observer)?;
    state.mark_extracted(&summary.root)?;
    observer.archive_extracted(&job.archive, &summary.root);

    Ok(state)
}

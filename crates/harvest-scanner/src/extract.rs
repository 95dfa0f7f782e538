//! Archive extraction.
//!
//! Unpacks one archive into a freshly created directory under the scanner's
//! base directory. Extraction is not transactional: a failure partway leaves
//! a partially populated directory behind, which the scanner removes before
//! it extracts an archive of the same name again.

use harvest_core::traits::ScanObserver;
use harvest_core::{Error, Result, ScannerConfig};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Outcome of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackSummary {
    /// Created unpack directory
    pub root: PathBuf,
    /// Number of directory entries created
    pub directories: usize,
    /// Number of file entries written
    pub files: usize,
    /// Total bytes written
    pub bytes: u64,
}

/// Unpacks archives into `<base_dir>/<unpack_prefix><archive base name>`.
///
/// The archive base name is the file name with the primary archive
/// extension (the first configured one, `jar` by default) removed; other
/// archive kinds keep their full file name so `app.jar` and `app.war` never
/// share a directory.
///
/// # Examples
///
/// ```
/// use harvest_core::ScannerConfig;
/// use harvest_scanner::ArchiveExtractor;
/// use std::path::Path;
///
/// let extractor = ArchiveExtractor::new(&ScannerConfig::new("/base"));
/// assert_eq!(
///     extractor.target_for(Path::new("plugins/metrics.jar")).unwrap(),
///     Path::new("/base/KMS-Plugin-metrics")
/// );
/// assert_eq!(
///     extractor.target_for(Path::new("plugins/console.war")).unwrap(),
///     Path::new("/base/KMS-Plugin-console.war")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    config: ScannerConfig,
}

impl ArchiveExtractor {
    /// Creates an extractor that unpacks below `config.base_dir`.
    #[must_use]
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Computes the unpack directory for `archive` without touching disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnpackingError`] if the archive has no UTF-8 file name.
    pub fn target_for(&self, archive: &Path) -> Result<PathBuf> {
        let file_name = archive
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::UnpackingError {
                archive: archive.to_path_buf(),
                message: "archive has no usable file name".to_string(),
                source: None,
            })?;

        let base_name = self
            .config
            .archive_extensions
            .first()
            .and_then(|ext| file_name.strip_suffix(&format!(".{ext}")))
            .unwrap_or(file_name);

        Ok(self.config.unpack_dir_for(base_name))
    }

    /// Unpacks `archive` into a newly created directory.
    ///
    /// Directory entries create subdirectories (idempotently); file entries
    /// are streamed to the mirrored relative path. Every file entry must be
    /// written completely.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the target already exists or any write fails
    /// - [`Error::UnpackingError`] if the archive is unreadable or contains
    ///   an entry that would escape the unpack directory
    pub fn extract(&self, archive: &Path, observer: &dyn ScanObserver) -> Result<UnpackSummary> {
        let root = self.target_for(archive)?;

        let file = File::open(archive).map_err(|e| Error::io("open archive", archive, e))?;
        let mut zip = ZipArchive::new(file).map_err(|e| unpacking(archive, "not a readable archive", e))?;

        fs::create_dir(&root).map_err(|e| Error::io("create unpack directory", &root, e))?;
        tracing::debug!("Created unpack directory: {}", root.display());

        let mut summary = UnpackSummary {
            root: root.clone(),
            directories: 0,
            files: 0,
            bytes: 0,
        };

        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| unpacking(archive, "corrupt archive entry", e))?;

            let Some(relative) = entry.enclosed_name() else {
                return Err(Error::UnpackingError {
                    archive: archive.to_path_buf(),
                    message: format!("entry '{}' escapes the unpack directory", entry.name()),
                    source: None,
                });
            };
            let dest = root.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&dest).map_err(|e| Error::io("create directory", &dest, e))?;
                summary.directories += 1;
                tracing::debug!("Creating directory {}", dest.display());
                continue;
            }

            // Archives are not required to carry explicit directory entries
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;
            }

            let expected = entry.size();
            let mut out = File::create(&dest).map_err(|e| Error::io("create file", &dest, e))?;
            let written = io::copy(&mut entry, &mut out).map_err(|e| Error::io("write entry", &dest, e))?;
            if written != expected {
                return Err(Error::io(
                    "write entry",
                    &dest,
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("wrote {written} of {expected} bytes"),
                    ),
                ));
            }

            tracing::debug!("Unzipped file {}", dest.display());
            observer.entry_unpacked(archive, &dest);
            summary.files += 1;
            summary.bytes += written;
        }

        tracing::info!(
            "Finished unpacking {} into {} ({} files, {} bytes)",
            archive.display(),
            root.display(),
            summary.files,
            summary.bytes
        );

        Ok(summary)
    }
}

fn unpacking(archive: &Path, message: &str, source: zip::result::ZipError) -> Error {
    Error::UnpackingError {
        archive: archive.to_path_buf(),
        message: message.to_string(),
        source: Some(Box::new(source)),
    }
}

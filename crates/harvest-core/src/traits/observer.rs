//! Scan progress hooks.

use std::path::Path;

/// Observer notified as the scanner makes progress.
///
/// Hooks may be called concurrently from extraction workers, so
/// implementations must be `Send + Sync`. Every hook has an empty default
/// body; implement only what you need.
///
/// See [`ScanCounters`](crate::stats::ScanCounters) for a counting
/// implementation.
pub trait ScanObserver: Send + Sync {
    /// An unchanged archive was reused from the cache.
    fn archive_skipped(&self, _archive: &Path) {}

    /// An archive was fully unpacked into `unpack_dir`.
    fn archive_extracted(&self, _archive: &Path, _unpack_dir: &Path) {}

    /// One file entry of an archive was written to `target`.
    fn entry_unpacked(&self, _archive: &Path, _target: &Path) {}

    /// A stale or outdated unpack directory was deleted.
    fn unpack_dir_removed(&self, _unpack_dir: &Path) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

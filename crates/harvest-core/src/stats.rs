//! Scan statistics.
//!
//! [`ScanCounters`] is a [`ScanObserver`] that counts scanner events with
//! atomics. Each scanner gets its own instance, so there is no process-wide
//! state; a [`ScanStats`] snapshot can be captured at any time and exported
//! as JSON.
//!
//! # Examples
//!
//! ```rust
//! use harvest_core::stats::ScanCounters;
//! use harvest_core::traits::ScanObserver;
//! use std::path::Path;
//!
//! let counters = ScanCounters::new();
//! counters.archive_skipped(Path::new("plugins/a.jar"));
//! counters.entry_unpacked(Path::new("plugins/b.jar"), Path::new("/u/B/x.class"));
//!
//! let stats = counters.snapshot();
//! assert_eq!(stats.archives_skipped, 1);
//! assert_eq!(stats.entries_unpacked, 1);
//!
//! let json = serde_json::to_string_pretty(&stats).unwrap();
//! assert!(json.contains("archives_skipped"));
//! ```

use crate::traits::ScanObserver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of scan counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Timestamp when this snapshot was captured (UTC).
    pub snapshot_time: DateTime<Utc>,
    /// Archives unpacked.
    pub archives_extracted: u64,
    /// Archives reused from the cache.
    pub archives_skipped: u64,
    /// File entries written during extraction.
    pub entries_unpacked: u64,
    /// Unpack directories deleted.
    pub unpack_dirs_removed: u64,
}

/// Atomic counters fed by scanner events.
#[derive(Debug, Default)]
pub struct ScanCounters {
    archives_extracted: AtomicU64,
    archives_skipped: AtomicU64,
    entries_unpacked: AtomicU64,
    unpack_dirs_removed: AtomicU64,
}

impl ScanCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> ScanStats {
        ScanStats {
            snapshot_time: Utc::now(),
            archives_extracted: self.archives_extracted.load(Ordering::Relaxed),
            archives_skipped: self.archives_skipped.load(Ordering::Relaxed),
            entries_unpacked: self.entries_unpacked.load(Ordering::Relaxed),
            unpack_dirs_removed: self.unpack_dirs_removed.load(Ordering::Relaxed),
        }
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        self.archives_extracted.store(0, Ordering::Relaxed);
        self.archives_skipped.store(0, Ordering::Relaxed);
        self.entries_unpacked.store(0, Ordering::Relaxed);
        self.unpack_dirs_removed.store(0, Ordering::Relaxed);
    }
}

impl ScanObserver for ScanCounters {
    fn archive_skipped(&self, _archive: &Path) {
        self.archives_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn archive_extracted(&self, _archive: &Path, _unpack_dir: &Path) {
        self.archives_extracted.fetch_add(1, Ordering::Relaxed);
    }

    fn entry_unpacked(&self, _archive: &Path, _target: &Path) {
        self.entries_unpacked.fetch_add(1, Ordering::Relaxed);
    }

    fn unpack_dir_removed(&self, _unpack_dir: &Path) {
        self.unpack_dirs_removed.fetch_add(1, Ordering::Relaxed);
    }
}

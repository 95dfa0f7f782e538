//! Cache-aware discovery and extraction of plugin archives.
//!
//! The scanner lists archives (`.jar`, `.war` by default) in registered
//! plugin directories, hashes each one, compares it with the state persisted
//! by previous runs and unpacks only what changed. Extraction runs on a
//! bounded worker pool; results are collected as workers finish.
//!
//! # Architecture
//!
//! ```text
//! <base_dir>/
//! ├── plugins.cache            # JSON: plugin directory -> package states
//! ├── KMS-Plugin-metrics/      # unpacked metrics.jar
//! │   ├── META-INF/
//! │   └── com/acme/Metrics.class
//! └── KMS-Plugin-audit/
//!     └── ...
//! ```
//!
//! # Features
//!
//! - **Change detection**: content hashes decide what gets re-extracted
//! - **Durability**: the cache is rewritten after every scan attempt
//! - **Concurrency**: bounded pool, completion-order aggregation
//! - **Observability**: `tracing` logs plus an injectable [`ScanObserver`]
//!
//! [`ScanObserver`]: harvest_core::traits::ScanObserver
//!
//! # Examples
//!
//! ```no_run
//! use harvest_core::{ScanMode, ScannerConfig};
//! use harvest_scanner::PackageScanner;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut scanner = PackageScanner::new(ScannerConfig::new("/var/lib/harvest"))?;
//! scanner.initialize()?;
//! scanner.add_directory("/opt/app/plugins")?;
//!
//! let report = scanner.scan(ScanMode::SkipAlreadyScanned)?;
//! println!("{} extracted, {} reused", report.extracted, report.reused);
//!
//! for state in scanner.stream_all()? {
//!     println!("{} -> {:?}", state.archive().display(), state.unpack_dir());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod cache;
pub mod checksum;
pub mod extract;
pub mod scanner;

pub use cache::{CacheFile, ScanCache};
pub use checksum::Blake3Hasher;
pub use extract::{ArchiveExtractor, UnpackSummary};
pub use scanner::{PackageScanner, ScanReport};

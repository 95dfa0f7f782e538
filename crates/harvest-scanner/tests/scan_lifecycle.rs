//! Integration tests for the scan lifecycle.
//!
//! These tests drive a real scanner over temporary plugin directories and
//! check change detection, forced rescans, cache durability and concurrent
//! extraction.

use harvest_core::stats::ScanCounters;
use harvest_core::traits::ContentHasher;
use harvest_core::{ContentHash, PackageState, Result, ScanMode, ScannerConfig};
use harvest_scanner::{Blake3Hasher, CacheFile, PackageScanner};
use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Writes a jar containing the given entries.
fn write_jar(path: &Path, files: &[(&str, &[u8])]) {
    let mut writer = zip::ZipWriter::new(fs::File::create(path).expect("create jar"));
    for (name, data) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(data).expect("write entry");
    }
    writer.finish().expect("finish jar");
}

struct Fixture {
    _temp: TempDir,
    base: PathBuf,
    plugins: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        let base = temp.path().join("base");
        let plugins = temp.path().join("plugins");
        fs::create_dir(&plugins).expect("create plugin dir");
        Self {
            _temp: temp,
            base,
            plugins,
        }
    }

    fn scanner(&self, workers: usize) -> (PackageScanner, Arc<ScanCounters>) {
        let counters = Arc::new(ScanCounters::new());
        let config = ScannerConfig::builder(&self.base).worker_threads(workers).build();
        let mut scanner = PackageScanner::new(config)
            .expect("valid config")
            .with_observer(counters.clone());
        scanner.initialize().expect("initialize");
        scanner.add_directory(&self.plugins).expect("register plugins");
        (scanner, counters)
    }
}

/// Scanning an unchanged directory twice reuses everything the second time
#[test]
fn test_unchanged_scan_is_idempotent() {
    let fx = Fixture::new();
    write_jar(&fx.plugins.join("a.jar"), &[("a/A.class", b"A".as_slice())]);
    write_jar(&fx.plugins.join("b.jar"), &[("b/B.class", b"B".as_slice())]);

    let (mut scanner, counters) = fx.scanner(4);
    scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();
    let first = scanner.get_all().unwrap();
    assert_eq!(counters.snapshot().archives_extracted, 2);

    counters.reset();
    let report = scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();
    let second = scanner.get_all().unwrap();

    assert_eq!(first, second);
    assert_eq!(report.extracted, 0);
    assert_eq!(report.reused, 2);
    assert_eq!(counters.snapshot().archives_extracted, 0);
    assert_eq!(counters.snapshot().archives_skipped, 2);
}

/// Replacing an archive's bytes deletes the old tree and extracts again
#[test]
fn test_changed_archive_is_replaced() {
    let fx = Fixture::new();
    let jar = fx.plugins.join("app.jar");
    write_jar(&jar, &[("old/Old.class", b"old".as_slice())]);

    let (mut scanner, counters) = fx.scanner(4);
    scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();
    let old_hash = scanner
        .get_all()
        .unwrap()
        .into_iter()
        .next()
        .and_then(|s| s.content_hash().cloned())
        .unwrap();

    write_jar(&jar, &[("new/New.class", b"new".as_slice())]);
    let report = scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();

    assert_eq!(report.replaced, 1);
    assert_eq!(report.extracted, 1);
    assert_eq!(counters.snapshot().unpack_dirs_removed, 1);

    let states = scanner.get_all().unwrap();
    assert_eq!(states.len(), 1);
    let state = states.iter().next().unwrap();
    assert_ne!(state.content_hash(), Some(&old_hash));

    let unpacked = state.unpack_dir().unwrap();
    assert!(unpacked.join("new/New.class").is_file());
    assert!(!unpacked.join("old").exists());
}

/// FORCE re-extracts archives whose content did not change
#[test]
fn test_force_reextracts_everything() {
    let fx = Fixture::new();
    write_jar(&fx.plugins.join("a.jar"), &[("A.class", b"A".as_slice())]);
    write_jar(&fx.plugins.join("b.war"), &[("WEB-INF/B.class", b"B".as_slice())]);

    let (mut scanner, counters) = fx.scanner(4);
    scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();
    counters.reset();

    let report = scanner.scan(ScanMode::Force).unwrap();
    assert_eq!(report.extracted, 2);
    assert_eq!(report.reused, 0);
    assert_eq!(counters.snapshot().archives_extracted, 2);
    assert_eq!(scanner.get_all().unwrap().len(), 2);
    assert!(fx.base.join("KMS-Plugin-a/A.class").is_file());
    assert!(fx.base.join("KMS-Plugin-b.war/WEB-INF/B.class").is_file());
}

/// A fresh scanner restores the same states from the cache file
#[test]
fn test_cache_survives_restart() {
    let fx = Fixture::new();
    write_jar(&fx.plugins.join("a.jar"), &[("x/A.class", b"A".as_slice())]);
    write_jar(&fx.plugins.join("b.jar"), &[("y/B.class", b"B".as_slice())]);

    let persisted: HashSet<PackageState> = {
        let (mut scanner, _) = fx.scanner(2);
        scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();
        scanner.get_all().unwrap()
    };

    let (mut restarted, counters) = fx.scanner(2);
    let restored: HashSet<PackageState> = restarted.cache().iter().cloned().collect();
    assert_eq!(restored, persisted);

    let report = restarted.scan(ScanMode::SkipAlreadyScanned).unwrap();
    assert_eq!(report.extracted, 0);
    assert_eq!(counters.snapshot().archives_extracted, 0);
    assert_eq!(restarted.get_all().unwrap(), persisted);
}

/// N archives always yield N states, regardless of pool width
#[test]
fn test_concurrent_extraction_loses_nothing() {
    const ARCHIVES: usize = 24;

    for workers in [1, 4, 16] {
        let fx = Fixture::new();
        for i in 0..ARCHIVES {
            let body = format!("class-{i}");
            write_jar(
                &fx.plugins.join(format!("plugin-{i}.jar")),
                &[(&format!("p{i}/C{i}.class"), body.as_bytes())],
            );
        }

        let (mut scanner, _) = fx.scanner(workers);
        let report = scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();
        let states = scanner.get_all().unwrap();

        assert_eq!(report.extracted, ARCHIVES, "workers = {workers}");
        assert_eq!(states.len(), ARCHIVES, "workers = {workers}");
        let archives: HashSet<_> = states.iter().map(|s| s.archive().to_path_buf()).collect();
        assert_eq!(archives.len(), ARCHIVES, "duplicate archives with {workers} workers");
        assert!(states.iter().all(PackageState::is_extracted));
    }
}

/// One corrupt archive aborts the batch but the cache is still written
#[test]
fn test_failed_batch_still_persists_cache() {
    let fx = Fixture::new();
    let healthy = fx.plugins.join("healthy.jar");
    write_jar(&healthy, &[("H.class", b"H".as_slice())]);

    let (mut scanner, _) = fx.scanner(4);
    scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();

    fs::write(fx.plugins.join("broken.jar"), b"this is not a zip archive").unwrap();
    let err = scanner.scan(ScanMode::SkipAlreadyScanned).unwrap_err();
    assert!(err.is_unpacking_error());
    assert!(err.to_string().contains(&fx.plugins.display().to_string()));

    // The previous successful state is still what the cache file holds
    let on_disk = CacheFile::new(fx.base.join("plugins.cache")).load().unwrap();
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk.iter().next().unwrap().archive(), healthy.as_path());

    // Results of the last successful scan stay queryable
    assert_eq!(scanner.get_all().unwrap().len(), 1);
}

/// A renamed copy of a known archive is extracted, not deduplicated
#[test]
fn test_hash_match_without_name_match_extracts() {
    let fx = Fixture::new();
    write_jar(&fx.plugins.join("orig.jar"), &[("O.class", b"same".as_slice())]);

    let (mut scanner, _) = fx.scanner(4);
    scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();

    fs::copy(fx.plugins.join("orig.jar"), fx.plugins.join("copy.jar")).unwrap();
    let report = scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();

    assert_eq!(report.reused, 1);
    assert_eq!(report.extracted, 1);
    assert!(fx.base.join("KMS-Plugin-copy/O.class").is_file());
}

/// Archives in several directories are all tracked
#[test]
fn test_multiple_directories() {
    let fx = Fixture::new();
    let extra = fx.base.parent().unwrap().join("more-plugins");
    fs::create_dir(&extra).unwrap();
    write_jar(&fx.plugins.join("a.jar"), &[("A.class", b"A".as_slice())]);
    write_jar(&extra.join("b.jar"), &[("B.class", b"B".as_slice())]);

    let (mut scanner, _) = fx.scanner(4);
    scanner.add_directory(&extra).unwrap();
    scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();

    assert_eq!(scanner.get_all().unwrap().len(), 2);
    assert_eq!(scanner.cache().directory(&extra).map(HashSet::len), Some(1));
    assert_eq!(scanner.cache().directories().count(), 2);
}

/// An archive removed from its directory disappears from the results
#[test]
fn test_removed_archive_is_dropped() {
    let fx = Fixture::new();
    write_jar(&fx.plugins.join("a.jar"), &[("A.class", b"A".as_slice())]);
    write_jar(&fx.plugins.join("b.jar"), &[("B.class", b"B".as_slice())]);

    let (mut scanner, _) = fx.scanner(4);
    scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();

    fs::remove_file(fx.plugins.join("b.jar")).unwrap();
    scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();

    let states = scanner.get_all().unwrap();
    assert_eq!(states.len(), 1);
    assert!(states.iter().all(|s| s.file_name() == Some(std::ffi::OsStr::new("a.jar"))));
}

/// Two archives that share an unpack directory fail before anything is unpacked
#[test]
fn test_colliding_unpack_targets_are_rejected() {
    let fx = Fixture::new();
    write_jar(&fx.plugins.join("a.war"), &[("W.class", b"war".as_slice())]);
    write_jar(&fx.plugins.join("a.war.jar"), &[("J.class", b"jar".as_slice())]);

    let (mut scanner, counters) = fx.scanner(4);
    let err = scanner.scan(ScanMode::SkipAlreadyScanned).unwrap_err();

    assert!(err.is_unpacking_error());
    let message = err.to_string();
    assert!(message.contains("a.war.jar"), "{message}");
    assert!(message.contains(&fx.plugins.join("a.war").display().to_string()), "{message}");
    assert_eq!(counters.snapshot().archives_extracted, 0);
    assert!(!fx.base.join("KMS-Plugin-a.war").exists());
}

/// Hashes normally but panics on one archive name.
struct PanicOn(&'static str);

impl ContentHasher for PanicOn {
    fn hash_reader(&self, reader: &mut dyn Read) -> Result<ContentHash> {
        Blake3Hasher.hash_reader(reader)
    }

    fn hash_file(&self, path: &Path) -> Result<ContentHash> {
        assert!(
            path.file_name() != Some(std::ffi::OsStr::new(self.0)),
            "hasher failure on {}",
            path.display()
        );
        Blake3Hasher.hash_file(path)
    }
}

/// States of finished directories reach the cache file even if a later one panics
#[test]
fn test_panicking_scan_still_persists_cache() {
    let fx = Fixture::new();
    let later = fx.base.parent().unwrap().join("zz-plugins");
    fs::create_dir(&later).unwrap();
    write_jar(&fx.plugins.join("good.jar"), &[("G.class", b"G".as_slice())]);
    write_jar(&later.join("boom.jar"), &[("B.class", b"B".as_slice())]);

    let config = ScannerConfig::builder(&fx.base).worker_threads(2).build();
    let mut scanner = PackageScanner::new(config)
        .unwrap()
        .with_hasher(Arc::new(PanicOn("boom.jar")));
    scanner.initialize().unwrap();
    scanner.add_directory(&fx.plugins).unwrap();
    scanner.add_directory(&later).unwrap();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        scanner.scan(ScanMode::SkipAlreadyScanned)
    }));
    assert!(outcome.is_err());

    let on_disk = CacheFile::new(fx.base.join("plugins.cache")).load().unwrap();
    assert_eq!(on_disk.len(), 1);
    assert_eq!(
        on_disk.iter().next().unwrap().archive(),
        fx.plugins.join("good.jar").as_path()
    );
}

/// Reusing another entry's unpack directory is not a collision
#[test]
fn test_shared_reuse_is_not_a_collision() {
    let fx = Fixture::new();
    write_jar(&fx.plugins.join("x.jar"), &[("X.class", b"x".as_slice())]);
    write_jar(&fx.plugins.join("y.jar"), &[("Y.class", b"y".as_slice())]);

    let (mut scanner, _) = fx.scanner(4);
    scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();

    fs::copy(fx.plugins.join("y.jar"), fx.plugins.join("x.jar")).unwrap();
    let report = scanner.scan(ScanMode::SkipAlreadyScanned).unwrap();

    assert_eq!(report.reused, 2);
    assert_eq!(report.extracted, 0);
}

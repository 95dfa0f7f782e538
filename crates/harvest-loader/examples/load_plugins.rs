//! Plugin loading example
//!
//! Demonstrates:
//! - Scanning a plugin directory and unpacking its archives
//! - Traversing unpacked archives for class files
//! - Handing each module to a host definer
//! - Reading scan counters afterwards
//!
//! Run with:
//! ```bash
//! cargo run --example load_plugins -- <plugin-dir> [base-dir]
//! ```
//!
//! Set `RUST_LOG=harvest=debug` for per-entry logging.

use harvest_core::stats::ScanCounters;
use harvest_core::traits::ModuleDefiner;
use harvest_core::{BoxError, ScannerConfig, TraversalConfig};
use harvest_loader::PluginLoader;
use harvest_scanner::PackageScanner;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Host that only checks the class file magic and reports sizes.
#[derive(Debug)]
struct ClassFileSizes;

impl ModuleDefiner for ClassFileSizes {
    type Handle = (String, usize);

    fn define_module(&self, identifier: &str, bytes: Vec<u8>) -> Result<Self::Handle, BoxError> {
        if !bytes.starts_with(&[0xCA, 0xFE, 0xBA, 0xBE]) {
            return Err(format!("{identifier} is not a class file").into());
        }
        Ok((identifier.to_string(), bytes.len()))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("harvest=info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let plugin_dir = args.next().map(PathBuf::from).ok_or("usage: load_plugins <plugin-dir> [base-dir]")?;
    let base_dir = args
        .next()
        .map_or_else(|| env::temp_dir().join("harvest"), PathBuf::from);

    println!("Harvest - Plugin Loading Example\n");
    println!("Plugins: {}", plugin_dir.display());
    println!("Base:    {}\n", base_dir.display());

    let counters = Arc::new(ScanCounters::new());
    let mut scanner = PackageScanner::new(ScannerConfig::new(&base_dir))?.with_observer(counters.clone());
    scanner.initialize()?;
    scanner.add_directory(&plugin_dir)?;

    let mut loader = PluginLoader::with_scanner(scanner, TraversalConfig::default(), ClassFileSizes)?;
    let modules = loader.load()?;

    for (identifier, size) in &modules {
        println!("  {identifier:<60} {size:>8} bytes");
    }

    let stats = counters.snapshot();
    println!("\nLoaded {} modules", modules.len());
    println!("Archives extracted: {}", stats.archives_extracted);
    println!("Archives reused:    {}", stats.archives_skipped);
    println!("Entries unpacked:   {}", stats.entries_unpacked);

    Ok(())
}

//! Module discovery and loading for unpacked plugin archives.
//!
//! [`ModuleTraverser`] walks one unpack directory and derives a canonical
//! dot-delimited identifier for every module file it finds.
//! [`PluginLoader`] ties scanning and traversal together: it refreshes the
//! unpacked archives, collects their modules and passes each one to a host
//! supplied [`ModuleDefiner`].
//!
//! [`ModuleDefiner`]: harvest_core::traits::ModuleDefiner
//!
//! # Identifier derivation
//!
//! | Relative path                          | Identifier  |
//! |----------------------------------------|-------------|
//! | `a/b/Foo.class`                        | `a.b.Foo`   |
//! | `BOOT-INF/classes/com/x/Y.class`       | `com.x.Y`   |
//! | `Root.class` (first-level file)        | *(empty)*   |
//!
//! # Examples
//!
//! ```no_run
//! use harvest_core::traits::ModuleDefiner;
//! use harvest_core::{BoxError, ScannerConfig, TraversalConfig};
//! use harvest_loader::PluginLoader;
//!
//! struct Sizes;
//!
//! impl ModuleDefiner for Sizes {
//!     type Handle = (String, usize);
//!
//!     fn define_module(&self, identifier: &str, bytes: Vec<u8>) -> Result<Self::Handle, BoxError> {
//!         Ok((identifier.to_string(), bytes.len()))
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut loader = PluginLoader::new(
//!     ScannerConfig::new("/var/lib/harvest"),
//!     TraversalConfig::default(),
//!     ["/opt/app/plugins"],
//!     Sizes,
//! )?;
//!
//! for (identifier, size) in loader.load()? {
//!     println!("{identifier}: {size} bytes");
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod loader;
pub mod traverser;

pub use loader::PluginLoader;
pub use traverser::{ModuleTraverser, derive_identifier};

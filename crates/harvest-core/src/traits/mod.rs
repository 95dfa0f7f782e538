//! Capability traits supplied by the embedding application.
//!
//! # Module Structure
//!
//! - `hasher` - Content digest of archives
//! - `definer` - Host code-loading primitive
//! - `observer` - Scan progress hooks (metrics)

mod definer;
mod hasher;
mod observer;

pub use definer::ModuleDefiner;
pub use hasher::ContentHasher;
pub use observer::{NoopObserver, ScanObserver};

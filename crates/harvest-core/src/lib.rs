//! Core types, traits, and errors for archive plugin harvesting.
//!
//! This crate provides the foundational types and abstractions shared by the
//! scanner and loader crates in the workspace.
//!
//! # Architecture
//!
//! The core consists of:
//! - Domain types (`ContentHash`, `PackageState`, `ModuleUnit`, `ScanMode`)
//! - Error hierarchy with contextual information
//! - Capability traits injected by the embedding application
//!   (`ContentHasher`, `ModuleDefiner`, `ScanObserver`)
//! - Configuration types
//! - Scan statistics

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod config;
mod error;
mod types;

pub mod stats;
pub mod traits;

pub use config::{ScannerConfig, ScannerConfigBuilder, TraversalConfig};
pub use error::{BoxError, Error, Result};
pub use types::{ContentHash, ModuleUnit, PackageState, PackageStatus, ScanMode};

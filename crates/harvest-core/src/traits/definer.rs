//! Host code-loading primitive.

use crate::BoxError;

/// Turns a canonical identifier plus raw bytes into an executable module.
///
/// The loader depends only on this capability, never on a concrete host
/// mechanism. Implementations reject malformed content by returning an error.
///
/// # Examples
///
/// ```
/// use harvest_core::traits::ModuleDefiner;
/// use harvest_core::BoxError;
///
/// /// Records what would have been loaded.
/// struct DryRun;
///
/// impl ModuleDefiner for DryRun {
///     type Handle = (String, usize);
///
///     fn define_module(&self, identifier: &str, bytes: Vec<u8>) -> Result<Self::Handle, BoxError> {
///         if bytes.is_empty() {
///             return Err("empty module".into());
///         }
///         Ok((identifier.to_string(), bytes.len()))
///     }
/// }
///
/// assert_eq!(DryRun.define_module("a.B", vec![1, 2]).unwrap(), ("a.B".to_string(), 2));
/// assert!(DryRun.define_module("a.C", vec![]).is_err());
/// ```
pub trait ModuleDefiner {
    /// Handle to a loaded module.
    type Handle;

    /// Defines the module `identifier` from its raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the content.
    fn define_module(&self, identifier: &str, bytes: Vec<u8>) -> Result<Self::Handle, BoxError>;
}

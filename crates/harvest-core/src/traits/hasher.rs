//! Content hasher trait.

use crate::{ContentHash, Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Deterministic digest of a file or byte stream.
///
/// Used by the scanner to decide whether an archive changed since the last
/// scan. Any digest works as long as equal bytes always produce equal hashes.
///
/// # Examples
///
/// ```
/// use harvest_core::traits::ContentHasher;
/// use harvest_core::{ContentHash, Result, Error};
/// use std::io::Read;
///
/// struct LengthHasher;
///
/// impl ContentHasher for LengthHasher {
///     fn hash_reader(&self, reader: &mut dyn Read) -> Result<ContentHash> {
///         let mut buf = Vec::new();
///         reader.read_to_end(&mut buf).map_err(|e| Error::io("hash", "<stream>", e))?;
///         Ok(ContentHash::new(format!("{:x}", buf.len())))
///     }
/// }
///
/// let hash = LengthHasher.hash_reader(&mut &b"hello"[..]).unwrap();
/// assert_eq!(hash.as_str(), "5");
/// ```
pub trait ContentHasher: Send + Sync {
    /// Streams `reader` to its end and returns the digest.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the stream fails.
    fn hash_reader(&self, reader: &mut dyn Read) -> Result<ContentHash>;

    /// Hashes the full contents of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened or read.
    fn hash_file(&self, path: &Path) -> Result<ContentHash> {
        let mut file = File::open(path).map_err(|e| Error::io("open for hashing", path, e))?;
        self.hash_reader(&mut file).map_err(|err| match err {
            Error::Io {
                operation, source, ..
            } => Error::io(operation, path, source),
            other => other,
        })
    }
}

//! Blake3 content hashing for archive change detection.
//!
//! Digests are lowercase hex strings without an algorithm prefix, matching
//! the format stored in the scan cache.

use harvest_core::traits::ContentHasher;
use harvest_core::{ContentHash, Error, Result};
use std::io::{self, Read};

/// Read buffer used while streaming archives through the hasher.
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculates the Blake3 digest of an in-memory buffer.
///
/// # Examples
///
/// ```
/// use harvest_scanner::checksum::calculate_checksum;
///
/// let hash = calculate_checksum(b"Hello, world!");
/// assert_eq!(hash.as_str().len(), 64);
/// assert_eq!(hash, calculate_checksum(b"Hello, world!"));
/// ```
#[must_use]
pub fn calculate_checksum(data: &[u8]) -> ContentHash {
    ContentHash::new(blake3::hash(data).to_hex().to_string())
}

/// [`ContentHasher`] backed by Blake3.
///
/// # Examples
///
/// ```
/// use harvest_core::traits::ContentHasher;
/// use harvest_scanner::Blake3Hasher;
/// use harvest_scanner::checksum::calculate_checksum;
///
/// let streamed = Blake3Hasher.hash_reader(&mut &b"plugin bytes"[..]).unwrap();
/// assert_eq!(streamed, calculate_checksum(b"plugin bytes"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    fn hash_reader(&self, reader: &mut dyn Read) -> Result<ContentHash> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io("read for hashing", "<stream>", e)),
            };
            hasher.update(&buffer[..read]);
        }

        Ok(ContentHash::new(hasher.finalize().to_hex().to_string()))
    }
}

/*!
 * Streaming content digests for duplicate detection and copy verification
 */

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Read size used while hashing
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Fixed-length SHA-256 digest of a file's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Streaming hasher that calculates a digest incrementally
pub struct StreamingHasher {
    hasher: Sha256,
}

impl StreamingHasher {
    /// Create a new streaming hasher
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Update the hash with new data
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Finalize and return the digest
    pub fn finalize(self) -> ContentDigest {
        ContentDigest(self.hasher.finalize().into())
    }
}

impl Default for StreamingHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a file in bounded chunks. Errors (vanished file, permission denied
/// mid-read) are returned as-is; nothing is retried.
pub fn digest_file(path: &Path) -> Result<ContentDigest> {
    let mut file = BufReader::with_capacity(HASH_CHUNK_SIZE, File::open(path)?);
    let mut hasher = StreamingHasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Compare two files by digest
pub fn files_have_same_content(left: &Path, right: &Path) -> Result<bool> {
    let left = digest_file(left)?;
    let right = digest_file(right)?;
    Ok(left.as_bytes() == right.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_streaming_hasher() {
        let mut hasher = StreamingHasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");

        // SHA256 of "hello world"
        let expected = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert_eq!(hasher.finalize().to_hex(), expected);
    }

    #[test]
    fn test_digest_file_spans_chunks() {
        let mut temp = NamedTempFile::new().unwrap();
        let data = vec![7u8; HASH_CHUNK_SIZE * 2 + 13];
        temp.write_all(&data).unwrap();
        temp.flush().unwrap();

        let mut hasher = StreamingHasher::new();
        hasher.update(&data);

        assert_eq!(digest_file(temp.path()).unwrap(), hasher.finalize());
    }

    #[test]
    fn test_same_size_different_content() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let c = dir.path().join("c.bin");
        std::fs::write(&a, b"abcdef").unwrap();
        std::fs::write(&b, b"abcxef").unwrap();
        std::fs::write(&c, b"abcdef").unwrap();

        assert!(!files_have_same_content(&a, &b).unwrap());
        assert!(files_have_same_content(&a, &c).unwrap());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = digest_file(&dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, crate::error::BackupError::Io(_)));
    }
}

//! Streaming content hashers.
//!
//! # Overview
//!
//! This module provides the [`Hasher`] struct for computing content digests
//! of files using memory-efficient streaming: files are read in bounded
//! chunks, so arbitrarily large files never need to fit in memory.
//!
//! Two algorithms are supported (see [`HashAlgorithm`]): BLAKE3 (fast,
//! default) and SHA-256 (cryptographic). Both produce 32-byte digests, but
//! digests from different algorithms are never comparable; stores record
//! which algorithm produced them.
//!
//! # Example
//!
//! ```no_run
//! use dupindex::scanner::{HashAlgorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new(HashAlgorithm::Blake3);
//! let digest = hasher.hash_file(Path::new("/data/a.txt")).unwrap();
//! println!("{}", dupindex::scanner::hash_to_hex(&digest));
//! ```

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use super::HashError;

/// Content digest: 32 bytes under every supported algorithm.
pub type Digest = [u8; 32];

/// Read buffer size for streaming hashing (64 KiB).
const CHUNK_SIZE: usize = 64 * 1024;

/// Digest function used to hash file content.
///
/// Digests produced under different algorithms are never comparable.
/// The choice affects collision resistance and speed, not the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3: fast, cryptographically secure, the default.
    #[default]
    Blake3,
    /// SHA-256: slower, widely standardized.
    Sha256,
}

impl HashAlgorithm {
    /// Stable lowercase name used in persisted report headers.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized algorithm name.
#[derive(Debug, thiserror::Error)]
#[error("unknown hash algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for HashAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Streaming file hasher.
///
/// Deterministic across platforms and repeated calls on identical bytes.
/// Keeps a counter of how many files it has hashed, which rescan tests use
/// to prove that unchanged files were never re-read.
#[derive(Debug)]
pub struct Hasher {
    algorithm: HashAlgorithm,
    files_hashed: AtomicU64,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(HashAlgorithm::default())
    }
}

impl Hasher {
    /// Create a hasher for the given algorithm.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            files_hashed: AtomicU64::new(0),
        }
    }

    /// The algorithm this hasher computes.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Number of files hashed so far by this instance.
    #[must_use]
    pub fn files_hashed(&self) -> u64 {
        self.files_hashed.load(Ordering::Relaxed)
    }

    /// Hash a file's content, streaming it in bounded chunks.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or a read fails
    /// mid-stream (permission change, concurrent deletion). Such failures
    /// are per-file: callers skip the file and continue the scan.
    pub fn hash_file(&self, path: &Path) -> Result<Digest, HashError> {
        let mut file = File::open(path).map_err(|e| map_io_error(path, e))?;
        let mut state = DigestState::new(self.algorithm);
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = file.read(&mut buf).map_err(|e| map_io_error(path, e))?;
            if n == 0 {
                break;
            }
            state.update(&buf[..n]);
        }

        self.files_hashed.fetch_add(1, Ordering::Relaxed);
        Ok(state.finalize())
    }
}

/// In-progress digest computation, dispatched on the algorithm.
enum DigestState {
    Blake3(blake3::Hasher),
    Sha256(Sha256),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Self::Blake3(blake3::Hasher::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(bytes);
            }
            Self::Sha256(h) => h.update(bytes),
        }
    }

    fn finalize(self) -> Digest {
        match self {
            Self::Blake3(h) => *h.finalize().as_bytes(),
            Self::Sha256(h) => h.finalize().into(),
        }
    }
}

fn map_io_error(path: &Path, error: std::io::Error) -> HashError {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::NotFound => HashError::NotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => HashError::PermissionDenied(path.to_path_buf()),
        _ => HashError::Io {
            path: path.to_path_buf(),
            source: error,
        },
    }
}

/// Format a digest as a lowercase hex string (64 characters).
#[must_use]
pub fn hash_to_hex(digest: &Digest) -> String {
    use fmt::Write;

    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parse a 64-character hex string back into a digest.
///
/// Returns `None` if the string has the wrong length or contains
/// non-hex characters.
#[must_use]
pub fn hex_to_digest(hex: &str) -> Option<Digest> {
    if hex.len() != 64 || !hex.is_ascii() {
        return None;
    }
    let mut digest = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks_exact(2).enumerate() {
        let pair = std::str::from_utf8(chunk).ok()?;
        digest[i] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(digest)
}

/// Serde adapter storing digests as hex strings.
pub(crate) mod digest_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{hash_to_hex, hex_to_digest, Digest};

    pub fn serialize<S: Serializer>(digest: &Digest, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hash_to_hex(digest))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Digest, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex_to_digest(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid digest hex: {hex}")))
    }
}

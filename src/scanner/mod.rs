//! Scanner module for directory traversal and streaming content hashing.
//!
//! This module provides functionality for:
//! - Deterministic directory walking (lexicographic, depth-first)
//! - Streaming content hashing (BLAKE3 or SHA-256)
//! - Path normalization (absolute + Unicode NFC)
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and candidate file discovery
//! - [`hasher`]: Streaming digest computation
//!
//! The walker never reads file content; it yields [`FileEntry`] metadata
//! only. Digests are computed later, and only for files the rescan engine
//! decides actually need hashing.
//!
//! # Example
//!
//! ```no_run
//! use dupindex::scanner::{ScannerConfig, Walker};
//! use std::path::PathBuf;
//!
//! let walker = Walker::new(&[PathBuf::from("/data")], ScannerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use unicode_normalization::{is_nfc, UnicodeNormalization};

pub use hasher::{
    hash_to_hex, hex_to_digest, Digest, HashAlgorithm, Hasher, UnknownAlgorithm,
};
pub use walker::Walker;

/// Metadata for a discovered candidate file.
///
/// Carries everything change detection needs without reading content:
/// path, size, and modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute, normalized path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
}

impl FileEntry {
    /// Create a new entry. The path is stored as given; the walker
    /// normalizes paths before constructing entries.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
        }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Follow symbolic links during traversal.
    /// Warning: may cause infinite loops with symlink cycles. Default: off.
    pub follow_symlinks: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,

    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,
}

impl ScannerConfig {
    /// Enable or disable following symbolic links.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Set the minimum file size filter.
    #[must_use]
    pub fn with_min_size(mut self, min: Option<u64>) -> Self {
        self.min_size = min;
        self
    }

    /// Set the maximum file size filter.
    #[must_use]
    pub fn with_max_size(mut self, max: Option<u64>) -> Self {
        self.max_size = max;
        self
    }
}

/// Errors that can occur during directory scanning.
///
/// All of these are per-entry: the walker yields them inline and keeps
/// going, so one unreadable directory never aborts a scan.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// A scan root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// A non-fatal problem recorded while scanning or rescanning.
///
/// The affected file is excluded from that run's results; the operation
/// itself still succeeds.
#[derive(thiserror::Error, Debug)]
pub enum ScanWarning {
    /// Discovery failed for an entry.
    #[error(transparent)]
    Walk(#[from] ScanError),

    /// Hashing failed for a file.
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Normalize a path for use as a record identity key.
///
/// Makes the path absolute (against the current directory) and applies
/// Unicode NFC to the path string, so the same file observed via NFD
/// (macOS) and NFC spellings maps to one record. Paths that are not
/// valid UTF-8 are left as-is after absolutization.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match absolute.to_str() {
        Some(s) if !is_nfc(s) => PathBuf::from(s.nfc().collect::<String>()),
        _ => absolute,
    }
}

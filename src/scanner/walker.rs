//! Deterministic multi-root directory walker.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing one or more
//! root directories and yielding candidate file metadata for the rescan
//! engine. Traversal is depth-first with children visited in lexicographic
//! order, so a given filesystem state always produces the same sequence;
//! test fixtures and persisted reports are reproducible.
//!
//! # Features
//!
//! - Multiple scan roots in one pass; roots nested under other roots are
//!   pruned so no file is surfaced twice
//! - Configurable symlink following (off by default, avoiding cycles)
//! - Size filtering (min/max)
//! - Per-entry errors yielded inline instead of aborting the walk
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dupindex::scanner::{ScannerConfig, Walker};
//! use std::path::PathBuf;
//!
//! let roots = vec![PathBuf::from("/data"), PathBuf::from("/backup")];
//! let walker = Walker::new(&roots, ScannerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use walkdir::WalkDir;

use super::{normalize_path, FileEntry, ScanError, ScannerConfig};

/// Directory walker producing a deterministic stream of candidate files.
#[derive(Debug)]
pub struct Walker {
    /// Normalized, pruned scan roots
    roots: Vec<PathBuf>,
    /// Walker configuration
    config: ScannerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a walker over the given roots.
    ///
    /// Roots are normalized up front. Duplicate roots collapse, and a root
    /// nested inside another root is dropped with a warning, so each real
    /// file is surfaced at most once per pass.
    #[must_use]
    pub fn new(roots: &[PathBuf], config: ScannerConfig) -> Self {
        Self {
            roots: prune_roots(roots),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag becomes `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The normalized roots this walker will traverse.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk all roots, yielding file entries in deterministic order.
    ///
    /// Returns a lazy iterator over [`FileEntry`] results. Errors are
    /// yielded as [`ScanError`] values rather than stopping iteration.
    /// No file content is read; only directory listings and stat calls.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        self.roots.iter().flat_map(move |root| self.walk_root(root))
    }

    /// Walk a single root depth-first with lexicographically sorted children.
    fn walk_root<'a>(
        &'a self,
        root: &'a Path,
    ) -> impl Iterator<Item = Result<FileEntry, ScanError>> + 'a {
        WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry_result| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: shutdown requested, stopping iteration");
                    return None;
                }

                let entry = match entry_result {
                    Ok(entry) => entry,
                    Err(e) => return Some(Err(map_walkdir_error(root, e))),
                };

                let file_type = entry.file_type();

                // A root that turns out to be a plain file is a caller error.
                if entry.depth() == 0 && !file_type.is_dir() {
                    return Some(Err(ScanError::NotADirectory(root.to_path_buf())));
                }

                if file_type.is_dir() {
                    return None;
                }

                if file_type.is_symlink() {
                    // Only reachable when follow_symlinks is off.
                    log::trace!("Skipping symlink: {}", entry.path().display());
                    return None;
                }

                let metadata = match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => return Some(Err(map_walkdir_error(entry.path(), e))),
                };

                // A followed symlink may resolve to something other than
                // a regular file.
                if !metadata.is_file() {
                    return None;
                }

                let size = metadata.len();
                if !self.passes_size_filter(size) {
                    log::trace!(
                        "Skipping file due to size filter ({}): {}",
                        size,
                        entry.path().display()
                    );
                    return None;
                }

                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

                Some(Ok(FileEntry {
                    path: normalize_path(entry.path()),
                    size,
                    modified,
                }))
            })
    }

    fn passes_size_filter(&self, size: u64) -> bool {
        if let Some(min) = self.config.min_size {
            if size < min {
                return false;
            }
        }
        if let Some(max) = self.config.max_size {
            if size > max {
                return false;
            }
        }
        true
    }
}

/// Normalize roots, drop duplicates, and drop roots nested inside others.
fn prune_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut normalized: Vec<PathBuf> = roots.iter().map(|r| normalize_path(r)).collect();
    // Sorting puts ancestors before their descendants.
    normalized.sort();
    normalized.dedup();

    let mut pruned: Vec<PathBuf> = Vec::with_capacity(normalized.len());
    for root in normalized {
        if pruned.iter().any(|kept| root.starts_with(kept)) {
            log::warn!(
                "Ignoring scan root nested under another root: {}",
                root.display()
            );
        } else {
            pruned.push(root);
        }
    }
    pruned
}

/// Convert a walkdir error into a per-entry [`ScanError`].
fn map_walkdir_error(fallback_path: &Path, error: walkdir::Error) -> ScanError {
    use std::io::ErrorKind;

    let path = error
        .path()
        .map_or_else(|| fallback_path.to_path_buf(), Path::to_path_buf);

    match error.io_error().map(std::io::Error::kind) {
        Some(ErrorKind::PermissionDenied) => {
            log::warn!("Permission denied: {}", path.display());
            ScanError::PermissionDenied(path)
        }
        Some(ErrorKind::NotFound) => {
            log::debug!("Path not found (may have been deleted): {}", path.display());
            ScanError::NotFound(path)
        }
        _ => {
            log::warn!("Walker error for {}: {}", path.display(), error);
            ScanError::Io {
                path,
                source: std::io::Error::other(error.to_string()),
            }
        }
    }
}

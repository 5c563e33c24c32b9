//! Scan and incremental rescan operations.
//!
//! # Overview
//!
//! This module orchestrates the inventory pipeline:
//! 1. A single producer walks the roots, collecting candidate metadata
//!    (see [`crate::scanner::walker`])
//! 2. Candidates with a metadata-identical baseline record carry their
//!    digest forward without touching file content
//! 3. The rest are hashed by a bounded rayon worker pool
//! 4. Results are merged into a fresh [`HashStore`] by the calling thread
//!
//! Step 2 is the core optimization: on a rescan of a mostly unchanged
//! tree, almost nothing is re-read. A first scan is simply a rescan
//! against an empty baseline.
//!
//! The baseline is never mutated. A rescan builds a new store and returns
//! it; on cancellation it returns an error and no store exists at all, so
//! a canceled run can never leave a partially updated inventory behind.
//!
//! # Example
//!
//! ```no_run
//! use dupindex::rescan::{scan, rescan, RescanOptions};
//! use dupindex::scanner::{Hasher, ScannerConfig};
//! use std::path::PathBuf;
//!
//! let roots = vec![PathBuf::from("/data")];
//! let hasher = Hasher::default();
//! let config = ScannerConfig::default();
//! let options = RescanOptions::default();
//!
//! let first = scan("media", &roots, &config, &hasher, &options).unwrap();
//! // ... later, against current filesystem state:
//! let second = rescan(&first.store, &roots, &config, &hasher, &options).unwrap();
//! println!(
//!     "added {} updated {} removed {} unchanged {}",
//!     second.stats.added, second.stats.updated,
//!     second.stats.removed, second.stats.unchanged
//! );
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::scanner::{
    Digest, FileEntry, HashAlgorithm, HashError, Hasher, ScanWarning, ScannerConfig, Walker,
};
use crate::store::{FileRecord, HashStore};

/// Options controlling a scan or rescan pass.
#[derive(Debug, Clone)]
pub struct RescanOptions {
    /// Recompute every digest regardless of metadata. Used for periodic
    /// integrity verification; defeats the rescan optimization.
    pub force_rehash: bool,
    /// Number of hashing worker threads. Kept low by default to prevent
    /// disk thrashing.
    pub io_threads: usize,
    /// Optional cooperative cancellation flag shared with the caller.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for RescanOptions {
    fn default() -> Self {
        Self {
            force_rehash: false,
            io_threads: 4,
            shutdown_flag: None,
        }
    }
}

impl RescanOptions {
    /// Enable or disable force-rehash mode.
    #[must_use]
    pub fn with_force_rehash(mut self, force: bool) -> Self {
        self.force_rehash = force;
        self
    }

    /// Set the hashing worker thread count.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the shutdown flag for cooperative cancellation.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Change summary for one rescan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescanStats {
    /// Candidate files surfaced by the walk
    pub files_seen: usize,
    /// New files not in the baseline
    pub added: usize,
    /// Files whose metadata drifted and were rehashed
    pub updated: usize,
    /// Files whose baseline digest was carried forward without rehashing
    pub unchanged: usize,
    /// Baseline records whose path was not encountered in the fresh walk
    pub removed: usize,
    /// Files actually hashed this pass
    pub hashed: usize,
    /// Files that failed to hash and were excluded from the result
    pub hash_failures: usize,
}

/// Result of a successful scan or rescan pass.
#[derive(Debug)]
pub struct RescanOutcome {
    /// The freshly built inventory
    pub store: HashStore,
    /// Change summary relative to the baseline
    pub stats: RescanStats,
    /// Per-file problems; the affected files are absent from `store`
    pub warnings: Vec<ScanWarning>,
}

/// Structural failures that abort a scan or rescan.
///
/// Per-file I/O problems never appear here; they are collected into
/// [`RescanOutcome::warnings`] instead.
#[derive(thiserror::Error, Debug)]
pub enum RescanError {
    /// The baseline was hashed under a different algorithm than the
    /// hasher supplied for this pass; its digests cannot be reused.
    #[error("hash algorithm mismatch: baseline uses {baseline}, hasher computes {requested}")]
    AlgorithmMismatch {
        /// Algorithm recorded in the baseline store
        baseline: HashAlgorithm,
        /// Algorithm of the supplied hasher
        requested: HashAlgorithm,
    },

    /// The shutdown flag was raised before the pass completed. No store
    /// was produced; the baseline is untouched.
    #[error("scan interrupted before completion")]
    Interrupted,
}

/// Build a fresh inventory of the given roots (first run).
///
/// Equivalent to [`rescan`] against an empty baseline: every discovered
/// file is hashed and recorded.
///
/// # Errors
///
/// Returns [`RescanError::Interrupted`] if the shutdown flag is raised.
pub fn scan(
    label: impl Into<String>,
    roots: &[PathBuf],
    config: &ScannerConfig,
    hasher: &Hasher,
    options: &RescanOptions,
) -> Result<RescanOutcome, RescanError> {
    let baseline = HashStore::new(label, hasher.algorithm());
    rescan(&baseline, roots, config, hasher, options)
}

/// Update a previously captured inventory against current filesystem state.
///
/// Per candidate file from the fresh walk:
/// - not in the baseline: hash it and insert a new record (`added`)
/// - baseline record with identical size and mtime: carry the digest
///   forward without rehashing (`unchanged`)
/// - baseline record with drifted metadata: rehash and replace (`updated`)
///
/// Baseline records whose path never shows up in the walk are dropped
/// (`removed`). With [`RescanOptions::force_rehash`] the carry-forward
/// step is bypassed and every candidate is rehashed.
///
/// # Errors
///
/// - [`RescanError::AlgorithmMismatch`] if the baseline's algorithm
///   differs from the hasher's (its digests would not be comparable)
/// - [`RescanError::Interrupted`] on cooperative cancellation; the
///   baseline is left untouched and no partial store escapes
pub fn rescan(
    baseline: &HashStore,
    roots: &[PathBuf],
    config: &ScannerConfig,
    hasher: &Hasher,
    options: &RescanOptions,
) -> Result<RescanOutcome, RescanError> {
    if baseline.algorithm != hasher.algorithm() {
        return Err(RescanError::AlgorithmMismatch {
            baseline: baseline.algorithm,
            requested: hasher.algorithm(),
        });
    }

    // Single producer: enumerate candidates, collecting per-entry
    // failures as warnings.
    let mut walker = Walker::new(roots, config.clone());
    if let Some(flag) = &options.shutdown_flag {
        walker = walker.with_shutdown_flag(Arc::clone(flag));
    }

    let mut warnings: Vec<ScanWarning> = Vec::new();
    let mut candidates: Vec<FileEntry> = Vec::new();
    for entry in walker.walk() {
        match entry {
            Ok(file) => candidates.push(file),
            Err(e) => {
                log::warn!("Skipping entry: {e}");
                warnings.push(e.into());
            }
        }
    }

    if options.is_shutdown_requested() {
        log::info!("Rescan interrupted during directory walk");
        return Err(RescanError::Interrupted);
    }

    let mut stats = RescanStats {
        files_seen: candidates.len(),
        ..Default::default()
    };

    // Decide per candidate whether the baseline digest is still good.
    let mut store = HashStore::new(baseline.label.clone(), baseline.algorithm);
    let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
    let mut to_hash: Vec<(FileEntry, bool)> = Vec::new();
    for entry in candidates {
        seen.insert(entry.path.clone());
        match baseline.get(&entry.path) {
            Some(record) if !options.force_rehash && record.metadata_matches(&entry) => {
                log::trace!("Unchanged, digest carried forward: {}", entry.path.display());
                stats.unchanged += 1;
                store.insert(record.clone());
            }
            existing => {
                to_hash.push((entry, existing.is_some()));
            }
        }
    }

    // Hash the remainder on a bounded worker pool; merge results here
    // under a single-writer discipline.
    let results = hash_candidates(to_hash, hasher, options);

    if options.is_shutdown_requested() {
        log::info!("Rescan interrupted during hashing");
        return Err(RescanError::Interrupted);
    }

    for (entry, in_baseline, result) in results {
        match result {
            Ok(digest) => {
                stats.hashed += 1;
                if in_baseline {
                    stats.updated += 1;
                } else {
                    stats.added += 1;
                }
                store.insert(FileRecord::new(entry, digest));
            }
            Err(e) => {
                log::warn!("Failed to hash {}: {e}", entry.path.display());
                stats.hash_failures += 1;
                warnings.push(e.into());
            }
        }
    }

    stats.removed = baseline.paths().filter(|p| !seen.contains(*p)).count();

    log::info!(
        "Rescan of '{}' complete: {} seen, {} added, {} updated, {} unchanged, {} removed, {} hashed",
        store.label,
        stats.files_seen,
        stats.added,
        stats.updated,
        stats.unchanged,
        stats.removed,
        stats.hashed,
    );

    Ok(RescanOutcome {
        store,
        stats,
        warnings,
    })
}

type HashResult = (FileEntry, bool, Result<Digest, HashError>);

/// Hash candidates in parallel with bounded I/O parallelism.
fn hash_candidates(
    to_hash: Vec<(FileEntry, bool)>,
    hasher: &Hasher,
    options: &RescanOptions,
) -> Vec<HashResult> {
    if to_hash.is_empty() {
        return Vec::new();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.io_threads.max(1))
        .build()
        .unwrap_or_else(|_| {
            log::warn!(
                "Failed to create custom thread pool, using global pool with {} threads",
                rayon::current_num_threads()
            );
            rayon::ThreadPoolBuilder::new().build().unwrap()
        });

    pool.install(|| {
        to_hash
            .into_par_iter()
            .map(|(entry, in_baseline)| {
                if options.is_shutdown_requested() {
                    // The whole pass is about to be discarded; don't
                    // start more reads.
                    let err = HashError::Io {
                        path: entry.path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::Interrupted,
                            "shutdown requested",
                        ),
                    };
                    return (entry, in_baseline, Err(err));
                }
                let result = hasher.hash_file(&entry.path);
                (entry, in_baseline, result)
            })
            .collect()
    })
}

//! Duplicate detection over captured inventories.
//!
//! # Overview
//!
//! Grouping works purely on [`HashStore`](crate::store::HashStore)
//! records: two files are duplicates exactly when their content digests
//! are equal. Because digests are computed at scan time, grouping itself
//! never touches the filesystem and can be rerun offline against any
//! number of previously persisted stores.
//!
//! # Example
//!
//! ```no_run
//! use dupindex::duplicates::group_duplicates;
//! use dupindex::rescan::{scan, RescanOptions};
//! use dupindex::scanner::{Hasher, ScannerConfig};
//! use std::path::PathBuf;
//!
//! let outcome = scan(
//!     "photos",
//!     &[PathBuf::from("/photos")],
//!     &ScannerConfig::default(),
//!     &Hasher::default(),
//!     &RescanOptions::default(),
//! ).unwrap();
//!
//! let groups = group_duplicates(&[&outcome.store]).unwrap();
//! for group in &groups {
//!     println!(
//!         "{} copies of {} ({} bytes reclaimable)",
//!         group.members.len(),
//!         group.digest_hex(),
//!         group.reclaimable_bytes(),
//!     );
//! }
//! ```

mod groups;

pub use groups::{group_duplicates, DuplicateGroup, GroupMember};

use crate::scanner::HashAlgorithm;

/// Errors when merging stores for duplicate detection.
#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    /// The input stores were hashed under different algorithms; their
    /// digests are not comparable.
    #[error(
        "cannot merge stores with different hash algorithms: '{first_label}' uses {first}, '{other_label}' uses {other}"
    )]
    AlgorithmMismatch {
        /// Label of the first store in the merge input
        first_label: String,
        /// Algorithm of the first store
        first: HashAlgorithm,
        /// Label of the first store that disagrees
        other_label: String,
        /// Its algorithm
        other: HashAlgorithm,
    },
}

//! dupindex - Content-Hash Inventory and Incremental Rescan
//!
//! A library for building digest inventories of directory trees, cheaply
//! refreshing them as files change, and reporting duplicate content
//! across one or more inventories.
//!
//! The surface maps 1:1 onto the commands of an embedding CLI:
//! [`rescan::scan`] / [`rescan::rescan`] build and refresh inventories,
//! [`duplicates::group_duplicates`] finds identical content,
//! [`filter`] narrows results, and [`report`] persists stores and
//! reports as CSV or checksummed JSON.

pub mod duplicates;
pub mod filter;
pub mod logging;
pub mod report;
pub mod rescan;
pub mod scanner;
pub mod store;

pub use duplicates::{group_duplicates, DuplicateGroup};
pub use rescan::{rescan, scan, RescanOptions, RescanOutcome};
pub use scanner::{HashAlgorithm, Hasher, ScannerConfig};
pub use store::HashStore;

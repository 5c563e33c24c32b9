//! File record store: the hash inventory produced by one scan.
//!
//! A [`HashStore`] is a named, path-ordered collection of [`FileRecord`]
//! values captured at one point in time, tagged with the algorithm that
//! produced its digests. It is the explicit baseline value that every
//! rescan takes as input and every report writer persists; there is no
//! implicit process-wide hash cache anywhere in this crate.
//!
//! Within one store, paths are unique. Across stores there is no
//! uniqueness constraint: the same path may appear in snapshots taken at
//! different times, and different paths may share a digest (that is what
//! makes them duplicates).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::scanner::{hasher::digest_serde, Digest, FileEntry, HashAlgorithm};

/// One tracked file: metadata captured at scan time plus its content digest.
///
/// A record always carries a digest; a file that failed to hash is never
/// recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute, normalized path (identity key within one store)
    pub path: PathBuf,
    /// Byte length at time of capture
    pub size: u64,
    /// Last-modification time at time of capture
    #[serde(with = "epoch_nanos")]
    pub modified: SystemTime,
    /// Content digest under the owning store's algorithm
    #[serde(with = "digest_serde")]
    pub digest: Digest,
}

impl FileRecord {
    /// Build a record from scanner metadata and a computed digest.
    #[must_use]
    pub fn new(entry: FileEntry, digest: Digest) -> Self {
        Self {
            path: entry.path,
            size: entry.size,
            modified: entry.modified,
            digest,
        }
    }

    /// Cheap change-detection check: does a freshly observed entry carry
    /// the same size and mtime this record captured?
    ///
    /// This is a heuristic, not a proof. A file rewritten with identical
    /// size inside the filesystem's timestamp resolution is a known,
    /// accepted false negative; force-rehash mode exists for periodic
    /// verification.
    #[must_use]
    pub fn metadata_matches(&self, entry: &FileEntry) -> bool {
        self.size == entry.size && self.modified == entry.modified
    }
}

/// A named, ordered collection of file records from one scan.
///
/// Records are keyed and iterated by path, so persisting a store twice
/// over unchanged input produces byte-identical output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashStore {
    /// Human-readable label for this snapshot (typically the scanned roots)
    pub label: String,
    /// Algorithm that produced every digest in this store
    pub algorithm: HashAlgorithm,
    /// Records keyed by path
    #[serde(
        serialize_with = "serialize_records",
        deserialize_with = "deserialize_records"
    )]
    records: BTreeMap<PathBuf, FileRecord>,
}

impl HashStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(label: impl Into<String>, algorithm: HashAlgorithm) -> Self {
        Self {
            label: label.into(),
            algorithm,
            records: BTreeMap::new(),
        }
    }

    /// Insert a record, replacing any existing record with the same path.
    /// Returns the replaced record, if any.
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        self.records.insert(record.path.clone(), record)
    }

    /// Look up a record by exact path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.records.get(path)
    }

    /// Whether a record exists for the given path.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(path)
    }

    /// Remove a record by path, returning it if present.
    pub fn remove(&mut self, path: &Path) -> Option<FileRecord> {
        self.records.remove(path)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in path order.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    /// Iterate paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.records.keys().map(PathBuf::as_path)
    }

    /// Sum of all recorded file sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.records.values().map(|r| r.size).sum()
    }
}

fn serialize_records<S: Serializer>(
    records: &BTreeMap<PathBuf, FileRecord>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(records.values())
}

fn deserialize_records<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<PathBuf, FileRecord>, D::Error> {
    let records = Vec::<FileRecord>::deserialize(deserializer)?;
    Ok(records
        .into_iter()
        .map(|r| (r.path.clone(), r))
        .collect())
}

/// Convert a timestamp to signed integer nanoseconds since the Unix
/// epoch. Negative values are pre-1970 mtimes, which filesystems can
/// legitimately report. Timestamps beyond the i64 range (roughly ±292
/// years from the epoch) saturate.
#[must_use]
pub(crate) fn timestamp_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos()).map_or(i64::MIN, |n| -n),
    }
}

/// Inverse of [`timestamp_nanos`].
#[must_use]
pub(crate) fn timestamp_from_nanos(nanos: i64) -> SystemTime {
    if nanos >= 0 {
        UNIX_EPOCH + Duration::from_nanos(nanos as u64)
    } else {
        UNIX_EPOCH - Duration::from_nanos(nanos.unsigned_abs())
    }
}

/// Serde adapter storing timestamps as signed epoch nanoseconds.
mod epoch_nanos {
    use super::{timestamp_from_nanos, timestamp_nanos};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::SystemTime;

    pub fn serialize<S: Serializer>(
        time: &SystemTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(timestamp_nanos(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<SystemTime, D::Error> {
        Ok(timestamp_from_nanos(i64::deserialize(deserializer)?))
    }
}

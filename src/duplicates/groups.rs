//! Digest-based duplicate grouping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scanner::{hash_to_hex, Digest};
use crate::store::{FileRecord, HashStore};

use super::MergeError;

/// One file belonging to a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Index of the originating store in the merge input. Lets callers
    /// working across several inventories tell which one a member came
    /// from.
    pub source: usize,
    /// The underlying inventory record
    pub record: FileRecord,
}

/// A set of files sharing one content digest.
///
/// Always holds at least two members; singletons are dropped during
/// grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Content digest shared by every member
    #[serde(with = "crate::scanner::hasher::digest_serde")]
    pub digest: Digest,
    /// Members ordered by (path, source)
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    /// Number of member files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members. Grouping never produces such a
    /// group; this exists for completeness of the collection API.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total size of all member files.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.members.iter().map(|m| m.record.size).sum()
    }

    /// Space reclaimable by keeping one copy (all members minus the
    /// largest one).
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        let largest = self.members.iter().map(|m| m.record.size).max().unwrap_or(0);
        self.total_size().saturating_sub(largest)
    }

    /// The shared digest as lowercase hex.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hash_to_hex(&self.digest)
    }
}

/// Find files with identical content across one or more inventories.
///
/// Members are bucketed by digest. A record appearing in several input
/// stores produces one member per store, so the same file inventoried
/// twice under two labels shows up as a cross-store duplicate; members
/// identical in both path and source collapse to one.
///
/// Only groups with two or more members are returned. Groups are ordered
/// by descending reclaimable bytes, ties broken by digest hex, so the
/// biggest wins come first and the order is stable across runs. Members
/// within a group are ordered by (path, source).
///
/// # Errors
///
/// Returns [`MergeError::AlgorithmMismatch`] if the input stores do not
/// all use the same hash algorithm.
pub fn group_duplicates(stores: &[&HashStore]) -> Result<Vec<DuplicateGroup>, MergeError> {
    let Some(first) = stores.first() else {
        return Ok(Vec::new());
    };
    for store in &stores[1..] {
        if store.algorithm != first.algorithm {
            return Err(MergeError::AlgorithmMismatch {
                first_label: first.label.clone(),
                first: first.algorithm,
                other_label: store.label.clone(),
                other: store.algorithm,
            });
        }
    }

    let mut by_digest: BTreeMap<Digest, Vec<GroupMember>> = BTreeMap::new();
    for (source, store) in stores.iter().enumerate() {
        for record in store.records() {
            by_digest.entry(record.digest).or_default().push(GroupMember {
                source,
                record: record.clone(),
            });
        }
    }

    let mut groups: Vec<DuplicateGroup> = by_digest
        .into_iter()
        .filter_map(|(digest, mut members)| {
            members.sort_by(|a, b| {
                (&a.record.path, a.source).cmp(&(&b.record.path, b.source))
            });
            members.dedup_by(|a, b| a.record.path == b.record.path && a.source == b.source);
            if members.len() < 2 {
                return None;
            }
            Some(DuplicateGroup { digest, members })
        })
        .collect();

    groups.sort_by(|a, b| {
        b.reclaimable_bytes()
            .cmp(&a.reclaimable_bytes())
            .then_with(|| a.digest.cmp(&b.digest))
    });

    log::debug!(
        "Grouped {} store(s) into {} duplicate group(s)",
        stores.len(),
        groups.len()
    );

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{FileEntry, HashAlgorithm};
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn record(path: &str, size: u64, digest_byte: u8) -> FileRecord {
        FileRecord::new(
            FileEntry::new(PathBuf::from(path), size, SystemTime::UNIX_EPOCH),
            [digest_byte; 32],
        )
    }

    fn store_with(label: &str, records: Vec<FileRecord>) -> HashStore {
        let mut store = HashStore::new(label, HashAlgorithm::Blake3);
        for r in records {
            store.insert(r);
        }
        store
    }

    #[test]
    fn test_singletons_are_dropped() {
        let store = store_with(
            "s",
            vec![record("/a", 10, 1), record("/b", 10, 1), record("/c", 20, 2)],
        );

        let groups = group_duplicates(&[&store]).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[0].digest, [1; 32]);
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        assert!(group_duplicates(&[]).unwrap().is_empty());

        let empty = HashStore::new("e", HashAlgorithm::Blake3);
        assert!(group_duplicates(&[&empty]).unwrap().is_empty());
    }

    #[test]
    fn test_groups_ordered_by_reclaimable_bytes() {
        let store = store_with(
            "s",
            vec![
                // 2 x 10 bytes -> 10 reclaimable
                record("/small1", 10, 1),
                record("/small2", 10, 1),
                // 3 x 100 bytes -> 200 reclaimable
                record("/big1", 100, 2),
                record("/big2", 100, 2),
                record("/big3", 100, 2),
            ],
        );

        let groups = group_duplicates(&[&store]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].reclaimable_bytes(), 200);
        assert_eq!(groups[1].reclaimable_bytes(), 10);
    }

    #[test]
    fn test_tie_broken_by_digest() {
        let store = store_with(
            "s",
            vec![
                record("/x1", 10, 9),
                record("/x2", 10, 9),
                record("/y1", 10, 3),
                record("/y2", 10, 3),
            ],
        );

        let groups = group_duplicates(&[&store]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].digest, [3; 32]);
        assert_eq!(groups[1].digest, [9; 32]);
    }

    #[test]
    fn test_members_ordered_by_path_then_source() {
        let a = store_with("a", vec![record("/z", 10, 1), record("/m", 10, 1)]);
        let b = store_with("b", vec![record("/a", 10, 1)]);

        let groups = group_duplicates(&[&a, &b]).unwrap();
        assert_eq!(groups.len(), 1);
        let paths: Vec<_> = groups[0]
            .members
            .iter()
            .map(|m| (m.record.path.clone(), m.source))
            .collect();
        assert_eq!(
            paths,
            vec![
                (PathBuf::from("/a"), 1),
                (PathBuf::from("/m"), 0),
                (PathBuf::from("/z"), 0),
            ]
        );
    }

    #[test]
    fn test_cross_store_duplicates_detected() {
        let a = store_with("backup", vec![record("/backup/f", 10, 7)]);
        let b = store_with("live", vec![record("/live/f", 10, 7)]);

        let groups = group_duplicates(&[&a, &b]).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members[0].source, 0);
        assert_eq!(groups[0].members[1].source, 1);
    }

    #[test]
    fn test_identical_path_and_source_collapse() {
        // Passing the same store twice under distinct sources is fine,
        // but a literally repeated (path, source) pair is not a
        // duplicate of itself.
        let a = store_with("s", vec![record("/f", 10, 7)]);

        let groups = group_duplicates(&[&a, &a]).unwrap();
        // Same path from two different source indexes: a real group.
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 2);
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let a = store_with("a", vec![record("/f", 10, 1)]);
        let mut b = HashStore::new("b", HashAlgorithm::Sha256);
        b.insert(record("/g", 10, 1));

        let err = group_duplicates(&[&a, &b]).unwrap_err();
        assert!(matches!(err, MergeError::AlgorithmMismatch { .. }));
    }

    #[test]
    fn test_reclaimable_and_total_size() {
        let group = DuplicateGroup {
            digest: [1; 32],
            members: vec![
                GroupMember {
                    source: 0,
                    record: record("/a", 100, 1),
                },
                GroupMember {
                    source: 0,
                    record: record("/b", 100, 1),
                },
                GroupMember {
                    source: 0,
                    record: record("/c", 100, 1),
                },
            ],
        };

        assert_eq!(group.total_size(), 300);
        assert_eq!(group.reclaimable_bytes(), 200);
        assert_eq!(group.len(), 3);
        assert!(!group.is_empty());
    }

    #[test]
    fn test_digest_hex() {
        let group = DuplicateGroup {
            digest: [0xab; 32],
            members: vec![],
        };
        assert_eq!(group.digest_hex(), "ab".repeat(32));
    }
}

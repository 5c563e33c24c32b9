//! End-to-end pipeline tests: scan, persist, rescan, group, filter.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use dupindex::duplicates::group_duplicates;
use dupindex::filter::{filter_groups, FilterMode, PathFilter};
use dupindex::report;
use dupindex::rescan::{rescan, scan, RescanOptions};
use dupindex::scanner::{normalize_path, Hasher, ScannerConfig};

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn scan_dir(dir: &TempDir, hasher: &Hasher) -> dupindex::rescan::RescanOutcome {
    scan(
        "it",
        &[dir.path().to_path_buf()],
        &ScannerConfig::default(),
        hasher,
        &RescanOptions::default(),
    )
    .unwrap()
}

#[test]
fn scan_then_group_finds_identical_content() {
    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "a.txt", "X");
    let b = write_file(dir.path(), "b.txt", "X");
    write_file(dir.path(), "c.txt", "Y");

    let outcome = scan_dir(&dir, &Hasher::default());
    assert_eq!(outcome.store.len(), 3);

    let groups = group_duplicates(&[&outcome.store]).unwrap();
    assert_eq!(groups.len(), 1);

    let members: Vec<_> = groups[0]
        .members
        .iter()
        .map(|m| m.record.path.clone())
        .collect();
    assert_eq!(members, vec![normalize_path(&a), normalize_path(&b)]);
}

#[test]
fn persist_delete_rescan_updates_inventory() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.txt", "X");
    let b = write_file(dir.path(), "b.txt", "X");
    write_file(dir.path(), "c.txt", "Y");

    let outcome = scan_dir(&dir, &Hasher::default());

    // Persist the inventory and load it back, as a CLI session would
    // between invocations.
    let mut buf = Vec::new();
    report::csv::write_store(&outcome.store, &mut buf).unwrap();
    let baseline = report::csv::read_store(buf.as_slice()).unwrap();
    assert_eq!(baseline, outcome.store);

    fs::remove_file(&b).unwrap();

    let second = rescan(
        &baseline,
        &[dir.path().to_path_buf()],
        &ScannerConfig::default(),
        &Hasher::default(),
        &RescanOptions::default(),
    )
    .unwrap();

    assert_eq!(second.store.len(), 2);
    assert_eq!(second.stats.removed, 1);
    assert_eq!(second.stats.unchanged, 2);

    // The surviving "X" copy no longer has a partner.
    let groups = group_duplicates(&[&second.store]).unwrap();
    assert!(groups.is_empty());
}

#[test]
fn rescan_of_unchanged_tree_rehashes_nothing() {
    let dir = TempDir::new().unwrap();
    for i in 0..5 {
        write_file(dir.path(), &format!("f{i}.dat"), &format!("content {i}"));
    }

    let baseline = scan_dir(&dir, &Hasher::default()).store;

    let hasher = Hasher::default();
    let outcome = rescan(
        &baseline,
        &[dir.path().to_path_buf()],
        &ScannerConfig::default(),
        &hasher,
        &RescanOptions::default(),
    )
    .unwrap();

    assert_eq!(hasher.files_hashed(), 0);
    assert_eq!(outcome.stats.added, 0);
    assert_eq!(outcome.stats.updated, 0);
    assert_eq!(outcome.stats.removed, 0);
    assert_eq!(outcome.stats.unchanged, 5);
    assert_eq!(outcome.store, baseline);
}

#[test]
fn size_preserving_edit_is_caught_via_mtime() {
    let dir = TempDir::new().unwrap();
    let target = write_file(dir.path(), "edit.txt", "aaaa");
    write_file(dir.path(), "other.txt", "bbbb");

    let baseline = scan_dir(&dir, &Hasher::default()).store;

    // Rewrite with identical length and force the mtime forward so the
    // change is visible even on coarse-granularity filesystems.
    fs::write(&target, "cccc").unwrap();
    filetime::set_file_mtime(&target, filetime::FileTime::from_unix_time(2_000_000_000, 0))
        .unwrap();

    let hasher = Hasher::default();
    let outcome = rescan(
        &baseline,
        &[dir.path().to_path_buf()],
        &ScannerConfig::default(),
        &hasher,
        &RescanOptions::default(),
    )
    .unwrap();

    assert_eq!(hasher.files_hashed(), 1);
    assert_eq!(outcome.stats.updated, 1);
    assert_eq!(outcome.stats.unchanged, 1);

    let old = baseline.get(&normalize_path(&target)).unwrap().digest;
    let new = outcome.store.get(&normalize_path(&target)).unwrap().digest;
    assert_ne!(old, new);
}

#[test]
fn cross_store_duplicates_via_saved_reports() {
    let live = TempDir::new().unwrap();
    let backup = TempDir::new().unwrap();
    write_file(live.path(), "doc.txt", "shared bytes");
    write_file(backup.path(), "doc-copy.txt", "shared bytes");
    write_file(live.path(), "only-live.txt", "unique");

    let hasher = Hasher::default();
    let live_store = scan_dir(&live, &hasher).store;
    let backup_store = scan_dir(&backup, &hasher).store;

    // Round-trip both stores through JSON, then group offline.
    let mut live_buf = Vec::new();
    let mut backup_buf = Vec::new();
    report::json::write_store(&live_store, &mut live_buf).unwrap();
    report::json::write_store(&backup_store, &mut backup_buf).unwrap();
    let live_loaded = report::json::read_store(live_buf.as_slice()).unwrap();
    let backup_loaded = report::json::read_store(backup_buf.as_slice()).unwrap();

    let groups = group_duplicates(&[&live_loaded, &backup_loaded]).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members.len(), 2);

    let sources: Vec<_> = groups[0].members.iter().map(|m| m.source).collect();
    assert!(sources.contains(&0));
    assert!(sources.contains(&1));
}

#[test]
fn report_round_trip_then_offline_filter() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "photos/a.jpg", "img");
    write_file(dir.path(), "photos/b.jpg", "img");
    write_file(dir.path(), "docs/a.txt", "doc");
    write_file(dir.path(), "docs/b.txt", "doc");

    let outcome = scan_dir(&dir, &Hasher::default());
    let groups = group_duplicates(&[&outcome.store]).unwrap();
    assert_eq!(groups.len(), 2);

    // Save the report, reload it later, and narrow it without any
    // filesystem access.
    let mut buf = Vec::new();
    report::csv::write_groups(&groups, outcome.store.algorithm, &mut buf).unwrap();
    let (loaded, algorithm) = report::csv::read_groups(buf.as_slice()).unwrap();
    assert_eq!(algorithm, outcome.store.algorithm);
    assert_eq!(loaded, groups);

    let filter = PathFilter::substring("photos");
    let kept = filter_groups(loaded, &filter, FilterMode::AllMembers);
    assert_eq!(kept.len(), 1);
    assert!(kept[0]
        .members
        .iter()
        .all(|m| m.record.path.to_string_lossy().contains("photos")));
}

#[test]
fn filter_composition_equals_combined_predicate() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "photos/x.jpg", "1");
    write_file(dir.path(), "photos/y.jpg", "1");
    write_file(dir.path(), "photos/z.png", "2");
    write_file(dir.path(), "photos/w.png", "2");
    write_file(dir.path(), "docs/p.jpg", "3");
    write_file(dir.path(), "docs/q.jpg", "3");

    let outcome = scan_dir(&dir, &Hasher::default());
    let groups = group_duplicates(&[&outcome.store]).unwrap();
    assert_eq!(groups.len(), 3);

    let in_photos = PathFilter::substring("photos");
    let jpegs = PathFilter::regex(r"\.jpg$").unwrap();

    let sequential = filter_groups(
        filter_groups(groups.clone(), &in_photos, FilterMode::AllMembers),
        &jpegs,
        FilterMode::AllMembers,
    );

    let combined: Vec<_> = groups
        .into_iter()
        .filter(|g| {
            g.members
                .iter()
                .all(|m| in_photos.matches(&m.record.path) && jpegs.matches(&m.record.path))
        })
        .collect();

    assert_eq!(sequential, combined);
    assert_eq!(sequential.len(), 1);
}

#[test]
fn many_identical_and_distinct_files_group_correctly() {
    let dir = TempDir::new().unwrap();
    let n = 7;
    let m = 4;
    for i in 0..n {
        write_file(dir.path(), &format!("same_{i}.bin"), "identical payload");
    }
    for i in 0..m {
        write_file(dir.path(), &format!("diff_{i}.bin"), &format!("unique {i}"));
    }

    let outcome = scan_dir(&dir, &Hasher::default());
    let groups = group_duplicates(&[&outcome.store]).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members.len(), n);
    let size = groups[0].members[0].record.size;
    assert_eq!(groups[0].reclaimable_bytes(), size * (n as u64 - 1));
}

#[test]
fn pre_epoch_mtime_survives_persistence_and_rescan() {
    let dir = TempDir::new().unwrap();
    let old = write_file(dir.path(), "ancient.dat", "payload");
    filetime::set_file_mtime(&old, filetime::FileTime::from_unix_time(-86_400, 0)).unwrap();

    let outcome = scan_dir(&dir, &Hasher::default());

    let mut buf = Vec::new();
    report::csv::write_store(&outcome.store, &mut buf).unwrap();
    let loaded = report::csv::read_store(buf.as_slice()).unwrap();
    assert_eq!(loaded, outcome.store);

    // The reloaded baseline still metadata-matches the untouched file,
    // so nothing gets rehashed.
    let hasher = Hasher::default();
    let second = rescan(
        &loaded,
        &[dir.path().to_path_buf()],
        &ScannerConfig::default(),
        &hasher,
        &RescanOptions::default(),
    )
    .unwrap();

    assert_eq!(hasher.files_hashed(), 0);
    assert_eq!(second.stats.unchanged, 1);
    assert_eq!(second.stats.updated, 0);
}

#[test]
fn empty_files_form_a_duplicate_group() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "empty1", "");
    write_file(dir.path(), "empty2", "");

    let outcome = scan_dir(&dir, &Hasher::default());
    let groups = group_duplicates(&[&outcome.store]).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].total_size(), 0);
    assert_eq!(groups[0].reclaimable_bytes(), 0);
}

//! CSV persistence for stores and duplicate reports.
//!
//! # Layout
//!
//! Store file:
//!
//! ```text
//! #dupindex-hashset,1,blake3,photos
//! path,size,modified_ns,digest
//! /data/a.txt,2,1700000000000000000,6f0...
//! ```
//!
//! Duplicate report, one row per member with group-level fields
//! repeated:
//!
//! ```text
//! #dupindex-dupes,1,blake3
//! group,digest,member_count,reclaimable_bytes,source,path,size,modified_ns
//! 1,6f0...,2,2,0,/data/a.txt,2,1700000000000000000
//! 1,6f0...,2,2,0,/data/b.txt,2,1700000000000000000
//! ```
//!
//! The magic row makes files self-describing; readers reject foreign
//! files, unknown versions, and unknown algorithms before touching any
//! data row. Paths containing the delimiter or quotes are handled by
//! the csv crate's quoting.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::SystemTime;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::duplicates::{DuplicateGroup, GroupMember};
use crate::scanner::{hash_to_hex, hex_to_digest, Digest, FileEntry, HashAlgorithm};
use crate::store::{timestamp_from_nanos, timestamp_nanos, FileRecord, HashStore};

use super::{ReportError, DUPES_MAGIC, FORMAT_VERSION, STORE_MAGIC};

const STORE_HEADER: [&str; 4] = ["path", "size", "modified_ns", "digest"];
const DUPES_HEADER: [&str; 8] = [
    "group",
    "digest",
    "member_count",
    "reclaimable_bytes",
    "source",
    "path",
    "size",
    "modified_ns",
];

/// Write a store as CSV. Records appear in path order.
///
/// # Errors
///
/// Returns [`ReportError::Csv`] or [`ReportError::Io`] on write failure.
pub fn write_store<W: Write>(store: &HashStore, writer: W) -> Result<(), ReportError> {
    let mut out = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(writer);

    let version = FORMAT_VERSION.to_string();
    out.write_record([
        STORE_MAGIC,
        version.as_str(),
        store.algorithm.as_str(),
        store.label.as_str(),
    ])?;
    out.write_record(STORE_HEADER)?;

    for record in store.records() {
        let size = record.size.to_string();
        let modified = timestamp_nanos(record.modified).to_string();
        let digest = hash_to_hex(&record.digest);
        out.write_record([
            utf8_path(&record.path)?,
            size.as_str(),
            modified.as_str(),
            digest.as_str(),
        ])?;
    }

    out.flush()?;
    Ok(())
}

/// Read a store previously written by [`write_store`].
///
/// # Errors
///
/// Rejects files that do not open with the store magic
/// ([`ReportError::UnrecognizedMagic`]), declare an unsupported version
/// ([`ReportError::UnsupportedVersion`]) or algorithm, or contain
/// malformed rows ([`ReportError::InvalidField`]).
pub fn read_store<R: Read>(reader: R) -> Result<HashStore, ReportError> {
    let mut input = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows = input.records();

    let magic = rows
        .next()
        .ok_or(ReportError::MissingHeader("magic"))??;
    let (algorithm, label) = parse_magic(&magic, STORE_MAGIC)?;
    let label = label.ok_or(ReportError::InvalidField {
        field: "label",
        line: 1,
        message: "missing store label".to_string(),
    })?;

    rows.next().ok_or(ReportError::MissingHeader("column"))??;

    let mut store = HashStore::new(label, algorithm);
    for row in rows {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let path = PathBuf::from(field(&row, 0, "path", line)?);
        let size = parse_u64(field(&row, 1, "size", line)?, "size", line)?;
        let modified = parse_timestamp(field(&row, 2, "modified_ns", line)?, line)?;
        let digest = parse_digest(field(&row, 3, "digest", line)?, line)?;
        store.insert(FileRecord::new(FileEntry::new(path, size, modified), digest));
    }

    log::debug!("Loaded CSV store '{}' with {} record(s)", store.label, store.len());
    Ok(store)
}

/// Write a duplicate report as CSV, one row per member.
///
/// The algorithm is recorded in the magic row so a loaded report can be
/// matched against stores without guessing.
///
/// # Errors
///
/// Returns [`ReportError::Csv`] or [`ReportError::Io`] on write failure.
pub fn write_groups<W: Write>(
    groups: &[DuplicateGroup],
    algorithm: HashAlgorithm,
    writer: W,
) -> Result<(), ReportError> {
    let mut out = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(writer);

    let version = FORMAT_VERSION.to_string();
    out.write_record([DUPES_MAGIC, version.as_str(), algorithm.as_str()])?;
    out.write_record(DUPES_HEADER)?;

    for (index, group) in groups.iter().enumerate() {
        let group_id = (index + 1).to_string();
        let digest_hex = group.digest_hex();
        let member_count = group.members.len().to_string();
        let reclaimable = group.reclaimable_bytes().to_string();
        for member in &group.members {
            let source = member.source.to_string();
            let size = member.record.size.to_string();
            let modified = timestamp_nanos(member.record.modified).to_string();
            out.write_record([
                group_id.as_str(),
                digest_hex.as_str(),
                member_count.as_str(),
                reclaimable.as_str(),
                source.as_str(),
                utf8_path(&member.record.path)?,
                size.as_str(),
                modified.as_str(),
            ])?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Read a duplicate report previously written by [`write_groups`].
///
/// Returns the groups in file order together with the algorithm they
/// were hashed under. The derived `member_count` and
/// `reclaimable_bytes` columns are ignored on load; they are
/// recomputed from the members themselves.
///
/// # Errors
///
/// Same failure modes as [`read_store`], against the report magic.
pub fn read_groups<R: Read>(
    reader: R,
) -> Result<(Vec<DuplicateGroup>, HashAlgorithm), ReportError> {
    let mut input = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows = input.records();

    let magic = rows
        .next()
        .ok_or(ReportError::MissingHeader("magic"))??;
    let (algorithm, _) = parse_magic(&magic, DUPES_MAGIC)?;

    rows.next().ok_or(ReportError::MissingHeader("column"))??;

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut current_id: Option<u64> = None;
    for row in rows {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let id = parse_u64(field(&row, 0, "group", line)?, "group", line)?;
        let digest = parse_digest(field(&row, 1, "digest", line)?, line)?;
        let source = parse_u64(field(&row, 4, "source", line)?, "source", line)?;
        let source = usize::try_from(source).map_err(|_| ReportError::InvalidField {
            field: "source",
            line,
            message: format!("'{source}' does not fit this platform's index type"),
        })?;
        let path = PathBuf::from(field(&row, 5, "path", line)?);
        let size = parse_u64(field(&row, 6, "size", line)?, "size", line)?;
        let modified = parse_timestamp(field(&row, 7, "modified_ns", line)?, line)?;

        if current_id != Some(id) {
            current_id = Some(id);
            groups.push(DuplicateGroup {
                digest,
                members: Vec::new(),
            });
        }
        let group = groups
            .last_mut()
            .ok_or(ReportError::MissingHeader("group"))?;
        if group.digest != digest {
            return Err(ReportError::InvalidField {
                field: "digest",
                line,
                message: "digest differs from earlier rows of the same group".to_string(),
            });
        }
        group.members.push(GroupMember {
            source,
            record: FileRecord::new(FileEntry::new(path, size, modified), digest),
        });
    }

    log::debug!("Loaded CSV report with {} group(s)", groups.len());
    Ok((groups, algorithm))
}

/// Validate a magic row and extract the algorithm and optional label.
fn parse_magic(
    row: &StringRecord,
    expected: &'static str,
) -> Result<(HashAlgorithm, Option<String>), ReportError> {
    let tag = row.get(0).unwrap_or("");
    if tag != expected {
        return Err(ReportError::UnrecognizedMagic {
            expected,
            found: tag.to_string(),
        });
    }

    let version: u32 = row
        .get(1)
        .unwrap_or("")
        .parse()
        .map_err(|_| ReportError::InvalidField {
            field: "format_version",
            line: 1,
            message: "not an integer".to_string(),
        })?;
    if version != FORMAT_VERSION {
        return Err(ReportError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }

    let algorithm: HashAlgorithm = row.get(2).unwrap_or("").parse()?;
    Ok((algorithm, row.get(3).map(ToString::to_string)))
}

fn field<'a>(
    row: &'a StringRecord,
    index: usize,
    name: &'static str,
    line: u64,
) -> Result<&'a str, ReportError> {
    row.get(index).ok_or(ReportError::InvalidField {
        field: name,
        line,
        message: "missing column".to_string(),
    })
}

fn parse_u64(text: &str, name: &'static str, line: u64) -> Result<u64, ReportError> {
    text.parse().map_err(|_| ReportError::InvalidField {
        field: name,
        line,
        message: format!("'{text}' is not an unsigned integer"),
    })
}

/// `modified_ns` is signed: negative values are pre-epoch mtimes.
fn parse_timestamp(text: &str, line: u64) -> Result<SystemTime, ReportError> {
    let nanos: i64 = text.parse().map_err(|_| ReportError::InvalidField {
        field: "modified_ns",
        line,
        message: format!("'{text}' is not an integer"),
    })?;
    Ok(timestamp_from_nanos(nanos))
}

fn utf8_path(path: &std::path::Path) -> Result<&str, ReportError> {
    path.to_str()
        .ok_or_else(|| ReportError::NonUtf8Path(path.to_path_buf()))
}

fn parse_digest(text: &str, line: u64) -> Result<Digest, ReportError> {
    hex_to_digest(text).ok_or_else(|| ReportError::InvalidField {
        field: "digest",
        line,
        message: format!("'{text}' is not a 64-char hex digest"),
    })
}

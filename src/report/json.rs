//! JSON persistence with integrity envelopes.
//!
//! Each file is an envelope holding the format version, a SHA-256
//! checksum of the compact-serialized payload, and the payload itself:
//!
//! ```json
//! {
//!   "version": 1,
//!   "checksum": "9f86d0...",
//!   "store": { "label": "photos", "algorithm": "blake3", "records": [...] }
//! }
//! ```
//!
//! On load, the payload is re-serialized compactly and hashed again;
//! a checksum mismatch means the file was corrupted or hand-edited and
//! loading fails rather than proceeding with silently wrong data.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::duplicates::DuplicateGroup;
use crate::scanner::HashAlgorithm;
use crate::store::HashStore;

use super::{ReportError, FORMAT_VERSION};

#[derive(Debug, Serialize, Deserialize)]
struct StoreEnvelope {
    version: u32,
    checksum: String,
    store: HashStore,
}

#[derive(Debug, Serialize, Deserialize)]
struct DupesEnvelope {
    version: u32,
    checksum: String,
    algorithm: HashAlgorithm,
    groups: Vec<DuplicateGroup>,
}

fn payload_checksum<T: Serialize>(payload: &T) -> Result<String, ReportError> {
    // Compact form; the envelope itself may be pretty-printed without
    // affecting the checksum.
    let bytes = serde_json::to_vec(payload)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn verify<T: Serialize>(
    version: u32,
    stored: &str,
    payload: &T,
) -> Result<(), ReportError> {
    if version != FORMAT_VERSION {
        return Err(ReportError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    let computed = payload_checksum(payload)?;
    if computed != stored {
        return Err(ReportError::ChecksumMismatch {
            stored: stored.to_string(),
            computed,
        });
    }
    Ok(())
}

/// Write a store as a checksummed JSON envelope.
///
/// # Errors
///
/// Returns [`ReportError::Json`] or [`ReportError::Io`] on failure.
pub fn write_store<W: Write>(store: &HashStore, mut writer: W) -> Result<(), ReportError> {
    let envelope = StoreEnvelope {
        version: FORMAT_VERSION,
        checksum: payload_checksum(store)?,
        store: store.clone(),
    };
    let json = serde_json::to_string_pretty(&envelope)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Read a store previously written by [`write_store`].
///
/// # Errors
///
/// Rejects unsupported versions ([`ReportError::UnsupportedVersion`])
/// and corrupted payloads ([`ReportError::ChecksumMismatch`]).
pub fn read_store<R: Read>(mut reader: R) -> Result<HashStore, ReportError> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    let envelope: StoreEnvelope = serde_json::from_str(&content)?;
    verify(envelope.version, &envelope.checksum, &envelope.store)?;
    log::debug!(
        "Loaded JSON store '{}' with {} record(s)",
        envelope.store.label,
        envelope.store.len()
    );
    Ok(envelope.store)
}

/// Write a duplicate report as a checksummed JSON envelope.
///
/// # Errors
///
/// Returns [`ReportError::Json`] or [`ReportError::Io`] on failure.
pub fn write_groups<W: Write>(
    groups: &[DuplicateGroup],
    algorithm: HashAlgorithm,
    mut writer: W,
) -> Result<(), ReportError> {
    let envelope = DupesEnvelope {
        version: FORMAT_VERSION,
        checksum: payload_checksum(&groups)?,
        algorithm,
        groups: groups.to_vec(),
    };
    let json = serde_json::to_string_pretty(&envelope)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Read a duplicate report previously written by [`write_groups`].
///
/// # Errors
///
/// Same failure modes as [`read_store`].
pub fn read_groups<R: Read>(
    mut reader: R,
) -> Result<(Vec<DuplicateGroup>, HashAlgorithm), ReportError> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    let envelope: DupesEnvelope = serde_json::from_str(&content)?;
    verify(envelope.version, &envelope.checksum, &envelope.groups)?;
    log::debug!("Loaded JSON report with {} group(s)", envelope.groups.len());
    Ok((envelope.groups, envelope.algorithm))
}

//! Persistence of inventories and duplicate reports.
//!
//! # Overview
//!
//! Two formats are supported, each for both stores and duplicate
//! reports:
//!
//! - **CSV** ([`csv`]): a magic first row carrying format version,
//!   hash algorithm, and store label, then plain rows. Friendly to
//!   spreadsheets and shell tooling.
//! - **JSON** ([`json`]): a versioned envelope with a SHA-256
//!   integrity checksum over the payload.
//!
//! Both are self-describing: loading never needs out-of-band knowledge
//! of the algorithm a file was hashed with, and files written by a
//! future incompatible version are rejected with
//! [`ReportError::UnsupportedVersion`] instead of being misread.
//!
//! Writers take `io::Write` and readers take `io::Read`, so callers
//! choose between files, pipes, and in-memory buffers.

pub mod csv;
pub mod json;

/// Version stamped into every persisted file. Bumped on incompatible
/// layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Magic tag opening a CSV store file.
pub(crate) const STORE_MAGIC: &str = "#dupindex-hashset";

/// Magic tag opening a CSV duplicate report.
pub(crate) const DUPES_MAGIC: &str = "#dupindex-dupes";

/// Errors while writing or reading persisted files.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    /// Underlying read or write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding failure
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file opens with the wrong magic tag; it is not one of ours
    /// (or not the kind the caller asked for).
    #[error("unrecognized file: expected '{expected}' header, found '{found}'")]
    UnrecognizedMagic {
        /// Magic tag the reader was looking for
        expected: &'static str,
        /// What the file actually opened with
        found: String,
    },

    /// The file declares a format version this build does not speak.
    #[error("unsupported format version {found} (this build reads version {supported})")]
    UnsupportedVersion {
        /// Version declared by the file
        found: u32,
        /// Version this build supports
        supported: u32,
    },

    /// The file names a hash algorithm this build does not know.
    #[error(transparent)]
    UnknownAlgorithm(#[from] crate::scanner::UnknownAlgorithm),

    /// A CSV file ended before its magic or header row.
    #[error("truncated file: missing {0} row")]
    MissingHeader(&'static str),

    /// A path in the store is not valid UTF-8 and cannot be written to
    /// the text-based CSV form losslessly. The JSON form has the same
    /// restriction, enforced by its serializer.
    #[error("path is not valid UTF-8 and cannot be persisted: {}", .0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// A CSV field could not be parsed.
    #[error("invalid value in field '{field}' at line {line}: {message}")]
    InvalidField {
        /// Column name
        field: &'static str,
        /// 1-based line number in the file
        line: u64,
        /// What went wrong
        message: String,
    },

    /// The JSON envelope checksum does not match its payload; the file
    /// was corrupted or edited.
    #[error("integrity check failed: stored checksum {stored}, computed {computed}")]
    ChecksumMismatch {
        /// Checksum recorded in the envelope
        stored: String,
        /// Checksum recomputed from the payload
        computed: String,
    },
}

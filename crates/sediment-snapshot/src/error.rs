//! Snapshot errors

use crate::encoder::DecodeError;
use crate::field::{FieldTag, ValueKind};
use thiserror::Error;

/// Errors raised while building, writing or reading a layer snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Invalid magic number in snapshot header
    #[error("Invalid snapshot magic number: {0:#x}")]
    InvalidMagic(u64),

    /// Incompatible snapshot version
    #[error("Incompatible snapshot version (expected {expected}, got {actual})")]
    IncompatibleVersion {
        /// Expected version
        expected: u32,
        /// Version found in the header
        actual: u32,
    },

    /// Snapshot was written with the other byte order
    #[error("Endianness mismatch: snapshot is not little-endian")]
    EndiannessMismatch,

    /// Checksum verification failed
    #[error("Checksum verification failed")]
    ChecksumMismatch,

    /// Structurally corrupted snapshot
    #[error("Corrupted snapshot data: {0}")]
    CorruptedData(String),

    /// Record bytes could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// I/O error during snapshot read/write
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Two records of the same table share an id
    #[error("Duplicate {table} record id {id}")]
    DuplicateRecord {
        /// "type" or "method"
        table: &'static str,
        /// Raw id
        id: u32,
    },

    /// A field tag appears twice in one record
    #[error("Duplicate provenance field '{0}'")]
    DuplicateField(FieldTag),

    /// A field value has the wrong kind for its tag
    #[error("Field '{tag}' expects a {expected} value, got {actual}")]
    FieldKindMismatch {
        /// Field tag
        tag: FieldTag,
        /// Kind required by the tag
        expected: ValueKind,
        /// Kind supplied
        actual: ValueKind,
    },

    /// A record's fields do not match the set its kind tag requires
    #[error("Malformed {kind} record {id}: {reason}")]
    MalformedRecord {
        /// Wire name of the record's kind tag
        kind: &'static str,
        /// Raw record id
        id: u32,
        /// What is wrong
        reason: String,
    },
}

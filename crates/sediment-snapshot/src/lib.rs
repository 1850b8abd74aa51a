//! Sediment layer snapshot format
//!
//! This crate provides the record model and binary container for one layer of
//! a layered ahead-of-time build:
//! - **Records**: type and method records with stable per-layer ids
//! - **Kind tags**: the fixed vocabulary of synthetic kinds and the provenance
//!   fields each kind must carry (the wire contract shared with the relinker)
//! - **Format**: header, segments and SHA-256 checksum of a snapshot file
//!
//! Deciding *which* provenance a synthetic entity needs lives in
//! `sediment-provenance`; this crate only stores and validates it.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod encoder;
pub mod error;
pub mod field;
pub mod format;
pub mod ids;
pub mod kind;
pub mod record;
pub mod snapshot;
pub mod table;

pub use encoder::{DecodeError, RecordReader, RecordWriter};
pub use error::SnapshotError;
pub use field::{FieldTag, FieldValue, ProvenanceFields, ValueKind};
pub use format::{SegmentType, SnapshotChecksum, SnapshotHeader};
pub use ids::{MethodId, TypeId};
pub use kind::{MethodTag, TypeTag, CONSTRUCTOR_NAME};
pub use record::{MethodRecord, TypeRecord};
pub use snapshot::LayerSnapshot;
pub use table::RecordTable;

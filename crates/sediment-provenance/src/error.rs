//! Provenance errors

use crate::universe::{MethodHandle, TypeHandle};
use sediment_snapshot::SnapshotError;
use thiserror::Error;

/// Inconsistent use of the analysis universe
#[derive(Debug, Error)]
pub enum UniverseError {
    /// Type handle does not belong to this universe
    #[error("Unknown type handle {0}")]
    UnknownType(TypeHandle),

    /// Method handle does not belong to this universe
    #[error("Unknown method handle {0}")]
    UnknownMethod(MethodHandle),

    /// A method with this signature already exists with another implementation
    #[error("Method {0} already exists with a different implementation")]
    SignatureConflict(String),

    /// A type name is already taken by an unrelated type
    #[error("Type name {0} is already in use")]
    NameConflict(String),
}

/// Write-time errors; any of them aborts the layer being written
#[derive(Debug, Error)]
pub enum ProvenanceError {
    /// A synthetic entity was classified but a required fact is missing
    #[error("Malformed {kind} provenance for {entity}: {reason}")]
    Malformed {
        /// Wire name of the classified kind
        kind: &'static str,
        /// Name of the offending entity
        entity: String,
        /// What could not be extracted
        reason: String,
    },

    /// An entity matched more than one synthetic kind
    #[error("Type {name} classifies as both {first} and {second}")]
    AmbiguousClassification {
        /// Type name
        name: String,
        /// Kind matched first
        first: &'static str,
        /// Kind matched second
        second: &'static str,
    },

    /// Handle unknown to the universe being written
    #[error(transparent)]
    Universe(#[from] UniverseError),

    /// The writer failed earlier and refuses further work
    #[error("Layer write aborted: {0}")]
    Aborted(String),

    /// Snapshot-level failure
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Read-time errors; any of them fails the layer load
#[derive(Debug, Error)]
pub enum RelinkError {
    /// A descriptor, sibling id or key does not resolve in this universe
    #[error("Unresolvable {kind} record {record}: {descriptor}")]
    Unresolvable {
        /// Wire name of the record's kind
        kind: &'static str,
        /// Record id, e.g. `method#3`
        record: String,
        /// What failed to resolve
        descriptor: String,
    },

    /// The universe already holds an incompatible entity
    #[error("Conflicting {kind} record {record}: {reason}")]
    Conflict {
        /// Wire name of the record's kind
        kind: &'static str,
        /// Record id, e.g. `type#0`
        record: String,
        /// Description of the conflict
        reason: String,
    },

    /// Universe rejected a mutation
    #[error(transparent)]
    Universe(#[from] UniverseError),

    /// Snapshot-level failure
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Runtime stub allocation errors
#[derive(Debug, Error)]
pub enum StubError {
    /// The stub section can only be allocated once
    #[error("Runtime stub section already allocated")]
    AlreadyAllocated,

    /// Slot count outside the supported range
    #[error("Invalid vtable slot count {0}")]
    InvalidSlotCount(u32),
}

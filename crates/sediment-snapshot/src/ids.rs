//! Stable record identifiers
//!
//! Ids are assigned once per layer snapshot, in increasing order, and are
//! never reused. They only mean something inside the snapshot that assigned
//! them; cross-layer identity is the relinker's job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable id of a type record within one layer snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(u32);

impl TypeId {
    /// Create a type id from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for TypeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

/// Stable id of a method record within one layer snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(u32);

impl MethodId {
    /// Create a method id from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for MethodId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method#{}", self.0)
    }
}

//! Layer snapshot binary format definitions
//!
//! # Layout
//!
//! ```text
//! header (36 bytes)
//! segment count (u32)
//! segment*   = segment header (12 bytes) + segment data
//! checksum   = SHA-256 over every segment header and its data
//! ```
//!
//! Snapshots use **little-endian encoding** as the canonical format. The header
//! carries an endianness marker (0x01020304); reading it back as 0x04030201
//! means the producer wrote native big-endian values, which this version
//! refuses instead of byte-swapping.

use crate::error::SnapshotError;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// Magic number for layer snapshots: "SEDIMENT" (little-endian)
pub const SNAPSHOT_MAGIC: u64 = u64::from_le_bytes(*b"SEDIMENT");

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Endianness marker as written by a little-endian producer
pub const ENDIANNESS_MARKER: u32 = 0x01020304;

/// Endianness marker when read back byte-swapped
pub const ENDIANNESS_MARKER_SWAPPED: u32 = 0x04030201;

/// Snapshot header (36 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Magic number (must be SNAPSHOT_MAGIC)
    pub magic: u64,

    /// Snapshot format version
    pub version: u32,

    /// Flags, currently always zero
    pub flags: u32,

    /// Endianness marker (0x01020304)
    pub endianness: u32,

    /// Creation time (Unix epoch millis)
    pub timestamp: u64,

    /// Reserved for future use
    pub reserved: u64,
}

impl SnapshotHeader {
    /// Create a header stamped with the current time
    pub fn new() -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            flags: 0,
            endianness: ENDIANNESS_MARKER,
            timestamp,
            reserved: 0,
        }
    }

    /// Validate magic, version and byte order
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic(self.magic));
        }

        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::IncompatibleVersion {
                expected: SNAPSHOT_VERSION,
                actual: self.version,
            });
        }

        match self.endianness {
            ENDIANNESS_MARKER => Ok(()),
            ENDIANNESS_MARKER_SWAPPED => Err(SnapshotError::EndiannessMismatch),
            other => Err(SnapshotError::CorruptedData(format!(
                "invalid endianness marker {:#x}",
                other
            ))),
        }
    }

    /// Encode header in little-endian format
    pub fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(&self.magic.to_le_bytes())?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.endianness.to_le_bytes())?;
        writer.write_all(&self.timestamp.to_le_bytes())?;
        writer.write_all(&self.reserved.to_le_bytes())?;
        Ok(())
    }

    /// Decode header from reader
    pub fn decode(reader: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            magic: read_u64(reader)?,
            version: read_u32(reader)?,
            flags: read_u32(reader)?,
            endianness: read_u32(reader)?,
            timestamp: read_u64(reader)?,
            reserved: read_u64(reader)?,
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Segment type identifier
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SegmentType {
    /// Layer metadata (name, record counts)
    Metadata = 1,
    /// Type records
    Types = 2,
    /// Method records
    Methods = 3,
}

impl SegmentType {
    /// Decode a segment type byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(SegmentType::Metadata),
            2 => Some(SegmentType::Types),
            3 => Some(SegmentType::Methods),
            _ => None,
        }
    }
}

/// Segment header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Segment type identifier
    pub segment_type: u8,
    /// Segment flags
    pub flags: u8,
    /// Reserved for future use
    pub reserved: u16,
    /// Length of segment data in bytes
    pub length: u64,
}

impl SegmentHeader {
    /// Create a new segment header
    pub fn new(segment_type: SegmentType, length: u64) -> Self {
        Self {
            segment_type: segment_type as u8,
            flags: 0,
            reserved: 0,
            length,
        }
    }

    /// Encode segment header to writer
    pub fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(&[self.segment_type, self.flags])?;
        writer.write_all(&self.reserved.to_le_bytes())?;
        writer.write_all(&self.length.to_le_bytes())?;
        Ok(())
    }

    /// Decode segment header from reader
    pub fn decode(reader: &mut impl Read) -> std::io::Result<Self> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(Self {
            segment_type: buf[0],
            flags: buf[1],
            reserved: u16::from_le_bytes([buf[2], buf[3]]),
            length: read_u64(reader)?,
        })
    }
}

/// Checksum for snapshot integrity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotChecksum {
    hash: [u8; 32],
}

impl SnapshotChecksum {
    /// Compute SHA-256 checksum of data
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());
        Self { hash }
    }

    /// Verify that checksum matches the given data
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data).hash == self.hash
    }

    /// Hex rendering, for display
    pub fn to_hex(&self) -> String {
        self.hash.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Encode checksum to writer
    pub fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(&self.hash)
    }

    /// Decode checksum from reader
    pub fn decode(reader: &mut impl Read) -> std::io::Result<Self> {
        let mut hash = [0u8; 32];
        reader.read_exact(&mut hash)?;
        Ok(Self { hash })
    }
}

pub(crate) fn read_u32(reader: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

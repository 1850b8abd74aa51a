//! Layer snapshot container
//!
//! Holds every type and method record of one layer and reads/writes the
//! binary format described in [`crate::format`]. Records are validated on
//! the way in, whether pushed by a writer or decoded from bytes, so a
//! `LayerSnapshot` never holds a record whose fields disagree with its tag.

use crate::encoder::{RecordReader, RecordWriter};
use crate::error::SnapshotError;
use crate::format::{read_u32, SegmentHeader, SegmentType, SnapshotChecksum, SnapshotHeader};
use crate::ids::{MethodId, TypeId};
use crate::record::{MethodRecord, TypeRecord};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// All records persisted for one layer
#[derive(Debug, Clone, Serialize)]
pub struct LayerSnapshot {
    name: String,
    types: Vec<TypeRecord>,
    methods: Vec<MethodRecord>,
    #[serde(skip)]
    header: SnapshotHeader,
    #[serde(skip)]
    checksum: Option<SnapshotChecksum>,
    #[serde(skip)]
    type_index: FxHashMap<TypeId, usize>,
    #[serde(skip)]
    method_index: FxHashMap<MethodId, usize>,
}

impl LayerSnapshot {
    /// Create an empty snapshot for the named layer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            methods: Vec::new(),
            header: SnapshotHeader::new(),
            checksum: None,
            type_index: FxHashMap::default(),
            method_index: FxHashMap::default(),
        }
    }

    /// Layer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header this snapshot was read with (or will be written with)
    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    /// Checksum verified while decoding, `None` for snapshots built in memory
    pub fn checksum(&self) -> Option<&SnapshotChecksum> {
        self.checksum.as_ref()
    }

    /// Add a type record
    pub fn push_type(&mut self, record: TypeRecord) -> Result<(), SnapshotError> {
        record.validate()?;
        if self.type_index.contains_key(&record.id) {
            return Err(SnapshotError::DuplicateRecord {
                table: "type",
                id: record.id.as_u32(),
            });
        }
        self.type_index.insert(record.id, self.types.len());
        self.types.push(record);
        Ok(())
    }

    /// Add a method record
    pub fn push_method(&mut self, record: MethodRecord) -> Result<(), SnapshotError> {
        record.validate()?;
        if self.method_index.contains_key(&record.id) {
            return Err(SnapshotError::DuplicateRecord {
                table: "method",
                id: record.id.as_u32(),
            });
        }
        self.method_index.insert(record.id, self.methods.len());
        self.methods.push(record);
        Ok(())
    }

    /// Look up a type record by id
    pub fn type_record(&self, id: TypeId) -> Option<&TypeRecord> {
        self.type_index.get(&id).map(|&i| &self.types[i])
    }

    /// Look up a method record by id
    pub fn method_record(&self, id: MethodId) -> Option<&MethodRecord> {
        self.method_index.get(&id).map(|&i| &self.methods[i])
    }

    /// Type records in the order they were written
    pub fn types(&self) -> &[TypeRecord] {
        &self.types
    }

    /// Method records in the order they were written
    pub fn methods(&self) -> &[MethodRecord] {
        &self.methods
    }

    /// Check that every id a method record mentions has a record
    pub fn check_references(&self) -> Result<(), SnapshotError> {
        for method in &self.methods {
            for ty in method.type_references() {
                if self.type_record(ty).is_none() {
                    return Err(SnapshotError::CorruptedData(format!(
                        "{} {} references missing {}",
                        method.tag, method.id, ty
                    )));
                }
            }
            for target in method.method_references() {
                if self.method_record(target).is_none() {
                    return Err(SnapshotError::CorruptedData(format!(
                        "{} {} references missing {}",
                        method.tag, method.id, target
                    )));
                }
            }
        }
        Ok(())
    }

    // ===== Writing =====

    /// Encode the snapshot to bytes
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Write the snapshot to a file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the snapshot to any writer
    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), SnapshotError> {
        let segments = [
            (SegmentType::Metadata, self.encode_metadata()),
            (SegmentType::Types, self.encode_types()),
            (SegmentType::Methods, self.encode_methods()),
        ];

        let mut segment_bytes = Vec::new();
        for (segment_type, data) in &segments {
            SegmentHeader::new(*segment_type, data.len() as u64).encode(&mut segment_bytes)?;
            segment_bytes.extend_from_slice(data);
        }

        self.header.encode(writer)?;
        writer.write_all(&(segments.len() as u32).to_le_bytes())?;
        writer.write_all(&segment_bytes)?;
        SnapshotChecksum::compute(&segment_bytes).encode(writer)?;
        Ok(())
    }

    fn encode_metadata(&self) -> Vec<u8> {
        let mut writer = RecordWriter::new();
        writer.emit_string(&self.name);
        writer.emit_u32(self.types.len() as u32);
        writer.emit_u32(self.methods.len() as u32);
        writer.into_bytes()
    }

    fn encode_types(&self) -> Vec<u8> {
        let mut writer = RecordWriter::new();
        writer.emit_u32(self.types.len() as u32);
        for record in &self.types {
            record.encode(&mut writer);
        }
        writer.into_bytes()
    }

    fn encode_methods(&self) -> Vec<u8> {
        let mut writer = RecordWriter::new();
        writer.emit_u32(self.methods.len() as u32);
        for record in &self.methods {
            record.encode(&mut writer);
        }
        writer.into_bytes()
    }

    // ===== Reading =====

    /// Decode a snapshot from bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Self::from_reader(&mut &bytes[..])
    }

    /// Load a snapshot from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::from_reader(&mut reader)
    }

    /// Load a snapshot from any reader
    pub fn from_reader(reader: &mut impl Read) -> Result<Self, SnapshotError> {
        let header = SnapshotHeader::decode(reader)?;
        header.validate()?;

        let segment_count = read_u32(reader)?;

        let mut segments: Vec<(SegmentType, Vec<u8>)> = Vec::new();
        let mut segment_bytes = Vec::new();
        for _ in 0..segment_count {
            let seg_header = SegmentHeader::decode(reader)?;
            let segment_type = SegmentType::from_u8(seg_header.segment_type).ok_or_else(|| {
                SnapshotError::CorruptedData(format!(
                    "unknown segment type {}",
                    seg_header.segment_type
                ))
            })?;
            if segments.iter().any(|(t, _)| *t == segment_type) {
                return Err(SnapshotError::CorruptedData(format!(
                    "duplicate {:?} segment",
                    segment_type
                )));
            }

            let mut data = Vec::new();
            reader
                .by_ref()
                .take(seg_header.length)
                .read_to_end(&mut data)?;
            if data.len() as u64 != seg_header.length {
                return Err(SnapshotError::CorruptedData(format!(
                    "{:?} segment truncated",
                    segment_type
                )));
            }

            seg_header.encode(&mut segment_bytes)?;
            segment_bytes.extend_from_slice(&data);
            segments.push((segment_type, data));
        }

        let checksum = SnapshotChecksum::decode(reader)?;
        if !checksum.verify(&segment_bytes) {
            return Err(SnapshotError::ChecksumMismatch);
        }

        let find = |wanted: SegmentType| {
            segments
                .iter()
                .find(|(t, _)| *t == wanted)
                .map(|(_, data)| data.as_slice())
                .ok_or_else(|| {
                    SnapshotError::CorruptedData(format!("missing {:?} segment", wanted))
                })
        };

        let mut meta = RecordReader::new(find(SegmentType::Metadata)?);
        let name = meta.read_string()?;
        let type_count = meta.read_u32()? as usize;
        let method_count = meta.read_u32()? as usize;

        let mut snapshot = LayerSnapshot::new(name);
        snapshot.header = header;
        snapshot.checksum = Some(checksum);

        let mut types = RecordReader::new(find(SegmentType::Types)?);
        let count = types.read_u32()? as usize;
        for _ in 0..count {
            snapshot.push_type(TypeRecord::decode(&mut types)?)?;
        }

        let mut methods = RecordReader::new(find(SegmentType::Methods)?);
        let count = methods.read_u32()? as usize;
        for _ in 0..count {
            snapshot.push_method(MethodRecord::decode(&mut methods)?)?;
        }

        if types.has_more() || methods.has_more() {
            return Err(SnapshotError::CorruptedData(
                "trailing bytes after records".to_string(),
            ));
        }
        if snapshot.types.len() != type_count || snapshot.methods.len() != method_count {
            return Err(SnapshotError::CorruptedData(format!(
                "metadata announces {} types and {} methods, found {} and {}",
                type_count,
                method_count,
                snapshot.types.len(),
                snapshot.methods.len()
            )));
        }

        Ok(snapshot)
    }
}

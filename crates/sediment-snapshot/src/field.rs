//! Provenance field vocabulary
//!
//! Every synthetic record carries a small ordered set of tagged fields next to
//! its base record. Each tag has exactly one value kind, so a reader never has
//! to guess how to interpret a value.

use crate::encoder::{DecodeError, RecordReader, RecordWriter};
use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag of a provenance field
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTag {
    /// Declaring class of a serialization key
    RawDeclaringClass = 1,
    /// Target constructor class of a serialization key
    RawTargetConstructorClass = 2,
    /// Class that captured a lambda
    CapturingClass = 3,
    /// Id of the constructor a factory allocates through
    TargetConstructor = 4,
    /// Whether a factory throws the object it allocated
    ThrowAllocatedObject = 5,
    /// Id of the type a factory instantiates
    InstantiatedType = 6,
    /// Id of the method a C entry point stub calls
    OriginalMethodId = 7,
    /// Whether a C entry point stub is not published
    NotAsPublished = 8,
    /// Declaring class of a wrapped reflective member
    WrappedMemberClass = 9,
    /// Name of a wrapped reflective member, or the constructor sentinel
    WrappedMemberName = 10,
    /// Parameter type names of a wrapped reflective member
    WrappedMemberArguments = 11,
}

impl FieldTag {
    /// All field tags in wire order
    pub const ALL: [FieldTag; 11] = [
        FieldTag::RawDeclaringClass,
        FieldTag::RawTargetConstructorClass,
        FieldTag::CapturingClass,
        FieldTag::TargetConstructor,
        FieldTag::ThrowAllocatedObject,
        FieldTag::InstantiatedType,
        FieldTag::OriginalMethodId,
        FieldTag::NotAsPublished,
        FieldTag::WrappedMemberClass,
        FieldTag::WrappedMemberName,
        FieldTag::WrappedMemberArguments,
    ];

    /// Decode a tag from its wire byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| *tag as u8 == byte)
    }

    /// The only value kind this tag may carry
    pub fn value_kind(self) -> ValueKind {
        match self {
            FieldTag::RawDeclaringClass
            | FieldTag::RawTargetConstructorClass
            | FieldTag::CapturingClass
            | FieldTag::WrappedMemberClass
            | FieldTag::WrappedMemberName => ValueKind::String,
            FieldTag::TargetConstructor
            | FieldTag::InstantiatedType
            | FieldTag::OriginalMethodId => ValueKind::Id,
            FieldTag::ThrowAllocatedObject | FieldTag::NotAsPublished => ValueKind::Bool,
            FieldTag::WrappedMemberArguments => ValueKind::StringList,
        }
    }

    /// Wire name of the tag
    pub fn name(self) -> &'static str {
        match self {
            FieldTag::RawDeclaringClass => "raw_declaring_class",
            FieldTag::RawTargetConstructorClass => "raw_target_constructor_class",
            FieldTag::CapturingClass => "capturing_class",
            FieldTag::TargetConstructor => "target_constructor",
            FieldTag::ThrowAllocatedObject => "throw_allocated_object",
            FieldTag::InstantiatedType => "instantiated_type",
            FieldTag::OriginalMethodId => "original_method_id",
            FieldTag::NotAsPublished => "not_as_published",
            FieldTag::WrappedMemberClass => "wrapped_member_class",
            FieldTag::WrappedMemberName => "wrapped_member_name",
            FieldTag::WrappedMemberArguments => "wrapped_member_arguments",
        }
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of a field value
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// UTF-8 string
    String = 1,
    /// Raw stable id of another record in the same snapshot
    Id = 2,
    /// Boolean flag
    Bool = 3,
    /// Ordered list of strings
    StringList = 4,
}

impl ValueKind {
    fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(ValueKind::String),
            2 => Some(ValueKind::Id),
            3 => Some(ValueKind::Bool),
            4 => Some(ValueKind::StringList),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Id => "id",
            ValueKind::Bool => "bool",
            ValueKind::StringList => "string list",
        };
        f.write_str(name)
    }
}

/// Value of a provenance field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// String value
    String(String),
    /// Raw record id
    Id(u32),
    /// Boolean flag
    Bool(bool),
    /// Ordered string list
    StringList(Vec<String>),
}

impl FieldValue {
    /// Kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::String(_) => ValueKind::String,
            FieldValue::Id(_) => ValueKind::Id,
            FieldValue::Bool(_) => ValueKind::Bool,
            FieldValue::StringList(_) => ValueKind::StringList,
        }
    }

    fn encode(&self, writer: &mut RecordWriter) {
        writer.emit_u8(self.kind() as u8);
        match self {
            FieldValue::String(s) => writer.emit_string(s),
            FieldValue::Id(id) => writer.emit_u32(*id),
            FieldValue::Bool(b) => writer.emit_bool(*b),
            FieldValue::StringList(list) => writer.emit_string_list(list),
        }
    }

    fn decode(reader: &mut RecordReader<'_>) -> Result<Self, DecodeError> {
        let offset = reader.position();
        let byte = reader.read_u8()?;
        let kind = ValueKind::from_u8(byte).ok_or(DecodeError::UnknownValueKind(byte, offset))?;
        Ok(match kind {
            ValueKind::String => FieldValue::String(reader.read_string()?),
            ValueKind::Id => FieldValue::Id(reader.read_u32()?),
            ValueKind::Bool => FieldValue::Bool(reader.read_bool()?),
            ValueKind::StringList => FieldValue::StringList(reader.read_string_list()?),
        })
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{:?}", s),
            FieldValue::Id(id) => write!(f, "#{}", id),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::StringList(list) => write!(f, "{:?}", list),
        }
    }
}

/// Ordered tag-to-value mapping attached to a record
///
/// Insertion order is preserved and is the order fields are written in.
/// A tag may appear at most once and only with its own value kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvenanceFields {
    entries: Vec<(FieldTag, FieldValue)>,
}

impl ProvenanceFields {
    /// Create an empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, rejecting duplicates and mistyped values
    pub fn insert(&mut self, tag: FieldTag, value: FieldValue) -> Result<(), SnapshotError> {
        if self.contains(tag) {
            return Err(SnapshotError::DuplicateField(tag));
        }
        if value.kind() != tag.value_kind() {
            return Err(SnapshotError::FieldKindMismatch {
                tag,
                expected: tag.value_kind(),
                actual: value.kind(),
            });
        }
        self.entries.push((tag, value));
        Ok(())
    }

    /// Builder-style insert
    pub fn with(mut self, tag: FieldTag, value: FieldValue) -> Result<Self, SnapshotError> {
        self.insert(tag, value)?;
        Ok(self)
    }

    /// Get a field value
    pub fn get(&self, tag: FieldTag) -> Option<&FieldValue> {
        self.entries.iter().find(|(t, _)| *t == tag).map(|(_, v)| v)
    }

    /// Get a string field
    pub fn get_str(&self, tag: FieldTag) -> Option<&str> {
        match self.get(tag) {
            Some(FieldValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get an id field
    pub fn get_id(&self, tag: FieldTag) -> Option<u32> {
        match self.get(tag) {
            Some(FieldValue::Id(id)) => Some(*id),
            _ => None,
        }
    }

    /// Get a boolean field
    pub fn get_bool(&self, tag: FieldTag) -> Option<bool> {
        match self.get(tag) {
            Some(FieldValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Get a string list field
    pub fn get_str_list(&self, tag: FieldTag) -> Option<&[String]> {
        match self.get(tag) {
            Some(FieldValue::StringList(list)) => Some(list),
            _ => None,
        }
    }

    /// Whether a tag is present
    pub fn contains(&self, tag: FieldTag) -> bool {
        self.entries.iter().any(|(t, _)| *t == tag)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no fields
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (FieldTag, &FieldValue)> {
        self.entries.iter().map(|(t, v)| (*t, v))
    }

    /// Tags present, in insertion order
    pub fn tags(&self) -> impl Iterator<Item = FieldTag> + '_ {
        self.entries.iter().map(|(t, _)| *t)
    }

    pub(crate) fn encode(&self, writer: &mut RecordWriter) {
        writer.emit_u8(self.entries.len() as u8);
        for (tag, value) in &self.entries {
            writer.emit_u8(*tag as u8);
            value.encode(writer);
        }
    }

    pub(crate) fn decode(reader: &mut RecordReader<'_>) -> Result<Self, SnapshotError> {
        let count = reader.read_u8()?;
        let mut fields = ProvenanceFields::new();
        for _ in 0..count {
            let offset = reader.position();
            let byte = reader.read_u8()?;
            let tag = FieldTag::from_u8(byte).ok_or(DecodeError::UnknownFieldTag(byte, offset))?;
            let value = FieldValue::decode(reader)?;
            fields.insert(tag, value)?;
        }
        Ok(fields)
    }
}

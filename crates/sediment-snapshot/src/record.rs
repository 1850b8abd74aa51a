//! Type and method records

use crate::encoder::{DecodeError, RecordReader, RecordWriter};
use crate::error::SnapshotError;
use crate::field::{FieldTag, ProvenanceFields};
use crate::ids::{MethodId, TypeId};
use crate::kind::{MethodTag, TypeTag};
use serde::{Deserialize, Serialize};

/// Persisted record of one type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRecord {
    /// Stable id within the layer
    pub id: TypeId,
    /// Fully qualified name
    pub name: String,
    /// Synthetic kind
    pub tag: TypeTag,
    /// Kind-specific provenance
    pub fields: ProvenanceFields,
}

impl TypeRecord {
    /// Create an ordinary type record with no provenance
    pub fn plain(id: TypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            tag: TypeTag::None,
            fields: ProvenanceFields::new(),
        }
    }

    /// Check that the fields are exactly those the tag requires
    pub fn validate(&self) -> Result<(), SnapshotError> {
        check_fields(
            self.tag.name(),
            self.id.as_u32(),
            self.tag.required_fields(),
            &self.fields,
        )
    }

    pub(crate) fn encode(&self, writer: &mut RecordWriter) {
        writer.emit_u32(self.id.as_u32());
        writer.emit_string(&self.name);
        writer.emit_u8(self.tag.as_u8());
        self.fields.encode(writer);
    }

    pub(crate) fn decode(reader: &mut RecordReader<'_>) -> Result<Self, SnapshotError> {
        let id = TypeId::new(reader.read_u32()?);
        let name = reader.read_string()?;
        let offset = reader.position();
        let byte = reader.read_u8()?;
        let tag = TypeTag::from_u8(byte).ok_or(DecodeError::UnknownKindTag("type", byte, offset))?;
        let fields = ProvenanceFields::decode(reader)?;
        let record = Self {
            id,
            name,
            tag,
            fields,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Persisted record of one method or constructor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRecord {
    /// Stable id within the layer
    pub id: MethodId,
    /// Id of the declaring type's record
    pub owner: TypeId,
    /// Method name, `<init>` for constructors
    pub name: String,
    /// Parameter type names in declaration order
    pub parameter_types: Vec<String>,
    /// Synthetic kind
    pub tag: MethodTag,
    /// Kind-specific provenance
    pub fields: ProvenanceFields,
}

impl MethodRecord {
    /// Check that the fields are exactly those the tag requires
    pub fn validate(&self) -> Result<(), SnapshotError> {
        check_fields(
            self.tag.name(),
            self.id.as_u32(),
            self.tag.required_fields(),
            &self.fields,
        )
    }

    /// Ids of other method records this record refers to
    pub fn method_references(&self) -> Vec<MethodId> {
        [FieldTag::TargetConstructor, FieldTag::OriginalMethodId]
            .into_iter()
            .filter_map(|tag| self.fields.get_id(tag))
            .map(MethodId::new)
            .collect()
    }

    /// Ids of type records this record refers to, owner included
    pub fn type_references(&self) -> Vec<TypeId> {
        let mut refs = vec![self.owner];
        if let Some(id) = self.fields.get_id(FieldTag::InstantiatedType) {
            refs.push(TypeId::new(id));
        }
        refs
    }

    pub(crate) fn encode(&self, writer: &mut RecordWriter) {
        writer.emit_u32(self.id.as_u32());
        writer.emit_u32(self.owner.as_u32());
        writer.emit_string(&self.name);
        writer.emit_string_list(&self.parameter_types);
        writer.emit_u8(self.tag.as_u8());
        self.fields.encode(writer);
    }

    pub(crate) fn decode(reader: &mut RecordReader<'_>) -> Result<Self, SnapshotError> {
        let id = MethodId::new(reader.read_u32()?);
        let owner = TypeId::new(reader.read_u32()?);
        let name = reader.read_string()?;
        let parameter_types = reader.read_string_list()?;
        let offset = reader.position();
        let byte = reader.read_u8()?;
        let tag =
            MethodTag::from_u8(byte).ok_or(DecodeError::UnknownKindTag("method", byte, offset))?;
        let fields = ProvenanceFields::decode(reader)?;
        let record = Self {
            id,
            owner,
            name,
            parameter_types,
            tag,
            fields,
        };
        record.validate()?;
        Ok(record)
    }
}

fn check_fields(
    kind: &'static str,
    id: u32,
    required: &[FieldTag],
    fields: &ProvenanceFields,
) -> Result<(), SnapshotError> {
    if let Some(missing) = required.iter().find(|tag| !fields.contains(**tag)) {
        return Err(SnapshotError::MalformedRecord {
            kind,
            id,
            reason: format!("missing required field '{}'", missing),
        });
    }
    if let Some(extra) = fields.tags().find(|tag| !required.contains(tag)) {
        return Err(SnapshotError::MalformedRecord {
            kind,
            id,
            reason: format!("field '{}' does not belong to this kind", extra),
        });
    }
    Ok(())
}

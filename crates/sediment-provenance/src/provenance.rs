//! Provenance sum types
//!
//! One variant per synthetic kind, holding exactly the cross-process facts
//! that kind is rebuilt from. Conversion to and from the tagged field set of a
//! snapshot record lives here and nowhere else.

use crate::universe::{MemberName, SerializationKey, WrappedMember};
use sediment_snapshot::{
    FieldTag, FieldValue, MethodId, MethodTag, ProvenanceFields, SnapshotError, TypeId, TypeTag,
};

/// Provenance of a type record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeProvenance {
    /// Ordinary type
    Ordinary,
    /// Serialization constructor accessor, identified by its key
    GeneratedSerialization(SerializationKey),
    /// Lambda class, identified by its capturing class
    Lambda {
        /// Capturing class name
        capturing_class: String,
    },
    /// Proxy type already renamed to a stable name
    Proxy,
}

impl TypeProvenance {
    /// Kind tag of this provenance
    pub fn tag(&self) -> TypeTag {
        match self {
            TypeProvenance::Ordinary => TypeTag::None,
            TypeProvenance::GeneratedSerialization(_) => TypeTag::GeneratedSerialization,
            TypeProvenance::Lambda { .. } => TypeTag::Lambda,
            TypeProvenance::Proxy => TypeTag::Proxy,
        }
    }

    /// Field set written alongside the record
    pub fn to_fields(&self) -> Result<ProvenanceFields, SnapshotError> {
        let fields = ProvenanceFields::new();
        match self {
            TypeProvenance::Ordinary | TypeProvenance::Proxy => Ok(fields),
            TypeProvenance::GeneratedSerialization(key) => fields
                .with(
                    FieldTag::RawDeclaringClass,
                    FieldValue::String(key.declaring_class.clone()),
                )?
                .with(
                    FieldTag::RawTargetConstructorClass,
                    FieldValue::String(key.target_constructor_class.clone()),
                ),
            TypeProvenance::Lambda { capturing_class } => fields.with(
                FieldTag::CapturingClass,
                FieldValue::String(capturing_class.clone()),
            ),
        }
    }

    /// Rebuild provenance from a record's tag and fields
    pub fn from_fields(
        id: TypeId,
        tag: TypeTag,
        fields: &ProvenanceFields,
    ) -> Result<Self, SnapshotError> {
        let missing = |field: FieldTag| SnapshotError::MalformedRecord {
            kind: tag.name(),
            id: id.as_u32(),
            reason: format!("missing field '{}'", field),
        };
        let string = |field: FieldTag| {
            fields
                .get_str(field)
                .map(str::to_string)
                .ok_or_else(|| missing(field))
        };

        match tag {
            TypeTag::None => Ok(TypeProvenance::Ordinary),
            TypeTag::Proxy => Ok(TypeProvenance::Proxy),
            TypeTag::GeneratedSerialization => {
                Ok(TypeProvenance::GeneratedSerialization(SerializationKey::new(
                    string(FieldTag::RawDeclaringClass)?,
                    string(FieldTag::RawTargetConstructorClass)?,
                )))
            }
            TypeTag::Lambda => Ok(TypeProvenance::Lambda {
                capturing_class: string(FieldTag::CapturingClass)?,
            }),
        }
    }
}

/// Provenance of a method record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodProvenance {
    /// Ordinary method
    Ordinary,
    /// Factory bound to a constructor sibling
    Factory {
        /// Id of the target constructor's record
        target_constructor: MethodId,
        /// Whether the allocated object is thrown
        throw_allocated_object: bool,
        /// Id of the instantiated type's record
        instantiated_type: TypeId,
    },
    /// C entry point stub bound to its original method
    CEntryPointStub {
        /// Id of the original method's record
        original_method: MethodId,
        /// Stub is not published under the original's name
        not_published: bool,
    },
    /// Reflective signature expander for a real member
    ReflectionExpandSignature(WrappedMember),
    /// Native-interop call variant wrapper for a real member
    JniCallVariantWrapper(WrappedMember),
}

impl MethodProvenance {
    /// Kind tag of this provenance
    pub fn tag(&self) -> MethodTag {
        match self {
            MethodProvenance::Ordinary => MethodTag::None,
            MethodProvenance::Factory { .. } => MethodTag::Factory,
            MethodProvenance::CEntryPointStub { .. } => MethodTag::CEntryPointStub,
            MethodProvenance::ReflectionExpandSignature(_) => MethodTag::ReflectionExpandSignature,
            MethodProvenance::JniCallVariantWrapper(_) => MethodTag::JniCallVariantWrapper,
        }
    }

    /// Field set written alongside the record
    pub fn to_fields(&self) -> Result<ProvenanceFields, SnapshotError> {
        let fields = ProvenanceFields::new();
        match self {
            MethodProvenance::Ordinary => Ok(fields),
            MethodProvenance::Factory {
                target_constructor,
                throw_allocated_object,
                instantiated_type,
            } => fields
                .with(
                    FieldTag::TargetConstructor,
                    FieldValue::Id(target_constructor.as_u32()),
                )?
                .with(
                    FieldTag::ThrowAllocatedObject,
                    FieldValue::Bool(*throw_allocated_object),
                )?
                .with(
                    FieldTag::InstantiatedType,
                    FieldValue::Id(instantiated_type.as_u32()),
                ),
            MethodProvenance::CEntryPointStub {
                original_method,
                not_published,
            } => fields
                .with(
                    FieldTag::OriginalMethodId,
                    FieldValue::Id(original_method.as_u32()),
                )?
                .with(FieldTag::NotAsPublished, FieldValue::Bool(*not_published)),
            MethodProvenance::ReflectionExpandSignature(member)
            | MethodProvenance::JniCallVariantWrapper(member) => fields
                .with(
                    FieldTag::WrappedMemberClass,
                    FieldValue::String(member.declaring_class.clone()),
                )?
                .with(
                    FieldTag::WrappedMemberName,
                    FieldValue::String(member.name.as_wire().to_string()),
                )?
                .with(
                    FieldTag::WrappedMemberArguments,
                    FieldValue::StringList(member.parameter_types.clone()),
                ),
        }
    }

    /// Rebuild provenance from a record's tag and fields
    pub fn from_fields(
        id: MethodId,
        tag: MethodTag,
        fields: &ProvenanceFields,
    ) -> Result<Self, SnapshotError> {
        let missing = |field: FieldTag| SnapshotError::MalformedRecord {
            kind: tag.name(),
            id: id.as_u32(),
            reason: format!("missing field '{}'", field),
        };
        let id_field = |field: FieldTag| fields.get_id(field).ok_or_else(|| missing(field));
        let bool_field = |field: FieldTag| fields.get_bool(field).ok_or_else(|| missing(field));
        let wrapped = || -> Result<WrappedMember, SnapshotError> {
            let declaring_class = fields
                .get_str(FieldTag::WrappedMemberClass)
                .ok_or_else(|| missing(FieldTag::WrappedMemberClass))?;
            let name = fields
                .get_str(FieldTag::WrappedMemberName)
                .ok_or_else(|| missing(FieldTag::WrappedMemberName))?;
            let parameter_types = fields
                .get_str_list(FieldTag::WrappedMemberArguments)
                .ok_or_else(|| missing(FieldTag::WrappedMemberArguments))?;
            Ok(WrappedMember {
                declaring_class: declaring_class.to_string(),
                name: MemberName::from_wire(name),
                parameter_types: parameter_types.to_vec(),
            })
        };

        match tag {
            MethodTag::None => Ok(MethodProvenance::Ordinary),
            MethodTag::Factory => Ok(MethodProvenance::Factory {
                target_constructor: MethodId::new(id_field(FieldTag::TargetConstructor)?),
                throw_allocated_object: bool_field(FieldTag::ThrowAllocatedObject)?,
                instantiated_type: TypeId::new(id_field(FieldTag::InstantiatedType)?),
            }),
            MethodTag::CEntryPointStub => Ok(MethodProvenance::CEntryPointStub {
                original_method: MethodId::new(id_field(FieldTag::OriginalMethodId)?),
                not_published: bool_field(FieldTag::NotAsPublished)?,
            }),
            MethodTag::ReflectionExpandSignature => {
                Ok(MethodProvenance::ReflectionExpandSignature(wrapped()?))
            }
            MethodTag::JniCallVariantWrapper => {
                Ok(MethodProvenance::JniCallVariantWrapper(wrapped()?))
            }
        }
    }
}

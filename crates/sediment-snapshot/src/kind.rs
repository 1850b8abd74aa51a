//! Synthetic kind tags
//!
//! The tag of a record fixes exactly which provenance fields it carries. This
//! table is the contract between the layer that writes a snapshot and every
//! layer that relinks it; changing a required field set is a format break and
//! must bump `SNAPSHOT_VERSION`.

use crate::field::FieldTag;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name used for constructors in wrapped-member descriptors
///
/// Constructors have no name in the source member model.
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Synthetic kind of a type record
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeTag {
    /// Ordinary, source-declared type
    None = 0,
    /// Platform-generated serialization constructor accessor
    GeneratedSerialization = 1,
    /// Lambda-synthesized class
    Lambda = 2,
    /// Dynamic proxy renamed by substitution
    Proxy = 3,
}

impl TypeTag {
    /// Decode a tag from its wire byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TypeTag::None),
            1 => Some(TypeTag::GeneratedSerialization),
            2 => Some(TypeTag::Lambda),
            3 => Some(TypeTag::Proxy),
            _ => None,
        }
    }

    /// Wire byte of the tag
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Wire name of the tag
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::None => "NONE",
            TypeTag::GeneratedSerialization => "GENERATED_SERIALIZATION",
            TypeTag::Lambda => "LAMBDA",
            TypeTag::Proxy => "PROXY",
        }
    }

    /// Whether this is a synthetic kind
    pub fn is_synthetic(self) -> bool {
        self != TypeTag::None
    }

    /// Fields a record of this kind must carry, in write order
    pub fn required_fields(self) -> &'static [FieldTag] {
        match self {
            TypeTag::None | TypeTag::Proxy => &[],
            TypeTag::GeneratedSerialization => &[
                FieldTag::RawDeclaringClass,
                FieldTag::RawTargetConstructorClass,
            ],
            TypeTag::Lambda => &[FieldTag::CapturingClass],
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Synthetic kind of a method record
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MethodTag {
    /// Ordinary, source-declared method
    None = 0,
    /// Allocation helper standing in for a constructor
    Factory = 1,
    /// Native entry point call stub
    CEntryPointStub = 2,
    /// Adapter from a narrow reflective call shape to a member's signature
    #[serde(rename = "REFLECTION_SIGNATURE_EXPANDER")]
    ReflectionExpandSignature = 3,
    /// Native-interop call variant wrapper
    JniCallVariantWrapper = 4,
}

impl MethodTag {
    /// Decode a tag from its wire byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(MethodTag::None),
            1 => Some(MethodTag::Factory),
            2 => Some(MethodTag::CEntryPointStub),
            3 => Some(MethodTag::ReflectionExpandSignature),
            4 => Some(MethodTag::JniCallVariantWrapper),
            _ => None,
        }
    }

    /// Wire byte of the tag
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Wire name of the tag
    pub fn name(self) -> &'static str {
        match self {
            MethodTag::None => "NONE",
            MethodTag::Factory => "FACTORY",
            MethodTag::CEntryPointStub => "C_ENTRY_POINT_STUB",
            MethodTag::ReflectionExpandSignature => "REFLECTION_SIGNATURE_EXPANDER",
            MethodTag::JniCallVariantWrapper => "JNI_CALL_VARIANT_WRAPPER",
        }
    }

    /// Whether this is a synthetic kind
    pub fn is_synthetic(self) -> bool {
        self != MethodTag::None
    }

    /// Fields a record of this kind must carry, in write order
    pub fn required_fields(self) -> &'static [FieldTag] {
        match self {
            MethodTag::None => &[],
            MethodTag::Factory => &[
                FieldTag::TargetConstructor,
                FieldTag::ThrowAllocatedObject,
                FieldTag::InstantiatedType,
            ],
            MethodTag::CEntryPointStub => {
                &[FieldTag::OriginalMethodId, FieldTag::NotAsPublished]
            }
            MethodTag::ReflectionExpandSignature | MethodTag::JniCallVariantWrapper => &[
                FieldTag::WrappedMemberClass,
                FieldTag::WrappedMemberName,
                FieldTag::WrappedMemberArguments,
            ],
        }
    }
}

impl fmt::Display for MethodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

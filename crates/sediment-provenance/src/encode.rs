//! Provenance encoder
//!
//! Turns a classified entity into the provenance facts its record carries.
//! Sibling ids (factory targets, instantiated types, stub originals) come from
//! the materializer, so every id written here resolves within the layer.

use crate::classify::{classify_type, lambda_name_parts};
use crate::error::{ProvenanceError, UniverseError};
use crate::materialize::SiblingMaterializer;
use crate::provenance::{MethodProvenance, TypeProvenance};
use crate::registry::SyntheticRegistry;
use crate::universe::{AnalysisMethod, AnalysisType, AnalysisUniverse, MethodImpl};
use sediment_snapshot::{MethodTag, TypeTag};

/// Extracts provenance from the universe and the synthetic registry
pub struct ProvenanceEncoder<'a, R: ?Sized> {
    universe: &'a AnalysisUniverse,
    registry: &'a R,
}

impl<'a, R: SyntheticRegistry + ?Sized> ProvenanceEncoder<'a, R> {
    /// Create an encoder over a universe and its registry
    pub fn new(universe: &'a AnalysisUniverse, registry: &'a R) -> Self {
        Self { universe, registry }
    }

    /// Provenance of a type
    pub fn type_provenance(&self, ty: &AnalysisType) -> Result<TypeProvenance, ProvenanceError> {
        match classify_type(ty)? {
            TypeTag::None => Ok(TypeProvenance::Ordinary),
            TypeTag::Proxy => Ok(TypeProvenance::Proxy),
            TypeTag::GeneratedSerialization => self
                .registry
                .serialization_key(ty.handle)
                .cloned()
                .map(TypeProvenance::GeneratedSerialization)
                .ok_or_else(|| ProvenanceError::Malformed {
                    kind: TypeTag::GeneratedSerialization.name(),
                    entity: ty.name.clone(),
                    reason: "no serialization key registered for accessor".to_string(),
                }),
            TypeTag::Lambda => {
                let capturing_class = match ty.capturing_class {
                    Some(handle) => self
                        .universe
                        .ty(handle)
                        .map(|capturing| capturing.name.clone())
                        .ok_or(UniverseError::UnknownType(handle))?,
                    None => lambda_name_parts(&ty.name)
                        .map(|(capturing, _)| capturing.to_string())
                        .ok_or_else(|| ProvenanceError::Malformed {
                            kind: TypeTag::Lambda.name(),
                            entity: ty.name.clone(),
                            reason: "capturing class cannot be determined".to_string(),
                        })?,
                };
                Ok(TypeProvenance::Lambda { capturing_class })
            }
        }
    }

    /// Provenance of a method, requesting its siblings from the materializer
    pub fn method_provenance(
        &self,
        method: &AnalysisMethod,
        siblings: &mut SiblingMaterializer,
    ) -> Result<MethodProvenance, ProvenanceError> {
        match &method.implementation {
            MethodImpl::Declared => Ok(MethodProvenance::Ordinary),
            MethodImpl::Factory {
                target_constructor,
                instantiated_type,
                throw_allocated_object,
            } => {
                let target = self
                    .universe
                    .method(*target_constructor)
                    .ok_or(UniverseError::UnknownMethod(*target_constructor))?;
                if !target.is_constructor() {
                    return Err(self.malformed(
                        MethodTag::Factory,
                        method,
                        format!("target {} is not a constructor", target.name),
                    ));
                }
                self.universe
                    .ty(*instantiated_type)
                    .ok_or(UniverseError::UnknownType(*instantiated_type))?;

                Ok(MethodProvenance::Factory {
                    target_constructor: siblings.require_method(*target_constructor),
                    throw_allocated_object: *throw_allocated_object,
                    instantiated_type: siblings.require_type(*instantiated_type),
                })
            }
            MethodImpl::CEntryPointStub { not_published } => {
                let original = self.registry.stub_original(method.handle).ok_or_else(|| {
                    self.malformed(
                        MethodTag::CEntryPointStub,
                        method,
                        "no original method registered for stub".to_string(),
                    )
                })?;
                self.universe
                    .method(original)
                    .ok_or(UniverseError::UnknownMethod(original))?;

                Ok(MethodProvenance::CEntryPointStub {
                    original_method: siblings.require_method(original),
                    not_published: *not_published,
                })
            }
            MethodImpl::ReflectionExpandSignature { member } => self
                .universe
                .wrapped_member(*member)
                .map(MethodProvenance::ReflectionExpandSignature)
                .ok_or(UniverseError::UnknownMethod(*member).into()),
            MethodImpl::JniCallVariantWrapper { member } => self
                .universe
                .wrapped_member(*member)
                .map(MethodProvenance::JniCallVariantWrapper)
                .ok_or(UniverseError::UnknownMethod(*member).into()),
        }
    }

    fn malformed(
        &self,
        tag: MethodTag,
        method: &AnalysisMethod,
        reason: String,
    ) -> ProvenanceError {
        let owner = self
            .universe
            .ty(method.declaring_type)
            .map(|ty| ty.name.as_str())
            .unwrap_or("?");
        ProvenanceError::Malformed {
            kind: tag.name(),
            entity: format!("{}.{}", owner, method.name),
            reason,
        }
    }
}

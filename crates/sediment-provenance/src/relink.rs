//! Layer relinker
//!
//! Rebinds the records of a loaded layer snapshot to entities of the consuming
//! universe. Synthetic entities are found again (or rebuilt) from their
//! provenance alone: keys, names, flags and sibling ids.
//!
//! Order of work:
//! 1. Non-lambda type records
//! 2. Lambda type records, once their capturing classes are bound
//! 3. Method records, repeatedly, until every sibling they name is bound
//!
//! Every record is first planned against the universe without mutating it.
//! Only a complete plan is committed, so a record that fails leaves no trace.

use crate::classify::{lambda_name_parts, LAMBDA_MARKER};
use crate::error::{RelinkError, UniverseError};
use crate::provenance::{MethodProvenance, TypeProvenance};
use crate::registry::{fresh_accessor_name, SyntheticRegistry};
use crate::universe::{
    AnalysisType, AnalysisUniverse, MethodHandle, MethodImpl, SerializationKey, TypeHandle,
};
use rustc_hash::FxHashMap;
use sediment_snapshot::{
    LayerSnapshot, MethodId, MethodRecord, SnapshotError, TypeId, TypeRecord, TypeTag,
};
use tracing::{debug, info};

/// Mapping from a layer's record ids to handles in the consuming universe
#[derive(Debug, Default)]
pub struct RelinkedLayer {
    name: String,
    types: FxHashMap<TypeId, TypeHandle>,
    methods: FxHashMap<MethodId, MethodHandle>,
}

impl RelinkedLayer {
    /// Layer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle bound to a type record
    pub fn type_handle(&self, id: TypeId) -> Option<TypeHandle> {
        self.types.get(&id).copied()
    }

    /// Handle bound to a method record
    pub fn method_handle(&self, id: MethodId) -> Option<MethodHandle> {
        self.methods.get(&id).copied()
    }

    /// Number of relinked type records
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of relinked method records
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

enum TypePlan {
    Existing(TypeHandle),
    Declare(String),
    DeclareProxy(String),
    Accessor {
        name: String,
        key: SerializationKey,
    },
    Lambda {
        capturing_class: TypeHandle,
        suffix: String,
    },
    BindLambda {
        handle: TypeHandle,
        capturing_class: TypeHandle,
        suffix: String,
    },
}

struct MethodPlan {
    owner: TypeHandle,
    name: String,
    parameter_types: Vec<String>,
    implementation: MethodImpl,
    stub_original: Option<MethodHandle>,
    existing: Option<MethodHandle>,
}

/// Relinks layer snapshots into a universe
pub struct LayerRelinker<'a, R: ?Sized> {
    universe: &'a mut AnalysisUniverse,
    registry: &'a mut R,
}

impl<'a, R: SyntheticRegistry + ?Sized> LayerRelinker<'a, R> {
    /// Create a relinker over the consuming universe and its registry
    pub fn new(universe: &'a mut AnalysisUniverse, registry: &'a mut R) -> Self {
        Self { universe, registry }
    }

    /// Relink every record of a layer
    pub fn relink(&mut self, snapshot: &LayerSnapshot) -> Result<RelinkedLayer, RelinkError> {
        let mut layer = RelinkedLayer {
            name: snapshot.name().to_string(),
            ..RelinkedLayer::default()
        };

        for lambdas in [false, true] {
            for record in snapshot
                .types()
                .iter()
                .filter(|record| (record.tag == TypeTag::Lambda) == lambdas)
            {
                let plan = self.plan_type(record)?;
                let handle = self.commit_type(plan)?;
                if record.tag.is_synthetic() {
                    debug!(
                        record = %record.id,
                        tag = %record.tag,
                        %handle,
                        "relinked synthetic type"
                    );
                }
                layer.types.insert(record.id, handle);
            }
        }

        let mut pending: Vec<&MethodRecord> = snapshot.methods().iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for record in pending {
                match self.plan_method(snapshot, &layer, record)? {
                    Some(plan) => {
                        let handle = self.commit_method(plan)?;
                        if record.tag.is_synthetic() {
                            debug!(
                                record = %record.id,
                                tag = %record.tag,
                                %handle,
                                "relinked synthetic method"
                            );
                        }
                        layer.methods.insert(record.id, handle);
                    }
                    None => deferred.push(record),
                }
            }
            if deferred.len() == before {
                let record = deferred[0];
                return Err(RelinkError::Unresolvable {
                    kind: record.tag.name(),
                    record: record.id.to_string(),
                    descriptor: format!(
                        "cyclic sibling reference through {}",
                        join_ids(&record.method_references())
                    ),
                });
            }
            pending = deferred;
        }

        info!(
            layer = snapshot.name(),
            types = layer.type_count(),
            methods = layer.method_count(),
            "layer relinked"
        );
        Ok(layer)
    }

    // ===== Types =====

    fn plan_type(&self, record: &TypeRecord) -> Result<TypePlan, RelinkError> {
        let provenance = TypeProvenance::from_fields(record.id, record.tag, &record.fields)?;
        let conflict = |reason: String| RelinkError::Conflict {
            kind: record.tag.name(),
            record: record.id.to_string(),
            reason,
        };

        match provenance {
            TypeProvenance::Ordinary => match self.universe.find_type(&record.name) {
                Some(handle) => {
                    let existing = self.type_of(handle)?;
                    if existing.proxy_renamed || existing.capturing_class.is_some() {
                        return Err(conflict(format!("{} is a synthetic type", record.name)));
                    }
                    Ok(TypePlan::Existing(handle))
                }
                None => Ok(TypePlan::Declare(record.name.clone())),
            },
            TypeProvenance::Proxy => match self.universe.find_type(&record.name) {
                Some(handle) => {
                    if !self.type_of(handle)?.proxy_renamed {
                        return Err(conflict(format!("{} is not a proxy type", record.name)));
                    }
                    Ok(TypePlan::Existing(handle))
                }
                None => Ok(TypePlan::DeclareProxy(record.name.clone())),
            },
            TypeProvenance::GeneratedSerialization(key) => {
                match self.registry.serialization_accessor(&key) {
                    Some(handle) => Ok(TypePlan::Existing(handle)),
                    None => Ok(TypePlan::Accessor {
                        name: fresh_accessor_name(&*self.universe),
                        key,
                    }),
                }
            }
            TypeProvenance::Lambda { capturing_class } => {
                let capturing = self.universe.find_type(&capturing_class).ok_or_else(|| {
                    RelinkError::Unresolvable {
                        kind: record.tag.name(),
                        record: record.id.to_string(),
                        descriptor: format!("capturing class {}", capturing_class),
                    }
                })?;
                let (_, suffix) = lambda_name_parts(&record.name).ok_or_else(|| {
                    SnapshotError::MalformedRecord {
                        kind: record.tag.name(),
                        id: record.id.as_u32(),
                        reason: format!("{} is not a lambda class name", record.name),
                    }
                })?;

                if let Some(handle) = self.universe.lambda_type(capturing, suffix) {
                    return Ok(TypePlan::Existing(handle));
                }
                let name = format!("{}{}{}", capturing_class, LAMBDA_MARKER, suffix);
                let Some(handle) = self.universe.find_type(&name) else {
                    return Ok(TypePlan::Lambda {
                        capturing_class: capturing,
                        suffix: suffix.to_string(),
                    });
                };
                let existing = self.type_of(handle)?;
                if existing.proxy_renamed {
                    return Err(conflict(format!("{} is a proxy type", name)));
                }
                if existing.capturing_class.is_some() {
                    return Err(conflict(format!("{} is not bound to {}", name, capturing_class)));
                }
                Ok(TypePlan::BindLambda {
                    handle,
                    capturing_class: capturing,
                    suffix: suffix.to_string(),
                })
            }
        }
    }

    fn commit_type(&mut self, plan: TypePlan) -> Result<TypeHandle, RelinkError> {
        let handle = match plan {
            TypePlan::Existing(handle) => handle,
            TypePlan::Declare(name) => self.universe.add_type(name),
            TypePlan::DeclareProxy(name) => self.universe.add_proxy_type(name),
            TypePlan::Accessor { name, key } => {
                let handle = self.universe.add_type(name);
                self.registry.register_serialization_accessor(handle, key);
                handle
            }
            TypePlan::Lambda {
                capturing_class,
                suffix,
            } => self.universe.add_lambda_type(capturing_class, &suffix)?,
            TypePlan::BindLambda {
                handle,
                capturing_class,
                suffix,
            } => {
                self.universe
                    .bind_lambda_type(handle, capturing_class, &suffix)?;
                handle
            }
        };
        Ok(handle)
    }

    fn type_of(&self, handle: TypeHandle) -> Result<&AnalysisType, RelinkError> {
        Ok(self.universe.ty(handle).ok_or(UniverseError::UnknownType(handle))?)
    }

    // ===== Methods =====

    fn plan_method(
        &self,
        snapshot: &LayerSnapshot,
        layer: &RelinkedLayer,
        record: &MethodRecord,
    ) -> Result<Option<MethodPlan>, RelinkError> {
        let unresolvable = |descriptor: String| RelinkError::Unresolvable {
            kind: record.tag.name(),
            record: record.id.to_string(),
            descriptor,
        };
        let conflict = |reason: String| RelinkError::Conflict {
            kind: record.tag.name(),
            record: record.id.to_string(),
            reason,
        };
        // Ok(None) while the sibling's own record is still waiting its turn
        let sibling = |id: MethodId| -> Result<Option<MethodHandle>, RelinkError> {
            if let Some(handle) = layer.method_handle(id) {
                return Ok(Some(handle));
            }
            if snapshot.method_record(id).is_some() {
                return Ok(None);
            }
            Err(unresolvable(format!("missing sibling {}", id)))
        };

        let owner = layer
            .type_handle(record.owner)
            .ok_or_else(|| unresolvable(format!("missing owner {}", record.owner)))?;

        let provenance = MethodProvenance::from_fields(record.id, record.tag, &record.fields)?;
        let mut stub_original = None;
        let implementation = match provenance {
            MethodProvenance::Ordinary => MethodImpl::Declared,
            MethodProvenance::Factory {
                target_constructor,
                throw_allocated_object,
                instantiated_type,
            } => {
                let Some(target) = sibling(target_constructor)? else {
                    return Ok(None);
                };
                let is_constructor = self
                    .universe
                    .method(target)
                    .map(|method| method.is_constructor())
                    .unwrap_or(false);
                if !is_constructor {
                    return Err(unresolvable(format!(
                        "target {} is not a constructor",
                        target_constructor
                    )));
                }
                let instantiated = layer.type_handle(instantiated_type).ok_or_else(|| {
                    unresolvable(format!("missing instantiated type {}", instantiated_type))
                })?;
                MethodImpl::Factory {
                    target_constructor: target,
                    instantiated_type: instantiated,
                    throw_allocated_object,
                }
            }
            MethodProvenance::CEntryPointStub {
                original_method,
                not_published,
            } => {
                let Some(original) = sibling(original_method)? else {
                    return Ok(None);
                };
                stub_original = Some(original);
                MethodImpl::CEntryPointStub { not_published }
            }
            MethodProvenance::ReflectionExpandSignature(member) => {
                let member = self
                    .universe
                    .find_reflective(&member)
                    .ok_or_else(|| unresolvable(format!("wrapped member {}", member)))?;
                MethodImpl::ReflectionExpandSignature { member }
            }
            MethodProvenance::JniCallVariantWrapper(member) => {
                let member = self
                    .universe
                    .find_reflective(&member)
                    .ok_or_else(|| unresolvable(format!("wrapped member {}", member)))?;
                MethodImpl::JniCallVariantWrapper { member }
            }
        };

        let existing = self
            .universe
            .find_method(owner, &record.name, &record.parameter_types);
        if let Some(handle) = existing {
            let method = self
                .universe
                .method(handle)
                .ok_or(UniverseError::UnknownMethod(handle))?;
            if method.implementation != implementation {
                return Err(conflict(format!(
                    "{} exists with a different implementation",
                    record.name
                )));
            }
            let bound = self.registry.stub_original(handle);
            if let (Some(bound), Some(original)) = (bound, stub_original) {
                if bound != original {
                    return Err(conflict(format!(
                        "stub {} already calls another method",
                        record.name
                    )));
                }
            }
        }

        Ok(Some(MethodPlan {
            owner,
            name: record.name.clone(),
            parameter_types: record.parameter_types.clone(),
            implementation,
            stub_original,
            existing,
        }))
    }

    fn commit_method(&mut self, plan: MethodPlan) -> Result<MethodHandle, RelinkError> {
        let handle = match plan.existing {
            Some(handle) => handle,
            None => self.universe.add_method(
                plan.owner,
                plan.name,
                plan.parameter_types,
                plan.implementation,
            )?,
        };
        if let Some(original) = plan.stub_original {
            self.registry.register_stub(handle, original);
        }
        Ok(handle)
    }
}

fn join_ids(ids: &[MethodId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

//! Layer writer
//!
//! Persists types and methods into a [`LayerSnapshot`], attaching provenance
//! to every record and pulling in the siblings that provenance refers to.
//!
//! Each `persist_*` call drains the sibling worklist and commits the records
//! it produced only if all of them were built. Any failure aborts the writer:
//! a layer with a missing or partial record must never be finished.

use crate::config::LayerOptions;
use crate::encode::ProvenanceEncoder;
use crate::error::{ProvenanceError, UniverseError};
use crate::materialize::{Pending, SiblingMaterializer};
use crate::registry::SyntheticRegistry;
use crate::universe::{AnalysisUniverse, MethodHandle, TypeHandle};
use parking_lot::Mutex;
use sediment_snapshot::{LayerSnapshot, MethodId, MethodRecord, TypeId, TypeRecord};
use tracing::{info, trace, warn};

/// Writes one layer snapshot
pub struct LayerWriter<'u, R: ?Sized> {
    universe: &'u AnalysisUniverse,
    registry: &'u R,
    materializer: SiblingMaterializer,
    snapshot: LayerSnapshot,
    aborted: Option<String>,
}

impl<'u, R: SyntheticRegistry + ?Sized> LayerWriter<'u, R> {
    /// Create a writer for the layer named in `options`
    pub fn new(universe: &'u AnalysisUniverse, registry: &'u R, options: &LayerOptions) -> Self {
        Self {
            universe,
            registry,
            materializer: SiblingMaterializer::new(),
            snapshot: LayerSnapshot::new(options.layer_name.clone()),
            aborted: None,
        }
    }

    /// Persist a type, returning its stable id
    pub fn persist_type(&mut self, handle: TypeHandle) -> Result<TypeId, ProvenanceError> {
        self.check_open()?;
        self.universe.ty(handle).ok_or(UniverseError::UnknownType(handle))?;
        let id = self.materializer.require_type(handle);
        self.drain()?;
        Ok(id)
    }

    /// Persist a method with its owner and siblings, returning its stable id
    pub fn persist_method(&mut self, handle: MethodHandle) -> Result<MethodId, ProvenanceError> {
        self.check_open()?;
        self.universe
            .method(handle)
            .ok_or(UniverseError::UnknownMethod(handle))?;
        let id = self.materializer.require_method(handle);
        self.drain()?;
        Ok(id)
    }

    /// Whether a type already has a record in this layer
    pub fn is_type_persisted(&self, handle: TypeHandle) -> bool {
        self.materializer.type_id(handle).is_some()
    }

    /// Whether a method already has a record in this layer
    pub fn is_method_persisted(&self, handle: MethodHandle) -> bool {
        self.materializer.method_id(handle).is_some()
    }

    /// Id of a persisted type
    pub fn type_id(&self, handle: TypeHandle) -> Option<TypeId> {
        self.materializer.type_id(handle)
    }

    /// Id of a persisted method
    pub fn method_id(&self, handle: MethodHandle) -> Option<MethodId> {
        self.materializer.method_id(handle)
    }

    /// Whether an earlier failure aborted this writer
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Finish the layer
    pub fn finish(self) -> Result<LayerSnapshot, ProvenanceError> {
        if let Some(reason) = self.aborted {
            return Err(ProvenanceError::Aborted(reason));
        }
        info!(
            layer = self.snapshot.name(),
            types = self.snapshot.types().len(),
            methods = self.snapshot.methods().len(),
            "layer snapshot finished"
        );
        Ok(self.snapshot)
    }

    fn check_open(&self) -> Result<(), ProvenanceError> {
        match &self.aborted {
            Some(reason) => Err(ProvenanceError::Aborted(reason.clone())),
            None => Ok(()),
        }
    }

    fn drain(&mut self) -> Result<(), ProvenanceError> {
        match self.build_pending() {
            Ok((types, methods)) => {
                for record in types {
                    self.snapshot.push_type(record).map_err(|e| self.abort(e.into()))?;
                }
                for record in methods {
                    self.snapshot.push_method(record).map_err(|e| self.abort(e.into()))?;
                }
                Ok(())
            }
            Err(err) => Err(self.abort(err)),
        }
    }

    fn build_pending(&mut self) -> Result<(Vec<TypeRecord>, Vec<MethodRecord>), ProvenanceError> {
        let mut types = Vec::new();
        let mut methods = Vec::new();
        while let Some(pending) = self.materializer.next_pending() {
            match pending {
                Pending::Type(handle) => types.push(self.build_type_record(handle)?),
                Pending::Method(handle) => methods.push(self.build_method_record(handle)?),
            }
        }
        Ok((types, methods))
    }

    fn build_type_record(&mut self, handle: TypeHandle) -> Result<TypeRecord, ProvenanceError> {
        let universe = self.universe;
        let ty = universe.ty(handle).ok_or(UniverseError::UnknownType(handle))?;
        let id = self.materializer.require_type(handle);
        let encoder = ProvenanceEncoder::new(universe, self.registry);
        let provenance = encoder.type_provenance(ty)?;

        let record = TypeRecord {
            id,
            name: ty.name.clone(),
            tag: provenance.tag(),
            fields: provenance.to_fields()?,
        };
        record.validate()?;
        trace!(%id, name = %record.name, tag = %record.tag, "persisted type");
        Ok(record)
    }

    fn build_method_record(
        &mut self,
        handle: MethodHandle,
    ) -> Result<MethodRecord, ProvenanceError> {
        let universe = self.universe;
        let method = universe
            .method(handle)
            .ok_or(UniverseError::UnknownMethod(handle))?;
        let id = self.materializer.require_method(handle);
        let owner = self.materializer.require_type(method.declaring_type);
        let encoder = ProvenanceEncoder::new(universe, self.registry);
        let provenance = encoder.method_provenance(method, &mut self.materializer)?;

        let record = MethodRecord {
            id,
            owner,
            name: method.name.clone(),
            parameter_types: method.parameter_types.clone(),
            tag: provenance.tag(),
            fields: provenance.to_fields()?,
        };
        record.validate()?;
        trace!(%id, %owner, name = %record.name, tag = %record.tag, "persisted method");
        Ok(record)
    }

    fn abort(&mut self, err: ProvenanceError) -> ProvenanceError {
        warn!(layer = self.snapshot.name(), error = %err, "layer write aborted");
        if self.aborted.is_none() {
            self.aborted = Some(err.to_string());
        }
        err
    }
}

/// [`LayerWriter`] shared between analysis threads
///
/// Every request runs under one lock, so the existing-record check and the
/// record it guards are never interleaved with another thread's request.
pub struct SharedLayerWriter<'u, R: ?Sized> {
    inner: Mutex<LayerWriter<'u, R>>,
}

impl<'u, R: SyntheticRegistry + Sync + ?Sized> SharedLayerWriter<'u, R> {
    /// Wrap a writer
    pub fn new(writer: LayerWriter<'u, R>) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    /// Persist a type
    pub fn persist_type(&self, handle: TypeHandle) -> Result<TypeId, ProvenanceError> {
        self.inner.lock().persist_type(handle)
    }

    /// Persist a method
    pub fn persist_method(&self, handle: MethodHandle) -> Result<MethodId, ProvenanceError> {
        self.inner.lock().persist_method(handle)
    }

    /// Whether a type already has a record
    pub fn is_type_persisted(&self, handle: TypeHandle) -> bool {
        self.inner.lock().is_type_persisted(handle)
    }

    /// Whether a method already has a record
    pub fn is_method_persisted(&self, handle: MethodHandle) -> bool {
        self.inner.lock().is_method_persisted(handle)
    }

    /// Finish the layer
    pub fn finish(self) -> Result<LayerSnapshot, ProvenanceError> {
        self.inner.into_inner().finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SyntheticTables;
    use crate::universe::MethodImpl;
    use sediment_snapshot::{FieldTag, MethodTag, TypeTag};

    fn options() -> LayerOptions {
        LayerOptions {
            layer_name: "ext-1".to_string(),
            ..LayerOptions::default()
        }
    }

    #[test]
    fn test_persist_method_pulls_owner() {
        let mut universe = AnalysisUniverse::new();
        let foo = universe.add_type("Foo");
        let run = universe
            .add_method(foo, "run", vec![], MethodImpl::Declared)
            .unwrap();
        let registry = SyntheticTables::new();

        let mut writer = LayerWriter::new(&universe, &registry, &options());
        let id = writer.persist_method(run).unwrap();
        assert!(writer.is_type_persisted(foo));

        let snapshot = writer.finish().unwrap();
        let record = snapshot.method_record(id).unwrap();
        assert_eq!(record.tag, MethodTag::None);
        assert!(record.fields.is_empty());
        assert_eq!(snapshot.type_record(record.owner).unwrap().name, "Foo");
    }

    #[test]
    fn test_factory_sibling_is_not_duplicated() {
        let mut universe = AnalysisUniverse::new();
        let foo = universe.add_type("Foo");
        let ctor = universe.add_constructor(foo, vec!["int".into()]).unwrap();
        let factory = universe
            .add_method(
                foo,
                "factory",
                vec!["int".into()],
                MethodImpl::Factory {
                    target_constructor: ctor,
                    instantiated_type: foo,
                    throw_allocated_object: true,
                },
            )
            .unwrap();
        let registry = SyntheticTables::new();

        let mut writer = LayerWriter::new(&universe, &registry, &options());
        let ctor_id = writer.persist_method(ctor).unwrap();
        let factory_id = writer.persist_method(factory).unwrap();
        // Persisting again hands back the same ids
        assert_eq!(writer.persist_method(ctor).unwrap(), ctor_id);
        assert_eq!(writer.persist_method(factory).unwrap(), factory_id);

        let snapshot = writer.finish().unwrap();
        assert_eq!(snapshot.methods().len(), 2);
        assert_eq!(snapshot.types().len(), 1);

        let record = snapshot.method_record(factory_id).unwrap();
        assert_eq!(record.tag, MethodTag::Factory);
        assert_eq!(
            record.fields.get_id(FieldTag::TargetConstructor),
            Some(ctor_id.as_u32())
        );
        assert_eq!(record.fields.get_bool(FieldTag::ThrowAllocatedObject), Some(true));
    }

    #[test]
    fn test_mutual_stubs_terminate() {
        let mut universe = AnalysisUniverse::new();
        let entry = universe.add_type("Entry");
        let a = universe
            .add_method(entry, "a", vec![], MethodImpl::CEntryPointStub { not_published: false })
            .unwrap();
        let b = universe
            .add_method(entry, "b", vec![], MethodImpl::CEntryPointStub { not_published: true })
            .unwrap();
        let mut registry = SyntheticTables::new();
        registry.register_stub(a, b);
        registry.register_stub(b, a);

        let mut writer = LayerWriter::new(&universe, &registry, &options());
        let a_id = writer.persist_method(a).unwrap();
        let b_id = writer.method_id(b).unwrap();

        let snapshot = writer.finish().unwrap();
        assert_eq!(snapshot.methods().len(), 2);
        assert_eq!(
            snapshot
                .method_record(a_id)
                .unwrap()
                .fields
                .get_id(FieldTag::OriginalMethodId),
            Some(b_id.as_u32())
        );
        assert!(snapshot.check_references().is_ok());
    }

    #[test]
    fn test_failure_aborts_writer() {
        let mut universe = AnalysisUniverse::new();
        let foo = universe.add_type("Foo");
        let accessor =
            universe.add_type("jdk.internal.reflect.GeneratedSerializationConstructorAccessor1");
        let registry = SyntheticTables::new();

        let mut writer = LayerWriter::new(&universe, &registry, &options());
        writer.persist_type(foo).unwrap();
        assert!(matches!(
            writer.persist_type(accessor),
            Err(ProvenanceError::Malformed { .. })
        ));
        assert!(writer.is_aborted());
        assert!(matches!(
            writer.persist_type(foo),
            Err(ProvenanceError::Aborted(_))
        ));
        assert!(matches!(writer.finish(), Err(ProvenanceError::Aborted(_))));
    }

    #[test]
    fn test_failed_batch_is_not_committed() {
        let mut universe = AnalysisUniverse::new();
        let entry = universe.add_type("Entry");
        let stub = universe
            .add_method(entry, "stub", vec![], MethodImpl::CEntryPointStub { not_published: false })
            .unwrap();
        let registry = SyntheticTables::new();

        let mut writer = LayerWriter::new(&universe, &registry, &options());
        assert!(writer.persist_method(stub).is_err());
        assert!(writer.is_aborted());
        assert!(matches!(writer.finish(), Err(ProvenanceError::Aborted(_))));
    }

    #[test]
    fn test_lambda_type_record() {
        let mut universe = AnalysisUniverse::new();
        let lambda = universe.add_type("com.example.Widget$$Lambda/0x1");
        let registry = SyntheticTables::new();

        let mut writer = LayerWriter::new(&universe, &registry, &options());
        let id = writer.persist_type(lambda).unwrap();
        let snapshot = writer.finish().unwrap();

        let record = snapshot.type_record(id).unwrap();
        assert_eq!(record.tag, TypeTag::Lambda);
        assert_eq!(
            record.fields.get_str(FieldTag::CapturingClass),
            Some("com.example.Widget")
        );
    }

    #[test]
    fn test_shared_writer_across_threads() {
        let mut universe = AnalysisUniverse::new();
        let foo = universe.add_type("Foo");
        let ctor = universe.add_constructor(foo, vec![]).unwrap();
        let mut factories = Vec::new();
        for i in 0..8 {
            let factory = universe
                .add_method(
                    foo,
                    format!("factory{}", i),
                    vec![],
                    MethodImpl::Factory {
                        target_constructor: ctor,
                        instantiated_type: foo,
                        throw_allocated_object: false,
                    },
                )
                .unwrap();
            factories.push(factory);
        }
        let registry = SyntheticTables::new();
        let writer = SharedLayerWriter::new(LayerWriter::new(&universe, &registry, &options()));

        std::thread::scope(|scope| {
            for chunk in factories.chunks(2) {
                let writer = &writer;
                scope.spawn(move || {
                    for &factory in chunk {
                        writer.persist_method(factory).unwrap();
                    }
                });
            }
        });

        assert!(writer.is_method_persisted(ctor));
        let snapshot = writer.finish().unwrap();
        // One shared constructor, eight factories, one owner type
        assert_eq!(snapshot.methods().len(), 9);
        assert_eq!(snapshot.types().len(), 1);
        let constructors = snapshot
            .methods()
            .iter()
            .filter(|m| m.name == sediment_snapshot::CONSTRUCTOR_NAME)
            .count();
        assert_eq!(constructors, 1);
    }
}

//! Sibling materializer
//!
//! Owns the existing-record tables of the layer being written. Requesting an
//! entity returns its stable id at once; entities seen for the first time are
//! queued so their records get written later. Ids are reserved before any
//! record is built, which keeps cyclic sibling chains finite.

use crate::universe::{MethodHandle, TypeHandle};
use sediment_snapshot::{MethodId, RecordTable, TypeId};
use std::collections::VecDeque;
use tracing::debug;

/// Entity whose id is reserved but whose record is not yet written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    /// A type
    Type(TypeHandle),
    /// A method
    Method(MethodHandle),
}

/// Existing-record tables plus the worklist of unwritten records
#[derive(Debug, Default)]
pub struct SiblingMaterializer {
    types: RecordTable<TypeHandle, TypeId>,
    methods: RecordTable<MethodHandle, MethodId>,
    pending: VecDeque<Pending>,
}

impl SiblingMaterializer {
    /// Create an empty materializer
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of a type, queuing its record if it has none yet
    pub fn require_type(&mut self, handle: TypeHandle) -> TypeId {
        let (id, fresh) = self.types.reserve(handle);
        if fresh {
            debug!(%handle, %id, "materializing type");
            self.pending.push_back(Pending::Type(handle));
        }
        id
    }

    /// Id of a method, queuing its record if it has none yet
    pub fn require_method(&mut self, handle: MethodHandle) -> MethodId {
        let (id, fresh) = self.methods.reserve(handle);
        if fresh {
            debug!(%handle, %id, "materializing method");
            self.pending.push_back(Pending::Method(handle));
        }
        id
    }

    /// Id already assigned to a type
    pub fn type_id(&self, handle: TypeHandle) -> Option<TypeId> {
        self.types.lookup(&handle)
    }

    /// Id already assigned to a method
    pub fn method_id(&self, handle: MethodHandle) -> Option<MethodId> {
        self.methods.lookup(&handle)
    }

    /// Next entity whose record must be written
    pub fn next_pending(&mut self) -> Option<Pending> {
        self.pending.pop_front()
    }

    /// Whether records remain to be written
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of type ids assigned
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of method ids assigned
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::{AnalysisUniverse, MethodImpl};

    #[test]
    fn test_require_is_idempotent() {
        let mut universe = AnalysisUniverse::new();
        let foo = universe.add_type("Foo");
        let ctor = universe.add_constructor(foo, vec![]).unwrap();

        let mut materializer = SiblingMaterializer::new();
        let first = materializer.require_method(ctor);
        let second = materializer.require_method(ctor);
        assert_eq!(first, second);
        assert_eq!(materializer.method_count(), 1);

        assert_eq!(materializer.next_pending(), Some(Pending::Method(ctor)));
        assert_eq!(materializer.next_pending(), None);
    }

    #[test]
    fn test_worklist_is_fifo() {
        let mut universe = AnalysisUniverse::new();
        let foo = universe.add_type("Foo");
        let bar = universe.add_type("Bar");
        let run = universe
            .add_method(foo, "run", vec![], MethodImpl::Declared)
            .unwrap();

        let mut materializer = SiblingMaterializer::new();
        materializer.require_type(foo);
        materializer.require_method(run);
        materializer.require_type(bar);
        materializer.require_type(foo);

        let order: Vec<_> = std::iter::from_fn(|| materializer.next_pending()).collect();
        assert_eq!(
            order,
            vec![Pending::Type(foo), Pending::Method(run), Pending::Type(bar)]
        );
        assert_eq!(materializer.type_id(bar), Some(TypeId::new(1)));
        assert!(!materializer.has_pending());
    }
}

//! Synthetic registries
//!
//! Generated serialization accessors and C entry point stubs are created on
//! demand by compiler support code, which keeps the facts needed to describe
//! them. Both the writer and the relinker receive that state explicitly
//! through [`SyntheticRegistry`].

use crate::classify::GENERATED_SERIALIZATION_PREFIX;
use crate::universe::{AnalysisUniverse, MethodHandle, SerializationKey, TypeHandle};
use rustc_hash::FxHashMap;

/// Lookup and registration of generated synthetic entities
pub trait SyntheticRegistry {
    /// Key a serialization accessor type was generated for
    fn serialization_key(&self, accessor: TypeHandle) -> Option<&SerializationKey>;

    /// Accessor type already bound to a key
    fn serialization_accessor(&self, key: &SerializationKey) -> Option<TypeHandle>;

    /// Bind an accessor type to its key
    fn register_serialization_accessor(&mut self, accessor: TypeHandle, key: SerializationKey);

    /// Original method a C entry point stub calls
    fn stub_original(&self, stub: MethodHandle) -> Option<MethodHandle>;

    /// Record the original method of a C entry point stub
    fn register_stub(&mut self, stub: MethodHandle, original: MethodHandle);
}

/// In-memory [`SyntheticRegistry`]
#[derive(Debug, Default)]
pub struct SyntheticTables {
    accessor_keys: FxHashMap<TypeHandle, SerializationKey>,
    accessors: FxHashMap<SerializationKey, TypeHandle>,
    stub_originals: FxHashMap<MethodHandle, MethodHandle>,
}

impl SyntheticTables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered serialization accessors
    pub fn accessor_count(&self) -> usize {
        self.accessors.len()
    }

    /// Number of registered C entry point stubs
    pub fn stub_count(&self) -> usize {
        self.stub_originals.len()
    }
}

impl SyntheticRegistry for SyntheticTables {
    fn serialization_key(&self, accessor: TypeHandle) -> Option<&SerializationKey> {
        self.accessor_keys.get(&accessor)
    }

    fn serialization_accessor(&self, key: &SerializationKey) -> Option<TypeHandle> {
        self.accessors.get(key).copied()
    }

    fn register_serialization_accessor(&mut self, accessor: TypeHandle, key: SerializationKey) {
        self.accessors.insert(key.clone(), accessor);
        self.accessor_keys.insert(accessor, key);
    }

    fn stub_original(&self, stub: MethodHandle) -> Option<MethodHandle> {
        self.stub_originals.get(&stub).copied()
    }

    fn register_stub(&mut self, stub: MethodHandle, original: MethodHandle) {
        self.stub_originals.insert(stub, original);
    }
}

/// First accessor class name not yet used in the universe
///
/// Names follow the platform's `GeneratedSerializationConstructorAccessor<N>`
/// pattern with `N` counting from 1.
pub fn fresh_accessor_name(universe: &AnalysisUniverse) -> String {
    let mut n = 1u32;
    loop {
        let name = format!("{}{}", GENERATED_SERIALIZATION_PREFIX, n);
        if universe.find_type(&name).is_none() {
            return name;
        }
        n += 1;
    }
}

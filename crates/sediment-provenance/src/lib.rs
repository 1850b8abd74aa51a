//! Sediment provenance
//!
//! Encodes *how* each synthetic type and method of a layered ahead-of-time
//! build came to exist, so that a later layer built in another process can
//! find or rebuild the same entity:
//! - **Classifier**: maps a resolved entity to its synthetic kind tag
//! - **Encoder**: extracts the cross-process facts each kind needs
//! - **Materializer**: persists referenced siblings exactly once
//! - **Writer**: produces a [`sediment_snapshot::LayerSnapshot`]
//! - **Relinker**: binds a loaded snapshot back to a universe
//! - **Stub allocator**: reserves vtable trampolines for runtime class loading
//!
//! # Example
//!
//! ```ignore
//! let mut writer = LayerWriter::new(&universe, &registry, &options);
//! writer.persist_method(factory)?;
//! let snapshot = writer.finish()?;
//!
//! let layer = LayerRelinker::new(&mut next_universe, &mut next_registry).relink(&snapshot)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod classify;
pub mod config;
pub mod encode;
pub mod error;
pub mod materialize;
pub mod provenance;
pub mod registry;
pub mod relink;
pub mod stubs;
pub mod universe;
pub mod writer;

pub use classify::{classify_method, classify_type};
pub use config::{ConfigError, LayerOptions};
pub use encode::ProvenanceEncoder;
pub use error::{ProvenanceError, RelinkError, StubError, UniverseError};
pub use materialize::SiblingMaterializer;
pub use provenance::{MethodProvenance, TypeProvenance};
pub use registry::{SyntheticRegistry, SyntheticTables};
pub use relink::{LayerRelinker, RelinkedLayer};
pub use stubs::{RuntimeStubAllocator, VtableEnterStub, VtableStubSection};
pub use universe::{
    AnalysisMethod, AnalysisType, AnalysisUniverse, MemberName, MethodHandle, MethodImpl,
    SerializationKey, TypeHandle, WrappedMember,
};
pub use writer::{LayerWriter, SharedLayerWriter};

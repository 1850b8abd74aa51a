//! Runtime stub allocator
//!
//! When classes unknown at build time may be loaded at run time, virtual call
//! sites compiled against the static hierarchy dispatch through a block of
//! vtable-enter trampolines reserved ahead of time, one per slot.

use crate::config::{LayerOptions, MAX_VTABLE_INDEX_LIMIT};
use crate::error::StubError;
use once_cell::sync::OnceCell;
use tracing::info;

/// Size in bytes of one vtable-enter stub
pub const VTABLE_STUB_SIZE: u32 = 16;

/// Trampoline for one vtable slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtableEnterStub {
    /// Vtable slot dispatched through
    pub slot: u32,
    /// Offset of the stub within the section
    pub offset: u32,
    /// Stable symbol name
    pub symbol: String,
}

/// Contiguous block of vtable-enter stubs for slots `0..slot_count`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtableStubSection {
    stubs: Vec<VtableEnterStub>,
}

impl VtableStubSection {
    /// Lay out stubs for every slot below `max_vtable_index`
    pub fn create(max_vtable_index: u32) -> Result<Self, StubError> {
        if max_vtable_index == 0 || max_vtable_index > MAX_VTABLE_INDEX_LIMIT {
            return Err(StubError::InvalidSlotCount(max_vtable_index));
        }
        let stubs = (0..max_vtable_index)
            .map(|slot| VtableEnterStub {
                slot,
                offset: slot * VTABLE_STUB_SIZE,
                symbol: format!("__vtable_enter_stub_{}", slot),
            })
            .collect();
        Ok(Self { stubs })
    }

    /// Stub for a slot
    pub fn stub(&self, slot: u32) -> Option<&VtableEnterStub> {
        self.stubs.get(slot as usize)
    }

    /// Every stub in slot order
    pub fn stubs(&self) -> &[VtableEnterStub] {
        &self.stubs
    }

    /// Number of slots covered
    pub fn slot_count(&self) -> u32 {
        self.stubs.len() as u32
    }

    /// Total size in bytes
    pub fn size(&self) -> u32 {
        self.slot_count() * VTABLE_STUB_SIZE
    }
}

/// One-shot allocator of the runtime stub section
#[derive(Debug, Default)]
pub struct RuntimeStubAllocator {
    section: OnceCell<VtableStubSection>,
}

impl RuntimeStubAllocator {
    /// Create an allocator with nothing reserved
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the stub section
    ///
    /// Returns `Ok(None)` without reserving anything when runtime class
    /// loading is disabled. Allocation happens at most once.
    pub fn allocate(
        &self,
        options: &LayerOptions,
    ) -> Result<Option<&VtableStubSection>, StubError> {
        if !options.runtime_class_loading {
            return Ok(None);
        }
        if self.section.get().is_some() {
            return Err(StubError::AlreadyAllocated);
        }

        let section = VtableStubSection::create(options.max_vtable_index)?;
        if self.section.set(section).is_err() {
            return Err(StubError::AlreadyAllocated);
        }
        let section = self.section.get().ok_or(StubError::AlreadyAllocated)?;
        info!(
            slots = section.slot_count(),
            bytes = section.size(),
            "allocated runtime vtable stub section"
        );
        Ok(Some(section))
    }

    /// The reserved section, if any
    pub fn section(&self) -> Option<&VtableStubSection> {
        self.section.get()
    }
}

//! The attached runtime: one explicit context object
//!
//! Holds the address space and every catalog built from it. Catalogs are
//! read once at attach time and never change; [`Runtime::reset`] only drops
//! cached memory.

use super::constants::ConstantCatalog;
use super::fields::FieldTable;
use super::flags::VmFlags;
use super::layout::{CollectedHeap, Universe, CORE};
use super::structs::{Scope, StructOverlay};
use super::types::TypeCatalog;
use crate::config::PageCacheConfig;
use crate::domain::{InspectError, ReadError};
use crate::heap::object_model::ObjectModel;
use crate::heap::shape::{self, HeapShape};
use crate::inferior::Inferior;
use crate::memory::AddressSpace;
use log::info;

pub struct Runtime {
    space: AddressSpace,
    types: TypeCatalog,
    constants: ConstantCatalog,
    fields: FieldTable,
    overlay: StructOverlay,
    flags: VmFlags,
    shape: HeapShape,
    model: ObjectModel,
}

impl Runtime {
    /// Read the runtime's self-description out of `inferior` and validate
    /// every declared struct contract against it.
    ///
    /// # Errors
    /// Any fatal initialisation error: missing symbols, types, constants or
    /// fields, contradicted contracts, or an unsupported heap
    pub fn attach(inferior: Box<dyn Inferior>, config: &PageCacheConfig) -> Result<Self, InspectError> {
        let space = AddressSpace::new(inferior, config);
        let types = TypeCatalog::read(&space)?;
        let constants = ConstantCatalog::read(&space)?;
        let fields = FieldTable::read(&space)?;

        let mut overlay = StructOverlay::new();
        overlay.bind(CORE, &space, &types, &fields)?;
        let flags = VmFlags::read(Scope::new(&space, &types, &overlay), &types)?;
        let shape = shape::resolve(&mut overlay, &space, &types, &fields)?;
        let free_list = matches!(shape, HeapShape::Generational { free_list: true });
        let model = ObjectModel::new(Scope::new(&space, &types, &overlay), &constants, &flags, free_list)?;

        info!("Attached: {}-bit runtime, {shape} heap", space.pointer_size() * 8);
        Ok(Self { space, types, constants, fields, overlay, flags, shape, model })
    }

    #[must_use]
    pub fn scope(&self) -> Scope<'_> {
        Scope::new(&self.space, &self.types, &self.overlay)
    }

    #[must_use]
    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    #[must_use]
    pub fn types(&self) -> &TypeCatalog {
        &self.types
    }

    #[must_use]
    pub fn constants(&self) -> &ConstantCatalog {
        &self.constants
    }

    #[must_use]
    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    #[must_use]
    pub fn overlay(&self) -> &StructOverlay {
        &self.overlay
    }

    #[must_use]
    pub fn flags(&self) -> &VmFlags {
        &self.flags
    }

    #[must_use]
    pub fn shape(&self) -> HeapShape {
        self.shape
    }

    #[must_use]
    pub fn object_model(&self) -> &ObjectModel {
        &self.model
    }

    /// Collections the heap has completed so far, read past the page cache.
    ///
    /// # Errors
    /// Unreadable heap object
    pub fn total_collections(&self) -> Result<u64, ReadError> {
        let heap = self.scope().static_view::<Universe>().collected_heap()?;
        self.space.invalidate(heap.field_address(CollectedHeap::total_collections)?);
        heap.total_collections()
    }

    /// Drop cached pages before a new run.
    ///
    /// # Errors
    /// Propagates the inferior's reset failure
    pub fn reset(&mut self) -> Result<(), InspectError> {
        self.space.reset()
    }

    pub fn detach(&mut self) {
        self.space.detach();
    }
}

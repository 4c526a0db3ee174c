//! Heap shape identification
//!
//! The collected heap is a dynamic type; its vtable tells which collector
//! owns the heap and therefore how its spaces are laid out.

use crate::domain::{InspectError, ReadError};
use crate::memory::AddressSpace;
use crate::vm::fields::FieldTable;
use crate::vm::layout::{
    GenCollectedHeap, Generation, Universe, FREE_LIST, GENERATIONAL, PARALLEL, REGIONIZED,
};
use crate::vm::structs::{Scope, StructOverlay};
use crate::vm::types::TypeCatalog;
use log::info;
use serde::Serialize;
use std::fmt;

/// More generations than any collector has ever used.
pub(crate) const MAX_GENERATIONS: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeapShape {
    /// Copying young generation plus a contiguous or free-list old generation.
    Generational { free_list: bool },
    /// Fixed young/old pair of bump-pointer spaces.
    ParallelScavenge,
    /// Indexed table of equally sized regions.
    Regionized,
}

impl fmt::Display for HeapShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapShape::Generational { free_list: false } => write!(f, "generational"),
            HeapShape::Generational { free_list: true } => write!(f, "generational (free-list old)"),
            HeapShape::ParallelScavenge => write!(f, "parallel scavenge"),
            HeapShape::Regionized => write!(f, "regionized"),
        }
    }
}

/// Identify the heap shape and bind the struct kinds its walk needs.
///
/// # Errors
/// [`InspectError::UnsupportedHeap`] for any other collector, or a binding failure
pub fn resolve(
    overlay: &mut StructOverlay,
    space: &AddressSpace,
    types: &TypeCatalog,
    fields: &FieldTable,
) -> Result<HeapShape, InspectError> {
    let heap_type = {
        let scope = Scope::new(space, types, overlay);
        let heap = scope.static_view::<Universe>().collected_heap()?;
        let id = heap.dynamic_type().ok_or_else(|| {
            InspectError::UnsupportedHeap(format!("unrecognized heap object at 0x{:x}", heap.address()))
        })?;
        types.info(id).name.clone()
    };

    let shape = if types.is_subclass_of_name(&heap_type, "G1CollectedHeap") {
        overlay.bind(REGIONIZED, space, types, fields)?;
        HeapShape::Regionized
    } else if types.is_subclass_of_name(&heap_type, "ParallelScavengeHeap") {
        overlay.bind(PARALLEL, space, types, fields)?;
        HeapShape::ParallelScavenge
    } else if types.is_subclass_of_name(&heap_type, "GenCollectedHeap") {
        overlay.bind(GENERATIONAL, space, types, fields)?;
        let free_list = has_free_list_generation(Scope::new(space, types, overlay))?;
        if free_list {
            overlay.bind(FREE_LIST, space, types, fields)?;
        }
        HeapShape::Generational { free_list }
    } else {
        return Err(InspectError::UnsupportedHeap(heap_type));
    };
    info!("Heap shape: {shape} ({heap_type})");
    Ok(shape)
}

fn has_free_list_generation(scope: Scope<'_>) -> Result<bool, InspectError> {
    let heap = scope.static_view::<Universe>().collected_heap()?.cast::<GenCollectedHeap>();
    let count = heap.n_gens()?;
    if !(0..=MAX_GENERATIONS).contains(&count) {
        return Err(ReadError::Implausible { address: heap.address(), reason: "generation count" }.into());
    }
    let space = scope.space();
    let slots = heap.gens()?;
    let stride = space.pointer_size() as u64;
    for index in 0..u64::from(count.unsigned_abs()) {
        let generation = scope.view::<Generation>(space.read_pointer(slots + index * stride)?);
        if generation.is_instance_of_name("ConcurrentMarkSweepGeneration") {
            return Ok(true);
        }
    }
    Ok(false)
}

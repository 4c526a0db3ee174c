//! Live region enumeration
//!
//! A live region is a byte range that holds only allocated objects. The
//! collector emits raw ranges per space, subtracts the unallocated tails of
//! thread-local allocation buffers, and normalizes the result into a sorted,
//! disjoint list.

use super::object_model::ObjectModel;
use super::shape::{HeapShape, MAX_GENERATIONS};
use crate::domain::{Address, AddressRange, InspectError, ReadError};
use crate::vm::layout::{
    CompactibleFreeListSpace, ConcurrentMarkSweepGeneration, ContiguousSpace, DefNewGeneration,
    G1CollectedHeap, GenCollectedHeap, Generation, HeapRegion, MutableSpace,
    OneContigSpaceCardGeneration, ParallelScavengeHeap, Threads, Universe,
};
use crate::vm::{Runtime, Scope, View};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;

/// Upper bound on threads and regions walked, against looping on torn lists.
const MAX_THREADS: usize = 1 << 20;
const MAX_REGIONS: u64 = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceKind {
    Eden,
    Survivor,
    Old,
    FreeListOld,
    Region,
}

impl fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpaceKind::Eden => "eden",
            SpaceKind::Survivor => "survivor",
            SpaceKind::Old => "old",
            SpaceKind::FreeListOld => "free-list old",
            SpaceKind::Region => "region",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveRegion {
    pub range: AddressRange,
    pub space: SpaceKind,
}

impl LiveRegion {
    #[must_use]
    pub fn new(start: Address, end: Address, space: SpaceKind) -> Self {
        Self { range: AddressRange::new(start, end), space }
    }
}

pub struct HeapRegionCollector<'a> {
    runtime: &'a Runtime,
    scope: Scope<'a>,
    model: &'a ObjectModel,
}

impl<'a> HeapRegionCollector<'a> {
    #[must_use]
    pub fn new(runtime: &'a Runtime) -> Self {
        Self { runtime, scope: runtime.scope(), model: runtime.object_model() }
    }

    /// Sorted, disjoint live regions of the current heap.
    ///
    /// # Errors
    /// Unreadable heap structures or an unsupported generation type
    pub fn collect(&self) -> Result<Vec<LiveRegion>, InspectError> {
        let raw = match self.runtime.shape() {
            HeapShape::Generational { .. } => self.generational()?,
            HeapShape::ParallelScavenge => self.parallel()?,
            HeapShape::Regionized => self.regionized()?,
        };
        let holes = if self.runtime.flags().use_tlab { self.tlab_holes() } else { Vec::new() };
        let live = normalize(raw, &holes);
        info!(
            "{} live regions, {} bytes, {} TLAB holes",
            live.len(),
            live.iter().map(|r| r.range.len()).sum::<u64>(),
            holes.len()
        );
        Ok(live)
    }

    fn generational(&self) -> Result<Vec<LiveRegion>, InspectError> {
        let heap = self.scope.static_view::<Universe>().collected_heap()?.cast::<GenCollectedHeap>();
        let count = heap.n_gens()?;
        if !(0..=MAX_GENERATIONS).contains(&count) {
            return Err(ReadError::Implausible { address: heap.address(), reason: "generation count" }.into());
        }
        let space = self.scope.space();
        let slots = heap.gens()?;
        let stride = space.pointer_size() as u64;

        let mut regions = Vec::new();
        for index in 0..u64::from(count.unsigned_abs()) {
            let generation = self.scope.view::<Generation>(space.read_pointer(slots + index * stride)?);
            if let Some(young) = generation.dynamic_cast::<DefNewGeneration>() {
                regions.push(contiguous(young.eden_space()?, SpaceKind::Eden)?);
                regions.push(contiguous(young.from_space()?, SpaceKind::Survivor)?);
            } else if let Some(old) = generation.dynamic_cast::<OneContigSpaceCardGeneration>() {
                regions.push(contiguous(old.the_space()?, SpaceKind::Old)?);
            } else if let Some(old) = generation.dynamic_cast::<ConcurrentMarkSweepGeneration>() {
                self.free_list_runs(old.cms_space()?, &mut regions)?;
            } else {
                let name = generation.dynamic_type_name().unwrap_or("<unknown>");
                return Err(InspectError::UnsupportedHeap(format!("generation type {name}")));
            }
        }
        Ok(regions)
    }

    /// Live runs of a free-list space: everything between free chunks.
    fn free_list_runs(
        &self,
        cms: View<'a, CompactibleFreeListSpace>,
        regions: &mut Vec<LiveRegion>,
    ) -> Result<(), InspectError> {
        let bottom = cms.bottom()?;
        let end = cms.end()?;
        let mut run_start = bottom;
        let mut cur = bottom;
        while cur < end {
            let chunk = match self.chunk_size(cur) {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("Free-list walk stopped at 0x{cur:x}: {e}");
                    break;
                }
            };
            let size = match chunk {
                Chunk::Free(size) | Chunk::Object(size) => size,
            };
            // a chunk must be non-empty and lie inside the space
            let next = match cur.checked_add(size) {
                Some(next) if size > 0 && next <= end => next,
                _ => {
                    warn!("Free-list walk stopped at 0x{cur:x}: chunk of {size} bytes does not fit");
                    break;
                }
            };
            if matches!(chunk, Chunk::Free(_)) {
                if cur > run_start {
                    regions.push(LiveRegion::new(run_start, cur, SpaceKind::FreeListOld));
                }
                run_start = next;
            }
            cur = next;
        }
        let run_end = end.min(cur);
        if run_start < run_end {
            regions.push(LiveRegion::new(run_start, run_end, SpaceKind::FreeListOld));
        }
        Ok(())
    }

    fn chunk_size(&self, chunk: Address) -> Result<Chunk, ReadError> {
        if let Some(size) = self.model.free_chunk_size(self.scope, chunk)? {
            return Ok(Chunk::Free(size));
        }
        let klass = self.model.read_klass(self.scope, chunk)?;
        if !self.model.is_klass(self.scope, klass) {
            return Err(ReadError::Implausible { address: chunk, reason: "neither free chunk nor object" });
        }
        let size = self.model.object_size(self.scope, chunk, klass)?;
        Ok(Chunk::Object(size))
    }

    fn parallel(&self) -> Result<Vec<LiveRegion>, InspectError> {
        let heap = self.scope.static_view::<ParallelScavengeHeap>();
        let young = heap.young_gen()?;
        let old = heap.old_gen()?;
        Ok(vec![
            mutable(young.eden_space()?, SpaceKind::Eden)?,
            mutable(young.from_space()?, SpaceKind::Survivor)?,
            mutable(old.object_space()?, SpaceKind::Old)?,
        ])
    }

    fn regionized(&self) -> Result<Vec<LiveRegion>, InspectError> {
        let heap = self.scope.static_view::<Universe>().collected_heap()?.cast::<G1CollectedHeap>();
        let table = heap.hrm()?.regions()?;
        let base = table.base()?;
        let length = table.length()?;
        if length > MAX_REGIONS {
            return Err(ReadError::Implausible { address: table.address(), reason: "region count" }.into());
        }
        let space = self.scope.space();
        let stride = space.pointer_size() as u64;
        let mut regions = Vec::new();
        for index in 0..length {
            let region = space.read_pointer(base + index * stride)?;
            if region == 0 {
                continue;
            }
            let region = self.scope.view::<HeapRegion>(region);
            regions.push(LiveRegion::new(region.bottom()?, region.top()?, SpaceKind::Region));
        }
        debug!("{} of {length} region slots in use", regions.len());
        Ok(regions)
    }

    /// Unallocated TLAB tails, `[top, end + reserve)` per thread.
    ///
    /// A torn thread list ends the walk early with what was gathered.
    #[must_use]
    pub fn tlab_holes(&self) -> Vec<AddressRange> {
        let reserve = self.model.tlab_reserve();
        let mut holes = Vec::new();
        let mut thread = match self.scope.static_view::<Threads>().thread_list() {
            Ok(thread) => thread,
            Err(e) => {
                warn!("Thread list unreadable: {e}");
                return holes;
            }
        };
        for _ in 0..MAX_THREADS {
            if thread.is_null() {
                break;
            }
            let hole = thread.tlab().and_then(|tlab| {
                let (start, top, end) = (tlab.start()?, tlab.top()?, tlab.end()?);
                Ok((start, top, end))
            });
            match hole {
                Ok((0, _, _)) => {}
                Ok((start, top, end)) if start <= top && top <= end => {
                    holes.push(AddressRange::new(top, end + reserve));
                }
                Ok((start, top, end)) => {
                    warn!("Inconsistent TLAB at 0x{:x}: start 0x{start:x} top 0x{top:x} end 0x{end:x}", thread.address());
                }
                Err(e) => {
                    warn!("Thread walk stopped at 0x{:x}: {e}", thread.address());
                    break;
                }
            }
            thread = match thread.next() {
                Ok(next) => next,
                Err(e) => {
                    warn!("Thread walk stopped at 0x{:x}: {e}", thread.address());
                    break;
                }
            };
        }
        holes
    }
}

enum Chunk {
    Free(u64),
    Object(u64),
}

fn contiguous(space: View<'_, ContiguousSpace>, kind: SpaceKind) -> Result<LiveRegion, ReadError> {
    Ok(LiveRegion::new(space.bottom()?, space.top()?, kind))
}

fn mutable(space: View<'_, MutableSpace>, kind: SpaceKind) -> Result<LiveRegion, ReadError> {
    Ok(LiveRegion::new(space.bottom()?, space.top()?, kind))
}

/// Sort, drop empty ranges, merge overlapping ranges and adjacent ranges of
/// the same kind, then cut out `holes`.
#[must_use]
pub fn normalize(mut regions: Vec<LiveRegion>, holes: &[AddressRange]) -> Vec<LiveRegion> {
    regions.retain(|r| !r.range.is_empty());
    regions.sort_by_key(|r| (r.range.start, r.range.end));

    let mut merged: Vec<LiveRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        match merged.last_mut() {
            Some(last)
                if region.range.start < last.range.end
                    || (region.range.start == last.range.end && region.space == last.space) =>
            {
                last.range.end = last.range.end.max(region.range.end);
            }
            _ => merged.push(region),
        }
    }

    let mut holes: Vec<AddressRange> = holes.iter().copied().filter(|h| !h.is_empty()).collect();
    holes.sort();
    let mut live = Vec::with_capacity(merged.len());
    for region in merged {
        let mut start = region.range.start;
        let end = region.range.end;
        for hole in holes.iter().filter(|h| h.overlaps(&region.range)) {
            if hole.start > start {
                live.push(LiveRegion::new(start, hole.start.min(end), region.space));
            }
            start = start.max(hole.end);
            if start >= end {
                break;
            }
        }
        if start < end {
            live.push(LiveRegion::new(start, end, region.space));
        }
    }
    live
}

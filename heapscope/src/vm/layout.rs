//! Declared native struct contracts
//!
//! Field names and C types follow the runtime's published field table. Kinds
//! are bound in groups: [`CORE`] always, the rest once the heap shape is known.

use super::structs::{vm_structs, View};
use crate::domain::{Address, ReadError};

vm_structs! {
    struct Universe = "Universe" {
        collected_heap: ptr -> CollectedHeap = ("Universe", "_collectedHeap", "CollectedHeap*");
        narrow_klass_base: word -> u64 = ("Universe", "_narrow_klass._base", "address");
        narrow_klass_shift: i32 -> i32 = ("Universe", "_narrow_klass._shift", "int");
    }

    struct CollectedHeap = "CollectedHeap" dynamic {
        /// Completed collections since startup.
        total_collections: u32 -> u64 = ("CollectedHeap", "_total_collections", "unsigned int");
    }

    struct Klass = "Klass" dynamic {
        super_klass: ptr -> Klass = ("Klass", "_super", "Klass*");
        name: ptr -> Symbol = ("Klass", "_name", "Symbol*");
        layout_helper: i32 -> i32 = ("Klass", "_layout_helper", "jint");
    }

    struct Symbol = "Symbol" {
        length: u16 -> u16 = ("Symbol", "_length", "unsigned short");
        body: offset -> Address = ("Symbol", "_body", "");
    }

    struct OopDesc = "oopDesc" {
        mark: word -> u64 = ("oopDesc", "_mark", "markOop");
        klass: word -> Address = ("oopDesc", "_metadata._klass", "Klass*");
        compressed_klass: u32 -> u32 = ("oopDesc", "_metadata._compressed_klass", "narrowOop");
    }

    /// Command line flag table entry.
    struct Flag = "Flag" {
        flags: ptr -> Flag = ("Flag", "flags", "Flag*");
        num_flags: word -> u64 = ("Flag", "numFlags", "size_t");
        flag_type: cstr -> Option<String> = ("Flag", "_type", "const char*");
        flag_name: cstr -> Option<String> = ("Flag", "_name", "const char*");
        value_address: word -> Address = ("Flag", "_addr", "");
    }

    /// Static offsets of the injected fields of `java.lang.Class` instances.
    struct JavaLangClass = "java_lang_Class" {
        klass_offset: i32 -> i32 = ("java_lang_Class", "_klass_offset", "int");
        array_klass_offset: i32 -> i32 = ("java_lang_Class", "_array_klass_offset", "int");
        oop_size_offset: i32 -> i32 = ("java_lang_Class", "_oop_size_offset", "int");
    }

    struct Threads = "Threads" {
        thread_list: ptr -> JavaThread = ("Threads", "_thread_list", "JavaThread*");
    }

    struct JavaThread = "JavaThread" dynamic {
        next: ptr -> JavaThread = ("JavaThread", "_next", "JavaThread*");
        tlab: inline -> ThreadLocalAllocBuffer = ("Thread", "_tlab", "ThreadLocalAllocBuffer");
    }

    struct ThreadLocalAllocBuffer = "ThreadLocalAllocBuffer" {
        start: word -> Address = ("ThreadLocalAllocBuffer", "_start", "HeapWord*");
        top: word -> Address = ("ThreadLocalAllocBuffer", "_top", "HeapWord*");
        end: word -> Address = ("ThreadLocalAllocBuffer", "_end", "HeapWord*");
    }

    struct GenCollectedHeap = "GenCollectedHeap" dynamic {
        n_gens: i32 -> i32 = ("GenCollectedHeap", "_n_gens", "int");
        /// First element of the inline `Generation*` array.
        gens: offset -> Address = ("GenCollectedHeap", "_gens", "");
    }

    struct Generation = "Generation" dynamic {}

    struct DefNewGeneration = "DefNewGeneration" dynamic {
        eden_space: ptr -> ContiguousSpace = ("DefNewGeneration", "_eden_space", "EdenSpace*");
        from_space: ptr -> ContiguousSpace = ("DefNewGeneration", "_from_space", "ContiguousSpace*");
    }

    struct OneContigSpaceCardGeneration = "OneContigSpaceCardGeneration" dynamic {
        the_space: ptr -> ContiguousSpace =
            ("OneContigSpaceCardGeneration", "_the_space", "ContiguousSpace*");
    }

    struct ConcurrentMarkSweepGeneration = "ConcurrentMarkSweepGeneration" dynamic {
        cms_space: ptr -> CompactibleFreeListSpace =
            ("ConcurrentMarkSweepGeneration", "_cmsSpace", "CompactibleFreeListSpace*");
    }

    struct ContiguousSpace = "ContiguousSpace" dynamic {
        bottom: word -> Address = ("Space", "_bottom", "HeapWord*");
        end: word -> Address = ("Space", "_end", "HeapWord*");
        top: word -> Address = ("ContiguousSpace", "_top", "HeapWord*");
    }

    struct CompactibleFreeListSpace = "CompactibleFreeListSpace" dynamic {
        bottom: word -> Address = ("Space", "_bottom", "HeapWord*");
        end: word -> Address = ("Space", "_end", "HeapWord*");
    }

    struct FreeChunk = "FreeChunk" {
        size: word -> u64 = ("FreeChunk", "_size", "size_t");
        prev: word -> Address = ("FreeChunk", "_prev", "FreeChunk*");
    }

    struct ParallelScavengeHeap = "ParallelScavengeHeap" dynamic {
        young_gen: ptr -> PSYoungGen = ("ParallelScavengeHeap", "_young_gen", "PSYoungGen*");
        old_gen: ptr -> PSOldGen = ("ParallelScavengeHeap", "_old_gen", "PSOldGen*");
    }

    struct PSYoungGen = "PSYoungGen" {
        eden_space: ptr -> MutableSpace = ("PSYoungGen", "_eden_space", "MutableSpace*");
        from_space: ptr -> MutableSpace = ("PSYoungGen", "_from_space", "MutableSpace*");
    }

    struct PSOldGen = "PSOldGen" {
        object_space: ptr -> MutableSpace = ("PSOldGen", "_object_space", "MutableSpace*");
    }

    struct MutableSpace = "MutableSpace" {
        bottom: word -> Address = ("ImmutableSpace", "_bottom", "HeapWord*");
        end: word -> Address = ("ImmutableSpace", "_end", "HeapWord*");
        top: word -> Address = ("MutableSpace", "_top", "HeapWord*");
    }

    struct G1CollectedHeap = "G1CollectedHeap" dynamic {
        hrm: inline -> HeapRegionManager = ("G1CollectedHeap", "_hrm", "HeapRegionManager");
    }

    struct HeapRegionManager = "HeapRegionManager" {
        regions: inline -> G1HeapRegionTable = ("HeapRegionManager", "_regions", "G1HeapRegionTable");
    }

    struct G1HeapRegionTable = "G1HeapRegionTable" {
        base: word -> Address = ("G1HeapRegionTable", "_base", "address");
        length: word -> u64 = ("G1HeapRegionTable", "_length", "size_t");
    }

    struct HeapRegion = "HeapRegion" dynamic {
        bottom: word -> Address = ("Space", "_bottom", "HeapWord*");
        end: word -> Address = ("Space", "_end", "HeapWord*");
        top: word -> Address = ("G1OffsetTableContigSpace", "_top", "HeapWord*");
    }
}

/// Always bound: object headers, class metadata, flags and threads.
pub const CORE: &[StructTag] = &[
    StructTag::Universe,
    StructTag::CollectedHeap,
    StructTag::Klass,
    StructTag::Symbol,
    StructTag::OopDesc,
    StructTag::Flag,
    StructTag::JavaLangClass,
    StructTag::Threads,
    StructTag::JavaThread,
    StructTag::ThreadLocalAllocBuffer,
];

pub const GENERATIONAL: &[StructTag] = &[
    StructTag::GenCollectedHeap,
    StructTag::Generation,
    StructTag::DefNewGeneration,
    StructTag::OneContigSpaceCardGeneration,
    StructTag::ContiguousSpace,
];

/// Bound in addition to [`GENERATIONAL`] when an old generation is free-list managed.
pub const FREE_LIST: &[StructTag] = &[
    StructTag::ConcurrentMarkSweepGeneration,
    StructTag::CompactibleFreeListSpace,
    StructTag::FreeChunk,
];

pub const PARALLEL: &[StructTag] = &[
    StructTag::ParallelScavengeHeap,
    StructTag::PSYoungGen,
    StructTag::PSOldGen,
    StructTag::MutableSpace,
];

pub const REGIONIZED: &[StructTag] = &[
    StructTag::G1CollectedHeap,
    StructTag::HeapRegionManager,
    StructTag::G1HeapRegionTable,
    StructTag::HeapRegion,
];

impl View<'_, Symbol> {
    /// # Errors
    /// Unreadable length or body
    pub fn as_string(&self) -> Result<String, ReadError> {
        let mut bytes = vec![0u8; usize::from(self.length()?)];
        self.scope().space().read_bytes(self.body()?, &mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl View<'_, Klass> {
    /// Class name in dotted form, e.g. `java.lang.String`
    ///
    /// # Errors
    /// Unreadable name symbol
    pub fn external_name(&self) -> Result<String, ReadError> {
        let name = self.name()?;
        if name.is_null() {
            return Err(ReadError::Implausible { address: self.address(), reason: "klass without name" });
        }
        Ok(name.as_string()?.replace('/', "."))
    }
}

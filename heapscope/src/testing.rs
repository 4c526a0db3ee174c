//! Synthetic runtime images for unit tests
//!
//! [`FixtureBuilder`] lays out the runtime's metadata tables, class
//! metadata, heap structures and objects in a [`MemoryImage`] the same way a
//! live process would expose them. Field offsets scale with the pointer size
//! so every test can run against both 32- and 64-bit layouts.

use crate::config::PageCacheConfig;
use crate::domain::{Address, AddressRange, InspectError};
use crate::heap::object_model::align_up;
use crate::inferior::{vtable_symbol, Inferior, MemoryImage};
use crate::memory::AddressSpace;
use crate::vm::Runtime;
use std::collections::HashMap;

const ARENA_BASE: Address = 0x1000_0000;
const ARENA_SIZE: u64 = 0x10_0000;
const HEAP_BASE: Address = 0x4000_0000;
const PAGE: u64 = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OldGen {
    Contiguous,
    FreeList,
}

/// Spaces created by a heap helper.
#[derive(Debug, Clone, Copy)]
pub struct HeapRanges {
    pub eden: AddressRange,
    pub old: AddressRange,
}

struct TypeDecl {
    name: String,
    superclass: Option<String>,
    size: u64,
    oop: bool,
    integer: bool,
    unsigned: bool,
    dynamic: bool,
}

enum Place {
    Static(Address),
    Instance(u64),
}

struct FieldDecl {
    owner: String,
    name: String,
    signature: Option<String>,
    place: Place,
}

struct FlagDecl {
    name: String,
    kind: &'static str,
    value: u64,
}

/// Addresses of static fields, allocated up front.
struct Statics {
    collected_heap: Address,
    narrow_base: Address,
    narrow_shift: Address,
    flags: Address,
    num_flags: Address,
    mirror_klass_offset: Address,
    mirror_array_klass_offset: Address,
    mirror_oop_size_offset: Address,
    thread_list: Address,
    young_gen: Address,
    old_gen: Address,
}

/// Column offsets of one metadata table, packed with natural alignment.
#[derive(Default)]
struct Columns {
    next: u64,
}

impl Columns {
    fn take(&mut self, width: u64) -> u64 {
        let at = align_up(self.next, width);
        self.next = at + width;
        at
    }

    fn stride(&self) -> u64 {
        align_up(self.next, 8)
    }
}

pub struct FixtureBuilder {
    image: MemoryImage,
    p: u64,
    next: Address,
    next_heap: Address,
    strings: HashMap<String, Address>,
    types: Vec<TypeDecl>,
    fields: Vec<FieldDecl>,
    ints: Vec<(String, i32)>,
    longs: Vec<(String, u64)>,
    flags: Vec<FlagDecl>,
    statics: Statics,
    narrow: (u64, u32),
    object_klass: Address,
    heap: Option<Address>,
    last_thread: Option<Address>,
}

impl FixtureBuilder {
    pub fn new(pointer_size: usize) -> Self {
        let image = MemoryImage::new(pointer_size);
        image.map(ARENA_BASE, ARENA_SIZE as usize);
        let p = pointer_size as u64;

        let mut next = ARENA_BASE;
        let mut static_slot = |width: u64| {
            let at = align_up(next, width);
            next = at + width;
            at
        };
        let statics = Statics {
            collected_heap: static_slot(p),
            narrow_base: static_slot(p),
            narrow_shift: static_slot(4),
            flags: static_slot(p),
            num_flags: static_slot(p),
            mirror_klass_offset: static_slot(4),
            mirror_array_klass_offset: static_slot(4),
            mirror_oop_size_offset: static_slot(4),
            thread_list: static_slot(p),
            young_gen: static_slot(p),
            old_gen: static_slot(p),
        };

        let mut builder = Self {
            image,
            p,
            next,
            next_heap: HEAP_BASE,
            strings: HashMap::new(),
            types: default_types(p),
            fields: default_fields(p, &statics),
            ints: default_ints(p),
            longs: vec![("markOopDesc::cms_mask".to_string(), 1)],
            flags: vec![
                FlagDecl { name: "UseCompressedOops".into(), kind: "bool", value: 0 },
                FlagDecl { name: "UseCompressedClassPointers".into(), kind: "bool", value: 0 },
                FlagDecl { name: "UseTLAB".into(), kind: "bool", value: 1 },
                FlagDecl { name: "ObjectAlignmentInBytes".into(), kind: "intx", value: 8 },
                FlagDecl { name: "PrintGC".into(), kind: "bool", value: 0 },
            ],
            statics,
            narrow: (0, 0),
            object_klass: 0,
            heap: None,
            last_thread: None,
        };
        builder.object_klass = builder.instance_klass("java/lang/Object", 2 * p);
        builder
    }

    fn alloc(&mut self, size: u64, align: u64) -> Address {
        let at = align_up(self.next, align);
        self.next = at + size;
        assert!(self.next <= ARENA_BASE + ARENA_SIZE, "fixture arena exhausted");
        at
    }

    fn word(&self, address: Address, value: u64) {
        assert!(self.image.write_word(address, value), "unmapped write at 0x{address:x}");
    }

    fn int(&self, address: Address, value: i32) {
        assert!(self.image.write_i32(address, value), "unmapped write at 0x{address:x}");
    }

    fn c_string(&mut self, text: &str) -> Address {
        if let Some(&at) = self.strings.get(text) {
            return at;
        }
        let at = self.alloc(text.len() as u64 + 1, 1);
        self.image.write(at, text.as_bytes());
        self.strings.insert(text.to_string(), at);
        at
    }

    fn global_u64(&mut self, name: &str, value: u64) {
        let at = self.alloc(8, 8);
        self.image.write_u64(at, value);
        self.image.define_symbol(name, at);
    }

    /// Address objects of `type_name` carry in their first word.
    fn vtable(&mut self, type_name: &str) -> Address {
        let symbol = vtable_symbol(type_name);
        let at = match self.image.lookup_symbol(&symbol) {
            Some(at) => at,
            None => {
                let at = self.alloc(4 * self.p, self.p);
                self.image.define_symbol(symbol, at);
                at
            }
        };
        at + 2 * self.p
    }

    fn flag_value(&self, name: &str) -> u64 {
        self.flags.iter().find(|f| f.name == name).map_or(0, |f| f.value)
    }

    fn compressed_class_pointers(&self) -> bool {
        self.flag_value("UseCompressedClassPointers") != 0
    }

    fn array_length_offset(&self) -> u64 {
        if self.compressed_class_pointers() {
            2 * self.p - 4
        } else {
            2 * self.p
        }
    }

    // ------------------------------------------------------------------
    // Metadata declarations
    // ------------------------------------------------------------------

    /// Add a type or change an existing one.
    pub fn declare_type(&mut self, name: &str, superclass: Option<&str>, size: u64) {
        let superclass = superclass.map(str::to_string);
        if let Some(existing) = self.types.iter_mut().find(|t| t.name == name) {
            existing.superclass = superclass;
            existing.size = size;
            return;
        }
        self.types.push(TypeDecl {
            name: name.to_string(),
            superclass,
            size,
            oop: false,
            integer: false,
            unsigned: false,
            dynamic: false,
        });
    }

    pub fn remove_type(&mut self, name: &str) {
        self.types.retain(|t| t.name != name);
    }

    /// Declare (or redeclare) an instance field.
    pub fn set_field(&mut self, owner: &str, name: &str, signature: &str, offset: u64) {
        self.remove_field(owner, name);
        self.fields.push(FieldDecl {
            owner: owner.to_string(),
            name: name.to_string(),
            signature: Some(signature.to_string()),
            place: Place::Instance(offset),
        });
    }

    pub fn remove_field(&mut self, owner: &str, name: &str) {
        self.fields.retain(|f| !(f.owner == owner && f.name == name));
    }

    pub fn long_constant(&mut self, name: &str, value: u64) {
        self.longs.retain(|(n, _)| n != name);
        self.longs.push((name.to_string(), value));
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.remove_flag(name);
        self.flags.push(FlagDecl { name: name.to_string(), kind: "bool", value: u64::from(value) });
    }

    pub fn remove_flag(&mut self, name: &str) {
        self.flags.retain(|f| f.name != name);
    }

    pub fn set_object_alignment(&mut self, bytes: u64) {
        self.remove_flag("ObjectAlignmentInBytes");
        self.flags.push(FlagDecl { name: "ObjectAlignmentInBytes".into(), kind: "intx", value: bytes });
    }

    pub fn set_narrow_klass(&mut self, base: Address, shift: u32) {
        self.narrow = (base, shift);
    }

    // ------------------------------------------------------------------
    // Class metadata
    // ------------------------------------------------------------------

    pub fn symbol(&mut self, text: &str) -> Address {
        let at = self.alloc(8 + text.len() as u64, 8);
        let length = u16::try_from(text.len()).expect("symbol length");
        self.image.write_u16(at, length);
        self.image.write(at + 8, text.as_bytes());
        at
    }

    fn klass(&mut self, type_name: &str, name: &str, layout_helper: i32) -> Address {
        let vtable = self.vtable(type_name);
        let name = self.symbol(name);
        let at = self.alloc(6 * self.p, 8);
        self.word(at, vtable);
        self.word(at + self.p, self.object_klass);
        self.word(at + 2 * self.p, name);
        self.int(at + 3 * self.p, layout_helper);
        at
    }

    /// Class whose instances are `size` bytes.
    pub fn instance_klass(&mut self, name: &str, size: u64) -> Address {
        let layout_helper = i32::try_from(size).expect("instance size");
        self.klass("InstanceKlass", name, layout_helper)
    }

    /// Primitive array class with `1 << log2_element_size` byte elements.
    pub fn type_array_klass(&mut self, name: &str, log2_element_size: u32) -> Address {
        let header = align_up(self.array_length_offset() + 4, self.p);
        let header = i32::try_from(header).expect("array header");
        let element = i32::try_from(log2_element_size).expect("element size");
        let layout_helper = (-1i32 << 30) | (header << 16) | element;
        self.klass("TypeArrayKlass", name, layout_helper)
    }

    /// `java.lang.Class`; its instances carry their size in the header.
    pub fn mirror_klass(&mut self) -> Address {
        let layout_helper = i32::try_from(6 * self.p).expect("mirror size") | 1;
        self.klass("InstanceMirrorKlass", "java/lang/Class", layout_helper)
    }

    // ------------------------------------------------------------------
    // Heap memory and objects
    // ------------------------------------------------------------------

    /// Map a fresh zeroed block of at least `size` bytes.
    pub fn allocate_heap(&mut self, size: u64) -> Address {
        let at = self.next_heap;
        let mapped = align_up(size.max(1), PAGE);
        self.image.map(at, usize::try_from(mapped).expect("heap size"));
        self.next_heap = at + mapped + 0x1_0000;
        at
    }

    fn write_klass_slot(&self, oop: Address, klass: Address) {
        if self.compressed_class_pointers() {
            let (base, shift) = self.narrow;
            let narrow = u32::try_from((klass - base) >> shift).expect("narrow klass");
            assert!(self.image.write_u32(oop + self.p, narrow));
        } else {
            self.word(oop + self.p, klass);
        }
    }

    pub fn place_object(&mut self, at: Address, klass: Address) {
        self.word(at, 1);
        self.write_klass_slot(at, klass);
    }

    /// Header with an arbitrary class pointer.
    pub fn place_raw_header(&mut self, at: Address, klass: Address) {
        self.word(at, 1);
        self.word(at + self.p, klass);
    }

    pub fn place_array(&mut self, at: Address, klass: Address, length: i32) {
        self.place_object(at, klass);
        self.int(at + self.array_length_offset(), length);
    }

    /// Mirror of `mirrored`, `words` heap words long.
    pub fn place_mirror(&mut self, at: Address, mirror_klass: Address, words: i32, mirrored: Address) {
        self.place_object(at, mirror_klass);
        self.word(at + 3 * self.p, mirrored);
        self.int(at + 5 * self.p, words);
    }

    /// Free block of `bytes`, encoded the way the free-list old generation marks it.
    pub fn place_free_chunk(&mut self, at: Address, bytes: u64) {
        let words = bytes / self.p;
        if self.flag_value("UseCompressedOops") != 0 {
            self.word(at, (words << 8) | (1 << 7));
        } else {
            self.word(at, words);
            self.word(at + self.p, 1);
        }
    }

    // ------------------------------------------------------------------
    // Heap shapes
    // ------------------------------------------------------------------

    fn collected_heap(&mut self, type_name: &str) -> Address {
        assert!(self.heap.is_none(), "fixture already has a heap");
        let vtable = self.vtable(type_name);
        let heap = self.alloc(8 * self.p, self.p);
        self.word(heap, vtable);
        self.word(self.statics.collected_heap, heap);
        self.heap = Some(heap);
        heap
    }

    fn space(&mut self, type_name: &str, bottom: Address, top: Address, end: Address) -> Address {
        let vtable = self.vtable(type_name);
        let space = self.alloc(4 * self.p, self.p);
        self.word(space, vtable);
        self.word(space + self.p, bottom);
        self.word(space + 2 * self.p, end);
        self.word(space + 3 * self.p, top);
        space
    }

    fn object(&mut self, type_name: &str, slots: &[Address]) -> Address {
        let vtable = self.vtable(type_name);
        let at = self.alloc(4 * self.p, self.p);
        self.word(at, vtable);
        for (index, &value) in slots.iter().enumerate() {
            self.word(at + (index as u64 + 1) * self.p, value);
        }
        at
    }

    /// Full eden, empty survivor and full old space.
    pub fn parallel_heap(&mut self, eden: u64, old: u64) -> HeapRanges {
        let eden_base = self.allocate_heap(eden);
        let from_base = self.allocate_heap(PAGE);
        let old_base = self.allocate_heap(old);

        let eden_space = self.space("MutableSpace", eden_base, eden_base + eden, eden_base + eden);
        let from_space = self.space("MutableSpace", from_base, from_base, from_base + PAGE);
        let old_space = self.space("MutableSpace", old_base, old_base + old, old_base + old);
        let young_gen = self.object("PSYoungGen", &[eden_space, from_space]);
        let old_gen = self.object("PSOldGen", &[old_space]);
        self.word(self.statics.young_gen, young_gen);
        self.word(self.statics.old_gen, old_gen);
        self.collected_heap("ParallelScavengeHeap");

        HeapRanges {
            eden: AddressRange::new(eden_base, eden_base + eden),
            old: AddressRange::new(old_base, old_base + old),
        }
    }

    /// Copying young generation plus the given old generation. A free-list
    /// old generation starts out as one undivided span for the test to fill.
    pub fn gen_heap(&mut self, young: u64, old: u64, old_gen: OldGen) -> HeapRanges {
        let eden_base = self.allocate_heap(young);
        let from_base = self.allocate_heap(PAGE);
        let old_base = self.allocate_heap(old);

        let eden = self.space("EdenSpace", eden_base, eden_base + young, eden_base + young);
        let from = self.space("ContiguousSpace", from_base, from_base, from_base + PAGE);
        let young_gen = self.object("DefNewGeneration", &[eden, from]);
        let old_gen = match old_gen {
            OldGen::Contiguous => {
                let space = self.space("ContiguousSpace", old_base, old_base + old, old_base + old);
                self.object("TenuredGeneration", &[space])
            }
            OldGen::FreeList => {
                let space = self.object("CompactibleFreeListSpace", &[old_base, old_base + old]);
                self.object("ConcurrentMarkSweepGeneration", &[space])
            }
        };

        let heap = self.collected_heap("GenCollectedHeap");
        self.int(heap + 2 * self.p, 2);
        self.word(heap + 3 * self.p, young_gen);
        self.word(heap + 4 * self.p, old_gen);

        HeapRanges {
            eden: AddressRange::new(eden_base, eden_base + young),
            old: AddressRange::new(old_base, old_base + old),
        }
    }

    /// Equally spaced regions, each filled to its given size; zero leaves the
    /// table slot empty. Returns the base of the first region.
    pub fn g1_heap(&mut self, sizes: &[u64]) -> Address {
        let stride = align_up(sizes.iter().copied().max().unwrap_or(PAGE).max(1), PAGE);
        let base = self.allocate_heap(stride * sizes.len() as u64);
        let table = self.alloc(self.p * sizes.len() as u64, self.p);
        for (index, &size) in sizes.iter().enumerate() {
            if size == 0 {
                continue;
            }
            let bottom = base + index as u64 * stride;
            let region = self.space("HeapRegion", bottom, bottom + size, bottom + stride);
            self.word(table + index as u64 * self.p, region);
        }
        let heap = self.collected_heap("G1CollectedHeap");
        self.word(heap + 2 * self.p, table);
        self.word(heap + 3 * self.p, sizes.len() as u64);
        base
    }

    /// A collected heap of some other collector type.
    pub fn custom_heap(&mut self, type_name: &str) -> Address {
        if !self.types.iter().any(|t| t.name == type_name) {
            self.declare_type(type_name, Some("CollectedHeap"), 8 * self.p);
        }
        self.collected_heap(type_name)
    }

    /// Append a thread whose TLAB spans `[start, end)` with `top` allocated to.
    pub fn add_thread_with_tlab(&mut self, start: Address, top: Address, end: Address) -> Address {
        let vtable = self.vtable("JavaThread");
        let thread = self.alloc(8 * self.p, self.p);
        self.word(thread, vtable);
        self.word(thread + 2 * self.p, start);
        self.word(thread + 3 * self.p, top);
        self.word(thread + 4 * self.p, end);
        match self.last_thread {
            Some(last) => self.word(last + self.p, thread),
            None => self.word(self.statics.thread_list, thread),
        }
        self.last_thread = Some(thread);
        thread
    }

    // ------------------------------------------------------------------
    // Table emission
    // ------------------------------------------------------------------

    fn table(&mut self, array: &str, stride_symbol: &str, stride: u64, rows: usize) -> Address {
        // one extra zeroed row terminates the walk
        let base = self.alloc(stride * (rows as u64 + 1), 8);
        let holder = self.alloc(self.p, self.p);
        self.word(holder, base);
        self.image.define_symbol(array, holder);
        self.global_u64(stride_symbol, stride);
        base
    }

    fn emit_types(&mut self) {
        let p = self.p;
        let mut columns = Columns::default();
        let name = columns.take(p);
        let superclass = columns.take(p);
        let is_oop = columns.take(4);
        let is_integer = columns.take(4);
        let is_unsigned = columns.take(4);
        let size = columns.take(8);
        let stride = columns.stride();

        let types = std::mem::take(&mut self.types);
        let base = self.table("gHotSpotVMTypes", "gHotSpotVMTypeEntryArrayStride", stride, types.len());
        for (index, decl) in types.iter().enumerate() {
            let entry = base + index as u64 * stride;
            let name_at = self.c_string(&decl.name);
            self.word(entry + name, name_at);
            if let Some(superclass_name) = &decl.superclass {
                let at = self.c_string(superclass_name);
                self.word(entry + superclass, at);
            }
            self.int(entry + is_oop, i32::from(decl.oop));
            self.int(entry + is_integer, i32::from(decl.integer));
            self.int(entry + is_unsigned, i32::from(decl.unsigned));
            self.image.write_u64(entry + size, decl.size);
            if decl.dynamic {
                self.vtable(&decl.name);
            }
        }
        self.types = types;

        self.global_u64("gHotSpotVMTypeEntryTypeNameOffset", name);
        self.global_u64("gHotSpotVMTypeEntrySuperclassNameOffset", superclass);
        self.global_u64("gHotSpotVMTypeEntryIsOopTypeOffset", is_oop);
        self.global_u64("gHotSpotVMTypeEntryIsIntegerTypeOffset", is_integer);
        self.global_u64("gHotSpotVMTypeEntryIsUnsignedOffset", is_unsigned);
        self.global_u64("gHotSpotVMTypeEntrySizeOffset", size);
    }

    fn emit_fields(&mut self) {
        let p = self.p;
        let mut columns = Columns::default();
        let type_name = columns.take(p);
        let field_name = columns.take(p);
        let type_string = columns.take(p);
        let is_static = columns.take(4);
        let offset = columns.take(8);
        let address = columns.take(p);
        let stride = columns.stride();

        let fields = std::mem::take(&mut self.fields);
        let base = self.table("gHotSpotVMStructs", "gHotSpotVMStructEntryArrayStride", stride, fields.len());
        for (index, decl) in fields.iter().enumerate() {
            let entry = base + index as u64 * stride;
            let owner = self.c_string(&decl.owner);
            self.word(entry + type_name, owner);
            let name = self.c_string(&decl.name);
            self.word(entry + field_name, name);
            if let Some(signature) = &decl.signature {
                let at = self.c_string(signature);
                self.word(entry + type_string, at);
            }
            match decl.place {
                Place::Static(at) => {
                    self.int(entry + is_static, 1);
                    self.word(entry + address, at);
                }
                Place::Instance(at) => {
                    self.image.write_u64(entry + offset, at);
                }
            }
        }
        self.fields = fields;

        self.global_u64("gHotSpotVMStructEntryTypeNameOffset", type_name);
        self.global_u64("gHotSpotVMStructEntryFieldNameOffset", field_name);
        self.global_u64("gHotSpotVMStructEntryTypeStringOffset", type_string);
        self.global_u64("gHotSpotVMStructEntryIsStaticOffset", is_static);
        self.global_u64("gHotSpotVMStructEntryOffsetOffset", offset);
        self.global_u64("gHotSpotVMStructEntryAddressOffset", address);
    }

    fn emit_constants(&mut self) {
        let p = self.p;
        let mut columns = Columns::default();
        let name = columns.take(p);
        let value = columns.take(4);
        let stride = columns.stride();
        let ints = std::mem::take(&mut self.ints);
        let base = self.table(
            "gHotSpotVMIntConstants",
            "gHotSpotVMIntConstantEntryArrayStride",
            stride,
            ints.len(),
        );
        for (index, (constant, v)) in ints.iter().enumerate() {
            let entry = base + index as u64 * stride;
            let at = self.c_string(constant);
            self.word(entry + name, at);
            self.int(entry + value, *v);
        }
        self.global_u64("gHotSpotVMIntConstantEntryNameOffset", name);
        self.global_u64("gHotSpotVMIntConstantEntryValueOffset", value);

        let mut columns = Columns::default();
        let name = columns.take(p);
        let value = columns.take(8);
        let stride = columns.stride();
        let longs = std::mem::take(&mut self.longs);
        let base = self.table(
            "gHotSpotVMLongConstants",
            "gHotSpotVMLongConstantEntryArrayStride",
            stride,
            longs.len(),
        );
        for (index, (constant, v)) in longs.iter().enumerate() {
            let entry = base + index as u64 * stride;
            let at = self.c_string(constant);
            self.word(entry + name, at);
            self.image.write_u64(entry + value, *v);
        }
        self.global_u64("gHotSpotVMLongConstantEntryNameOffset", name);
        self.global_u64("gHotSpotVMLongConstantEntryValueOffset", value);
    }

    fn emit_flags(&mut self) {
        let p = self.p;
        let stride = 4 * p;
        let flags = std::mem::take(&mut self.flags);
        // numFlags counts the terminating null entry
        let table = self.alloc(stride * (flags.len() as u64 + 1), p);
        for (index, flag) in flags.iter().enumerate() {
            let entry = table + index as u64 * stride;
            let kind = self.c_string(flag.kind);
            self.word(entry, kind);
            let name = self.c_string(&flag.name);
            self.word(entry + p, name);
            let value = self.alloc(p, p);
            if flag.kind == "bool" {
                self.image.write_u8(value, u8::from(flag.value != 0));
            } else {
                self.word(value, flag.value);
            }
            self.word(entry + 2 * p, value);
        }
        self.word(self.statics.flags, table);
        self.word(self.statics.num_flags, flags.len() as u64 + 1);
        self.flags = flags;
    }

    pub fn build(mut self) -> Fixture {
        if self.heap.is_none() {
            self.parallel_heap(PAGE, PAGE);
        }
        let p = self.p;
        self.word(self.statics.narrow_base, self.narrow.0);
        self.int(self.statics.narrow_shift, i32::try_from(self.narrow.1).expect("shift"));
        let mirror = [
            (self.statics.mirror_klass_offset, 3 * p),
            (self.statics.mirror_array_klass_offset, 4 * p),
            (self.statics.mirror_oop_size_offset, 5 * p),
        ];
        for (at, offset) in mirror {
            self.int(at, i32::try_from(offset).expect("mirror offset"));
        }

        self.emit_types();
        self.emit_fields();
        self.emit_constants();
        self.emit_flags();

        Fixture { image: self.image, heap: self.heap.unwrap_or_default(), pointer_size: p }
    }
}

/// A finished image; attach to it as often as needed.
pub struct Fixture {
    image: MemoryImage,
    heap: Address,
    pointer_size: u64,
}

impl Fixture {
    pub fn try_runtime(&self) -> Result<Runtime, InspectError> {
        Runtime::attach(Box::new(self.image.clone()), &PageCacheConfig::default())
    }

    pub fn runtime(&self) -> Runtime {
        match self.try_runtime() {
            Ok(runtime) => runtime,
            Err(e) => panic!("fixture failed to attach: {e}"),
        }
    }

    pub fn address_space(&self) -> AddressSpace {
        AddressSpace::new(Box::new(self.image.clone()), &PageCacheConfig::default())
    }

    pub fn image(&self) -> &MemoryImage {
        &self.image
    }

    pub fn set_total_collections(&self, count: u32) {
        assert!(self.image.write_u32(self.heap + self.pointer_size, count));
    }
}

fn default_types(p: u64) -> Vec<TypeDecl> {
    let scalar = |name: &str, size: u64, unsigned: bool| TypeDecl {
        name: name.to_string(),
        superclass: None,
        size,
        oop: false,
        integer: true,
        unsigned,
        dynamic: false,
    };
    let mut types = vec![
        scalar("bool", 1, false),
        scalar("char", 1, false),
        scalar("jint", 4, false),
        scalar("int", 4, false),
        scalar("unsigned int", 4, true),
        scalar("unsigned short", 2, true),
        scalar("intx", p, false),
        scalar("size_t", p, true),
        scalar("uint64_t", 8, true),
        scalar("address", p, true),
        scalar("markOop", p, true),
        scalar("narrowOop", 4, true),
    ];
    types.push(TypeDecl {
        name: "oop".into(),
        superclass: None,
        size: p,
        oop: true,
        integer: false,
        unsigned: false,
        dynamic: false,
    });

    // (name, superclass, size, dynamic)
    let structs: &[(&str, Option<&str>, u64, bool)] = &[
        ("Metadata", None, p, true),
        ("Klass", Some("Metadata"), 6 * p, true),
        ("InstanceKlass", Some("Klass"), 6 * p, true),
        ("InstanceMirrorKlass", Some("InstanceKlass"), 6 * p, true),
        ("ArrayKlass", Some("Klass"), 6 * p, true),
        ("TypeArrayKlass", Some("ArrayKlass"), 6 * p, true),
        ("ObjArrayKlass", Some("ArrayKlass"), 6 * p, true),
        ("Symbol", None, 8, false),
        ("oopDesc", None, 2 * p, false),
        ("arrayOopDesc", Some("oopDesc"), 2 * p, false),
        ("Flag", None, 4 * p, false),
        ("Universe", None, 0, false),
        ("java_lang_Class", None, 0, false),
        ("Threads", None, 0, false),
        ("Thread", None, 8 * p, true),
        ("JavaThread", Some("Thread"), 8 * p, true),
        ("ThreadLocalAllocBuffer", None, 4 * p, false),
        ("CollectedHeap", None, 8 * p, true),
        ("GenCollectedHeap", Some("CollectedHeap"), 8 * p, true),
        ("ParallelScavengeHeap", Some("CollectedHeap"), 8 * p, true),
        ("G1CollectedHeap", Some("CollectedHeap"), 8 * p, true),
        ("Generation", None, 4 * p, true),
        ("DefNewGeneration", Some("Generation"), 4 * p, true),
        ("OneContigSpaceCardGeneration", Some("Generation"), 4 * p, true),
        ("TenuredGeneration", Some("OneContigSpaceCardGeneration"), 4 * p, true),
        ("ConcurrentMarkSweepGeneration", Some("Generation"), 4 * p, true),
        ("Space", None, 4 * p, true),
        ("CompactibleSpace", Some("Space"), 4 * p, true),
        ("ContiguousSpace", Some("CompactibleSpace"), 4 * p, true),
        ("EdenSpace", Some("ContiguousSpace"), 4 * p, true),
        ("CompactibleFreeListSpace", Some("CompactibleSpace"), 4 * p, true),
        ("FreeChunk", None, 2 * p, false),
        ("PSYoungGen", None, 4 * p, false),
        ("PSOldGen", None, 4 * p, false),
        ("ImmutableSpace", None, 4 * p, true),
        ("MutableSpace", Some("ImmutableSpace"), 4 * p, true),
        ("HeapRegionManager", None, 4 * p, false),
        ("G1HeapRegionTable", None, 2 * p, false),
        ("G1OffsetTableContigSpace", Some("CompactibleSpace"), 4 * p, true),
        ("HeapRegion", Some("G1OffsetTableContigSpace"), 4 * p, true),
    ];
    types.extend(structs.iter().map(|&(name, superclass, size, dynamic)| TypeDecl {
        name: name.to_string(),
        superclass: superclass.map(str::to_string),
        size,
        oop: false,
        integer: false,
        unsigned: false,
        dynamic,
    }));
    types
}

fn default_fields(p: u64, statics: &Statics) -> Vec<FieldDecl> {
    let field = |owner: &str, name: &str, signature: Option<&str>, place: Place| FieldDecl {
        owner: owner.to_string(),
        name: name.to_string(),
        signature: signature.map(str::to_string),
        place,
    };
    let at = |offset: u64| Place::Instance(offset);
    let fixed = |address: Address| Place::Static(address);
    vec![
        field("Universe", "_collectedHeap", Some("CollectedHeap*"), fixed(statics.collected_heap)),
        field("Universe", "_narrow_klass._base", Some("address"), fixed(statics.narrow_base)),
        field("Universe", "_narrow_klass._shift", Some("int"), fixed(statics.narrow_shift)),
        field("CollectedHeap", "_total_collections", Some("unsigned int"), at(p)),
        field("Klass", "_super", Some("Klass*"), at(p)),
        field("Klass", "_name", Some("Symbol*"), at(2 * p)),
        field("Klass", "_layout_helper", Some("jint"), at(3 * p)),
        field("Symbol", "_length", Some("unsigned short"), at(0)),
        field("Symbol", "_body", None, at(8)),
        field("oopDesc", "_mark", Some("markOop"), at(0)),
        field("oopDesc", "_metadata._klass", Some("Klass*"), at(p)),
        field("oopDesc", "_metadata._compressed_klass", Some("narrowOop"), at(p)),
        field("Flag", "flags", Some("Flag*"), fixed(statics.flags)),
        field("Flag", "numFlags", Some("size_t"), fixed(statics.num_flags)),
        field("Flag", "_type", Some("const char*"), at(0)),
        field("Flag", "_name", Some("const char*"), at(p)),
        field("Flag", "_addr", Some("void*"), at(2 * p)),
        field("java_lang_Class", "_klass_offset", Some("int"), fixed(statics.mirror_klass_offset)),
        field(
            "java_lang_Class",
            "_array_klass_offset",
            Some("int"),
            fixed(statics.mirror_array_klass_offset),
        ),
        field("java_lang_Class", "_oop_size_offset", Some("int"), fixed(statics.mirror_oop_size_offset)),
        field("Threads", "_thread_list", Some("JavaThread*"), fixed(statics.thread_list)),
        field("JavaThread", "_next", Some("JavaThread*"), at(p)),
        field("Thread", "_tlab", Some("ThreadLocalAllocBuffer"), at(2 * p)),
        field("ThreadLocalAllocBuffer", "_start", Some("HeapWord*"), at(0)),
        field("ThreadLocalAllocBuffer", "_top", Some("HeapWord*"), at(p)),
        field("ThreadLocalAllocBuffer", "_end", Some("HeapWord*"), at(2 * p)),
        field("GenCollectedHeap", "_n_gens", Some("int"), at(2 * p)),
        field("GenCollectedHeap", "_gens", Some("Generation*"), at(3 * p)),
        field("DefNewGeneration", "_eden_space", Some("EdenSpace*"), at(p)),
        field("DefNewGeneration", "_from_space", Some("ContiguousSpace*"), at(2 * p)),
        field("OneContigSpaceCardGeneration", "_the_space", Some("ContiguousSpace*"), at(p)),
        field(
            "ConcurrentMarkSweepGeneration",
            "_cmsSpace",
            Some("CompactibleFreeListSpace*"),
            at(p),
        ),
        field("Space", "_bottom", Some("HeapWord*"), at(p)),
        field("Space", "_end", Some("HeapWord*"), at(2 * p)),
        field("ContiguousSpace", "_top", Some("HeapWord*"), at(3 * p)),
        field("FreeChunk", "_size", Some("size_t"), at(0)),
        field("FreeChunk", "_prev", Some("FreeChunk*"), at(p)),
        field("ParallelScavengeHeap", "_young_gen", Some("PSYoungGen*"), fixed(statics.young_gen)),
        field("ParallelScavengeHeap", "_old_gen", Some("PSOldGen*"), fixed(statics.old_gen)),
        field("PSYoungGen", "_eden_space", Some("MutableSpace*"), at(p)),
        field("PSYoungGen", "_from_space", Some("MutableSpace*"), at(2 * p)),
        field("PSOldGen", "_object_space", Some("MutableSpace*"), at(p)),
        field("ImmutableSpace", "_bottom", Some("HeapWord*"), at(p)),
        field("ImmutableSpace", "_end", Some("HeapWord*"), at(2 * p)),
        field("MutableSpace", "_top", Some("HeapWord*"), at(3 * p)),
        field("G1CollectedHeap", "_hrm", Some("HeapRegionManager"), at(2 * p)),
        field("HeapRegionManager", "_regions", Some("G1HeapRegionTable"), at(0)),
        field("G1HeapRegionTable", "_base", Some("address"), at(0)),
        field("G1HeapRegionTable", "_length", Some("size_t"), at(p)),
        field("G1OffsetTableContigSpace", "_top", Some("HeapWord*"), at(3 * p)),
    ]
}

fn default_ints(p: u64) -> Vec<(String, i32)> {
    let heap_word = i32::try_from(p).unwrap_or(8);
    [
        ("HeapWordSize", heap_word),
        ("Klass::_lh_instance_slow_path_bit", 1),
        ("Klass::_lh_array_tag_shift", 30),
        ("Klass::_lh_array_tag_type_value", -1),
        ("Klass::_lh_array_tag_obj_value", -2),
        ("Klass::_lh_header_size_shift", 16),
        ("Klass::_lh_header_size_mask", 0xff),
        ("Klass::_lh_element_type_shift", 8),
        ("Klass::_lh_element_type_mask", 0xff),
        ("Klass::_lh_log2_element_size_shift", 0),
        ("Klass::_lh_log2_element_size_mask", 0x3f),
        ("markOopDesc::cms_shift", 7),
        ("markOopDesc::size_shift", 8),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_align_naturally() {
        let mut columns = Columns::default();
        assert_eq!(columns.take(4), 0);
        assert_eq!(columns.take(4), 4);
        assert_eq!(columns.take(4), 8);
        assert_eq!(columns.take(8), 16);
        assert_eq!(columns.stride(), 24);
    }

    #[test]
    fn test_default_fixture_attaches() {
        for pointer_size in [4, 8] {
            let fixture = FixtureBuilder::new(pointer_size).build();
            assert!(fixture.try_runtime().is_ok());
        }
    }
}

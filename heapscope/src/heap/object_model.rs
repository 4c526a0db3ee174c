//! Object header decoding and size recovery
//!
//! Everything here is heuristic-safe: callers pass addresses that may not
//! hold an object at all, so every read returns a [`ReadError`] instead of
//! trusting the memory.

use crate::domain::{Address, InspectError, ReadError};
use crate::vm::constants::ConstantCatalog;
use crate::vm::flags::VmFlags;
use crate::vm::layout::{FreeChunk, JavaLangClass, Klass, OopDesc, StructTag, Universe};
use crate::vm::structs::{Location, Scope};
use crate::vm::types::TypeId;
use log::debug;

/// Bit layout of `Klass::_layout_helper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutHelperBits {
    pub instance_slow_path_bit: i32,
    pub array_tag_shift: u32,
    pub array_tag_type_value: i32,
    pub array_tag_obj_value: i32,
    pub header_size_shift: u32,
    pub header_size_mask: i32,
    pub log2_element_size_shift: u32,
    pub log2_element_size_mask: i32,
}

impl LayoutHelperBits {
    /// # Errors
    /// [`InspectError::MissingConstant`]
    pub fn read(constants: &ConstantCatalog) -> Result<Self, InspectError> {
        let shift = |name: &str| constants.int(name).map(i32::unsigned_abs);
        Ok(Self {
            instance_slow_path_bit: constants.int("Klass::_lh_instance_slow_path_bit")?,
            array_tag_shift: shift("Klass::_lh_array_tag_shift")?,
            array_tag_type_value: constants.int("Klass::_lh_array_tag_type_value")?,
            array_tag_obj_value: constants.int("Klass::_lh_array_tag_obj_value")?,
            header_size_shift: shift("Klass::_lh_header_size_shift")?,
            header_size_mask: constants.int("Klass::_lh_header_size_mask")?,
            log2_element_size_shift: shift("Klass::_lh_log2_element_size_shift")?,
            log2_element_size_mask: constants.int("Klass::_lh_log2_element_size_mask")?,
        })
    }

    #[must_use]
    pub fn decode(&self, layout_helper: i32) -> Layout {
        match layout_helper {
            lh if lh > 0 => Layout::Instance {
                size: u64::from((lh & !self.instance_slow_path_bit).unsigned_abs()),
                slow_path: lh & self.instance_slow_path_bit != 0,
            },
            lh if lh < 0 => {
                let tag = lh >> self.array_tag_shift;
                if tag != self.array_tag_type_value && tag != self.array_tag_obj_value {
                    return Layout::Invalid;
                }
                Layout::Array {
                    header: u64::from(
                        ((lh >> self.header_size_shift) & self.header_size_mask).unsigned_abs(),
                    ),
                    log2_element_size: ((lh >> self.log2_element_size_shift)
                        & self.log2_element_size_mask)
                        .unsigned_abs(),
                }
            }
            _ => Layout::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Instance { size: u64, slow_path: bool },
    Array { header: u64, log2_element_size: u32 },
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarrowKlass {
    pub base: Address,
    pub shift: u32,
}

impl NarrowKlass {
    #[must_use]
    pub fn decode(&self, narrow: u32) -> Address {
        (u64::from(narrow) << self.shift).wrapping_add(self.base)
    }
}

/// Injected `java.lang.Class` field offsets, in bytes from the mirror start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorOffsets {
    pub klass: u64,
    pub array_klass: u64,
    pub oop_size: u64,
}

/// Free-chunk encoding in the mark word, used when oops are compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkBits {
    pub cms_shift: u32,
    pub cms_mask: u64,
    pub size_shift: u32,
}

#[derive(Debug, Clone)]
pub struct ObjectModel {
    heap_word_size: u64,
    object_alignment: u64,
    narrow_klass: Option<NarrowKlass>,
    klass_slot_offset: u64,
    array_length_offset: u64,
    layout: LayoutHelperBits,
    mirror: MirrorOffsets,
    mark: Option<MarkBits>,
    klass_type: TypeId,
    mirror_type: Option<TypeId>,
}

fn non_negative(value: i32, name: &'static str) -> Result<u64, InspectError> {
    u64::try_from(value).map_err(|_| InspectError::Config(format!("{name} is negative ({value})")))
}

impl ObjectModel {
    /// # Errors
    /// Missing constants or types, or unreadable static state
    pub fn new(
        scope: Scope<'_>,
        constants: &ConstantCatalog,
        flags: &VmFlags,
        free_list: bool,
    ) -> Result<Self, InspectError> {
        let types = scope.types();
        let heap_word_size = non_negative(constants.int("HeapWordSize")?, "HeapWordSize")?;

        let narrow_klass = if flags.use_compressed_class_pointers {
            let universe = scope.static_view::<Universe>();
            Some(NarrowKlass {
                base: universe.narrow_klass_base()?,
                shift: universe.narrow_klass_shift()?.unsigned_abs(),
            })
        } else {
            None
        };

        let klass_slot = if flags.use_compressed_class_pointers {
            OopDesc::compressed_klass
        } else {
            OopDesc::klass
        };
        let klass_slot_offset = match scope.overlay().binding(StructTag::OopDesc, klass_slot)?.location {
            Location::Instance(offset) => offset,
            Location::Static(_) => {
                return Err(InspectError::Config("oopDesc klass field is static".into()));
            }
        };

        let array_header = types
            .size_of("arrayOopDesc")
            .ok_or_else(|| InspectError::MissingType("arrayOopDesc".into()))?;
        let array_length_offset =
            if flags.use_compressed_class_pointers { array_header - 4 } else { array_header };

        let class = scope.static_view::<JavaLangClass>();
        let mirror = MirrorOffsets {
            klass: non_negative(class.klass_offset()?, "java_lang_Class::_klass_offset")?,
            array_klass: non_negative(
                class.array_klass_offset()?,
                "java_lang_Class::_array_klass_offset",
            )?,
            oop_size: non_negative(class.oop_size_offset()?, "java_lang_Class::_oop_size_offset")?,
        };

        let mark = if free_list && flags.use_compressed_oops {
            let cms_mask = constants
                .find_long("markOopDesc::cms_mask")
                .or_else(|| constants.find_int("markOopDesc::cms_mask").map(|m| u64::from(m.unsigned_abs())))
                .ok_or_else(|| InspectError::MissingConstant("markOopDesc::cms_mask".into()))?;
            Some(MarkBits {
                cms_shift: constants.int("markOopDesc::cms_shift")?.unsigned_abs(),
                cms_mask,
                size_shift: constants.int("markOopDesc::size_shift")?.unsigned_abs(),
            })
        } else {
            None
        };

        let model = Self {
            heap_word_size,
            object_alignment: flags.object_alignment,
            narrow_klass,
            klass_slot_offset,
            array_length_offset,
            layout: LayoutHelperBits::read(constants)?,
            mirror,
            mark,
            klass_type: types.id("Klass").ok_or_else(|| InspectError::MissingType("Klass".into()))?,
            mirror_type: types.id("InstanceMirrorKlass"),
        };
        debug!("{model:?}");
        Ok(model)
    }

    #[must_use]
    pub fn heap_word_size(&self) -> u64 {
        self.heap_word_size
    }

    #[must_use]
    pub fn object_alignment(&self) -> u64 {
        self.object_alignment
    }

    #[must_use]
    pub fn array_length_offset(&self) -> u64 {
        self.array_length_offset
    }

    #[must_use]
    pub fn layout_bits(&self) -> &LayoutHelperBits {
        &self.layout
    }

    #[must_use]
    pub fn align_object(&self, size: u64) -> u64 {
        align_up(size, self.object_alignment)
    }

    /// Bytes past a TLAB's end reserved for the filler array header.
    #[must_use]
    pub fn tlab_reserve(&self) -> u64 {
        self.align_object(align_up(self.array_length_offset + 4, self.heap_word_size))
    }

    /// Raw class pointer in the header at `oop`, decoded if compressed.
    ///
    /// # Errors
    /// The header cannot be read
    pub fn read_klass(&self, scope: Scope<'_>, oop: Address) -> Result<Address, ReadError> {
        let header = scope.view::<OopDesc>(oop);
        match self.narrow_klass {
            Some(narrow) => header.compressed_klass().map(|n| narrow.decode(n)),
            None => header.klass(),
        }
    }

    /// Whether `klass` plausibly points at class metadata.
    #[must_use]
    pub fn is_klass(&self, scope: Scope<'_>, klass: Address) -> bool {
        let space = scope.space();
        klass != 0
            && klass % space.pointer_size() as u64 == 0
            && space.is_mapped(klass)
            && scope.view::<Klass>(klass).is_instance_of_type(self.klass_type)
    }

    fn is_mirror_klass(&self, scope: Scope<'_>, klass: Address) -> bool {
        self.mirror_type.is_some_and(|mirror| scope.view::<Klass>(klass).is_instance_of_type(mirror))
    }

    /// Size in bytes of the object at `oop` whose class is `klass`.
    ///
    /// # Errors
    /// Unreadable fields, or a header that decodes to an impossible size
    pub fn object_size(&self, scope: Scope<'_>, oop: Address, klass: Address) -> Result<u64, ReadError> {
        let space = scope.space();
        let layout_helper = scope.view::<Klass>(klass).layout_helper()?;
        match self.layout.decode(layout_helper) {
            Layout::Instance { size, slow_path } => {
                let size = if slow_path && self.is_mirror_klass(scope, klass) {
                    let words = space.read_i32(oop + self.mirror.oop_size)?;
                    u64::try_from(words).unwrap_or(0) * self.heap_word_size
                } else {
                    size
                };
                if size == 0 || size % self.heap_word_size != 0 {
                    return Err(ReadError::Implausible { address: oop, reason: "instance size" });
                }
                Ok(size)
            }
            Layout::Array { header, log2_element_size } => {
                let length = space.read_i32(oop + self.array_length_offset)?;
                let length = u64::try_from(length)
                    .map_err(|_| ReadError::Implausible { address: oop, reason: "negative array length" })?;
                Ok(self.align_object(header + (length << log2_element_size)))
            }
            Layout::Invalid => Err(ReadError::Implausible { address: klass, reason: "layout helper" }),
        }
    }

    /// True if the class slot of `candidate` is really the `klass` or
    /// `array_klass` field inside a mirror that starts below it.
    #[must_use]
    pub fn is_mirror_field(&self, scope: Scope<'_>, candidate: Address, bottom: Address) -> bool {
        let slot = candidate + self.klass_slot_offset;
        [self.mirror.klass, self.mirror.array_klass].into_iter().any(|field| {
            let Some(mirror) = slot.checked_sub(field) else {
                return false;
            };
            if mirror < bottom || mirror >= candidate {
                return false;
            }
            self.read_klass(scope, mirror)
                .is_ok_and(|klass| self.is_klass(scope, klass) && self.is_mirror_klass(scope, klass))
        })
    }

    /// Size of the free chunk at `chunk`, or `None` if it holds an object.
    ///
    /// # Errors
    /// Unreadable chunk header
    pub fn free_chunk_size(&self, scope: Scope<'_>, chunk: Address) -> Result<Option<u64>, ReadError> {
        if let Some(bits) = self.mark {
            let mark = scope.view::<OopDesc>(chunk).mark()?;
            if (mark >> bits.cms_shift) & bits.cms_mask == 0 {
                return Ok(None);
            }
            return self.chunk_bytes(chunk, mark >> bits.size_shift).map(Some);
        }
        let free = scope.view::<FreeChunk>(chunk);
        if free.prev()? & 1 == 0 {
            return Ok(None);
        }
        self.chunk_bytes(chunk, free.size()?).map(Some)
    }

    fn chunk_bytes(&self, chunk: Address, words: u64) -> Result<u64, ReadError> {
        words
            .checked_mul(self.heap_word_size)
            .ok_or(ReadError::Implausible { address: chunk, reason: "free chunk size overflows" })
    }
}

#[must_use]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

//! # Struct overlay
//!
//! Native structs are declared once, in [`super::layout`], as a list of field
//! contracts: owning type, field name, expected C type and the way the field
//! is read. At attach time every contract is looked up in the runtime's own
//! field table and checked:
//!
//! - the field must exist with the declared C type,
//! - its native width must equal the width the accessor reads,
//! - its offset (or static address) must be aligned for that width.
//!
//! The result is a [`BoundField`] per contract: a location plus an access
//! mode. Reading a field through a [`View`] is then one table index and one
//! cached read, with no name lookups.
//!
//! `vm_structs!` turns the declarations into a marker type per struct kind,
//! the [`StructTag`] enum over all kinds, field index constants and typed
//! accessor methods on `View<'_, Kind>`.

use super::fields::FieldTable;
use super::layout::StructTag;
use super::types::{TypeCatalog, TypeId};
use crate::domain::{Address, InspectError, ReadError};
use crate::memory::AddressSpace;
use log::{debug, info};
use std::marker::PhantomData;

/// How a bound field is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Fixed-width integer of this many bytes.
    Scalar(usize),
    /// Pointer-width integer.
    Word,
    /// `char*` followed to a NUL-terminated string.
    CString,
    /// Pointer to another struct kind.
    Pointer,
    /// Another struct kind embedded at the field's location.
    Inline,
    /// Only the field's address is used.
    Offset,
}

/// A declared field contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub owner: &'static str,
    pub name: &'static str,
    /// `None` for fields the runtime publishes without a C type.
    pub signature: Option<&'static str>,
    pub access: Access,
}

impl FieldSpec {
    /// An empty `signature` declares an unchecked field.
    #[must_use]
    pub const fn new(
        owner: &'static str,
        name: &'static str,
        signature: &'static str,
        access: Access,
    ) -> Self {
        let signature = if signature.is_empty() { None } else { Some(signature) };
        Self { owner, name, signature, access }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Static(Address),
    Instance(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundField {
    pub location: Location,
    pub access: Access,
}

impl BoundField {
    #[must_use]
    pub fn resolve(&self, base: Address) -> Address {
        match self.location {
            Location::Static(address) => address,
            Location::Instance(offset) => base.wrapping_add(offset),
        }
    }
}

/// A native struct kind with a declared field list.
pub trait StructKind: Copy {
    const TAG: StructTag;
    const TYPE_NAME: &'static str;
    const FIELDS: &'static [FieldSpec];
}

/// Struct kinds whose instances start with a vtable pointer.
pub trait Dynamic: StructKind {}

/// Maps a declared return type to what an accessor hands back.
pub trait FieldOut<'a> {
    type Out;
}

macro_rules! plain_field_out {
    ($($t:ty),*) => {
        $(impl<'a> FieldOut<'a> for $t { type Out = $t; })*
    };
}

plain_field_out!(bool, u8, u16, u32, u64, i32, i64, String, Option<String>);

fn bind_field(
    spec: &FieldSpec,
    space: &AddressSpace,
    types: &TypeCatalog,
    fields: &FieldTable,
) -> Result<BoundField, InspectError> {
    let info = fields.get(spec.owner, spec.name).ok_or_else(|| InspectError::MissingField {
        owner: spec.owner.to_string(),
        field: spec.name.to_string(),
        signature: spec.signature.unwrap_or("<unchecked>").to_string(),
    })?;
    let (location, raw) = if info.is_static {
        (Location::Static(info.address), info.address)
    } else {
        (Location::Instance(info.offset), info.offset)
    };

    let Some(expected) = spec.signature else {
        return Ok(BoundField { location, access: spec.access });
    };
    if info.signature.as_deref() != Some(expected) {
        return Err(InspectError::FieldSignatureMismatch {
            owner: spec.owner.to_string(),
            field: spec.name.to_string(),
            expected: expected.to_string(),
            found: info.signature.clone().unwrap_or_else(|| "<unchecked>".to_string()),
        });
    }

    let pointer = space.pointer_size();
    let native = if expected.ends_with('*') {
        pointer
    } else {
        let size = types.size_of(expected).ok_or_else(|| InspectError::UnknownFieldType {
            owner: spec.owner.to_string(),
            field: spec.name.to_string(),
            signature: expected.to_string(),
        })?;
        usize::try_from(size).unwrap_or(usize::MAX)
    };
    let declared = match spec.access {
        Access::Scalar(width) => Some(width),
        Access::Word | Access::CString | Access::Pointer => Some(pointer),
        Access::Inline | Access::Offset => None,
    };
    if let Some(declared) = declared {
        if declared != native {
            return Err(InspectError::FieldWidthMismatch {
                owner: spec.owner.to_string(),
                field: spec.name.to_string(),
                declared,
                native,
            });
        }
        if raw % declared as u64 != 0 {
            return Err(InspectError::MisalignedField {
                owner: spec.owner.to_string(),
                field: spec.name.to_string(),
                location: raw,
                width: declared,
            });
        }
    }
    Ok(BoundField { location, access: spec.access })
}

/// Bound field tables, one per struct kind that has been bound.
#[derive(Debug)]
pub struct StructOverlay {
    tables: Vec<Option<Box<[BoundField]>>>,
}

impl Default for StructOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl StructOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self { tables: vec![None; StructTag::ALL.len()] }
    }

    /// Bind every field of every listed kind; already bound kinds are skipped.
    ///
    /// # Errors
    /// The first contract that the runtime's tables contradict
    pub fn bind(
        &mut self,
        tags: &[StructTag],
        space: &AddressSpace,
        types: &TypeCatalog,
        fields: &FieldTable,
    ) -> Result<(), InspectError> {
        let mut bound = 0usize;
        for &tag in tags {
            if self.is_bound(tag) {
                continue;
            }
            let table = tag
                .fields()
                .iter()
                .map(|spec| bind_field(spec, space, types, fields))
                .collect::<Result<Vec<_>, _>>()?;
            debug!("Bound {} ({} fields)", tag.type_name(), table.len());
            bound += table.len();
            self.tables[tag as usize] = Some(table.into_boxed_slice());
        }
        if bound > 0 {
            info!("Struct overlay: {bound} fields bound across {} kinds", tags.len());
        }
        Ok(())
    }

    #[must_use]
    pub fn is_bound(&self, tag: StructTag) -> bool {
        self.tables[tag as usize].is_some()
    }

    /// # Errors
    /// [`ReadError::Unbound`] if the kind was never bound
    pub fn binding(&self, tag: StructTag, index: usize) -> Result<&BoundField, ReadError> {
        self.tables[tag as usize]
            .as_deref()
            .and_then(|table| table.get(index))
            .ok_or(ReadError::Unbound(tag.type_name()))
    }
}

/// Everything a [`View`] needs to read fields.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    space: &'a AddressSpace,
    types: &'a TypeCatalog,
    overlay: &'a StructOverlay,
}

impl<'a> Scope<'a> {
    #[must_use]
    pub fn new(space: &'a AddressSpace, types: &'a TypeCatalog, overlay: &'a StructOverlay) -> Self {
        Self { space, types, overlay }
    }

    #[must_use]
    pub fn view<K: StructKind>(self, address: Address) -> View<'a, K> {
        View { scope: self, address, kind: PhantomData }
    }

    /// View for reading static fields; the address is irrelevant.
    #[must_use]
    pub fn static_view<K: StructKind>(self) -> View<'a, K> {
        self.view(0)
    }

    #[must_use]
    pub fn space(&self) -> &'a AddressSpace {
        self.space
    }

    #[must_use]
    pub fn types(&self) -> &'a TypeCatalog {
        self.types
    }

    #[must_use]
    pub fn overlay(&self) -> &'a StructOverlay {
        self.overlay
    }
}

/// A struct of kind `K` at some address.
///
/// Views are plain values; [`View::rebind`] moves one to another address so
/// a scan loop can reuse it. Field values read before a rebind are copies and
/// stay valid.
pub struct View<'a, K> {
    scope: Scope<'a>,
    address: Address,
    kind: PhantomData<K>,
}

impl<K> Clone for View<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for View<'_, K> {}

impl<K: StructKind> std::fmt::Debug for View<'_, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@0x{:x}", K::TYPE_NAME, self.address)
    }
}

impl<'a, K: StructKind> View<'a, K> {
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    pub fn rebind(&mut self, address: Address) {
        self.address = address;
    }

    /// Same scope and kind, another address.
    #[must_use]
    pub fn at(&self, address: Address) -> Self {
        self.scope.view(address)
    }

    /// Reinterpret the same address as another kind, unchecked.
    #[must_use]
    pub fn cast<T: StructKind>(&self) -> View<'a, T> {
        self.scope.view(self.address)
    }

    #[must_use]
    pub fn scope(&self) -> Scope<'a> {
        self.scope
    }

    fn binding(&self, index: usize) -> Result<&'a BoundField, ReadError> {
        self.scope.overlay.binding(K::TAG, index)
    }

    /// # Errors
    /// [`ReadError::Unbound`] if `K` was never bound
    pub fn field_address(&self, index: usize) -> Result<Address, ReadError> {
        Ok(self.binding(index)?.resolve(self.address))
    }

    /// # Errors
    /// Unbound kind or unreadable field
    pub fn read_u8(&self, index: usize) -> Result<u8, ReadError> {
        self.scope.space.read_u8(self.field_address(index)?)
    }

    /// # Errors
    /// Unbound kind or unreadable field
    pub fn read_bool(&self, index: usize) -> Result<bool, ReadError> {
        self.scope.space.read_bool(self.field_address(index)?)
    }

    /// # Errors
    /// Unbound kind or unreadable field
    pub fn read_u16(&self, index: usize) -> Result<u16, ReadError> {
        self.scope.space.read_u16(self.field_address(index)?)
    }

    /// # Errors
    /// Unbound kind or unreadable field
    pub fn read_u32(&self, index: usize) -> Result<u32, ReadError> {
        self.scope.space.read_u32(self.field_address(index)?)
    }

    /// # Errors
    /// Unbound kind or unreadable field
    pub fn read_i32(&self, index: usize) -> Result<i32, ReadError> {
        self.scope.space.read_i32(self.field_address(index)?)
    }

    /// # Errors
    /// Unbound kind or unreadable field
    pub fn read_u64(&self, index: usize) -> Result<u64, ReadError> {
        self.scope.space.read_u64(self.field_address(index)?)
    }

    /// # Errors
    /// Unbound kind or unreadable field
    pub fn read_word(&self, index: usize) -> Result<u64, ReadError> {
        self.scope.space.read_pointer(self.field_address(index)?)
    }

    /// # Errors
    /// Unbound kind, unreadable pointer or string
    pub fn read_c_string(&self, index: usize) -> Result<Option<String>, ReadError> {
        self.scope.space.read_c_string(self.field_address(index)?)
    }

    /// Follow a pointer field, or step into an embedded one.
    ///
    /// # Errors
    /// Unbound kind or unreadable pointer
    pub fn read_view<T: StructKind>(&self, index: usize) -> Result<View<'a, T>, ReadError> {
        let field = self.binding(index)?;
        let address = field.resolve(self.address);
        let target = match field.access {
            Access::Pointer => self.scope.space.read_pointer(address)?,
            _ => address,
        };
        Ok(self.scope.view(target))
    }
}

impl<'a, K: Dynamic> View<'a, K> {
    /// Type of the object by its vtable, if it is a known dynamic type.
    #[must_use]
    pub fn dynamic_type(&self) -> Option<TypeId> {
        self.scope.types.dynamic_type(self.scope.space, self.address)
    }

    #[must_use]
    pub fn dynamic_type_name(&self) -> Option<&'a str> {
        let types = self.scope.types;
        self.dynamic_type().map(|id| types.info(id).name.as_str())
    }

    #[must_use]
    pub fn is_instance_of_type(&self, ancestor: TypeId) -> bool {
        self.dynamic_type().is_some_and(|id| self.scope.types.is_subclass_of(id, ancestor))
    }

    #[must_use]
    pub fn is_instance_of_name(&self, name: &str) -> bool {
        self.scope.types.id(name).is_some_and(|ancestor| self.is_instance_of_type(ancestor))
    }

    #[must_use]
    pub fn is_instance_of<T: StructKind>(&self) -> bool {
        self.is_instance_of_name(T::TYPE_NAME)
    }

    /// The same address viewed as `T` if its dynamic type allows it.
    #[must_use]
    pub fn dynamic_cast<T: StructKind>(&self) -> Option<View<'a, T>> {
        self.is_instance_of::<T>().then(|| self.cast())
    }
}

/// Declares struct kinds and generates their markers and accessors.
///
/// ```text
/// struct Klass = "Klass" dynamic {
///     layout_helper: i32 -> i32 = ("Klass", "_layout_helper", "jint");
/// }
/// ```
///
/// Access keywords: `u8 bool u16 u32 i32 u64 word cstr ptr inline offset`.
/// Scalar accessors may widen into a larger return type.
macro_rules! vm_structs {
    (@access u8) => { $crate::vm::structs::Access::Scalar(1) };
    (@access bool) => { $crate::vm::structs::Access::Scalar(1) };
    (@access u16) => { $crate::vm::structs::Access::Scalar(2) };
    (@access u32) => { $crate::vm::structs::Access::Scalar(4) };
    (@access i32) => { $crate::vm::structs::Access::Scalar(4) };
    (@access u64) => { $crate::vm::structs::Access::Scalar(8) };
    (@access word) => { $crate::vm::structs::Access::Word };
    (@access cstr) => { $crate::vm::structs::Access::CString };
    (@access ptr) => { $crate::vm::structs::Access::Pointer };
    (@access inline) => { $crate::vm::structs::Access::Inline };
    (@access offset) => { $crate::vm::structs::Access::Offset };

    (@read u8 $view:ident, $index:expr, $ret:ty) => { $view.read_u8($index).map(Into::into) };
    (@read bool $view:ident, $index:expr, $ret:ty) => { $view.read_bool($index) };
    (@read u16 $view:ident, $index:expr, $ret:ty) => { $view.read_u16($index).map(Into::into) };
    (@read u32 $view:ident, $index:expr, $ret:ty) => { $view.read_u32($index).map(Into::into) };
    (@read i32 $view:ident, $index:expr, $ret:ty) => { $view.read_i32($index).map(Into::into) };
    (@read u64 $view:ident, $index:expr, $ret:ty) => { $view.read_u64($index) };
    (@read word $view:ident, $index:expr, $ret:ty) => { $view.read_word($index) };
    (@read cstr $view:ident, $index:expr, $ret:ty) => { $view.read_c_string($index) };
    (@read ptr $view:ident, $index:expr, $ret:ty) => { $view.read_view::<$ret>($index) };
    (@read inline $view:ident, $index:expr, $ret:ty) => { $view.read_view::<$ret>($index) };
    (@read offset $view:ident, $index:expr, $ret:ty) => { $view.field_address($index) };

    (@dynamic $kind:ident dynamic) => {
        impl $crate::vm::structs::Dynamic for $kind {}
    };

    (@consts $kind:ident [$index:expr]) => {};
    (@consts $kind:ident [$index:expr] $accessor:ident $($rest:ident)*) => {
        #[allow(non_upper_case_globals)]
        impl $kind {
            pub const $accessor: usize = $index;
        }
        vm_structs!(@consts $kind [$index + 1] $($rest)*);
    };

    (
        $(
            $(#[$meta:meta])*
            struct $kind:ident = $type_name:literal $($dynamic:ident)? {
                $(
                    $(#[$field_meta:meta])*
                    $accessor:ident : $access:ident -> $ret:ty =
                        ($owner:literal, $field:literal, $signature:literal);
                )*
            }
        )*
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StructTag {
            $($kind,)*
        }

        impl StructTag {
            pub const ALL: &'static [StructTag] = &[$(StructTag::$kind,)*];

            #[must_use]
            pub fn type_name(self) -> &'static str {
                match self {
                    $(StructTag::$kind => $type_name,)*
                }
            }

            #[must_use]
            pub fn fields(self) -> &'static [$crate::vm::structs::FieldSpec] {
                match self {
                    $(StructTag::$kind => <$kind as $crate::vm::structs::StructKind>::FIELDS,)*
                }
            }
        }

        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $kind;

            vm_structs!(@consts $kind [0usize] $($accessor)*);

            impl $crate::vm::structs::StructKind for $kind {
                const TAG: StructTag = StructTag::$kind;
                const TYPE_NAME: &'static str = $type_name;
                const FIELDS: &'static [$crate::vm::structs::FieldSpec] = &[
                    $(
                        $crate::vm::structs::FieldSpec::new(
                            $owner,
                            $field,
                            $signature,
                            vm_structs!(@access $access),
                        ),
                    )*
                ];
            }

            impl<'a> $crate::vm::structs::FieldOut<'a> for $kind {
                type Out = $crate::vm::structs::View<'a, $kind>;
            }

            $(vm_structs!(@dynamic $kind $dynamic);)?

            impl<'a> $crate::vm::structs::View<'a, $kind> {
                $(
                    $(#[$field_meta])*
                    #[allow(clippy::missing_errors_doc)]
                    pub fn $accessor(
                        &self,
                    ) -> Result<
                        <$ret as $crate::vm::structs::FieldOut<'a>>::Out,
                        $crate::domain::ReadError,
                    > {
                        vm_structs!(@read $access self, $kind::$accessor, $ret)
                    }
                )*
            }
        )*
    };
}

pub(crate) use vm_structs;

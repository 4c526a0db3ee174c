//! Native type table
//!
//! Built once from `gHotSpotVMTypes`. Types with a resolvable vtable symbol
//! are dynamic and indexed by vtable address so that the first word of an
//! arbitrary block of memory can be checked against them.

use super::table::MetadataTable;
use crate::domain::{Address, InspectError};
use crate::memory::AddressSpace;
use log::{debug, info};
use std::collections::HashMap;

/// Index of a type in its [`TypeCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub superclass: Option<String>,
    pub size: u64,
    pub is_oop: bool,
    pub is_integer: bool,
    pub is_unsigned: bool,
    /// The vtable address objects of this type carry, if it has one.
    pub vtable: Option<Address>,
}

impl TypeInfo {
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.vtable.is_some()
    }
}

#[derive(Debug, Default)]
pub struct TypeCatalog {
    types: Vec<TypeInfo>,
    parents: Vec<Option<TypeId>>,
    by_name: HashMap<String, TypeId>,
    by_vtable: HashMap<Address, TypeId>,
}

impl TypeCatalog {
    /// # Errors
    /// Missing bootstrap symbols or unreadable table entries
    pub fn read(space: &AddressSpace) -> Result<Self, InspectError> {
        let table = MetadataTable::open(
            space,
            "gHotSpotVMTypes",
            "gHotSpotVMTypeEntryArrayStride",
            "gHotSpotVMTypeEntryTypeNameOffset",
        )?;
        let superclass_col = table.column("gHotSpotVMTypeEntrySuperclassNameOffset")?;
        let is_oop_col = table.column("gHotSpotVMTypeEntryIsOopTypeOffset")?;
        let is_integer_col = table.column("gHotSpotVMTypeEntryIsIntegerTypeOffset")?;
        let is_unsigned_col = table.column("gHotSpotVMTypeEntryIsUnsignedOffset")?;
        let size_col = table.column("gHotSpotVMTypeEntrySizeOffset")?;

        let mut types = Vec::new();
        table.for_each(|entry, name| {
            let vtable = space.lookup_vtable(&name);
            types.push(TypeInfo {
                superclass: space.read_c_string(entry + superclass_col)?,
                is_oop: space.read_i32(entry + is_oop_col)? != 0,
                is_integer: space.read_i32(entry + is_integer_col)? != 0,
                is_unsigned: space.read_i32(entry + is_unsigned_col)? != 0,
                size: space.read_u64(entry + size_col)?,
                vtable,
                name,
            });
            Ok(())
        })?;

        let catalog = Self::from_types(types);
        info!(
            "Type catalog: {} types, {} with vtables",
            catalog.types.len(),
            catalog.by_vtable.len()
        );
        Ok(catalog)
    }

    /// Index an already decoded type list. Later duplicates of a name are ignored.
    #[must_use]
    pub fn from_types(types: Vec<TypeInfo>) -> Self {
        let mut catalog = Self::default();
        for info in types {
            if catalog.by_name.contains_key(&info.name) {
                debug!("Duplicate type entry {} ignored", info.name);
                continue;
            }
            let id = TypeId(catalog.types.len());
            catalog.by_name.insert(info.name.clone(), id);
            if let Some(vtable) = info.vtable {
                catalog.by_vtable.entry(vtable).or_insert(id);
            }
            catalog.types.push(info);
        }
        catalog.parents = catalog
            .types
            .iter()
            .map(|t| t.superclass.as_deref().and_then(|s| catalog.by_name.get(s).copied()))
            .collect();
        catalog
    }

    #[must_use]
    pub fn id(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn info(&self, id: TypeId) -> &TypeInfo {
        &self.types[id.0]
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.id(name).map(|id| self.info(id))
    }

    #[must_use]
    pub fn size_of(&self, name: &str) -> Option<u64> {
        self.get(name).map(|t| t.size)
    }

    #[must_use]
    pub fn parent(&self, id: TypeId) -> Option<TypeId> {
        self.parents[id.0]
    }

    /// Identity or transitive superclass match.
    #[must_use]
    pub fn is_subclass_of(&self, id: TypeId, ancestor: TypeId) -> bool {
        let mut current = Some(id);
        // bounded by the table size in case the parent links form a cycle
        for _ in 0..=self.types.len() {
            match current {
                Some(t) if t == ancestor => return true,
                Some(t) => current = self.parent(t),
                None => return false,
            }
        }
        false
    }

    /// Name-based variant of [`Self::is_subclass_of`]; unknown names never match.
    #[must_use]
    pub fn is_subclass_of_name(&self, name: &str, ancestor: &str) -> bool {
        match (self.id(name), self.id(ancestor)) {
            (Some(t), Some(a)) => self.is_subclass_of(t, a),
            _ => false,
        }
    }

    #[must_use]
    pub fn type_for_vtable(&self, vtable: Address) -> Option<TypeId> {
        self.by_vtable.get(&vtable).copied()
    }

    /// Dynamic type of the object at `address`, judged by its first word.
    ///
    /// Unreadable memory is simply "unknown": the address may not hold an
    /// object at all.
    #[must_use]
    pub fn dynamic_type(&self, space: &AddressSpace, address: Address) -> Option<TypeId> {
        let vtable = space.read_pointer(address).ok()?;
        self.type_for_vtable(vtable)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeInfo)> {
        self.types.iter().enumerate().map(|(i, t)| (TypeId(i), t))
    }
}

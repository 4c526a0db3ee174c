//! Field table built from `gHotSpotVMStructs`

use super::table::MetadataTable;
use crate::domain::{Address, InspectError};
use crate::memory::AddressSpace;
use log::info;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub owner: String,
    pub name: String,
    /// C type as spelled in the runtime's declaration; some entries leave it out.
    pub signature: Option<String>,
    pub is_static: bool,
    /// Byte offset for instance fields.
    pub offset: u64,
    /// Absolute address for static fields.
    pub address: Address,
}

#[derive(Debug, Default)]
pub struct FieldTable {
    fields: HashMap<(String, String), FieldInfo>,
}

impl FieldTable {
    /// # Errors
    /// Missing bootstrap symbols or unreadable table entries
    pub fn read(space: &AddressSpace) -> Result<Self, InspectError> {
        let table = MetadataTable::open(
            space,
            "gHotSpotVMStructs",
            "gHotSpotVMStructEntryArrayStride",
            "gHotSpotVMStructEntryTypeNameOffset",
        )?;
        let field_name_col = table.column("gHotSpotVMStructEntryFieldNameOffset")?;
        let type_string_col = table.column("gHotSpotVMStructEntryTypeStringOffset")?;
        let is_static_col = table.column("gHotSpotVMStructEntryIsStaticOffset")?;
        let offset_col = table.column("gHotSpotVMStructEntryOffsetOffset")?;
        let address_col = table.column("gHotSpotVMStructEntryAddressOffset")?;

        let mut fields = Vec::new();
        table.for_each(|entry, owner| {
            let Some(name) = space.read_c_string(entry + field_name_col)? else {
                return Ok(());
            };
            fields.push(FieldInfo {
                owner,
                name,
                signature: space.read_c_string(entry + type_string_col)?,
                is_static: space.read_i32(entry + is_static_col)? != 0,
                offset: space.read_u64(entry + offset_col)?,
                address: space.read_pointer(entry + address_col)?,
            });
            Ok(())
        })?;

        let table = Self::from_fields(fields);
        info!("Field table: {} fields", table.len());
        Ok(table)
    }

    #[must_use]
    pub fn from_fields(fields: Vec<FieldInfo>) -> Self {
        let mut table = Self::default();
        for field in fields {
            table.fields.entry((field.owner.clone(), field.name.clone())).or_insert(field);
        }
        table
    }

    #[must_use]
    pub fn get(&self, owner: &str, name: &str) -> Option<&FieldInfo> {
        self.fields.get(&(owner.to_string(), name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

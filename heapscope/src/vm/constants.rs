//! Named integer and long constants (`gHotSpotVMIntConstants`, `gHotSpotVMLongConstants`)

use super::table::MetadataTable;
use crate::domain::InspectError;
use crate::memory::AddressSpace;
use log::info;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct ConstantCatalog {
    ints: HashMap<String, i32>,
    longs: HashMap<String, u64>,
}

impl ConstantCatalog {
    /// # Errors
    /// Missing bootstrap symbols or unreadable table entries
    pub fn read(space: &AddressSpace) -> Result<Self, InspectError> {
        let mut catalog = Self::default();

        let table = MetadataTable::open(
            space,
            "gHotSpotVMIntConstants",
            "gHotSpotVMIntConstantEntryArrayStride",
            "gHotSpotVMIntConstantEntryNameOffset",
        )?;
        let value_col = table.column("gHotSpotVMIntConstantEntryValueOffset")?;
        table.for_each(|entry, name| {
            catalog.ints.insert(name, space.read_i32(entry + value_col)?);
            Ok(())
        })?;

        let table = MetadataTable::open(
            space,
            "gHotSpotVMLongConstants",
            "gHotSpotVMLongConstantEntryArrayStride",
            "gHotSpotVMLongConstantEntryNameOffset",
        )?;
        let value_col = table.column("gHotSpotVMLongConstantEntryValueOffset")?;
        table.for_each(|entry, name| {
            catalog.longs.insert(name, space.read_u64(entry + value_col)?);
            Ok(())
        })?;

        info!("Constant catalog: {} int, {} long constants", catalog.ints.len(), catalog.longs.len());
        Ok(catalog)
    }

    #[must_use]
    pub fn find_int(&self, name: &str) -> Option<i32> {
        self.ints.get(name).copied()
    }

    #[must_use]
    pub fn find_long(&self, name: &str) -> Option<u64> {
        self.longs.get(name).copied()
    }

    /// # Errors
    /// [`InspectError::MissingConstant`]
    pub fn int(&self, name: &str) -> Result<i32, InspectError> {
        self.find_int(name).ok_or_else(|| InspectError::MissingConstant(name.to_string()))
    }

    /// # Errors
    /// [`InspectError::MissingConstant`]
    pub fn long(&self, name: &str) -> Result<u64, InspectError> {
        self.find_long(name).ok_or_else(|| InspectError::MissingConstant(name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ints.len() + self.longs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

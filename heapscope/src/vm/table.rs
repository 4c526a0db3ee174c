//! Walker for the runtime's self-describing metadata arrays
//!
//! Each array is exported as a pointer global, its element stride and every
//! column offset as `uint64_t` globals. The array ends at the first entry
//! whose name column holds a null pointer.

use crate::domain::{Address, InspectError, ReadError};
use crate::memory::AddressSpace;

/// Upper bound on entries in any one table; a walk past this is reading garbage.
const MAX_ENTRIES: u64 = 1 << 20;

pub struct MetadataTable<'a> {
    space: &'a AddressSpace,
    base: Address,
    stride: u64,
    name_column: u64,
}

impl<'a> MetadataTable<'a> {
    /// # Errors
    /// [`InspectError::MissingSymbol`] for any of the three globals, or a
    /// read error / zero stride.
    pub fn open(
        space: &'a AddressSpace,
        array_symbol: &str,
        stride_symbol: &str,
        name_column_symbol: &str,
    ) -> Result<Self, InspectError> {
        let base = space.read_pointer(space.lookup_symbol(array_symbol)?)?;
        let stride = space.read_u64(space.lookup_symbol(stride_symbol)?)?;
        if stride == 0 {
            return Err(ReadError::Implausible { address: base, reason: "zero table stride" }.into());
        }
        let name_column = space.read_u64(space.lookup_symbol(name_column_symbol)?)?;
        Ok(Self { space, base, stride, name_column })
    }

    /// Byte offset of a column within each entry.
    ///
    /// # Errors
    /// [`InspectError::MissingSymbol`] or a read error
    pub fn column(&self, symbol: &str) -> Result<u64, InspectError> {
        Ok(self.space.read_u64(self.space.lookup_symbol(symbol)?)?)
    }

    #[must_use]
    pub fn space(&self) -> &'a AddressSpace {
        self.space
    }

    /// Call `visit(entry_address, name)` for every entry up to the terminator.
    ///
    /// # Errors
    /// Propagates read errors and errors from `visit`
    pub fn for_each<F>(&self, mut visit: F) -> Result<u64, InspectError>
    where
        F: FnMut(Address, String) -> Result<(), InspectError>,
    {
        let mut entry = self.base;
        for index in 0..MAX_ENTRIES {
            let Some(name) = self.space.read_c_string(entry + self.name_column)? else {
                return Ok(index);
            };
            visit(entry, name)?;
            entry += self.stride;
        }
        Err(ReadError::Implausible { address: self.base, reason: "metadata table is not terminated" }
            .into())
    }
}

//! # Inferior
//!
//! An inferior is "a block of addressable memory I can read" plus the symbol
//! lookups needed to find the runtime's self-describing tables in it.
//!
//! - [`SelfInferior`]: the inspector's own process, read through
//!   `/proc/self/mem` so that unmapped addresses fail the read instead of
//!   faulting.
//! - [`MemoryImage`]: a sparse in-memory address space with a symbol map,
//!   used to replay captured or synthetic runtime images.

pub mod image;
pub mod self_process;

pub use image::MemoryImage;
pub use self_process::SelfInferior;

use crate::domain::{Address, InspectError};

pub trait Inferior {
    /// Fill `buf` from `address`; returns the number of bytes read, which is
    /// short when the range runs into unmapped memory.
    fn read(&self, address: Address, buf: &mut [u8]) -> usize;

    fn is_mapped(&self, address: Address) -> bool {
        let mut byte = [0u8; 1];
        self.read(address, &mut byte) == 1
    }

    fn lookup_symbol(&self, name: &str) -> Option<Address>;

    /// Address a dynamically dispatched object of `type_name` stores in its
    /// first word.
    fn lookup_vtable(&self, type_name: &str) -> Option<Address> {
        let symbol = vtable_symbol(type_name);
        // Itanium vtables start with offset-to-top and the RTTI pointer.
        let header = 2 * self.pointer_size() as u64;
        self.lookup_symbol(&symbol).map(|address| address.wrapping_add(header))
    }

    /// 4 or 8
    fn pointer_size(&self) -> usize;

    /// Re-derive anything that depends on the memory map.
    ///
    /// # Errors
    /// Returns an error if the memory map or a required image cannot be read.
    fn reset(&mut self) -> Result<(), InspectError>;

    fn detach(&mut self);
}

/// Itanium C++ ABI vtable symbol for a (possibly `::`-nested) type name.
#[must_use]
pub fn vtable_symbol(type_name: &str) -> String {
    let parts: Vec<&str> = type_name.split("::").collect();
    if parts.len() == 1 {
        return format!("_ZTV{}{}", type_name.len(), type_name);
    }
    let mut symbol = String::from("_ZTVN");
    for part in parts {
        symbol.push_str(&part.len().to_string());
        symbol.push_str(part);
    }
    symbol.push('E');
    symbol
}

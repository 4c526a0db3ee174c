//! Runtime command line flags that change object layout

use super::layout::Flag;
use super::structs::Scope;
use super::types::TypeCatalog;
use crate::domain::{InspectError, ReadError};
use log::{debug, info};

/// Generous upper bound on the flag table length.
const MAX_FLAGS: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmFlags {
    pub use_compressed_oops: bool,
    pub use_compressed_class_pointers: bool,
    pub use_tlab: bool,
    /// `ObjectAlignmentInBytes`
    pub object_alignment: u64,
}

impl Default for VmFlags {
    fn default() -> Self {
        Self {
            use_compressed_oops: false,
            use_compressed_class_pointers: false,
            use_tlab: false,
            object_alignment: 8,
        }
    }
}

impl VmFlags {
    /// Scan the flag table for the flags the heap walk depends on.
    ///
    /// # Errors
    /// Missing `Flag` type or unreadable flag table
    pub fn read(scope: Scope<'_>, types: &TypeCatalog) -> Result<Self, InspectError> {
        let stride = types.size_of("Flag").ok_or_else(|| InspectError::MissingType("Flag".into()))?;
        let table = scope.static_view::<Flag>();
        let count = table.num_flags()?;
        if count > MAX_FLAGS {
            return Err(ReadError::Implausible { address: table.flags()?.address(), reason: "flag count" }
                .into());
        }

        let space = scope.space();
        let mut flags = Self::default();
        let mut flag = table.flags()?;
        for _ in 0..count {
            let Some(name) = flag.flag_name()? else {
                break;
            };
            match name.as_str() {
                "UseCompressedOops" => flags.use_compressed_oops = space.read_bool(flag.value_address()?)?,
                "UseCompressedClassPointers" => {
                    flags.use_compressed_class_pointers = space.read_bool(flag.value_address()?)?;
                }
                "UseTLAB" => flags.use_tlab = space.read_bool(flag.value_address()?)?,
                "ObjectAlignmentInBytes" => {
                    debug!("ObjectAlignmentInBytes has type {:?}", flag.flag_type()?);
                    flags.object_alignment = space.read_pointer(flag.value_address()?)?;
                }
                _ => {}
            }
            flag.rebind(flag.address() + stride);
        }

        if !flags.object_alignment.is_power_of_two() {
            return Err(ReadError::Implausible {
                address: table.flags()?.address(),
                reason: "ObjectAlignmentInBytes is not a power of two",
            }
            .into());
        }
        info!(
            "Flags: UseCompressedOops={} UseCompressedClassPointers={} UseTLAB={} ObjectAlignmentInBytes={}",
            flags.use_compressed_oops,
            flags.use_compressed_class_pointers,
            flags.use_tlab,
            flags.object_alignment
        );
        Ok(flags)
    }
}

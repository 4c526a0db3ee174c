//! Address newtypes and ranges

use serde::Serialize;
use std::fmt;

/// A location in the inspected address space.
pub type Address = u64;

/// Half-open byte range `[start, end)` in the inspected address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AddressRange {
    pub start: Address,
    pub end: Address,
}

impl AddressRange {
    #[must_use]
    pub fn new(start: Address, end: Address) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered, zero for inverted ranges.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Check if an address falls within this range
    #[must_use]
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.end
    }

    #[must_use]
    pub fn overlaps(&self, other: &AddressRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:x}, 0x{:x})", self.start, self.end)
    }
}

/// Address of a class metadata structure; identifies a class for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct KlassAddress(pub Address);

impl fmt::Display for KlassAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Klass@0x{:x}", self.0)
    }
}

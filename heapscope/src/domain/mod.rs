//! Domain model for heapscope
//!
//! This module contains core domain types and errors that provide:
//! - Address ranges shared by the symbol, memory and heap layers
//! - Newtypes for values that must not be mixed up with plain addresses
//! - Structured error handling for fatal and transient conditions

pub mod errors;
pub mod types;

pub use types::{Address, AddressRange, KlassAddress};

pub use errors::{ElfError, ExportError, InspectError, ReadError};

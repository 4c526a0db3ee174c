//! # Symbol Resolution
//!
//! The inspected runtime describes its own internal layout through a handful
//! of exported global symbols (`gHotSpotVMTypes`, `gHotSpotVMStructs`, ...).
//! Locating them needs no debugger: every loaded object is an ELF file on
//! disk whose symbol table gives link-time values, and the process's own
//! memory map says where each object was loaded.
//!
//! ```text
//! Runtime Address = Load Base + Link-time Value
//! Load Base       = Offset-0 Mapping Start - Link Address of File Offset 0
//! ```
//!
//! For PIE executables and shared objects the link address of file offset 0
//! is 0, so the load base is the mapping start. Fixed-address executables
//! relocate by zero.
//!
//! The table must be rebuilt when objects are loaded or unloaded; see
//! [`SelfInferior::reset`](crate::inferior::SelfInferior).

pub mod elf;
pub mod memory_maps;
pub mod symbol_table;

pub use elf::ElfSymbols;
pub use memory_maps::{parse_maps, read_self_maps, MapEntry};
pub use symbol_table::{loaded_objects, read_process_symbols, LoadedObject, SymbolTable};

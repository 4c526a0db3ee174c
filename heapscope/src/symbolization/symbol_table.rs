//! Process-wide symbol table
//!
//! Every file-backed ELF object in the memory map contributes its function
//! and data symbols, relocated by the object's load base. The first object
//! defining a name wins, matching dynamic linker lookup order.

use super::elf::ElfSymbols;
use super::memory_maps::{read_self_maps, MapEntry};
use crate::domain::{ElfError, InspectError};
use log::{debug, info, warn};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A file-backed object and the address its offset-0 mapping starts at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedObject {
    pub path: PathBuf,
    pub map_start: u64,
}

/// Collect the loaded objects of a memory map in address order
#[must_use]
pub fn loaded_objects(maps: &[MapEntry]) -> Vec<LoadedObject> {
    let mut seen = HashSet::new();
    maps.iter()
        .filter(|entry| entry.offset == 0)
        .filter_map(|entry| {
            let path = entry.path.as_ref()?;
            seen.insert(path.clone())
                .then(|| LoadedObject { path: path.clone(), map_start: entry.range.start })
        })
        .collect()
}

/// Symbol name to absolute address
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, u64>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table for a set of loaded objects
    ///
    /// Objects that are not ELF images or cannot be read are skipped with a
    /// log line, except `required`, whose failure is fatal.
    ///
    /// # Errors
    /// Returns [`InspectError::Elf`] if the required object cannot be parsed
    pub fn for_objects(
        objects: &[LoadedObject],
        required: Option<&Path>,
    ) -> Result<Self, InspectError> {
        let mut table = Self::new();
        for object in objects {
            match ElfSymbols::read(&object.path) {
                Ok(symbols) => {
                    let base = object.map_start.wrapping_sub(symbols.link_base());
                    let added = table.merge(&symbols, base);
                    debug!(
                        "{}: {} symbols, base 0x{base:x}, {added} new",
                        object.path.display(),
                        symbols.len()
                    );
                }
                Err(source) if required == Some(object.path.as_path()) => {
                    return Err(InspectError::Elf { path: object.path.clone(), source });
                }
                Err(ElfError::BadMagic) => {
                    debug!("{} is not an ELF image", object.path.display());
                }
                Err(e) => warn!("Skipping symbols of {}: {e}", object.path.display()),
            }
        }
        info!("Resolved {} symbols across {} loaded objects", table.len(), objects.len());
        Ok(table)
    }

    /// Add one object's symbols relocated by `base`; returns how many were new
    pub fn merge(&mut self, symbols: &ElfSymbols, base: u64) -> usize {
        let mut added = 0;
        for (name, value) in symbols.iter() {
            if let Entry::Vacant(slot) = self.symbols.entry(name.to_owned()) {
                slot.insert(base.wrapping_add(value));
                added += 1;
            }
        }
        added
    }

    pub fn insert(&mut self, name: impl Into<String>, address: u64) {
        self.symbols.entry(name.into()).or_insert(address);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Loaded objects and their merged symbols for the current process
///
/// The main executable is the required image.
///
/// # Errors
/// Returns an error if the memory map cannot be read or the executable
/// cannot be parsed
pub fn read_process_symbols() -> Result<(Vec<LoadedObject>, SymbolTable), InspectError> {
    let objects = loaded_objects(&read_self_maps()?);
    let exe = std::fs::read_link("/proc/self/exe").ok();
    let table = SymbolTable::for_objects(&objects, exe.as_deref())?;
    Ok((objects, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AddressRange;

    fn entry(start: u64, offset: u64, path: Option<&str>) -> MapEntry {
        MapEntry {
            range: AddressRange::new(start, start + 0x1000),
            readable: true,
            offset,
            path: path.map(PathBuf::from),
        }
    }

    #[test]
    fn test_loaded_objects_first_offset_zero_mapping() {
        let maps = vec![
            entry(0x1000, 0, Some("/bin/app")),
            entry(0x2000, 0x1000, Some("/bin/app")),
            entry(0x8000, 0, None),
            entry(0x9000, 0, Some("/lib/libjvm.so")),
            entry(0xa000, 0, Some("/lib/libjvm.so")),
        ];
        let objects = loaded_objects(&maps);
        assert_eq!(
            objects,
            vec![
                LoadedObject { path: PathBuf::from("/bin/app"), map_start: 0x1000 },
                LoadedObject { path: PathBuf::from("/lib/libjvm.so"), map_start: 0x9000 },
            ]
        );
    }

    #[test]
    fn test_first_definition_wins() {
        let mut table = SymbolTable::new();
        table.insert("gHotSpotVMTypes", 0x1000);
        table.insert("gHotSpotVMTypes", 0x2000);
        assert_eq!(table.get("gHotSpotVMTypes"), Some(0x1000));
        assert_eq!(table.get("missing"), None);
    }

    #[test]
    fn test_missing_required_object_is_fatal() {
        let objects =
            vec![LoadedObject { path: PathBuf::from("/nonexistent/libjvm.so"), map_start: 0 }];
        let err = SymbolTable::for_objects(&objects, Some(Path::new("/nonexistent/libjvm.so")))
            .expect_err("required image must load");
        assert!(matches!(err, InspectError::Elf { .. }));
        assert!(SymbolTable::for_objects(&objects, None).is_ok());
    }

    #[test]
    fn test_own_process_symbols() {
        let (objects, table) = read_process_symbols().expect("own symbols");
        assert!(!objects.is_empty());
        assert!(!table.is_empty());
    }
}

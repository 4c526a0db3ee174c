//! The inspector's own address space

use super::Inferior;
use crate::domain::{Address, InspectError};
use crate::symbolization::{read_process_symbols, LoadedObject, SymbolTable};
use log::info;
use std::fs::File;
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;

/// Reads the current process through `/proc/self/mem`.
///
/// Unlike dereferencing raw pointers, a read of an unmapped address returns
/// an error from the kernel, which becomes a short read.
pub struct SelfInferior {
    mem: Option<File>,
    objects: Vec<LoadedObject>,
    symbols: SymbolTable,
}

impl SelfInferior {
    /// Open the own address space and build the process symbol table
    ///
    /// # Errors
    /// Returns an error if `/proc/self/mem` or `/proc/self/maps` cannot be
    /// read, or the main executable cannot be parsed
    pub fn open() -> Result<Self, InspectError> {
        let mem = File::open("/proc/self/mem")?;
        let (objects, symbols) = read_process_symbols()?;
        Ok(Self { mem: Some(mem), objects, symbols })
    }

    #[must_use]
    pub fn loaded_objects(&self) -> &[LoadedObject] {
        &self.objects
    }

    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }
}

impl Inferior for SelfInferior {
    fn read(&self, address: Address, buf: &mut [u8]) -> usize {
        let Some(mem) = &self.mem else {
            return 0;
        };
        let mut done = 0;
        while done < buf.len() {
            let Some(at) = address.checked_add(done as u64) else {
                break;
            };
            match mem.read_at(&mut buf[done..], at) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        done
    }

    fn lookup_symbol(&self, name: &str) -> Option<Address> {
        self.symbols.get(name)
    }

    fn pointer_size(&self) -> usize {
        std::mem::size_of::<usize>()
    }

    fn reset(&mut self) -> Result<(), InspectError> {
        let (objects, symbols) = read_process_symbols()?;
        if objects != self.objects {
            info!(
                "Loaded objects changed ({} -> {}), symbol table rebuilt",
                self.objects.len(),
                objects.len()
            );
            self.objects = objects;
            self.symbols = symbols;
        }
        Ok(())
    }

    fn detach(&mut self) {
        self.mem = None;
    }
}

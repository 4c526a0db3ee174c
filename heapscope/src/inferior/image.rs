//! Sparse in-memory address space
//!
//! Segments are byte vectors keyed by start address. Handles are cheap
//! clones of the same image, so a test or a replay driver can keep writing
//! into memory that an `AddressSpace` already owns.

use super::Inferior;
use crate::domain::{Address, InspectError};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Debug, Default)]
struct ImageState {
    segments: BTreeMap<Address, Vec<u8>>,
    symbols: HashMap<String, Address>,
    resets: u64,
    detached: bool,
}

impl ImageState {
    fn segment_containing(&self, address: Address) -> Option<(Address, &Vec<u8>)> {
        let (&start, data) = self.segments.range(..=address).next_back()?;
        (address - start < data.len() as u64).then_some((start, data))
    }

    fn segment_containing_mut(&mut self, address: Address) -> Option<(Address, &mut Vec<u8>)> {
        let (&start, data) = self.segments.range_mut(..=address).next_back()?;
        (address - start < data.len() as u64).then_some((start, data))
    }
}

#[derive(Debug, Clone)]
pub struct MemoryImage {
    state: Rc<RefCell<ImageState>>,
    pointer_size: usize,
}

impl MemoryImage {
    /// # Panics
    /// Panics if `pointer_size` is neither 4 nor 8.
    #[must_use]
    pub fn new(pointer_size: usize) -> Self {
        assert!(pointer_size == 4 || pointer_size == 8, "pointer size must be 4 or 8");
        Self { state: Rc::new(RefCell::new(ImageState::default())), pointer_size }
    }

    /// Map `len` zeroed bytes at `start`, replacing any segment that starts there.
    pub fn map(&self, start: Address, len: usize) {
        self.state.borrow_mut().segments.insert(start, vec![0; len]);
    }

    pub fn unmap(&self, start: Address) {
        self.state.borrow_mut().segments.remove(&start);
    }

    /// Copy `bytes` into mapped memory; returns false if any byte falls outside a segment.
    pub fn write(&self, address: Address, bytes: &[u8]) -> bool {
        let mut state = self.state.borrow_mut();
        let mut done = 0usize;
        while done < bytes.len() {
            let at = address + done as u64;
            let Some((start, data)) = state.segment_containing_mut(at) else {
                return false;
            };
            let offset = (at - start) as usize;
            let n = (data.len() - offset).min(bytes.len() - done);
            data[offset..offset + n].copy_from_slice(&bytes[done..done + n]);
            done += n;
        }
        true
    }

    pub fn write_u8(&self, address: Address, value: u8) -> bool {
        self.write(address, &[value])
    }

    pub fn write_u16(&self, address: Address, value: u16) -> bool {
        self.write(address, &value.to_ne_bytes())
    }

    pub fn write_u32(&self, address: Address, value: u32) -> bool {
        self.write(address, &value.to_ne_bytes())
    }

    pub fn write_i32(&self, address: Address, value: i32) -> bool {
        self.write(address, &value.to_ne_bytes())
    }

    pub fn write_u64(&self, address: Address, value: u64) -> bool {
        self.write(address, &value.to_ne_bytes())
    }

    /// Write a pointer-sized word; values wider than a 4-byte pointer are truncated.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_word(&self, address: Address, value: u64) -> bool {
        if self.pointer_size == 4 {
            self.write_u32(address, value as u32)
        } else {
            self.write_u64(address, value)
        }
    }

    pub fn define_symbol(&self, name: impl Into<String>, address: Address) {
        self.state.borrow_mut().symbols.insert(name.into(), address);
    }

    /// Number of times [`Inferior::reset`] has been called on any handle.
    #[must_use]
    pub fn reset_count(&self) -> u64 {
        self.state.borrow().resets
    }
}

impl Inferior for MemoryImage {
    fn read(&self, address: Address, buf: &mut [u8]) -> usize {
        let state = self.state.borrow();
        if state.detached {
            return 0;
        }
        let mut done = 0usize;
        while done < buf.len() {
            let Some(at) = address.checked_add(done as u64) else {
                break;
            };
            let Some((start, data)) = state.segment_containing(at) else {
                break;
            };
            let offset = (at - start) as usize;
            let n = (data.len() - offset).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&data[offset..offset + n]);
            done += n;
        }
        done
    }

    fn lookup_symbol(&self, name: &str) -> Option<Address> {
        self.state.borrow().symbols.get(name).copied()
    }

    fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    fn reset(&mut self) -> Result<(), InspectError> {
        self.state.borrow_mut().resets += 1;
        Ok(())
    }

    fn detach(&mut self) {
        self.state.borrow_mut().detached = true;
    }
}

//! Cached, paged reads over an [`Inferior`]
//!
//! Every multi-byte scalar read must be naturally aligned. Since page sizes
//! are powers of two no smaller than 4 KiB, an aligned scalar never straddles
//! a page and is served from a single cached page.

use super::page_cache::PageCache;
use crate::config::PageCacheConfig;
use crate::domain::{Address, InspectError, ReadError};
use crate::inferior::Inferior;
use log::debug;
use std::cell::RefCell;
use std::rc::Rc;

/// Longest C string accepted before the read is declared implausible.
const MAX_C_STRING: usize = 64 * 1024;

pub struct AddressSpace {
    inferior: Box<dyn Inferior>,
    cache: RefCell<PageCache>,
    page_size: u64,
    pointer_size: usize,
}

impl AddressSpace {
    #[must_use]
    pub fn new(inferior: Box<dyn Inferior>, config: &PageCacheConfig) -> Self {
        let pointer_size = inferior.pointer_size();
        Self {
            inferior,
            cache: RefCell::new(PageCache::new(config.capacity)),
            page_size: config.page_size.bytes(),
            pointer_size,
        }
    }

    #[must_use]
    pub fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    #[must_use]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    fn page_base(&self, address: Address) -> Address {
        address & !(self.page_size - 1)
    }

    fn page(&self, base: Address) -> Rc<[u8]> {
        if let Some(data) = self.cache.borrow_mut().get(base) {
            return data;
        }
        let mut buf = vec![0u8; self.page_size as usize];
        let n = self.inferior.read(base, &mut buf);
        buf.truncate(n);
        let data: Rc<[u8]> = Rc::from(buf);
        self.cache.borrow_mut().insert(base, Rc::clone(&data));
        data
    }

    fn read_scalar<const N: usize>(&self, address: Address) -> Result<[u8; N], ReadError> {
        if address % N as u64 != 0 {
            return Err(ReadError::Misaligned { address, width: N });
        }
        let base = self.page_base(address);
        let offset = (address - base) as usize;
        let page = self.page(base);
        page.get(offset..offset + N)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(ReadError::NotMapped { address })
    }

    /// # Errors
    /// [`ReadError::NotMapped`] if the byte cannot be read
    pub fn read_u8(&self, address: Address) -> Result<u8, ReadError> {
        self.read_scalar::<1>(address).map(|b| b[0])
    }

    /// # Errors
    /// [`ReadError::NotMapped`] if the byte cannot be read
    pub fn read_bool(&self, address: Address) -> Result<bool, ReadError> {
        self.read_u8(address).map(|b| b != 0)
    }

    /// # Errors
    /// [`ReadError::Misaligned`] or [`ReadError::NotMapped`]
    pub fn read_u16(&self, address: Address) -> Result<u16, ReadError> {
        self.read_scalar(address).map(u16::from_ne_bytes)
    }

    /// # Errors
    /// [`ReadError::Misaligned`] or [`ReadError::NotMapped`]
    pub fn read_u32(&self, address: Address) -> Result<u32, ReadError> {
        self.read_scalar(address).map(u32::from_ne_bytes)
    }

    /// # Errors
    /// [`ReadError::Misaligned`] or [`ReadError::NotMapped`]
    pub fn read_i32(&self, address: Address) -> Result<i32, ReadError> {
        self.read_scalar(address).map(i32::from_ne_bytes)
    }

    /// # Errors
    /// [`ReadError::Misaligned`] or [`ReadError::NotMapped`]
    pub fn read_u64(&self, address: Address) -> Result<u64, ReadError> {
        self.read_scalar(address).map(u64::from_ne_bytes)
    }

    /// # Errors
    /// [`ReadError::Misaligned`] or [`ReadError::NotMapped`]
    pub fn read_i64(&self, address: Address) -> Result<i64, ReadError> {
        self.read_scalar(address).map(i64::from_ne_bytes)
    }

    /// Pointer-width read, zero-extended to 64 bits.
    ///
    /// # Errors
    /// [`ReadError::Misaligned`] or [`ReadError::NotMapped`]
    pub fn read_pointer(&self, address: Address) -> Result<Address, ReadError> {
        if self.pointer_size == 4 {
            self.read_u32(address).map(u64::from)
        } else {
            self.read_u64(address)
        }
    }

    /// Unaligned bulk read that may cross pages.
    ///
    /// # Errors
    /// [`ReadError::NotMapped`] naming the first unreadable byte
    pub fn read_bytes(&self, address: Address, buf: &mut [u8]) -> Result<(), ReadError> {
        let mut done = 0usize;
        while done < buf.len() {
            let at = address
                .checked_add(done as u64)
                .ok_or(ReadError::NotMapped { address: u64::MAX })?;
            let base = self.page_base(at);
            let offset = (at - base) as usize;
            let page = self.page(base);
            if offset >= page.len() {
                return Err(ReadError::NotMapped { address: at });
            }
            let n = (page.len() - offset).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&page[offset..offset + n]);
            done += n;
        }
        Ok(())
    }

    /// Follow the pointer stored at `address` and read the NUL-terminated
    /// string it points to. A null pointer yields `None`.
    ///
    /// # Errors
    /// [`ReadError::NotMapped`] if the pointer or any byte up to the NUL is
    /// unreadable, [`ReadError::Implausible`] for unterminated strings
    pub fn read_c_string(&self, address: Address) -> Result<Option<String>, ReadError> {
        let start = self.read_pointer(address)?;
        if start == 0 {
            return Ok(None);
        }
        let mut bytes = Vec::new();
        let mut at = start;
        loop {
            let base = self.page_base(at);
            let offset = (at - base) as usize;
            let page = self.page(base);
            if offset >= page.len() {
                return Err(ReadError::NotMapped { address: at });
            }
            let chunk = &page[offset..];
            if let Some(nul) = chunk.iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&chunk[..nul]);
                break;
            }
            bytes.extend_from_slice(chunk);
            if bytes.len() > MAX_C_STRING {
                return Err(ReadError::Implausible { address: start, reason: "unterminated string" });
            }
            at = base + page.len() as u64;
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    #[must_use]
    pub fn is_mapped(&self, address: Address) -> bool {
        let base = self.page_base(address);
        ((address - base) as usize) < self.page(base).len()
    }

    /// Resolve a symbol the inspection cannot proceed without.
    ///
    /// # Errors
    /// [`InspectError::MissingSymbol`] naming the symbol
    pub fn lookup_symbol(&self, name: &str) -> Result<Address, InspectError> {
        self.inferior.lookup_symbol(name).ok_or_else(|| InspectError::MissingSymbol(name.to_string()))
    }

    #[must_use]
    pub fn find_symbol(&self, name: &str) -> Option<Address> {
        self.inferior.lookup_symbol(name)
    }

    #[must_use]
    pub fn lookup_vtable(&self, type_name: &str) -> Option<Address> {
        self.inferior.lookup_vtable(type_name)
    }

    /// Forget the cached page holding `address`, so the next read sees
    /// current memory.
    pub fn invalidate(&self, address: Address) {
        let base = self.page_base(address);
        self.cache.borrow_mut().remove(base);
    }

    /// Invalidate every cached page and let the inferior re-derive its maps.
    ///
    /// # Errors
    /// Propagates the inferior's reset failure
    pub fn reset(&mut self) -> Result<(), InspectError> {
        let cache = self.cache.get_mut();
        let (hits, misses) = cache.stats();
        debug!("Page cache reset: {} pages dropped ({hits} hits, {misses} misses)", cache.len());
        cache.clear();
        self.inferior.reset()
    }

    pub fn detach(&mut self) {
        self.cache.get_mut().clear();
        self.inferior.detach();
    }
}

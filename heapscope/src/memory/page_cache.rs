//! Least-recently-used page cache

use crate::domain::Address;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

struct CachedPage {
    data: Rc<[u8]>,
    stamp: u64,
}

/// Pages keyed by their aligned base address.
///
/// A page's data holds only the readable prefix, so an unmapped page is
/// cached as an empty slice and a partially readable one as a short slice.
pub struct PageCache {
    capacity: usize,
    pages: HashMap<Address, CachedPage>,
    /// stamp -> page base, oldest first
    recency: BTreeMap<u64, Address>,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl PageCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pages: HashMap::with_capacity(capacity.min(4096)),
            recency: BTreeMap::new(),
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, base: Address) -> Option<Rc<[u8]>> {
        self.clock += 1;
        let Some(page) = self.pages.get_mut(&base) else {
            self.misses += 1;
            return None;
        };
        self.recency.remove(&page.stamp);
        page.stamp = self.clock;
        self.recency.insert(self.clock, base);
        self.hits += 1;
        Some(Rc::clone(&page.data))
    }

    pub fn insert(&mut self, base: Address, data: Rc<[u8]>) {
        self.clock += 1;
        if let Some(old) = self.pages.insert(base, CachedPage { data, stamp: self.clock }) {
            self.recency.remove(&old.stamp);
        }
        self.recency.insert(self.clock, base);
        while self.pages.len() > self.capacity {
            let Some((_, victim)) = self.recency.pop_first() else {
                break;
            };
            self.pages.remove(&victim);
        }
    }

    pub fn remove(&mut self, base: Address) -> bool {
        match self.pages.remove(&base) {
            Some(page) => {
                self.recency.remove(&page.stamp);
                true
            }
            None => false,
        }
    }

    /// Drop every page. Counters survive.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.recency.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// (hits, misses)
    #[must_use]
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

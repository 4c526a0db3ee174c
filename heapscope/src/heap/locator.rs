//! Heuristic object boundary recovery
//!
//! A probe lands somewhere inside a live region. Walking backward one heap
//! word at a time, each candidate address is read as an object header; the
//! first header whose class pointer resolves to class metadata decides the
//! probe. The walk never looks further once a header is found: if that
//! object ends before the probe the probe is a miss, which bounds the cost of
//! a bad guess.

use super::object_model::ObjectModel;
use crate::config::SamplerConfig;
use crate::domain::{Address, KlassAddress};
use crate::vm::{Runtime, Scope};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbedObject {
    pub address: Address,
    pub klass: KlassAddress,
    pub size: u64,
}

impl ProbedObject {
    #[must_use]
    pub fn end(&self) -> Address {
        self.address.saturating_add(self.size)
    }
}

/// Why a probe did not produce an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    /// Reached the region bottom without seeing a header.
    NoHeader,
    /// The nearest header belongs to an object that ends before the probe.
    Overshoot,
    /// No candidate between the probe and the scan floor could be read.
    Unreadable,
    /// A header was found but its size could not be recovered.
    Corrupt,
    /// Gave up after the configured backward scan distance.
    ScanLimit,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissReason::NoHeader => "no header",
            MissReason::Overshoot => "overshoot",
            MissReason::Unreadable => "unreadable",
            MissReason::Corrupt => "corrupt",
            MissReason::ScanLimit => "scan limit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Hit(ProbedObject),
    Miss(MissReason),
}

/// Not thread safe; one locator per sampling run.
pub struct ObjectLocator<'a> {
    scope: Scope<'a>,
    model: &'a ObjectModel,
    word: u64,
    max_scan: u64,
    large_threshold: u64,
    large_capacity: usize,
    large: BTreeMap<Address, ProbedObject>,
    cache_hits: u64,
}

impl<'a> ObjectLocator<'a> {
    #[must_use]
    pub fn new(runtime: &'a Runtime, config: &SamplerConfig) -> Self {
        let model = runtime.object_model();
        Self {
            scope: runtime.scope(),
            model,
            word: model.heap_word_size(),
            max_scan: config.max_scan_bytes,
            large_threshold: config.large_object_threshold,
            large_capacity: config.large_object_cache_entries,
            large: BTreeMap::new(),
            cache_hits: 0,
        }
    }

    /// Find the object containing `probe`, scanning no lower than `bottom`.
    pub fn probe_for_object(&mut self, probe: Address, bottom: Address) -> Probe {
        if let Some(object) = self.cached(probe, bottom) {
            self.cache_hits += 1;
            return Probe::Hit(object);
        }

        let mut cur = probe & !(self.word - 1);
        if cur < bottom {
            return Probe::Miss(MissReason::NoHeader);
        }
        let floor = bottom.max(cur.saturating_sub(self.max_scan));
        let mut any_readable = false;
        loop {
            // an unreadable class slot (e.g. past the region top) is not a header
            let klass = self.model.read_klass(self.scope, cur).ok();
            any_readable |= klass.is_some();
            if let Some(klass) = klass.filter(|&k| {
                self.model.is_klass(self.scope, k) && !self.model.is_mirror_field(self.scope, cur, bottom)
            }) {
                let Ok(size) = self.model.object_size(self.scope, cur, klass) else {
                    return Probe::Miss(MissReason::Corrupt);
                };
                let object = ProbedObject { address: cur, klass: KlassAddress(klass), size };
                if object.end() <= probe {
                    return Probe::Miss(MissReason::Overshoot);
                }
                self.remember(object);
                return Probe::Hit(object);
            }
            if cur < floor + self.word {
                let reason = if !any_readable {
                    MissReason::Unreadable
                } else if floor > bottom {
                    MissReason::ScanLimit
                } else {
                    MissReason::NoHeader
                };
                return Probe::Miss(reason);
            }
            cur -= self.word;
        }
    }

    fn cached(&mut self, probe: Address, bottom: Address) -> Option<ProbedObject> {
        let (&start, &object) = self.large.range(..=probe).next_back()?;
        if start < bottom || probe >= object.end() {
            return None;
        }
        // the object may have been collected since it was cached
        match self.model.read_klass(self.scope, start) {
            Ok(klass) if klass == object.klass.0 => Some(object),
            _ => {
                self.large.remove(&start);
                None
            }
        }
    }

    fn remember(&mut self, object: ProbedObject) {
        if object.size < self.large_threshold || self.large_capacity == 0 {
            return;
        }
        if self.large.len() >= self.large_capacity {
            self.large.pop_first();
        }
        self.large.insert(object.address, object);
    }

    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    #[must_use]
    pub fn cached_objects(&self) -> usize {
        self.large.len()
    }
}

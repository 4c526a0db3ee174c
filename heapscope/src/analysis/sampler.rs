//! Statistical heap sampling.
//!
//! Draws uniformly distributed byte offsets over the concatenated live
//! regions, recovers the object under each one and aggregates hits by class.
//! A class's share of hits estimates its share of live bytes.
//!
//! # Architecture
//!
//! - **`SampleTally`** - Per-class aggregation as probes resolve
//! - **`StatisticalSampler::run()`** - One complete pass over a fresh region list
//!
//! ## Data Flow
//!
//! ```text
//! HeapRegionCollector.collect()
//!     │
//!     ▼
//! prefix sums ──► uniform offset ──► (region, probe address)
//!                                         │
//!                                         ▼
//!                             ObjectLocator.probe_for_object()
//!                                         │
//!                        ┌────────────────┴────────────────┐
//!                        ▼                                 ▼
//!             SampleTally.record_hit()          SampleTally.record_miss()
//! ```
//!
//! # Performance
//!
//! - Region lookup per probe: O(log r) via binary search over prefix sums
//! - Object lookup per probe: bounded by the backward scan limit
//! - Memory: O(distinct classes hit)

use super::random::SampleRng;
use super::report::{ClassEstimate, SamplingReport};
use crate::config::SamplerConfig;
use crate::domain::{Address, InspectError, KlassAddress};
use crate::heap::{HeapRegionCollector, LiveRegion, MissReason, ObjectLocator, Probe, SpaceKind};
use crate::vm::layout::Klass;
use crate::vm::{Runtime, Scope};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

// =============================================================================
// SAMPLE TALLY (AGGREGATOR)
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ClassStats {
    hits: u64,
    /// Sum of hit object sizes, for the average object size.
    bytes: u64,
}

/// Hit and miss counts of one sampling run.
#[derive(Debug, Default)]
pub struct SampleTally {
    classes: HashMap<KlassAddress, ClassStats>,
    misses: BTreeMap<MissReason, u64>,
    total_samples: u64,
    total_hits: u64,
}

impl SampleTally {
    pub fn record_hit(&mut self, klass: KlassAddress, size: u64) {
        let stats = self.classes.entry(klass).or_default();
        stats.hits += 1;
        stats.bytes += size;
        self.total_samples += 1;
        self.total_hits += 1;
    }

    pub fn record_miss(&mut self, reason: MissReason) {
        *self.misses.entry(reason).or_insert(0) += 1;
        self.total_samples += 1;
    }

    #[must_use]
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    #[must_use]
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    #[must_use]
    pub fn hits_for(&self, klass: KlassAddress) -> u64 {
        self.classes.get(&klass).map_or(0, |s| s.hits)
    }

    /// Estimates for every class hit, most hits first, names resolved by `name_of`.
    pub fn to_estimates<F>(&self, live_heap_bytes: u64, mut name_of: F) -> Vec<ClassEstimate>
    where
        F: FnMut(KlassAddress) -> String,
    {
        let mut estimates: Vec<ClassEstimate> = self
            .classes
            .iter()
            .map(|(&klass, stats)| {
                ClassEstimate::new(
                    name_of(klass),
                    klass,
                    stats.hits,
                    stats.bytes,
                    self.total_hits,
                    live_heap_bytes,
                )
            })
            .collect();
        estimates.sort_unstable_by(|a, b| {
            b.hits.cmp(&a.hits).then_with(|| a.class_name.cmp(&b.class_name))
        });
        estimates
    }
}

// =============================================================================
// SAMPLER
// =============================================================================

/// Live regions indexed for uniform byte selection.
struct RegionIndex<'r> {
    regions: &'r [LiveRegion],
    /// `ends[i]` is the total size of `regions[..=i]`.
    ends: Vec<u64>,
}

impl<'r> RegionIndex<'r> {
    fn new(regions: &'r [LiveRegion]) -> Self {
        let ends = regions
            .iter()
            .scan(0u64, |total, region| {
                *total += region.range.len();
                Some(*total)
            })
            .collect();
        Self { regions, ends }
    }

    fn total(&self) -> u64 {
        self.ends.last().copied().unwrap_or(0)
    }

    /// Probe address for a byte offset into the concatenated regions, plus
    /// the bottom of the region it falls in. `None` past the end.
    fn locate(&self, offset: u64) -> Option<(Address, Address)> {
        let index = self.ends.partition_point(|&end| end <= offset);
        let region = self.regions.get(index)?;
        let before = if index == 0 { 0 } else { self.ends[index - 1] };
        Some((region.range.start + (offset - before), region.range.start))
    }
}

pub struct StatisticalSampler<'a> {
    runtime: &'a Runtime,
    config: &'a SamplerConfig,
}

impl<'a> StatisticalSampler<'a> {
    #[must_use]
    pub fn new(runtime: &'a Runtime, config: &'a SamplerConfig) -> Self {
        Self { runtime, config }
    }

    /// Collect live regions and draw `config.samples` probes over them.
    ///
    /// Individual probes never fail the run; they are counted as misses.
    ///
    /// # Errors
    /// Invalid configuration, unreadable heap structures or an unsupported heap
    pub fn run(&self) -> Result<SamplingReport, InspectError> {
        self.config.validate()?;
        let started = Instant::now();
        let gc_before = self.collections();

        let regions = HeapRegionCollector::new(self.runtime).collect()?;
        let index = RegionIndex::new(&regions);
        let live_heap_bytes = index.total();

        let seed = self.config.seed.unwrap_or_else(|| SampleRng::from_clock().next_u64());
        let mut rng = SampleRng::new(seed);
        let mut locator = ObjectLocator::new(self.runtime, self.config);
        let mut tally = SampleTally::default();

        if live_heap_bytes == 0 {
            warn!("Heap has no live regions; nothing to sample");
        } else {
            for _ in 0..self.config.samples {
                let Some((probe, bottom)) = index.locate(rng.below(live_heap_bytes)) else {
                    continue;
                };
                match locator.probe_for_object(probe, bottom) {
                    Probe::Hit(object) => tally.record_hit(object.klass, object.size),
                    Probe::Miss(reason) => tally.record_miss(reason),
                }
            }
        }
        debug!(
            "{} large objects cached, {} probes served from cache",
            locator.cached_objects(),
            locator.cache_hits()
        );

        let gc_runs = match (gc_before, self.collections()) {
            (Some(before), Some(after)) => Some(after.saturating_sub(before)),
            _ => None,
        };
        if let Some(runs) = gc_runs.filter(|&runs| runs > 0) {
            warn!("{runs} garbage collections ran during sampling; estimates may be skewed");
        }

        let scope = self.runtime.scope();
        let classes = tally.to_estimates(live_heap_bytes, |klass| class_name(scope, klass));
        let runtime_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            "Sampled {} probes over {live_heap_bytes} live bytes: {} hits, {} classes, {runtime_ms} ms",
            tally.total_samples(),
            tally.total_hits(),
            classes.len()
        );

        Ok(SamplingReport {
            heap_shape: self.runtime.shape(),
            live_heap_bytes,
            space_bytes: space_totals(&regions),
            total_samples: tally.total_samples(),
            total_hits: tally.total_hits(),
            misses: tally.misses.clone(),
            runtime_ms,
            gc_runs,
            seed,
            classes,
            min_significant_hits: self.config.min_significant_hits,
            confident: tally.total_hits() > self.config.min_total_hits,
        })
    }

    fn collections(&self) -> Option<u64> {
        match self.runtime.total_collections() {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Collection counter unreadable: {e}");
                None
            }
        }
    }
}

fn class_name(scope: Scope<'_>, klass: KlassAddress) -> String {
    scope.view::<Klass>(klass.0).external_name().unwrap_or_else(|e| {
        debug!("No name for {klass}: {e}");
        format!("<unnamed {klass}>")
    })
}

/// Bytes per space kind, for callers that only hold the region list.
#[must_use]
pub fn space_totals(regions: &[LiveRegion]) -> BTreeMap<SpaceKind, u64> {
    let mut totals = BTreeMap::new();
    for region in regions {
        *totals.entry(region.space).or_insert(0) += region.range.len();
    }
    totals
}

//! Sampling report and its tabular rendering

// Estimates are ratios of hit counts and byte totals
#![allow(clippy::cast_precision_loss)]

use crate::domain::KlassAddress;
use crate::heap::{HeapShape, MissReason, SpaceKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One class's extrapolated share of the live heap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassEstimate {
    /// Dotted class name, e.g. `java.lang.String`.
    pub class_name: String,
    pub klass: KlassAddress,
    pub hits: u64,
    /// Sum of the sizes of the objects the hits landed in.
    pub sampled_bytes: u64,
    pub heap_percent: f64,
    pub estimated_bytes: f64,
    pub estimated_count: f64,
    pub average_size: f64,
}

impl ClassEstimate {
    /// Extrapolate from `hits` out of `total_hits` over `live_heap_bytes`.
    ///
    /// Larger objects are proportionally more likely to be hit, so the
    /// instance count is the estimated byte total over the mean hit size.
    #[must_use]
    pub fn new(
        class_name: String,
        klass: KlassAddress,
        hits: u64,
        sampled_bytes: u64,
        total_hits: u64,
        live_heap_bytes: u64,
    ) -> Self {
        let share = if total_hits == 0 { 0.0 } else { hits as f64 / total_hits as f64 };
        let estimated_bytes = share * live_heap_bytes as f64;
        let average_size = if hits == 0 { 0.0 } else { sampled_bytes as f64 / hits as f64 };
        let estimated_count = if average_size > 0.0 { estimated_bytes / average_size } else { 0.0 };
        Self {
            class_name,
            klass,
            hits,
            sampled_bytes,
            heap_percent: share * 100.0,
            estimated_bytes,
            estimated_count,
            average_size,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SamplingReport {
    pub heap_shape: HeapShape,
    pub live_heap_bytes: u64,
    pub space_bytes: BTreeMap<SpaceKind, u64>,
    pub total_samples: u64,
    pub total_hits: u64,
    pub misses: BTreeMap<MissReason, u64>,
    pub runtime_ms: u64,
    /// Collections that completed while sampling, if the counter was readable.
    pub gc_runs: Option<u64>,
    pub seed: u64,
    /// Every class hit at least once, most hits first.
    pub classes: Vec<ClassEstimate>,
    pub min_significant_hits: u64,
    /// Whether enough probes hit for the +/- 3% at 99% statement.
    pub confident: bool,
}

impl SamplingReport {
    /// Classes shown in the table.
    pub fn significant_classes(&self) -> impl Iterator<Item = &ClassEstimate> {
        self.classes.iter().filter(|c| c.hits >= self.min_significant_hits)
    }

    #[must_use]
    pub fn total_misses(&self) -> u64 {
        self.misses.values().sum()
    }

    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassEstimate> {
        self.classes.iter().find(|c| c.class_name == name)
    }
}

impl fmt::Display for SamplingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Heap shape:    {}", self.heap_shape)?;
        writeln!(f, "Live heap:     {}", self.live_heap_bytes)?;
        writeln!(f, "Total samples: {}", self.total_samples)?;
        writeln!(f, "Total hits:    {}", self.total_hits)?;
        writeln!(f, "Runtime:       {} ms", self.runtime_ms)?;
        match self.gc_runs {
            Some(runs) => writeln!(f, "# GC Runs:     {runs}")?,
            None => writeln!(f, "# GC Runs:     unknown")?,
        }
        if self.total_misses() > 0 {
            let misses: Vec<String> =
                self.misses.iter().map(|(reason, count)| format!("{reason} {count}")).collect();
            writeln!(f, "Misses:        {}", misses.join(", "))?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "Hits | % of heap | Estimated Total Size | Estimated Number | Average Size | Class"
        )?;
        writeln!(f, "{}", "-".repeat(82))?;
        for class in self.significant_classes() {
            writeln!(
                f,
                "{:4} | {:8.1}% | {:20.0} | {:16.0} | {:12.0} | {}",
                class.hits,
                class.heap_percent,
                class.estimated_bytes,
                class.estimated_count,
                class.average_size,
                class.class_name
            )?;
        }
        writeln!(f)?;
        if self.confident {
            writeln!(f, "'% of heap' measurements are within +/- 3%, at the 99% confidence level")
        } else {
            writeln!(f, "THERE WAS SIGNIFICANT DATA LOSS, NUMBERS MAY BE INACCURATE")
        }
    }
}

//! # heapscope - Statistical Heap Inspector
//!
//! heapscope estimates which classes occupy the live heap of a Java runtime
//! embedded in the current process, without stopping the world and without
//! any cooperation from the runtime. It reads the runtime's self-describing
//! metadata tables, enumerates the live heap regions, throws uniformly
//! distributed probes at them and attributes each probe to the object that
//! contains it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Own Process Address Space                     │
//! │          (libjvm.so, its metadata tables, the Java heap)         │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ /proc/self/mem, /proc/self/maps
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      heapscope (This Crate)                     │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Inferior   │──▶│ AddressSpace │──▶│  VM Runtime  │         │
//! │  │ + Symbols    │   │ (page cache) │   │  (catalogs)  │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │                                               │                 │
//! │                                               ▼                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Export    │◀──│   Analysis   │◀──│     Heap     │         │
//! │  │ (report.json)│   │  (sampler)   │   │ (regions,    │         │
//! │  └──────────────┘   └──────────────┘   │  locator)    │         │
//! │                                        └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`inferior`]: readable memory plus symbol lookup (own process or image)
//! - [`symbolization`]: ELF symbol tables relocated by load base
//! - [`memory`]: page-cached reads with mapped/unmapped distinction
//! - [`vm`]: type, field and constant catalogs and validated struct views
//! - [`heap`]: heap shape, live regions and heuristic object location
//! - [`analysis`]: statistical sampling and the per-class report
//! - [`export`]: JSON report export
//! - [`cli`], [`config`], [`preflight`]: the binary's surface
//!
//! ## Typical Usage
//!
//! ```bash
//! # One run, printed as a table
//! heapscope sample
//!
//! # Five reproducible runs saved for later comparison
//! heapscope sample --seed 42 --repeat 5 --export heap.json
//! ```
//!
//! Embedders call [`inspect_self`] directly.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod domain;
pub mod export;
pub mod heap;
pub mod inferior;
pub mod memory;
pub mod preflight;
pub mod symbolization;
pub mod vm;

#[cfg(test)]
mod testing;

use analysis::{SamplingReport, StatisticalSampler};
use config::InspectorConfig;
use domain::InspectError;
use inferior::SelfInferior;
use vm::Runtime;

/// Attach to the runtime in this process and run one sampling pass
///
/// # Errors
/// Returns an error for an invalid configuration, or if the runtime's
/// metadata cannot be found or does not match the expected layout
pub fn inspect_self(config: &InspectorConfig) -> Result<SamplingReport, InspectError> {
    config.validate()?;
    let inferior = SelfInferior::open()?;
    let mut runtime = Runtime::attach(Box::new(inferior), &config.page_cache)?;
    let report = StatisticalSampler::new(&runtime, &config.sampler).run();
    runtime.detach();
    report
}

//! # Analysis
//!
//! Statistical sampling of the live heap and the report built from it.
//!
//! - `sampler`: draws probes, resolves them to objects and tallies classes
//! - `report`: per-class estimates and the printed table
//! - `random`: the seeded probe offset generator

pub mod random;
pub mod report;
pub mod sampler;

pub use random::SampleRng;
pub use report::{ClassEstimate, SamplingReport};
pub use sampler::{space_totals, SampleTally, StatisticalSampler};

//! # Heap
//!
//! Heap shape detection, object header decoding, live region enumeration and
//! heuristic object location.

pub mod locator;
pub mod object_model;
pub mod regions;
pub mod shape;

pub use locator::{MissReason, ObjectLocator, Probe, ProbedObject};
pub use object_model::ObjectModel;
pub use regions::{normalize, HeapRegionCollector, LiveRegion, SpaceKind};
pub use shape::HeapShape;

//! # Memory
//!
//! Paged, cached access to an inferior's address space.

pub mod address_space;
pub mod page_cache;

pub use address_space::AddressSpace;
pub use page_cache::PageCache;

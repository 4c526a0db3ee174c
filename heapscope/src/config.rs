//! Inspector configuration
//!
//! Plain structs with defaults; the binary fills them from CLI arguments and
//! embedders construct them directly.

use crate::domain::InspectError;
use crate::preflight::system_page_size;

/// Size of one cached page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PageSize {
    /// 4 KiB pages
    #[default]
    #[value(name = "4k")]
    Small,
    /// 64 KiB pages
    #[value(name = "64k")]
    Large,
}

impl PageSize {
    #[must_use]
    pub fn bytes(self) -> u64 {
        match self {
            PageSize::Small => 0x1000,
            PageSize::Large => 0x1_0000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCacheConfig {
    pub page_size: PageSize,
    /// Maximum number of cached pages before least-recently-used eviction.
    pub capacity: usize,
}

impl Default for PageCacheConfig {
    fn default() -> Self {
        Self { page_size: PageSize::Small, capacity: 2048 }
    }
}

impl PageCacheConfig {
    /// Reject settings that would make the cache lie about mappings.
    ///
    /// A cache page larger than the system page may straddle a mapped and an
    /// unmapped system page, which would hide the mapped half.
    ///
    /// # Errors
    /// Returns [`InspectError::Config`] for a zero capacity or an oversized page.
    pub fn validate(&self) -> Result<(), InspectError> {
        if self.capacity == 0 {
            return Err(InspectError::Config("page cache capacity must be at least 1".into()));
        }
        let system = system_page_size();
        if self.page_size.bytes() > system {
            return Err(InspectError::Config(format!(
                "cache page size {} exceeds the system page size {system}",
                self.page_size.bytes()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Uniform probes drawn per run.
    pub samples: u64,
    /// Classes with fewer hits are left out of the printed table.
    pub min_significant_hits: u64,
    /// Total hits above which the +/- 3% at 99% confidence statement holds.
    pub min_total_hits: u64,
    /// Fixed seed for reproducible runs; drawn from the clock when absent.
    pub seed: Option<u64>,
    /// Longest backward walk from a probe before it is declared a miss.
    pub max_scan_bytes: u64,
    /// Objects at least this large are remembered across probes.
    pub large_object_threshold: u64,
    pub large_object_cache_entries: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            samples: 2000,
            min_significant_hits: 40,
            min_total_hits: 1849,
            seed: None,
            max_scan_bytes: 4 * 1024 * 1024,
            large_object_threshold: 32 * 1024,
            large_object_cache_entries: 4096,
        }
    }
}

impl SamplerConfig {
    /// # Errors
    /// Returns [`InspectError::Config`] when no probe could ever be drawn or matched.
    pub fn validate(&self) -> Result<(), InspectError> {
        if self.samples == 0 {
            return Err(InspectError::Config("sample count must be at least 1".into()));
        }
        if self.max_scan_bytes == 0 {
            return Err(InspectError::Config("maximum scan distance must be non-zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectorConfig {
    pub page_cache: PageCacheConfig,
    pub sampler: SamplerConfig,
}

impl InspectorConfig {
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), InspectError> {
        self.page_cache.validate()?;
        self.sampler.validate()
    }
}

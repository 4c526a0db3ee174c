//! CLI argument definitions

use crate::config::{InspectorConfig, PageCacheConfig, PageSize, SamplerConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "heapscope",
    version,
    about = "Estimate which classes occupy the live heap of the embedded Java runtime",
    after_help = "\
EXAMPLES:
    heapscope sample                         One run with 2000 probes
    heapscope sample --seed 42 --repeat 5    Five reproducible runs
    heapscope sample --export heap.json      Also save the runs as JSON
    heapscope symbols gHotSpotVMTypes        Resolve runtime metadata symbols"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sample the live heap and print per-class estimates
    Sample(SampleArgs),

    /// Resolve symbols across all loaded objects
    Symbols {
        /// Symbol names to look up
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,
    },

    /// List loaded ELF objects and their load addresses
    Maps,
}

#[derive(clap::Args)]
pub struct SampleArgs {
    /// Probes per run
    #[arg(short = 'n', long, default_value = "2000")]
    pub samples: u64,

    /// Seed for reproducible probe offsets (random if omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Hide classes with fewer hits from the table
    #[arg(long, default_value = "40")]
    pub min_hits: u64,

    /// Page size of the memory cache
    #[arg(long, value_enum, default_value = "4k")]
    pub page_size: PageSize,

    /// Pages kept in the memory cache
    #[arg(long, default_value = "2048")]
    pub cache_pages: usize,

    /// Longest backward scan from a probe, in bytes
    #[arg(long, default_value = "4194304")]
    pub max_scan_bytes: u64,

    /// Number of runs
    #[arg(long, default_value = "1")]
    pub repeat: u32,

    /// Seconds to wait between runs
    #[arg(long, default_value = "0")]
    pub interval: u64,

    /// Export all runs to a JSON file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl SampleArgs {
    #[must_use]
    pub fn to_config(&self) -> InspectorConfig {
        InspectorConfig {
            page_cache: PageCacheConfig { page_size: self.page_size, capacity: self.cache_pages },
            sampler: SamplerConfig {
                samples: self.samples,
                min_significant_hits: self.min_hits,
                seed: self.seed,
                max_scan_bytes: self.max_scan_bytes,
                ..SamplerConfig::default()
            },
        }
    }
}

//! Memory mapping utilities for process address space analysis
//!
//! This module parses `/proc/self/maps` to find every file-backed object
//! loaded into the process and the address it was mapped at, which is needed
//! to relocate link-time symbol values of position-independent objects.

use crate::domain::{AddressRange, InspectError};
use log::debug;
use std::fs;
use std::path::PathBuf;

/// One line of a `/proc/<pid>/maps` listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub range: AddressRange,
    pub readable: bool,
    /// File offset of the first mapped byte
    pub offset: u64,
    /// Backing file, `None` for anonymous and pseudo mappings (`[heap]`, `[vdso]`)
    pub path: Option<PathBuf>,
}

/// Read and parse the current process's memory map
///
/// # Errors
/// Returns an error if `/proc/self/maps` cannot be read
pub fn read_self_maps() -> Result<Vec<MapEntry>, InspectError> {
    let maps = fs::read_to_string("/proc/self/maps")?;
    Ok(parse_maps(&maps))
}

/// Parse the text of a maps listing, skipping malformed lines
#[must_use]
pub fn parse_maps(contents: &str) -> Vec<MapEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let entry = parse_line(line);
            if entry.is_none() && !line.trim().is_empty() {
                debug!("Skipping unparseable maps line: {line}");
            }
            entry
        })
        .collect()
}

// "start-end perms offset dev inode      pathname"
fn parse_line(line: &str) -> Option<MapEntry> {
    let mut parts = line.splitn(6, ' ');
    let range = parts.next()?;
    let perms = parts.next()?;
    let offset = parts.next()?;
    let _dev = parts.next()?;
    let _inode = parts.next()?;
    let path = parts.next().map(str::trim).unwrap_or_default();

    let (start, end) = range.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    let offset = u64::from_str_radix(offset, 16).ok()?;

    let path = (path.starts_with('/') && !path.ends_with(" (deleted)")).then(|| PathBuf::from(path));

    Some(MapEntry {
        range: AddressRange::new(start, end),
        readable: perms.starts_with('r'),
        offset,
        path,
    })
}

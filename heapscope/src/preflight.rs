//! Pre-flight checks for heapscope
//!
//! Validates that the process can read its own memory and memory map before
//! any runtime metadata is touched. Provides clear, actionable error messages
//! when requirements aren't met.

#![allow(unsafe_code)] // sysconf() requires unsafe

use anyhow::{bail, Context, Result};
use std::fs::File;

/// Run all pre-flight checks before attaching to the own address space
///
/// # Errors
/// Returns an error naming the `/proc` file that could not be read.
pub fn run_preflight_checks() -> Result<()> {
    check_proc_access()?;
    check_page_size()?;
    Ok(())
}

/// Check that `/proc/self/maps` and `/proc/self/mem` are readable
///
/// # Errors
/// Returns an error if either file cannot be opened.
pub fn check_proc_access() -> Result<()> {
    let maps = std::fs::read_to_string("/proc/self/maps")
        .context("Failed to read /proc/self/maps (is /proc mounted?)")?;
    if maps.is_empty() {
        bail!("/proc/self/maps is empty; cannot locate loaded objects");
    }

    File::open("/proc/self/mem").context(
        "Permission denied opening /proc/self/mem.\n\n\
         The inspector reads its own address space through this file; check that\n\
         the process is not running under a restrictive seccomp or LSM profile.",
    )?;
    Ok(())
}

fn check_page_size() -> Result<()> {
    let size = system_page_size();
    if !size.is_power_of_two() || size < 0x1000 {
        bail!("Unexpected system page size {size}");
    }
    Ok(())
}

/// Hardware page size reported by the kernel, 4 KiB if unavailable.
#[must_use]
pub fn system_page_size() -> u64 {
    // SAFETY: sysconf has no preconditions and only reads a system constant
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(size).ok().filter(|&s| s > 0).unwrap_or(0x1000)
}

// dixsearch: Double-indexed local alignment search
//
// Copyright 2024 Tommi Mäklin [tommi@maklin.fi].

// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.

// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
//! Available memory detection and index size estimates.
use log::info;

use crate::error::Error;
use crate::index::IndexVariant;
use crate::index::SYMBOL_SHIFT;

/// Where the available memory figure came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemorySource {
    /// cgroups v2 `memory.max` of this process.
    CgroupsV2,
    /// `MemAvailable` in `/proc/meminfo`.
    ProcMeminfo,
    /// [FALLBACK_MEMORY_BYTES].
    Fallback,
}

/// Detected available memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AvailableMemory {
    /// Bytes available.
    pub bytes: usize,
    /// Where `bytes` came from.
    pub source: MemorySource,
}

/// Assumed available memory when detection fails (8 GiB).
pub const FALLBACK_MEMORY_BYTES: usize = 8 * 1024 * 1024 * 1024;

/// Detects the memory available to this process.
///
/// Tries the cgroups v2 limit first, then `MemAvailable` from
/// `/proc/meminfo`, and falls back to [FALLBACK_MEMORY_BYTES].
pub fn detect_available_memory() -> AvailableMemory {
    if let Some(bytes) = read_cgroups_v2_limit() {
        return AvailableMemory { bytes, source: MemorySource::CgroupsV2 };
    }
    if let Some(bytes) = read_proc_meminfo_available() {
        return AvailableMemory { bytes, source: MemorySource::ProcMeminfo };
    }
    AvailableMemory { bytes: FALLBACK_MEMORY_BYTES, source: MemorySource::Fallback }
}

fn read_cgroups_v2_limit() -> Option<usize> {
    let contents = std::fs::read_to_string("/proc/self/cgroup").ok()?;
    let path = cgroup_v2_path(&contents)?;
    let limit = std::fs::read_to_string(format!("/sys/fs/cgroup{}/memory.max", path)).ok()?;
    parse_memory_max(&limit)
}

// v2 entries look like "0::<path>"
fn cgroup_v2_path(contents: &str) -> Option<&str> {
    contents.lines()
        .filter_map(|line| line.strip_prefix("0::"))
        .find(|path| !path.is_empty() && *path != "/")
}

// "max" means no limit
fn parse_memory_max(contents: &str) -> Option<usize> {
    match contents.trim() {
        "max" => None,
        value => value.parse().ok(),
    }
}

fn read_proc_meminfo_available() -> Option<usize> {
    let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo_available(&contents)
}

fn parse_meminfo_available(contents: &str) -> Option<usize> {
    let line = contents.lines().find(|line| line.starts_with("MemAvailable:"))?;
    let kb: usize = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// Estimated peak bytes for building a `variant` index over a text of
/// `text_len` symbols from an alphabet of `sigma` working symbols.
///
/// Counts the text, the suffix array used during construction and the
/// finished structures.
pub fn estimate_index_bytes(variant: IndexVariant, text_len: usize, sigma: usize, sa_sampling: usize) -> usize {
    let n = text_len;
    let suffixes = n * std::mem::size_of::<usize>();
    let fm = {
        let sigma = sigma + SYMBOL_SHIFT as usize;
        let occ = sigma * (n / 64 + 1) * std::mem::size_of::<usize>();
        let samples = (n / sa_sampling.max(1) + 1) * std::mem::size_of::<usize>();
        let marks = 2 * (n / 64 + 1) * std::mem::size_of::<u64>();
        n + occ + samples + marks
    };
    match variant {
        IndexVariant::SuffixArray => n + suffixes,
        IndexVariant::FmIndex => 2 * n + suffixes + fm,
        IndexVariant::BiFmIndex => 2 * n + suffixes + 2 * fm,
    }
}

/// Fails with [Error::InsufficientMemory] if `required` exceeds the
/// detected available memory.
pub fn check_available(required: usize) -> Result<(), Error> {
    let available = detect_available_memory();
    info!("Estimated memory use {}, available {} ({:?})", format_bytes(required), format_bytes(available.bytes), available.source);
    if required > available.bytes {
        return Err(Error::InsufficientMemory { required, available: available.bytes });
    }
    Ok(())
}

/// Formats bytes with a binary unit.
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GiB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MiB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KiB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cgroup_path_from_v2_entry() {
        let contents = "0::/user.slice/user-1000.slice/session-2.scope\n";
        assert_eq!(cgroup_v2_path(contents), Some("/user.slice/user-1000.slice/session-2.scope"));
        assert_eq!(cgroup_v2_path("0::/\n"), None);
        assert_eq!(cgroup_v2_path("6:memory:/slurm/job_1\n"), None);
    }

    #[test]
    fn memory_max_without_limit() {
        assert_eq!(parse_memory_max("max\n"), None);
        assert_eq!(parse_memory_max("4294967296\n"), Some(4294967296));
    }

    #[test]
    fn meminfo_available_in_bytes() {
        let contents = "MemTotal:       16318412 kB\nMemFree:         1021344 kB\nMemAvailable:    8123456 kB\n";
        assert_eq!(parse_meminfo_available(contents), Some(8123456 * 1024));
        assert_eq!(parse_meminfo_available("MemTotal: 1 kB\n"), None);
    }

    #[test]
    fn detected_memory_is_positive() {
        assert!(detect_available_memory().bytes > 0);
    }

    #[test]
    fn estimates_grow_with_the_variant() {
        let sa = estimate_index_bytes(IndexVariant::SuffixArray, 1_000_000, 11, 10);
        let fm = estimate_index_bytes(IndexVariant::FmIndex, 1_000_000, 11, 10);
        let bifm = estimate_index_bytes(IndexVariant::BiFmIndex, 1_000_000, 11, 10);
        assert!(sa >= 9_000_000);
        assert!(sa < fm);
        assert!(fm < bifm);
    }

    #[test]
    fn impossible_requirement_fails() {
        let got = check_available(usize::MAX);
        assert!(matches!(got, Err(Error::InsufficientMemory { .. })));
        assert!(check_available(1).is_ok());
    }

    #[test]
    fn bytes_are_formatted() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GiB");
    }
}

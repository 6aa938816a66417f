// Memory information parsing from /proc/meminfo

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Immutable snapshot of kernel memory state, produced once per control-loop
/// iteration.
///
/// `swap_free_pct` is defined as `100.0` when `swap_total_kib == 0` so that
/// swap-gated conditions never block action on swapless hosts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySnapshot {
    pub mem_total_kib: u64,
    pub swap_total_kib: u64,
    pub mem_available_pct: f64,
    pub swap_free_pct: f64,
}

impl MemorySnapshot {
    /// Read and parse `/proc/meminfo`.
    pub fn read() -> Result<Self> {
        let file = File::open("/proc/meminfo").context("failed to open /proc/meminfo")?;
        Self::read_from_reader(BufReader::new(file))
    }

    /// Read `/proc/meminfo`, discarding the error. Used as a `refresh`
    /// callback where a mid-escalation read failure should just be treated
    /// as "no fresher data available" rather than aborting the kill.
    pub fn read_ok() -> Option<Self> {
        Self::read().ok()
    }

    /// Parse meminfo content from any `BufRead` source (used by tests to
    /// feed a fixture instead of the real `/proc/meminfo`).
    fn read_from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut mem_total: Option<u64> = None;
        let mut mem_available: Option<u64> = None;
        let mut swap_total: Option<u64> = None;
        let mut swap_free: Option<u64> = None;

        for line in reader.lines() {
            let line = line.context("failed to read meminfo line")?;
            let mut parts = line.split_whitespace();
            let Some(key) = parts.next() else { continue };
            let Some(value) = parts.next() else { continue };
            let key = key.trim_end_matches(':');
            let Ok(value) = value.parse::<u64>() else {
                continue;
            };

            match key {
                "MemTotal" => mem_total = Some(value),
                "MemAvailable" => mem_available = Some(value),
                "SwapTotal" => swap_total = Some(value),
                "SwapFree" => swap_free = Some(value),
                _ => {}
            }
        }

        let mem_total = mem_total.context("meminfo missing MemTotal")?;
        let mem_available = mem_available.context("meminfo missing MemAvailable")?;
        let swap_total = swap_total.context("meminfo missing SwapTotal")?;
        let swap_free = swap_free.context("meminfo missing SwapFree")?;

        let mem_available_pct = if mem_total == 0 {
            0.0
        } else {
            100.0 * mem_available as f64 / mem_total as f64
        };
        let swap_free_pct = if swap_total == 0 {
            100.0
        } else {
            100.0 * swap_free as f64 / swap_total as f64
        };

        Ok(Self {
            mem_total_kib: mem_total,
            swap_total_kib: swap_total,
            mem_available_pct,
            swap_free_pct,
        })
    }

    #[cfg(test)]
    fn read_from_str(text: &str) -> Result<Self> {
        Self::read_from_reader(std::io::Cursor::new(text))
    }

    pub fn mem_total_mib(&self) -> f64 {
        self.mem_total_kib as f64 / 1024.0
    }

    pub fn swap_total_mib(&self) -> f64 {
        self.swap_total_kib as f64 / 1024.0
    }

    /// Format a KiB size in human-readable units.
    pub fn format_size(kib: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if kib >= GB {
            format!("{:.2} GiB", kib as f64 / GB as f64)
        } else if kib >= MB {
            format!("{:.2} MiB", kib as f64 / MB as f64)
        } else if kib >= KB {
            format!("{:.2} KiB", kib as f64 / KB as f64)
        } else {
            format!("{kib} KiB")
        }
    }
}

impl std::fmt::Display for MemorySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mem_available={:.2}% swap_free={:.2}% (total {:.0} MiB / {:.0} MiB swap)",
            self.mem_available_pct,
            self.swap_free_pct,
            self.mem_total_mib(),
            self.swap_total_mib()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "\
MemTotal:       16384000 kB
MemFree:         2048000 kB
MemAvailable:    8192000 kB
SwapTotal:       8192000 kB
SwapFree:        4096000 kB
";

    #[test]
    fn test_parses_required_fields() {
        let snap = MemorySnapshot::read_from_str(FIXTURE).unwrap();
        assert_eq!(snap.mem_total_kib, 16_384_000);
        assert_eq!(snap.swap_total_kib, 8_192_000);
        assert_eq!(snap.mem_available_pct, 50.0);
        assert_eq!(snap.swap_free_pct, 50.0);
    }

    #[test]
    fn test_missing_key_is_error() {
        let bogus = "MemTotal: 1000 kB\n";
        assert!(MemorySnapshot::read_from_str(bogus).is_err());
    }

    #[test]
    fn test_zero_swap_total_yields_full_swap_free_pct() {
        let text = "\
MemTotal:       16384000 kB
MemAvailable:    8192000 kB
SwapTotal:              0 kB
SwapFree:               0 kB
";
        let snap = MemorySnapshot::read_from_str(text).unwrap();
        assert_eq!(snap.swap_free_pct, 100.0);
    }

    #[test]
    fn test_percentages_are_bounded() {
        let snap = MemorySnapshot::read_from_str(FIXTURE).unwrap();
        assert!((0.0..=100.0).contains(&snap.mem_available_pct));
        assert!((0.0..=100.0).contains(&snap.swap_free_pct));
    }
}

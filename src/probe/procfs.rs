//! Parsers for the handful of `/proc` files sysinfo does not cover.

use std::{fs, path::Path};

use crate::{
    error::{MonitorError, Result},
    probe::{ProcessMemory, SwapCounters, SystemMemory},
};

/// Extract `pswpin` and `pswpout` from `/proc/vmstat`.
pub fn parse_vmstat(vmstat: &str) -> Option<SwapCounters> {
    let mut pages_in = None;
    let mut pages_out = None;
    for line in vmstat.lines() {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("pswpin"), Some(value)) => pages_in = value.parse().ok(),
            (Some("pswpout"), Some(value)) => pages_out = value.parse().ok(),
            _ => {}
        }
    }
    Some(SwapCounters {
        pages_in: pages_in?,
        pages_out: pages_out?,
    })
}

/// Resident and swapped bytes from `/proc/<pid>/status`.
///
/// Kernel threads carry no `VmRSS` line and yield `None`. A missing `VmSwap`
/// (kernels without swap accounting) reads as zero.
pub fn parse_status_memory(status: &str) -> Option<ProcessMemory> {
    let resident = status_kb(status, "VmRSS:")?;
    let swapped = status_kb(status, "VmSwap:").unwrap_or(0);
    Some(ProcessMemory {
        resident: resident.saturating_mul(1024),
        swapped: swapped.saturating_mul(1024),
    })
}

/// Gauges from `/proc/meminfo`. `MemAvailable` falls back to `MemFree` on
/// kernels older than 3.14.
pub fn parse_meminfo(meminfo: &str) -> Option<SystemMemory> {
    let total = status_kb(meminfo, "MemTotal:")?;
    let available =
        status_kb(meminfo, "MemAvailable:").or_else(|| status_kb(meminfo, "MemFree:"))?;
    Some(SystemMemory {
        total: total.saturating_mul(1024),
        available: available.saturating_mul(1024),
        swap_total: status_kb(meminfo, "SwapTotal:").unwrap_or(0).saturating_mul(1024),
        swap_free: status_kb(meminfo, "SwapFree:").unwrap_or(0).saturating_mul(1024),
    })
}

fn status_kb(text: &str, key: &str) -> Option<u64> {
    text.lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

pub fn read_vmstat(proc_root: &Path) -> Result<SwapCounters> {
    let path = proc_root.join("vmstat");
    let text = fs::read_to_string(&path)
        .map_err(|e| MonitorError::unavailable(path.display().to_string(), e))?;
    parse_vmstat(&text).ok_or_else(|| {
        MonitorError::unavailable(path.display().to_string(), "no pswpin/pswpout counters")
    })
}

pub fn read_process_memory(proc_root: &Path, pid: u32) -> Result<ProcessMemory> {
    let path = proc_root.join(pid.to_string()).join("status");
    let what = format!("memory of pid {pid}");
    let text = fs::read_to_string(&path).map_err(|e| MonitorError::unavailable(&what, e))?;
    parse_status_memory(&text).ok_or_else(|| MonitorError::unavailable(what, "no VmRSS in status"))
}

pub fn read_meminfo(proc_root: &Path) -> Result<SystemMemory> {
    let path = proc_root.join("meminfo");
    let text = fs::read_to_string(&path)
        .map_err(|e| MonitorError::unavailable(path.display().to_string(), e))?;
    parse_meminfo(&text)
        .ok_or_else(|| MonitorError::unavailable(path.display().to_string(), "no MemTotal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VMSTAT: &str = "\
nr_free_pages 123456
pgpgin 99887766
pgpgout 11223344
pswpin 4021
pswpout 17760
pgalloc_dma 0
";

    const STATUS: &str = "\
Name:\tjava
Umask:\t0022
State:\tS (sleeping)
Pid:\t4242
VmPeak:\t 9000000 kB
VmSize:\t 8800000 kB
VmRSS:\t  204800 kB
RssAnon:\t  180000 kB
VmSwap:\t   51200 kB
Threads:\t64
";

    const MEMINFO: &str = "\
MemTotal:       16384000 kB
MemFree:         1024000 kB
MemAvailable:    4096000 kB
Buffers:          200000 kB
SwapTotal:       2097148 kB
SwapFree:        1048574 kB
";

    #[test]
    fn vmstat_counters() {
        assert_eq!(
            parse_vmstat(VMSTAT),
            Some(SwapCounters {
                pages_in: 4021,
                pages_out: 17760
            })
        );
    }

    #[test]
    fn vmstat_without_swap_counters() {
        assert_eq!(parse_vmstat("nr_free_pages 1\npswpin 5\n"), None);
    }

    #[test]
    fn status_memory_in_bytes() {
        assert_eq!(
            parse_status_memory(STATUS),
            Some(ProcessMemory {
                resident: 204800 * 1024,
                swapped: 51200 * 1024,
            })
        );
    }

    #[test]
    fn kernel_thread_status_has_no_memory() {
        assert_eq!(parse_status_memory("Name:\tkworker/0:1\nThreads:\t1\n"), None);
    }

    #[test]
    fn status_without_swap_line() {
        let memory = parse_status_memory("VmRSS:\t 10 kB\n").unwrap();
        assert_eq!(memory.resident, 10240);
        assert_eq!(memory.swapped, 0);
    }

    #[test]
    fn meminfo_gauges() {
        let memory = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(memory.total, 16384000 * 1024);
        assert_eq!(memory.available, 4096000 * 1024);
        assert_eq!(memory.swap_total, 2097148 * 1024);
        assert_eq!(memory.swap_free, 1048574 * 1024);
    }

    #[test]
    fn meminfo_falls_back_to_free() {
        let memory = parse_meminfo("MemTotal: 100 kB\nMemFree: 40 kB\n").unwrap();
        assert_eq!(memory.available, 40 * 1024);
        assert_eq!(memory.swap_total, 0);
    }

    #[test]
    fn reads_from_a_proc_root() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("vmstat"), VMSTAT).unwrap();
        fs::create_dir(root.path().join("4242")).unwrap();
        fs::write(root.path().join("4242").join("status"), STATUS).unwrap();

        assert_eq!(read_vmstat(root.path()).unwrap().pages_out, 17760);
        assert_eq!(
            read_process_memory(root.path(), 4242).unwrap().swapped,
            51200 * 1024
        );
        assert!(matches!(
            read_process_memory(root.path(), 1),
            Err(MonitorError::MetricsUnavailable { .. })
        ));
        assert!(read_meminfo(root.path()).is_err());
    }
}

//! Advisory checklist of kernel VM settings that matter for swap pressure.
//!
//! Read-only: it prints what it would change and why, nothing more.

use std::{fmt, fs, path::Path};

use crate::probe::{SystemMemory, procfs};

pub const MAX_SWAPPINESS: u64 = 10;
pub const MIN_VFS_CACHE_PRESSURE: u64 = 50;
/// `vm.min_free_kbytes` as a share of RAM, in per-mille.
pub const MIN_FREE_PER_MILLE: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Advise,
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Ok => "OK",
            Verdict::Advise => "ADVISE",
            Verdict::Unknown => "UNKNOWN",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub current: Option<String>,
    pub advice: String,
    pub verdict: Verdict,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:<7}] {:<22} {:<12} {}",
            self.verdict.to_string(),
            self.name,
            self.current.as_deref().unwrap_or("?"),
            self.advice
        )
    }
}

/// Current values; `None` where the file could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readings {
    pub swappiness: Option<u64>,
    pub vfs_cache_pressure: Option<u64>,
    pub overcommit_memory: Option<u64>,
    pub min_free_kbytes: Option<u64>,
    pub memory: Option<SystemMemory>,
}

impl Readings {
    pub fn read(proc_root: &Path) -> Readings {
        let vm = |name: &str| -> Option<u64> {
            fs::read_to_string(proc_root.join("sys").join("vm").join(name))
                .ok()?
                .trim()
                .parse()
                .ok()
        };
        Readings {
            swappiness: vm("swappiness"),
            vfs_cache_pressure: vm("vfs_cache_pressure"),
            overcommit_memory: vm("overcommit_memory"),
            min_free_kbytes: vm("min_free_kbytes"),
            memory: procfs::read_meminfo(proc_root).ok(),
        }
    }
}

fn check(
    name: &'static str,
    current: Option<u64>,
    ok: impl Fn(u64) -> bool,
    advice: String,
) -> Check {
    Check {
        name,
        current: current.map(|v| v.to_string()),
        verdict: match current {
            None => Verdict::Unknown,
            Some(v) if ok(v) => Verdict::Ok,
            Some(_) => Verdict::Advise,
        },
        advice,
    }
}

pub fn checklist(readings: &Readings) -> Vec<Check> {
    let mut checks = vec![
        check(
            "vm.swappiness",
            readings.swappiness,
            |v| v <= MAX_SWAPPINESS,
            format!("keep at or below {MAX_SWAPPINESS} so anonymous pages stay resident"),
        ),
        check(
            "vm.vfs_cache_pressure",
            readings.vfs_cache_pressure,
            |v| v >= MIN_VFS_CACHE_PRESSURE,
            format!("at least {MIN_VFS_CACHE_PRESSURE} so dentry/inode caches are reclaimed"),
        ),
        check(
            "vm.overcommit_memory",
            readings.overcommit_memory,
            |v| v != 2,
            "strict accounting (2) fails large allocations early; use 0".to_string(),
        ),
    ];

    let total_kb = readings.memory.map(|m| m.total / 1024);
    let wanted_kb = total_kb.map(|kb| kb * MIN_FREE_PER_MILLE / 1000);
    checks.push(check(
        "vm.min_free_kbytes",
        readings.min_free_kbytes,
        |v| wanted_kb.is_none_or(|wanted| v >= wanted),
        match wanted_kb {
            Some(wanted) => format!("at least {wanted} (0.5% of RAM) to leave headroom for reclaim"),
            None => "at least 0.5% of RAM to leave headroom for reclaim".to_string(),
        },
    ));
    checks.push(check(
        "swap configured",
        readings.memory.map(|m| m.swap_total / (1024 * 1024)),
        |mb| mb > 0,
        "MB of swap; without any the OOM killer acts instead of swapping".to_string(),
    ));
    checks
}

//! Read-only access to the operating system's memory accounting.
//!
//! The sampler only talks to the two traits defined here, so the loop can be
//! driven by canned readings in tests.

use crate::error::Result;

pub mod procfs;
pub mod system;

pub use system::SystemProbe;

/// System-wide memory and swap gauges, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemMemory {
    pub total: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_free: u64,
}

/// Cumulative pages swapped in and out since boot (`pswpin` / `pswpout`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapCounters {
    pub pages_in: u64,
    pub pages_out: u64,
}

/// Memory held by one process, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessMemory {
    pub resident: u64,
    pub swapped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub command_line: String,
}

/// The live process table.
pub trait ProcessTable {
    /// Command line of `pid`, or `None` when the process no longer exists.
    fn command_line(&mut self, pid: u32) -> Option<String>;

    /// Every live process. This is the expensive call.
    fn scan(&mut self) -> Vec<ProcessEntry>;
}

pub trait MetricSource {
    fn system_memory(&mut self) -> Result<SystemMemory>;
    fn swap_counters(&mut self) -> Result<SwapCounters>;
    fn process_memory(&mut self, pid: u32) -> Result<ProcessMemory>;
}

/// Everything the sampler needs from the host.
pub trait Probe: ProcessTable + MetricSource {}

impl<T: ProcessTable + MetricSource> Probe for T {}

//! One reading of the target's memory situation, and the rate arithmetic
//! carried between readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    probe::{MetricSource, SwapCounters},
    target::ProcessHandle,
};

/// A row of the sample log. Gauges are bytes, rates are pages per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub pid: u32,
    pub memory_total: u64,
    pub memory_available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub process_resident: u64,
    pub process_swapped: u64,
    pub swap_in_rate: f64,
    pub swap_out_rate: f64,
}

impl Sample {
    pub fn memory_used_percent(&self) -> f64 {
        percent(
            self.memory_total
                .saturating_sub(self.memory_available.min(self.memory_total)),
            self.memory_total,
        )
    }

    pub fn swap_used_percent(&self) -> f64 {
        percent(self.swap_used, self.swap_total)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Kernel counters as of a sample, kept to derive the next sample's rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCounters {
    pub taken_at: DateTime<Utc>,
    pub swap: SwapCounters,
}

/// Finite-difference rate of a monotonic counter.
///
/// Zero when no time has passed (or the clock stepped backwards) and when the
/// counter went down, which only happens across a reboot.
pub fn per_second(previous: u64, current: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 || !elapsed_secs.is_finite() {
        return 0.0;
    }
    current.saturating_sub(previous) as f64 / elapsed_secs
}

/// Read every source for `handle` and derive rates against `previous`.
///
/// Fails as soon as one source is unreadable; nothing partial is returned.
pub fn take_sample<M>(
    source: &mut M,
    handle: &ProcessHandle,
    previous: Option<&RawCounters>,
    now: DateTime<Utc>,
) -> Result<(Sample, RawCounters)>
where
    M: MetricSource + ?Sized,
{
    let system = source.system_memory()?;
    let process = source.process_memory(handle.pid)?;
    let swap = source.swap_counters()?;

    let (swap_in_rate, swap_out_rate) = match previous {
        Some(prev) => {
            let elapsed = (now - prev.taken_at).num_milliseconds() as f64 / 1000.0;
            (
                per_second(prev.swap.pages_in, swap.pages_in, elapsed),
                per_second(prev.swap.pages_out, swap.pages_out, elapsed),
            )
        }
        None => (0.0, 0.0),
    };

    let sample = Sample {
        timestamp: now,
        pid: handle.pid,
        memory_total: system.total,
        memory_available: system.available,
        swap_total: system.swap_total,
        // total and free are read separately and can disagree for a moment
        swap_used: system.swap_total.saturating_sub(system.swap_free),
        process_resident: process.resident,
        process_swapped: process.swapped,
        swap_in_rate,
        swap_out_rate,
    };
    Ok((
        sample,
        RawCounters {
            taken_at: now,
            swap,
        },
    ))
}

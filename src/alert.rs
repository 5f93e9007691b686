//! Static threshold checks over a single sample.

use std::fmt;

use crate::sample::Sample;

const MB: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// System memory in use, percent of total.
    pub memory_percent: f64,
    /// System swap in use, percent of total swap.
    pub swap_percent: f64,
    /// Target process pages in swap, bytes.
    pub process_swap_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    MemoryUsage,
    SwapUsage,
    ProcessSwap,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::MemoryUsage, Metric::SwapUsage, Metric::ProcessSwap];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::MemoryUsage => "memory usage",
            Metric::SwapUsage => "swap usage",
            Metric::ProcessSwap => "process swap",
        }
    }

    /// The sample's value for this metric, in the unit its threshold uses.
    pub fn value(&self, sample: &Sample) -> f64 {
        match self {
            Metric::MemoryUsage => sample.memory_used_percent(),
            Metric::SwapUsage => sample.swap_used_percent(),
            Metric::ProcessSwap => sample.process_swapped as f64,
        }
    }

    pub fn threshold(&self, thresholds: &Thresholds) -> f64 {
        match self {
            Metric::MemoryUsage => thresholds.memory_percent,
            Metric::SwapUsage => thresholds.swap_percent,
            Metric::ProcessSwap => thresholds.process_swap_bytes as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alert {
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.metric {
            Metric::ProcessSwap => write!(
                f,
                "{} {:.1}MB exceeds {:.1}MB",
                self.metric.label(),
                self.value / MB,
                self.threshold / MB
            ),
            _ => write!(
                f,
                "{} {:.2}% exceeds {:.2}%",
                self.metric.label(),
                self.value,
                self.threshold
            ),
        }
    }
}

/// One alert per metric strictly above its threshold.
pub fn evaluate(sample: &Sample, thresholds: &Thresholds) -> Vec<Alert> {
    Metric::ALL
        .iter()
        .filter_map(|metric| {
            let value = metric.value(sample);
            let threshold = metric.threshold(thresholds);
            (value > threshold).then_some(Alert {
                metric: *metric,
                value,
                threshold,
            })
        })
        .collect()
}

//! Summary of everything currently in the sample log.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};

use crate::{
    alert::{Metric, Thresholds},
    sample::Sample,
};

const MB: f64 = 1_000_000.0;

/// min / mean / max of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl Spread {
    fn of(values: impl Iterator<Item = f64>) -> Option<Spread> {
        let (count, sum, min, max) = values.fold(
            (0usize, 0.0, f64::INFINITY, f64::NEG_INFINITY),
            |(count, sum, min, max), v| (count + 1, sum + v, min.min(v), max.max(v)),
        );
        (count > 0).then(|| Spread {
            min,
            mean: sum / count as f64,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub samples: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    pub memory_used_percent: Option<Spread>,
    pub swap_used_percent: Option<Spread>,
    pub process_resident: Option<Spread>,
    pub process_swapped: Option<Spread>,
    pub latest: Option<Sample>,
    pub peak_swap_in_rate: f64,
    pub peak_swap_out_rate: f64,
    /// Samples above each threshold, in `Metric::ALL` order.
    pub breaches: Vec<(Metric, usize)>,
    /// Every pid the target ran under; more than one means it restarted.
    pub pids: Vec<u32>,
}

impl Report {
    pub fn build(samples: &[Sample], thresholds: &Thresholds) -> Report {
        let column = |f: fn(&Sample) -> f64| Spread::of(samples.iter().map(f));
        let pids: BTreeSet<u32> = samples.iter().map(|s| s.pid).collect();
        let breaches = Metric::ALL
            .iter()
            .map(|metric| {
                let limit = metric.threshold(thresholds);
                let count = samples.iter().filter(|s| metric.value(s) > limit).count();
                (*metric, count)
            })
            .collect();
        Report {
            samples: samples.len(),
            first: samples.iter().map(|s| s.timestamp).min(),
            last: samples.iter().map(|s| s.timestamp).max(),
            memory_used_percent: column(Sample::memory_used_percent),
            swap_used_percent: column(Sample::swap_used_percent),
            process_resident: column(|s| s.process_resident as f64),
            process_swapped: column(|s| s.process_swapped as f64),
            latest: samples.last().copied(),
            peak_swap_in_rate: samples.iter().map(|s| s.swap_in_rate).fold(0.0, f64::max),
            peak_swap_out_rate: samples.iter().map(|s| s.swap_out_rate).fold(0.0, f64::max),
            breaches,
            pids: pids.into_iter().collect(),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Some(first), Some(last)) = (self.first, self.last) else {
            return writeln!(f, "No samples logged yet.");
        };
        writeln!(f, "Samples:        {}", self.samples)?;
        writeln!(f, "From:           {}", first.to_rfc3339())?;
        writeln!(f, "To:             {}", last.to_rfc3339())?;
        if let Some(m) = self.memory_used_percent {
            writeln!(
                f,
                "Memory used:    min {:.1}%  avg {:.1}%  max {:.1}%",
                m.min, m.mean, m.max
            )?;
        }
        if let Some(s) = self.swap_used_percent {
            writeln!(f, "Swap used:      avg {:.1}%  max {:.1}%", s.mean, s.max)?;
        }
        if let (Some(rss), Some(latest)) = (self.process_resident, self.latest) {
            writeln!(
                f,
                "Process RSS:    latest {:.1}MB  max {:.1}MB",
                latest.process_resident as f64 / MB,
                rss.max / MB
            )?;
        }
        if let (Some(swapped), Some(latest)) = (self.process_swapped, self.latest) {
            writeln!(
                f,
                "Process swap:   latest {:.1}MB  max {:.1}MB",
                latest.process_swapped as f64 / MB,
                swapped.max / MB
            )?;
        }
        writeln!(
            f,
            "Peak swap I/O:  in {:.1} pages/s  out {:.1} pages/s",
            self.peak_swap_in_rate, self.peak_swap_out_rate
        )?;
        for (metric, count) in &self.breaches {
            writeln!(f, "Over {:<13} {} samples", format!("{}:", metric.label()), count)?;
        }
        let pids: Vec<String> = self.pids.iter().map(u32::to_string).collect();
        writeln!(f, "Target PIDs:    {}", pids.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::tests::{MB as BYTES_PER_MB, at};

    const THRESHOLDS: Thresholds = Thresholds {
        memory_percent: 85.0,
        swap_percent: 50.0,
        process_swap_bytes: 512 * 1_000_000,
    };

    fn sample(secs: i64, pid: u32, available_mb: u64, swapped_mb: u64, rate: f64) -> Sample {
        Sample {
            timestamp: at(secs),
            pid,
            memory_total: 16000 * BYTES_PER_MB,
            memory_available: available_mb * BYTES_PER_MB,
            swap_total: 1000 * BYTES_PER_MB,
            swap_used: 100 * BYTES_PER_MB,
            process_resident: (1000 + swapped_mb) * BYTES_PER_MB,
            process_swapped: swapped_mb * BYTES_PER_MB,
            swap_in_rate: rate,
            swap_out_rate: rate * 2.0,
        }
    }

    #[test]
    fn empty_log() {
        let report = Report::build(&[], &THRESHOLDS);
        assert_eq!(report.samples, 0);
        assert!(report.memory_used_percent.is_none());
        assert_eq!(report.to_string(), "No samples logged yet.\n");
    }

    #[test]
    fn summarises_samples() {
        let samples = vec![
            sample(0, 10, 8000, 0, 0.0),
            sample(30, 10, 1800, 600, 12.0),
            sample(60, 11, 3000, 100, 3.0),
        ];
        let report = Report::build(&samples, &THRESHOLDS);
        assert_eq!(report.samples, 3);
        assert_eq!(report.first, Some(at(0)));
        assert_eq!(report.last, Some(at(60)));
        let memory = report.memory_used_percent.unwrap();
        assert!((memory.min - 50.0).abs() < 1e-9);
        assert!((memory.max - 88.75).abs() < 1e-9);
        assert_eq!(report.peak_swap_in_rate, 12.0);
        assert_eq!(report.peak_swap_out_rate, 24.0);
        assert_eq!(
            report.breaches,
            vec![
                (Metric::MemoryUsage, 1),
                (Metric::SwapUsage, 0),
                (Metric::ProcessSwap, 1)
            ]
        );
        assert_eq!(report.pids, vec![10, 11]);
        assert_eq!(report.latest.unwrap().pid, 11);

        let text = report.to_string();
        assert!(text.contains("Samples:        3"));
        assert!(text.contains("max 88.8%"));
        assert!(text.contains("Process swap:   latest 100.0MB  max 600.0MB"));
        assert!(text.contains("Target PIDs:    10, 11"));
    }
}

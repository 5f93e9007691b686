use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::{
    resample::{Point, resample, window},
    sample::Sample,
    ui::state::UiState,
};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    macros::*,
    prelude::*,
    style::Stylize,
    widgets::*,
};

/// How far back the sparklines reach.
pub const SPARKLINE_WINDOW: Duration = Duration::from_secs(120);

/// Points older than this are dropped from a series.
const RETAIN: Duration = Duration::from_secs(15 * 60);

/// One plotted quantity, in display units.
#[derive(Debug, Clone)]
pub struct Series {
    pub name: &'static str,
    pub unit: &'static str,
    /// Alert threshold in display units, if the quantity has one.
    pub threshold: Option<f64>,
    pub points: VecDeque<Point>,
    pub max: f64,
}

impl Series {
    pub fn new(name: &'static str, unit: &'static str, threshold: Option<f64>) -> Self {
        Self {
            name,
            unit,
            threshold,
            points: VecDeque::new(),
            max: 0.0,
        }
    }

    pub fn push(&mut self, at: Instant, value: f64) {
        self.points.push_back(Point { at, value });
        self.max = self.max.max(value);
        while let Some(front) = self.points.front()
            && at.saturating_duration_since(front.at) > RETAIN
        {
            self.points.pop_front();
        }
    }

    pub fn last(&self) -> Option<f64> {
        self.points.back().map(|p| p.value)
    }

    /// `(seconds ago, value)` pairs for a chart.
    pub fn data(&self, now: Instant) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|p| (-now.saturating_duration_since(p.at).as_secs_f64(), p.value))
            .collect()
    }
}

/// The dashboard's history of samples, one series per panel line.
#[derive(Debug, Clone)]
pub struct Trends {
    pub memory: Series,
    pub swap: Series,
    pub resident: Series,
    pub swapped: Series,
    pub swap_in: Series,
    pub swap_out: Series,
}

const MB: f64 = 1_000_000.0;

impl Trends {
    pub fn new(memory_threshold: f64, swap_threshold: f64, process_swap_mb: f64) -> Self {
        Self {
            memory: Series::new("MEM", "%", Some(memory_threshold)),
            swap: Series::new("SWAP", "%", Some(swap_threshold)),
            resident: Series::new("RSS", "MB", None),
            swapped: Series::new("SWAP", "MB", Some(process_swap_mb)),
            swap_in: Series::new("IN", "p/s", None),
            swap_out: Series::new("OUT", "p/s", None),
        }
    }

    /// Move the alert lines without dropping the history.
    pub fn set_thresholds(&mut self, memory_threshold: f64, swap_threshold: f64, process_swap_mb: f64) {
        self.memory.threshold = Some(memory_threshold);
        self.swap.threshold = Some(swap_threshold);
        self.swapped.threshold = Some(process_swap_mb);
    }

    pub fn record(&mut self, sample: &Sample, at: Instant) {
        self.memory.push(at, sample.memory_used_percent());
        self.swap.push(at, sample.swap_used_percent());
        self.resident.push(at, sample.process_resident as f64 / MB);
        self.swapped.push(at, sample.process_swapped as f64 / MB);
        self.swap_in.push(at, sample.swap_in_rate);
        self.swap_out.push(at, sample.swap_out_rate);
    }

    pub fn is_empty(&self) -> bool {
        self.memory.points.is_empty()
    }
}

#[derive(Debug)]
pub struct SingleStat<'a> {
    pub series: &'a Series,
    pub ui: &'a UiState,
}

impl<'a> Widget for &SingleStat<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let [_, history, _, label, current, _] =
            horizontal![==1, *=1, ==1, ==6, ==9, ==3].areas(area);
        let series = self.series;
        let value = series.last().unwrap_or(0.0);
        let colour = match series.threshold {
            Some(threshold) => self.ui.theme.level(value, threshold),
            None => self.ui.theme.primary,
        };
        Text::from(format!("{}:", series.name)).render(label, buf);
        ratatui::macros::line![
            span![format!("{:.1}", value)].fg(colour),
            span![format!("{:<3}", series.unit)].fg(self.ui.theme.primary_background)
        ]
        .alignment(Alignment::Right)
        .render(current, buf);

        let (start, end) = window(self.ui.time, SPARKLINE_WINDOW);
        let points: Vec<Point> = series.points.iter().copied().collect();
        let resampled: Vec<Option<u64>> = resample(&points, start, end, history.width as usize)
            .iter()
            .map(|o| o.map(|v| v.max(0.0).round() as u64))
            .collect();
        // the threshold keeps the scale put while readings stay below it
        let ceiling = series.threshold.unwrap_or(0.0).max(series.max * 1.1).max(1.0);
        Sparkline::default()
            .data(&resampled)
            .max(ceiling.ceil() as u64)
            .absent_value_symbol("_")
            .fg(colour)
            .render(history, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::tests::at;

    fn sample() -> Sample {
        Sample {
            timestamp: at(0),
            pid: 300,
            memory_total: 16_000_000_000,
            memory_available: 1_800_000_000,
            swap_total: 8_000_000_000,
            swap_used: 2_000_000_000,
            process_resident: 800_000_000,
            process_swapped: 600_000_000,
            swap_in_rate: 0.0,
            swap_out_rate: 4.0,
        }
    }

    #[test]
    fn record_converts_to_display_units() {
        let mut trends = Trends::new(85.0, 50.0, 512.0);
        assert!(trends.is_empty());
        trends.record(&sample(), Instant::now());
        assert_eq!(trends.memory.last(), Some(88.75));
        assert_eq!(trends.swap.last(), Some(25.0));
        assert_eq!(trends.resident.last(), Some(800.0));
        assert_eq!(trends.swapped.last(), Some(600.0));
        assert_eq!(trends.swap_out.last(), Some(4.0));
        assert_eq!(trends.swapped.max, 600.0);
    }

    #[test]
    fn old_points_are_dropped() {
        let start = Instant::now();
        let mut series = Series::new("MEM", "%", None);
        series.push(start, 10.0);
        series.push(start + Duration::from_secs(60), 20.0);
        series.push(start + RETAIN + Duration::from_secs(30), 30.0);
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.max, 30.0);

        let data = series.data(start + RETAIN + Duration::from_secs(30));
        assert_eq!(data.last(), Some(&(0.0, 30.0)));
    }
}

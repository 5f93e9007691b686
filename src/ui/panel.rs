use crate::{
    monitor::{MonitorState, MonitorStatus},
    ui::{
        stat_line::{SPARKLINE_WINDOW, SingleStat, Series, Trends},
        state::{Mode, PANELS, UiState},
        theme::Theme,
    },
};
use ratatui::{
    buffer::Buffer, layout::Rect, macros::line as rline, macros::*, prelude::*, style::Stylize,
    widgets::*,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Host,
    Target,
    Paging,
    Alerts,
}

impl Panel {
    pub const ALL: [Panel; PANELS] = [Panel::Host, Panel::Target, Panel::Paging, Panel::Alerts];

    fn title(&self) -> &'static str {
        match self {
            Panel::Host => "Host",
            Panel::Target => "Target",
            Panel::Paging => "Paging",
            Panel::Alerts => "Alerts",
        }
    }

    fn series<'a>(&self, trends: &'a Trends) -> Option<[&'a Series; 2]> {
        match self {
            Panel::Host => Some([&trends.memory, &trends.swap]),
            Panel::Target => Some([&trends.resident, &trends.swapped]),
            Panel::Paging => Some([&trends.swap_in, &trends.swap_out]),
            Panel::Alerts => None,
        }
    }
}

pub struct PanelWidget<'a> {
    pub panel: Panel,
    pub trends: &'a Trends,
    pub status: Option<&'a MonitorStatus>,
    pub focussed: bool,
    pub ui: &'a UiState,
}

impl PanelWidget<'_> {
    /// Render the card shown in the dashboard grid.
    ///
    /// ```"not rust"
    /// ╭ Host ──────────────────────────────────────────────── ᔐ ╮
    /// │ ____________________▆▆▇▇██   MEM:     88.8%             │
    /// │ ____________________▁▁▁▁▁▁   SWAP:    25.0%             │
    /// │                                                          │
    /// ╰──────────────────────────────────────────────────────────╯
    /// ```
    fn render_card(&self, area: Rect, buf: &mut Buffer) {
        let border = self.border();
        let inner = border.inner(area);
        border.render(area, buf);

        match self.panel.series(self.trends) {
            Some(_) if self.trends.is_empty() => self.placeholder("No Samples Yet", inner, buf),
            Some([top, bottom]) => {
                let [first, second, _] = vertical![==1, ==1, ==1].areas(inner);
                (&SingleStat { series: top, ui: self.ui }).render(first, buf);
                (&SingleStat { series: bottom, ui: self.ui }).render(second, buf);
            }
            None => self.alert_lines().render(inner, buf),
        }
    }

    /// Render the spotlight version: a chart of the panel's two series over
    /// the sparkline window, with the alert threshold drawn across it.
    fn render_modal(&self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let border = self.border();
        let inner = border.inner(area).inner(Margin::new(1, 1));
        border.render(area, buf);

        let Some(series) = self.panel.series(self.trends) else {
            self.alert_lines().render(inner, buf);
            return;
        };
        if self.trends.is_empty() {
            self.placeholder("No Samples Yet", inner, buf);
            return;
        }

        let span = SPARKLINE_WINDOW.as_secs_f64();
        let colours = [self.ui.theme.secondary, self.ui.theme.accent];
        let data: Vec<Vec<(f64, f64)>> = series.iter().map(|s| s.data(self.ui.time)).collect();
        let thresholds: Vec<(&Series, Vec<(f64, f64)>)> = series
            .iter()
            .filter_map(|s| s.threshold.map(|t| (*s, vec![(-span, t), (0.0, t)])))
            .collect();
        let top = series
            .iter()
            .map(|s| s.max.max(s.threshold.unwrap_or(0.0)))
            .fold(1.0_f64, f64::max)
            * 1.2;

        let mut datasets: Vec<Dataset> = series
            .iter()
            .zip(&data)
            .zip(colours)
            .map(|((s, points), colour)| {
                Dataset::default()
                    .name(format!("{} {}", s.name, s.unit))
                    .marker(symbols::Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().bg(self.ui.theme.surface).fg(colour))
                    .data(points)
            })
            .collect();
        for (s, points) in &thresholds {
            datasets.push(
                Dataset::default()
                    .name(format!("{} limit", s.name))
                    .marker(symbols::Marker::Dot)
                    .graph_type(GraphType::Line)
                    .style(Style::default().bg(self.ui.theme.surface).fg(self.ui.theme.error))
                    .data(points),
            );
        }

        let base_style = Style::default()
            .bg(self.ui.theme.surface)
            .fg(self.ui.theme.foreground);
        let x_axis = Axis::default()
            .title("Seconds ago")
            .style(base_style)
            .bounds([-span, 0.0])
            .labels([
                rline![format!("{span:.0}")],
                rline![format!("{:.0}", span / 2.0)],
                rline!["0"],
            ]);
        let y_axis = Axis::default()
            .style(base_style)
            .bounds([0.0, top])
            .labels([
                rline!["0"],
                rline![format!("{:.1}", top / 2.0)],
                rline![format!("{top:.1}")],
            ]);
        Chart::new(datasets)
            .x_axis(x_axis)
            .y_axis(y_axis)
            .render(inner, buf);
    }

    fn border(&self) -> Block<'_> {
        let border_color = match (self.focussed, self.live()) {
            (true, _) => self.ui.theme.accent,
            (false, true) => self.ui.theme.primary_background,
            (false, false) => Theme::darken(self.ui.theme.primary_background, 0.4),
        };
        let mut border = Block::bordered()
            .title_top(rline![" ", self.panel.title().fg(self.ui.theme.primary), " "])
            .border_style(Style::default().bg(self.ui.theme.surface).fg(border_color))
            .bg(self.ui.theme.surface)
            .border_type(BorderType::Rounded);
        if let Some(subtitle) = self.subtitle() {
            border = border.title_bottom(rline![" ", subtitle, " "].right_aligned());
        }
        if self.live() {
            border = border.title_top(rline![self.signal_throbber(), " "].right_aligned());
        }
        border
    }

    fn live(&self) -> bool {
        self.status
            .is_some_and(|s| s.state == MonitorState::Sampling)
    }

    fn subtitle(&self) -> Option<Span<'_>> {
        let status = self.status?;
        match self.panel {
            Panel::Target => status
                .target_pid
                .map(|pid| span!(self.ui.theme.foreground; "PID {}", pid)),
            Panel::Alerts => Some(span!(self.ui.theme.foreground; "{} raised", status.alerts)),
            Panel::Host | Panel::Paging => None,
        }
    }

    fn alert_lines(&self) -> Text<'_> {
        let alerts = self.status.map(|s| s.last_alerts.as_slice()).unwrap_or(&[]);
        if alerts.is_empty() {
            return Text::from(rline![span!(self.ui.theme.success; " ● no active alerts")]);
        }
        alerts
            .iter()
            .map(|alert| rline![span!(self.ui.theme.error; " ▲ {}", alert)])
            .collect()
    }

    fn placeholder(&self, message: &str, area: Rect, buf: &mut Buffer) {
        let text = Text::from(message.to_string()).fg(self.ui.theme.foreground);
        let area = area.centered(
            Constraint::Length(text.width() as u16),
            Constraint::Length(1),
        );
        text.render(area, buf);
    }

    fn signal_throbber(&self) -> &'static str {
        const FRAMES: [&str; 4] = ["ᔐ", "ᯇ", "ᔑ", "ᯇ"];
        FRAMES[self.ui.step_of_4_in_1_second()]
    }
}

impl<'a> Widget for PanelWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.focussed && matches!(self.ui.mode, Mode::Spotlight) {
            self.render_modal(area, buf);
        } else {
            self.render_card(area, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use uuid::Uuid;

    use super::*;
    use crate::{
        alert::{Alert, Metric},
        monitor::MonitorStatus,
        sample::{Sample, tests::at},
    };

    fn status(alerts: Vec<Alert>) -> MonitorStatus {
        MonitorStatus {
            run: Uuid::nil(),
            state: MonitorState::Sampling,
            target_pid: Some(300),
            samples: 1,
            alerts: alerts.len() as u64,
            write_failures: 0,
            diagnostics_runs: 0,
            scans: 1,
            last_sample: None,
            last_alerts: alerts,
        }
    }

    fn render(widget: PanelWidget) -> String {
        let area = Rect::new(0, 0, 60, 5);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        buf.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn alerts_panel_lists_active_alerts() {
        let ui = UiState::default();
        let trends = Trends::new(85.0, 50.0, 512.0);
        let status = status(vec![Alert {
            metric: Metric::MemoryUsage,
            value: 88.75,
            threshold: 85.0,
        }]);
        let screen = render(PanelWidget {
            panel: Panel::Alerts,
            trends: &trends,
            status: Some(&status),
            focussed: false,
            ui: &ui,
        });
        assert!(screen.contains("memory usage 88.75% exceeds 85.00%"));
        assert!(screen.contains("1 raised"));
    }

    #[test]
    fn cards_wait_for_the_first_sample() {
        let ui = UiState::default();
        let mut trends = Trends::new(85.0, 50.0, 512.0);
        let panel = |trends: &Trends| {
            render(PanelWidget {
                panel: Panel::Host,
                trends,
                status: None,
                focussed: false,
                ui: &ui,
            })
        };
        assert!(panel(&trends).contains("No Samples Yet"));

        trends.record(
            &Sample {
                timestamp: at(0),
                pid: 300,
                memory_total: 16_000_000_000,
                memory_available: 1_800_000_000,
                swap_total: 0,
                swap_used: 0,
                process_resident: 800_000_000,
                process_swapped: 0,
                swap_in_rate: 0.0,
                swap_out_rate: 0.0,
            },
            Instant::now(),
        );
        let screen = panel(&trends);
        assert!(screen.contains("MEM:"));
        assert!(screen.contains("88.8%"));
    }
}

use crate::{
    config::MonitorConfig,
    monitor::{MonitorState, MonitorStatus},
    ui::{
        debug::DebugWidget,
        panel::{Panel, PanelWidget},
        stat_line::Trends,
        state::{Focussable, Mode, UiState},
    },
};
use ratatui::{
    buffer::Buffer, layout::Rect, macros::line as rline, macros::*, prelude::*, widgets::*,
};
use tui_logger::*;

pub struct DashboardWidget<'a> {
    pub ui: &'a UiState,
    pub status: Option<&'a MonitorStatus>,
    pub trends: &'a Trends,
    pub config: &'a MonitorConfig,
}

impl DashboardWidget<'_> {
    /// ` swapwatch  app.jar  ● sampling PID 300  42 samples  every 30s → swapwatch.csv`
    fn header(&self) -> Line<'_> {
        let theme = &self.ui.theme;
        let state = match self.status.map(|s| s.state) {
            None | Some(MonitorState::Stopped) => span!(theme.error; "○ stopped"),
            Some(MonitorState::Starting) => span!(theme.foreground; "{} starting", self.progress_throbber()),
            Some(MonitorState::NotFound) => {
                span!(theme.warning; "{} waiting for target", self.progress_throbber())
            }
            Some(MonitorState::Sampling) => span!(theme.success; "● sampling"),
        };
        let pid = self
            .status
            .and_then(|s| s.target_pid)
            .map(|pid| format!(" PID {pid}"))
            .unwrap_or_default();
        let counts = match self.status {
            Some(s) if s.write_failures > 0 => span!(
                theme.error;
                "  {} samples, {} not logged", s.samples, s.write_failures
            ),
            Some(s) => span!(theme.foreground; "  {} samples", s.samples),
            None => span!(""),
        };
        rline![
            span!(theme.primary; " swapwatch  "),
            span!(theme.accent; "{}", self.config.target),
            span!("  "),
            state,
            span!(theme.foreground; "{}", pid),
            counts,
            span!(
                theme.secondary;
                "  every {}s → {}", self.config.interval_secs, self.config.log_path.display()
            ),
        ]
    }

    fn progress_throbber(&self) -> &'static str {
        const FRAMES: [&str; 4] = ["◑", "◒", "◐", "◓"];
        FRAMES[self.ui.step_of_4_in_1_second()]
    }
}

impl<'a> Widget for &mut DashboardWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let [header_rect, window_rect, log_rect] = vertical![==1, >=5, ==10].areas(area);

        let panel_style = Style::default()
            .bg(self.ui.theme.surface)
            .fg(self.ui.theme.foreground);
        Block::new().style(panel_style).render(header_rect, buf);
        self.header().render(header_rect, buf);

        let main_rect = if self.ui.debug {
            let [main_rect, panel_rect] = horizontal![>=5, >=30].areas(window_rect);
            DebugWidget {
                ui: self.ui,
                status: self.status,
            }
            .render(panel_rect, buf);
            main_rect
        } else {
            window_rect
        };

        let border_color = match self.ui.focus {
            Some(Focussable::Logs) => self.ui.theme.accent,
            _ => self.ui.theme.foreground,
        };
        TuiLoggerSmartWidget::default()
            .style_error(panel_style.fg(self.ui.theme.error))
            .style_debug(panel_style)
            .style_warn(panel_style.fg(self.ui.theme.warning))
            .style_trace(panel_style)
            .style_info(panel_style)
            .style(panel_style)
            .border_style(panel_style.fg(border_color))
            .output_separator(':')
            .output_timestamp(Some("%H:%M:%S".to_string()))
            .output_level(Some(TuiLoggerLevelOutput::Abbreviated))
            .output_target(true)
            .output_file(false)
            .output_line(false)
            .state(&self.ui.logger_state)
            .render(log_rect, buf);

        let main_style = Style::default()
            .bg(self.ui.theme.background)
            .fg(self.ui.theme.foreground);
        Block::new().style(main_style).render(main_rect, buf);

        let horizontal = Layout::horizontal([Constraint::Fill(1); 2])
            .spacing(1)
            .horizontal_margin(1);
        let vertical = Layout::vertical([Constraint::Length(5); 2])
            .spacing(1)
            .margin(1);
        let rows = vertical.split(main_rect);
        let cells = rows.iter().flat_map(|&row| horizontal.split(row).to_vec());

        let spotlit = match (&self.ui.mode, &self.ui.focus) {
            (Mode::Spotlight, Some(Focussable::Panel(i))) => Some(*i),
            _ => None,
        };
        for (index, (panel, area)) in Panel::ALL.into_iter().zip(cells).enumerate() {
            if spotlit == Some(index) {
                continue;
            }
            PanelWidget {
                panel,
                trends: self.trends,
                status: self.status,
                focussed: self.ui.is_focussed(&Focussable::Panel(index)),
                ui: self.ui,
            }
            .render(area, buf);
        }

        if let Some(index) = spotlit
            && let Some(&panel) = Panel::ALL.get(index)
        {
            PanelWidget {
                panel,
                trends: self.trends,
                status: self.status,
                focussed: true,
                ui: self.ui,
            }
            .render(main_rect.inner(Margin::new(2, 1)), buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn screen(dashboard: &mut DashboardWidget) -> String {
        let area = Rect::new(0, 0, 100, 30);
        let mut buf = Buffer::empty(area);
        dashboard.render(area, &mut buf);
        buf.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn header_shows_the_target_and_its_state() {
        let ui = UiState::default();
        let trends = Trends::new(85.0, 50.0, 512.0);
        let config = MonitorConfig {
            target: "app.jar".into(),
            ..Default::default()
        };
        let status = MonitorStatus {
            run: Uuid::nil(),
            state: MonitorState::Sampling,
            target_pid: Some(300),
            samples: 42,
            alerts: 0,
            write_failures: 0,
            diagnostics_runs: 0,
            scans: 1,
            last_sample: None,
            last_alerts: vec![],
        };
        let rendered = screen(&mut DashboardWidget {
            ui: &ui,
            status: Some(&status),
            trends: &trends,
            config: &config,
        });
        assert!(rendered.contains("app.jar"));
        assert!(rendered.contains("● sampling PID 300"));
        assert!(rendered.contains("42 samples"));
        assert!(rendered.contains("Paging"));
    }

    #[test]
    fn missing_target_is_called_out() {
        let ui = UiState::default();
        let trends = Trends::new(85.0, 50.0, 512.0);
        let config = MonitorConfig {
            target: "app.jar".into(),
            ..Default::default()
        };
        let status = MonitorStatus {
            run: Uuid::nil(),
            state: MonitorState::NotFound,
            target_pid: None,
            samples: 0,
            alerts: 0,
            write_failures: 0,
            diagnostics_runs: 0,
            scans: 1,
            last_sample: None,
            last_alerts: vec![],
        };
        let rendered = screen(&mut DashboardWidget {
            ui: &ui,
            status: Some(&status),
            trends: &trends,
            config: &config,
        });
        assert!(rendered.contains("waiting for target"));
        assert!(!rendered.contains("PID"));
    }
}

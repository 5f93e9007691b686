use std::{path::PathBuf, time::Instant};

use crate::{
    config::{ConfigManager, MonitorConfig, Overrides},
    event::{AppEvent, Event, EventHandler},
    monitor::{Monitor, MonitorUpdate, Tick},
    probe::SystemProbe,
    ui::{
        dashboard::DashboardWidget,
        stat_line::Trends,
        state::{Focussable, UiState},
    },
};
use color_eyre::eyre::Result;
use log::*;
use ratatui::{
    DefaultTerminal,
    crossterm::event::{KeyCode, KeyEvent, KeyModifiers},
};
use tokio::sync::mpsc;
use tui_logger::TuiWidgetEvent;

pub struct App {
    pub running: bool,
    pub events: EventHandler,
    pub config: ConfigManager,
    pub monitor: Option<Monitor>,
    pub trends: Trends,
    pub ui_state: UiState,
    /// The configuration the current monitor was started with.
    running_config: MonitorConfig,
}

fn trends_for(config: &MonitorConfig) -> Trends {
    Trends::new(
        config.memory_threshold,
        config.swap_threshold,
        config.process_swap_threshold_mb as f64,
    )
}

impl App {
    pub fn new(config_path: PathBuf, overrides: Overrides) -> Result<Self> {
        Self::with_events(config_path, overrides, EventHandler::new())
    }

    fn with_events(config_path: PathBuf, overrides: Overrides, events: EventHandler) -> Result<Self> {
        let config = ConfigManager::new(config_path, overrides, events.clone_sender())?;
        let running_config = config.current();
        Ok(Self {
            running: true,
            events,
            trends: trends_for(&running_config),
            config,
            monitor: None,
            ui_state: UiState::default(),
            running_config,
        })
    }

    /// Run the application's main loop.
    pub async fn run(&mut self, mut terminal: DefaultTerminal) -> Result<()> {
        self.start(self.running_config.clone())?;
        while self.running {
            terminal.draw(|frame| {
                let status = self.monitor.as_ref().map(Monitor::status);
                let mut dashboard = DashboardWidget {
                    ui: &self.ui_state,
                    status: status.as_ref(),
                    trends: &self.trends,
                    config: &self.running_config,
                };
                frame.render_widget(&mut dashboard, frame.area());
            })?;
            match self.events.next().await? {
                Event::Tick => self.tick(),
                Event::Crossterm(event) => match event {
                    crossterm::event::Event::Key(key_event)
                        if key_event.kind == crossterm::event::KeyEventKind::Press =>
                    {
                        self.handle_key_events(key_event)?
                    }
                    _ => {}
                },
                Event::App(app_event) => match app_event {
                    AppEvent::Reload => self.reload_config().await,
                    AppEvent::Quit => self.quit(),
                    AppEvent::Monitor(update) => self.monitor_update(update),
                },
            }
        }
        self.stop().await;
        Ok(())
    }

    /// Handles the key events and updates the state of [`App`].
    pub fn handle_key_events(&mut self, key_event: KeyEvent) -> Result<()> {
        if self.ui_state.is_focussed(&Focussable::Logs)
            && let Some(logger_event) = logger_event(key_event.code)
        {
            self.ui_state.logger_state.transition(logger_event);
            return Ok(());
        }
        match key_event.code {
            KeyCode::Esc | KeyCode::Char('q') => self.events.send(AppEvent::Quit),
            KeyCode::Char('c' | 'C') if key_event.modifiers == KeyModifiers::CONTROL => {
                self.events.send(AppEvent::Quit)
            }
            KeyCode::Char('r') => self.events.send(AppEvent::Reload),
            KeyCode::Char('d') => self.ui_state.toggle_debug(),
            KeyCode::Tab => self.ui_state.focus_next(),
            KeyCode::BackTab => self.ui_state.focus_prev(),
            KeyCode::Enter => self.ui_state.toggle_spotlight(),
            _ => {}
        }
        Ok(())
    }

    fn tick(&mut self) {
        self.ui_state.tick();
    }

    fn quit(&mut self) {
        self.running = false;
    }

    /// Only updates from the monitor currently running are plotted; a
    /// stopped run may still have a few in flight.
    fn monitor_update(&mut self, update: MonitorUpdate) {
        if self.monitor.as_ref().map(Monitor::run_id) != Some(update.run) {
            trace!(target: "App", "Dropping update from run {}", update.run);
            return;
        }
        if let Tick::Sampled { sample, .. } = &update.tick {
            self.trends.record(sample, Instant::now());
        }
    }

    async fn reload_config(&mut self) {
        debug!(target: "App", "Reload!");
        let config = match self.config.reload() {
            Ok(config) => config,
            Err(e) => {
                error!(target: "App", "Keeping the running configuration: {}", e);
                return;
            }
        };
        if config == self.running_config && self.monitor.is_some() {
            debug!(target: "App", "Configuration unchanged");
            return;
        }
        self.stop().await;
        self.trends.set_thresholds(
            config.memory_threshold,
            config.swap_threshold,
            config.process_swap_threshold_mb as f64,
        );
        if let Err(e) = self.start(config) {
            error!(target: "App", "{}", e);
        }
    }

    /// Start a monitor for `config`, forwarding its ticks into the event loop.
    fn start(&mut self, config: MonitorConfig) -> Result<()> {
        let (updates, mut received) = mpsc::unbounded_channel::<MonitorUpdate>();
        let sender = self.events.clone_sender();
        tokio::spawn(async move {
            while let Some(update) = received.recv().await {
                if sender.send(Event::App(AppEvent::Monitor(update))).is_err() {
                    break;
                }
            }
        });
        let probe = SystemProbe::new(&config.proc_root);
        self.monitor = Some(Monitor::start(&config, probe, Some(updates))?);
        self.running_config = config;
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop().await;
        }
    }
}

fn logger_event(code: KeyCode) -> Option<TuiWidgetEvent> {
    match code {
        KeyCode::Char(' ') => Some(TuiWidgetEvent::SpaceKey),
        KeyCode::Up => Some(TuiWidgetEvent::UpKey),
        KeyCode::Down => Some(TuiWidgetEvent::DownKey),
        KeyCode::Left => Some(TuiWidgetEvent::LeftKey),
        KeyCode::Right => Some(TuiWidgetEvent::RightKey),
        KeyCode::Char('+') => Some(TuiWidgetEvent::PlusKey),
        KeyCode::Char('-') => Some(TuiWidgetEvent::MinusKey),
        KeyCode::Char('h') => Some(TuiWidgetEvent::HideKey),
        KeyCode::Char('f') => Some(TuiWidgetEvent::FocusKey),
        KeyCode::PageUp => Some(TuiWidgetEvent::PrevPageKey),
        KeyCode::PageDown => Some(TuiWidgetEvent::NextPageKey),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use uuid::Uuid;

    use super::*;
    use crate::sample::{Sample, tests::at};

    fn write_config(path: &Path, interval_secs: u64) {
        let log_path = path.with_file_name("swap.csv");
        std::fs::write(
            path,
            format!(
                "target = \"swapwatch-test-no-such-process\"\ninterval_secs = {interval_secs}\nlog_path = {:?}\n",
                log_path.display().to_string()
            ),
        )
        .unwrap();
    }

    fn started_app(path: &Path) -> App {
        let mut app =
            App::with_events(path.to_path_buf(), Overrides::default(), EventHandler::detached())
                .unwrap();
        app.start(app.running_config.clone()).unwrap();
        app
    }

    fn sampled() -> Tick {
        Tick::Sampled {
            sample: Sample {
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
            alerts: vec![],
            logged: true,
        }
    }

    #[tokio::test]
    async fn unchanged_reload_keeps_the_monitor_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swapwatch.toml");
        write_config(&path, 30);
        let mut app = started_app(&path);
        let first = app.monitor.as_ref().map(Monitor::run_id);
        assert!(first.is_some());

        app.reload_config().await;
        assert_eq!(app.monitor.as_ref().map(Monitor::run_id), first);

        write_config(&path, 60);
        app.reload_config().await;
        let second = app.monitor.as_ref().map(Monitor::run_id);
        assert!(second.is_some());
        assert_ne!(second, first);
        assert_eq!(app.running_config.interval_secs, 60);

        // an invalid file leaves the new monitor alone
        write_config(&path, 0);
        app.reload_config().await;
        assert_eq!(app.monitor.as_ref().map(Monitor::run_id), second);
        assert_eq!(app.running_config.interval_secs, 60);

        app.stop().await;
        assert!(app.monitor.is_none());
    }

    #[tokio::test]
    async fn updates_from_an_earlier_run_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swapwatch.toml");
        write_config(&path, 30);
        let mut app = started_app(&path);
        let Some(run) = app.monitor.as_ref().map(Monitor::run_id) else {
            panic!("the monitor should be running");
        };

        app.monitor_update(MonitorUpdate {
            run: Uuid::new_v4(),
            tick: sampled(),
        });
        assert!(app.trends.is_empty());

        app.monitor_update(MonitorUpdate { run, tick: sampled() });
        assert!(!app.trends.is_empty());
        app.stop().await;
    }

    #[test]
    fn log_pane_keys_leave_app_keys_alone() {
        assert!(matches!(logger_event(KeyCode::PageUp), Some(TuiWidgetEvent::PrevPageKey)));
        assert!(logger_event(KeyCode::Char('q')).is_none());
        assert!(logger_event(KeyCode::Tab).is_none());
        assert!(logger_event(KeyCode::Char('r')).is_none());
    }
}

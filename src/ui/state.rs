use std::{fmt::Debug, time::Instant};

use crate::{event::TICK_FPS, ui::theme::Theme};
use tui_logger::*;

/// Number of metric panels on the dashboard.
pub const PANELS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dashboard,
    /// The focussed panel fills the window.
    Spotlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Focussable {
    Panel(usize),
    Logs,
    Debug,
}

pub struct UiState {
    pub tick: f64,
    pub time: Instant,
    pub theme: Theme,
    pub focus: Option<Focussable>,
    pub mode: Mode,
    pub debug: bool,
    pub logger_state: TuiWidgetState,
}

impl Debug for UiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiState")
            .field("tick", &self.tick)
            .field("time", &self.time)
            .field("focus", &self.focus)
            .field("mode", &self.mode)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            logger_state: TuiWidgetState::new(),
            tick: Default::default(),
            time: Instant::now(),
            theme: Theme::dark(),
            focus: None,
            mode: Mode::Dashboard,
            debug: false,
        }
    }
}

impl UiState {
    pub fn tick(&mut self) {
        self.tick += 1.0;
        if self.tick >= 2.0 * TICK_FPS {
            self.tick = 0.0;
        }
        self.time = Instant::now();
    }

    pub fn step_of_4_in_1_second(&self) -> usize {
        (self.tick * 4.0 / TICK_FPS) as usize % 4
    }

    pub fn toggle_debug(&mut self) {
        self.debug = !self.debug;
        if !self.debug
            && let Some(Focussable::Debug) = &self.focus
        {
            self.focus = Some(Focussable::Panel(0));
        }
    }

    /// Only a focussed panel can be spotlit.
    pub fn toggle_spotlight(&mut self) {
        self.mode = match (self.mode, &self.focus) {
            (Mode::Dashboard, Some(Focussable::Panel(_))) => Mode::Spotlight,
            _ => Mode::Dashboard,
        };
    }

    pub fn focus_next(&mut self) {
        self.focus = match &self.focus {
            None => Some(Focussable::Panel(0)),
            Some(Focussable::Panel(i)) if i + 1 < PANELS => Some(Focussable::Panel(i + 1)),
            Some(Focussable::Panel(_)) => Some(Focussable::Logs),
            Some(Focussable::Logs) if self.debug => Some(Focussable::Debug),
            Some(Focussable::Logs) | Some(Focussable::Debug) => Some(Focussable::Panel(0)),
        }
    }

    pub fn focus_prev(&mut self) {
        self.focus = match &self.focus {
            None => Some(Focussable::Panel(0)),
            Some(Focussable::Panel(0)) if self.debug => Some(Focussable::Debug),
            Some(Focussable::Panel(0)) => Some(Focussable::Logs),
            Some(Focussable::Panel(i)) => Some(Focussable::Panel(i - 1)),
            Some(Focussable::Logs) => Some(Focussable::Panel(PANELS - 1)),
            Some(Focussable::Debug) => Some(Focussable::Logs),
        }
    }

    pub fn is_focussed(&self, target: &Focussable) -> bool {
        self.focus.as_ref() == Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throbber_cycles_four_steps_a_second() {
        let mut ui = UiState::default();
        let mut steps = vec![];
        for _ in 0..(2 * TICK_FPS as usize) {
            steps.push(ui.step_of_4_in_1_second());
            ui.tick();
        }
        assert_eq!(steps, vec![0, 0, 1, 1, 2, 2, 3, 3, 0, 0, 1, 1, 2, 2, 3, 3]);
        assert_eq!(ui.tick, 0.0);
    }

    #[test]
    fn focus_walks_panels_then_logs() {
        let mut ui = UiState::default();
        let mut seen = vec![];
        for _ in 0..6 {
            ui.focus_next();
            seen.push(ui.focus.clone().unwrap());
        }
        assert_eq!(
            seen,
            vec![
                Focussable::Panel(0),
                Focussable::Panel(1),
                Focussable::Panel(2),
                Focussable::Panel(3),
                Focussable::Logs,
                Focussable::Panel(0),
            ]
        );
    }

    #[test]
    fn debug_panel_joins_the_cycle() {
        let mut ui = UiState::default();
        ui.toggle_debug();
        ui.focus = Some(Focussable::Logs);
        ui.focus_next();
        assert!(ui.is_focussed(&Focussable::Debug));
        ui.focus_prev();
        assert!(ui.is_focussed(&Focussable::Logs));
        ui.focus = Some(Focussable::Debug);
        ui.toggle_debug();
        assert!(ui.is_focussed(&Focussable::Panel(0)));
    }

    #[test]
    fn spotlight_needs_a_focussed_panel() {
        let mut ui = UiState::default();
        ui.toggle_spotlight();
        assert_eq!(ui.mode, Mode::Dashboard);
        ui.focus_next();
        ui.toggle_spotlight();
        assert_eq!(ui.mode, Mode::Spotlight);
        ui.toggle_spotlight();
        assert_eq!(ui.mode, Mode::Dashboard);
    }
}

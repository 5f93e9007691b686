pub mod dashboard;
pub mod debug;
pub mod panel;
pub mod stat_line;
pub mod state;
pub mod theme;

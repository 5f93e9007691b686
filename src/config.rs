//! Monitor configuration: file, environment and command-line layers, plus a
//! ConfigManager that watches the file for edits.
//!

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::Result;
use log::*;
use notify::{RecommendedWatcher, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    alert::Thresholds,
    error::MonitorError,
    event::{AppEvent, Event},
};

pub const DEFAULT_FILE: &str = "swapwatch.toml";
pub const ENV_PREFIX: &str = "SWAPWATCH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Shell-style command lines run when alerts first appear.
    pub commands: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            commands: vec![],
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Substring of the target's command line.
    pub target: String,
    pub interval_secs: u64,
    pub memory_threshold: f64,
    pub swap_threshold: f64,
    pub process_swap_threshold_mb: u64,
    pub log_path: PathBuf,
    pub max_log_bytes: u64,
    pub log_backups: usize,
    pub not_found_backoff_secs: u64,
    pub minimum_sleep_ms: u64,
    pub proc_root: PathBuf,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            interval_secs: 30,
            memory_threshold: 85.0,
            swap_threshold: 50.0,
            process_swap_threshold_mb: 512,
            log_path: PathBuf::from("swapwatch.csv"),
            max_log_bytes: 10 * 1024 * 1024,
            log_backups: 5,
            not_found_backoff_secs: 5,
            minimum_sleep_ms: 1000,
            proc_root: PathBuf::from("/proc"),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub target: Option<String>,
    pub interval_secs: Option<u64>,
    pub memory_threshold: Option<f64>,
    pub log_path: Option<PathBuf>,
}

impl MonitorConfig {
    /// Layer the optional file, `SWAPWATCH_*` variables and `overrides`.
    pub fn load(file_path: &Path, overrides: &Overrides) -> Result<MonitorConfig> {
        Self::layered(file_path, overrides, ENV_PREFIX)
    }

    fn layered(file_path: &Path, overrides: &Overrides, env_prefix: &str) -> Result<MonitorConfig> {
        let raw = config::Config::builder()
            .add_source(config::File::from(file_path).required(false))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let mut config: MonitorConfig = raw.try_deserialize()?;
        config.apply(overrides);
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(target) = &overrides.target {
            self.target = target.clone();
        }
        if let Some(interval) = overrides.interval_secs {
            self.interval_secs = interval;
        }
        if let Some(threshold) = overrides.memory_threshold {
            self.memory_threshold = threshold;
        }
        if let Some(path) = &overrides.log_path {
            self.log_path = path.clone();
        }
    }

    /// Everything the monitor loop relies on. Run before the loop starts.
    pub fn validate(&self) -> Result<(), MonitorError> {
        let fail = |msg: String| Err(MonitorError::Config(msg));
        if self.target.trim().is_empty() {
            return fail("target marker must not be empty".into());
        }
        if self.interval_secs == 0 {
            return fail("interval_secs must be at least 1".into());
        }
        for (name, value) in [
            ("memory_threshold", self.memory_threshold),
            ("swap_threshold", self.swap_threshold),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return fail(format!("{name} must be a percentage in (0, 100], got {value}"));
            }
        }
        if self.log_path.as_os_str().is_empty() {
            return fail("log_path must not be empty".into());
        }
        if self.max_log_bytes < 1024 {
            return fail(format!(
                "max_log_bytes must be at least 1024, got {}",
                self.max_log_bytes
            ));
        }
        if self.log_backups > 100 {
            return fail(format!("log_backups must be at most 100, got {}", self.log_backups));
        }
        if self.not_found_backoff_secs == 0 {
            return fail("not_found_backoff_secs must be at least 1".into());
        }
        if self.diagnostics.timeout_secs == 0 {
            return fail("diagnostics.timeout_secs must be at least 1".into());
        }
        for command in &self.diagnostics.commands {
            match shlex::split(command) {
                Some(words) if !words.is_empty() => {}
                _ => return fail(format!("diagnostics command {command:?} does not parse")),
            }
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            memory_percent: self.memory_threshold,
            swap_percent: self.swap_threshold,
            process_swap_bytes: self.process_swap_threshold_mb.saturating_mul(1_000_000),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn not_found_backoff(&self) -> Duration {
        Duration::from_secs(self.not_found_backoff_secs)
    }

    pub fn minimum_sleep(&self) -> Duration {
        Duration::from_millis(self.minimum_sleep_ms)
    }

    pub fn diagnostics_timeout(&self) -> Duration {
        Duration::from_secs(self.diagnostics.timeout_secs)
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    pub file_path: PathBuf,
    overrides: Overrides,
    config: MonitorConfig,
    _watcher: Option<RecommendedWatcher>,
}

impl ConfigManager {
    /// Load the configuration and watch the directory holding the file, so
    /// editors that save by replacing the file still trigger
    /// [`AppEvent::Reload`], as does creating it later.
    pub fn new(
        file_path: PathBuf,
        overrides: Overrides,
        sender: UnboundedSender<Event>,
    ) -> Result<ConfigManager> {
        let config = MonitorConfig::load(&file_path, &overrides)?;
        if !file_path.exists() {
            info!(target: "config", "No file at {:?}, using defaults and overrides", file_path);
        }
        let directory = match file_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let watcher = match (directory.is_dir(), file_path.file_name()) {
            (true, Some(name)) => {
                let name = name.to_os_string();
                let captured = sender.clone();
                let mut watcher =
                    notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                        if let Ok(event) = res
                            && touches(&event, &name)
                        {
                            let _ = captured.send(Event::App(AppEvent::Reload));
                        }
                    })?;
                info!(target: "config", "Watching {:?} for changes to {:?}", directory, file_path);
                watcher.watch(&directory, notify::RecursiveMode::NonRecursive)?;
                Some(watcher)
            }
            _ => {
                warn!(target: "config", "Not watching {:?}: no such directory", file_path);
                None
            }
        };
        Ok(ConfigManager {
            file_path,
            overrides,
            config,
            _watcher: watcher,
        })
    }

    pub fn current(&self) -> MonitorConfig {
        self.config.clone()
    }

    /// Re-read the file. The previous configuration stays current when the new
    /// one fails to load or validate.
    pub fn reload(&mut self) -> Result<MonitorConfig> {
        let config = MonitorConfig::load(&self.file_path, &self.overrides)?;
        config.validate()?;
        self.config = config;
        Ok(self.current())
    }
}

/// Whether a directory event wrote or replaced the file called `name`.
/// Removal is ignored: a reload would only fall back to the defaults, and a
/// replacing save sends a create or rename right after.
fn touches(event: &notify::Event, name: &OsStr) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|path| path.file_name() == Some(name))
}

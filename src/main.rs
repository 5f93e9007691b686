use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use log::info;
use std::path::{Path, PathBuf};
use tokio::signal::unix::{SignalKind, signal};
use tui_logger::{
    TuiLoggerFile, TuiLoggerLevelOutput, init_logger, set_default_level, set_log_file,
};

use crate::{
    app::App,
    config::{MonitorConfig, Overrides},
    history::SampleLog,
    monitor::Monitor,
    optimize::{Readings, checklist},
    probe::SystemProbe,
    report::Report,
};

pub mod alert;
pub mod app;
pub mod config;
pub mod error;
pub mod event;
pub mod history;
pub mod monitor;
pub mod optimize;
pub mod probe;
pub mod report;
pub mod resample;
pub mod sample;
pub mod service;
pub mod target;
pub mod ui;

#[derive(Parser, Debug)]
#[command(about, version)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = config::DEFAULT_FILE, global = true)]
    config: PathBuf,
    /// Substring of the target process's command line
    #[arg(short, long, value_name = "MARKER", global = true)]
    target: Option<String>,
    /// Seconds between samples
    #[arg(short, long, value_name = "SECS", global = true)]
    interval: Option<u64>,
    /// Memory usage alert threshold in percent
    #[arg(long, value_name = "PERCENT", global = true)]
    threshold: Option<f64>,
    /// CSV file the samples are appended to
    #[arg(long, value_name = "FILE", global = true)]
    log_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            target: self.target.clone(),
            interval_secs: self.interval,
            memory_threshold: self.threshold,
            log_path: self.log_path.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Sample the target until stopped (the default)
    Monitor {
        /// Log to stderr instead of drawing the dashboard
        #[arg(long)]
        headless: bool,
    },
    /// Summarise the sample log
    Report,
    /// Check kernel memory settings and suggest changes
    Optimize,
    /// Install and start a systemd user service running the headless monitor
    Install,
    /// Stop and remove the systemd user service
    Uninstall,
    /// Validate the configuration and print the effective values
    Validate,
}

/// Plain stderr logging for everything but the dashboard. `RUST_LOG` wins
/// over the default level.
fn init_plain_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(true)
        .init();
}

fn load(config_path: &Path, overrides: &Overrides) -> Result<MonitorConfig> {
    let config = MonitorConfig::load(config_path, overrides)?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let overrides = cli.overrides();
    match cli.command.unwrap_or(Commands::Monitor { headless: false }) {
        Commands::Monitor { headless: false } => {
            // fail on a bad configuration before the terminal is taken over
            load(&cli.config, &overrides)?;
            init_logger(tui_logger::LevelFilter::Debug)?;
            let file_options = TuiLoggerFile::new("swapwatch.log")
                .output_level(Some(TuiLoggerLevelOutput::Abbreviated))
                .output_file(false)
                .output_separator(':');
            set_log_file(file_options);
            info!("Logging started");
            let mut app = App::new(cli.config, overrides)?;
            set_default_level(tui_logger::LevelFilter::Info);
            let terminal = ratatui::init();
            let result = app.run(terminal).await;
            ratatui::restore();
            result
        }
        Commands::Monitor { headless: true } => {
            init_plain_logger();
            let config = load(&cli.config, &overrides)?;
            run_headless(&config).await
        }
        Commands::Report => {
            init_plain_logger();
            let config = MonitorConfig::load(&cli.config, &overrides)?;
            let log = SampleLog::new(&config.log_path, config.max_log_bytes, config.log_backups);
            let samples = log.read_all()?;
            print!("{}", Report::build(&samples, &config.thresholds()));
            Ok(())
        }
        Commands::Optimize => {
            init_plain_logger();
            let config = MonitorConfig::load(&cli.config, &overrides)?;
            for check in checklist(&Readings::read(&config.proc_root)) {
                println!("{check}");
            }
            Ok(())
        }
        Commands::Install => {
            init_plain_logger();
            load(&cli.config, &overrides)?;
            let unit = service::install(&cli.config, &overrides).await?;
            println!("Installed and started {}", unit.display());
            Ok(())
        }
        Commands::Uninstall => {
            init_plain_logger();
            let unit = service::uninstall().await?;
            println!("Removed {}", unit.display());
            Ok(())
        }
        Commands::Validate => {
            let config = load(&cli.config, &overrides)?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Sample until SIGINT or SIGTERM, then let the current tick finish.
async fn run_headless(config: &MonitorConfig) -> Result<()> {
    let mut monitor = Monitor::start(config, SystemProbe::new(&config.proc_root), None)?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    info!("Shutting down");
    monitor.stop().await;
    let status = monitor.status();
    info!(
        "{} samples, {} alerts, {} rows not logged",
        status.samples, status.alerts, status.write_failures
    );
    Ok(())
}

//! Registering the monitor as a systemd user service.

use std::{
    env,
    path::{Path, PathBuf, absolute},
    process::Stdio,
};

use color_eyre::eyre::{Result, eyre};
use log::*;
use tokio::process::Command;

use crate::config::Overrides;

pub const UNIT_NAME: &str = "swapwatch.service";

/// `$XDG_CONFIG_HOME/systemd/user`, falling back to `~/.config/systemd/user`.
pub fn unit_dir() -> Result<PathBuf> {
    let base = match env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .ok_or(eyre!("Neither XDG_CONFIG_HOME nor HOME is set"))?,
    };
    Ok(base.join("systemd").join("user"))
}

/// Arguments the service starts the binary with. Command-line overrides given
/// at install time are kept so the service watches the same target.
pub fn monitor_args(config: &Path, overrides: &Overrides) -> Vec<String> {
    let mut args = vec!["--config".to_string(), config.display().to_string()];
    if let Some(target) = &overrides.target {
        args.extend(["--target".to_string(), target.clone()]);
    }
    if let Some(interval) = overrides.interval_secs {
        args.extend(["--interval".to_string(), interval.to_string()]);
    }
    if let Some(threshold) = overrides.memory_threshold {
        args.extend(["--threshold".to_string(), threshold.to_string()]);
    }
    if let Some(path) = &overrides.log_path {
        args.extend(["--log-path".to_string(), path.display().to_string()]);
    }
    args.extend(["monitor".to_string(), "--headless".to_string()]);
    args
}

pub fn render_unit(exe: &Path, args: &[String]) -> String {
    let exec = std::iter::once(exe.display().to_string())
        .chain(args.iter().cloned())
        .map(|arg| shlex::try_quote(&arg).map(|q| q.into_owned()).unwrap_or(arg.clone()))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "[Unit]\n\
         Description=Memory and swap monitor\n\
         After=default.target\n\
         \n\
         [Service]\n\
         Type=simple\n\
         ExecStart={exec}\n\
         Restart=on-failure\n\
         RestartSec=10\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n"
    )
}

async fn systemctl(args: &[&str]) -> Result<()> {
    info!(target: "service", "systemctl --user {}", args.join(" "));
    let status = Command::new("systemctl")
        .arg("--user")
        .args(args)
        .stdin(Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(eyre!("systemctl --user {} exited with {}", args.join(" "), status))
    }
}

pub async fn install(config: &Path, overrides: &Overrides) -> Result<PathBuf> {
    let exe = env::current_exe()?;
    let mut overrides = overrides.clone();
    if let Some(path) = &overrides.log_path {
        overrides.log_path = Some(absolute(path)?);
    }
    let args = monitor_args(&absolute(config)?, &overrides);
    let dir = unit_dir()?;
    tokio::fs::create_dir_all(&dir).await?;
    let unit_path = dir.join(UNIT_NAME);
    tokio::fs::write(&unit_path, render_unit(&exe, &args)).await?;
    info!(target: "service", "Wrote {}", unit_path.display());
    systemctl(&["daemon-reload"]).await?;
    systemctl(&["enable", "--now", UNIT_NAME]).await?;
    Ok(unit_path)
}

pub async fn uninstall() -> Result<PathBuf> {
    let unit_path = unit_dir()?.join(UNIT_NAME);
    if let Err(err) = systemctl(&["disable", "--now", UNIT_NAME]).await {
        warn!(target: "service", "{}", err);
    }
    match tokio::fs::remove_file(&unit_path).await {
        Ok(()) => info!(target: "service", "Removed {}", unit_path.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(target: "service", "{} was not installed", unit_path.display())
        }
        Err(err) => return Err(err.into()),
    }
    systemctl(&["daemon-reload"]).await?;
    Ok(unit_path)
}

//! External snapshot commands (`free -m`, `vmstat 1 3`, ...) captured when a
//! memory alert first fires.

use std::{process::Stdio, time::Duration};

use log::*;
use tokio::process::Command;

/// How much of each output stream is kept in the log.
const MAX_LOGGED_LINES: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// Ran past the deadline; the child was killed and its output discarded.
    TimedOut,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub command: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    commands: Vec<String>,
    timeout: Duration,
}

impl Diagnostics {
    pub fn new(commands: Vec<String>, timeout: Duration) -> Self {
        Self { commands, timeout }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run every command in turn, each bounded by the timeout, and log what
    /// came back.
    pub async fn snapshot(&self) -> Vec<Snapshot> {
        let mut snapshots = Vec::with_capacity(self.commands.len());
        for command in &self.commands {
            let outcome = run(command, self.timeout).await;
            log_outcome(command, &outcome);
            snapshots.push(Snapshot {
                command: command.clone(),
                outcome,
            });
        }
        snapshots
    }
}

async fn run(command: &str, timeout: Duration) -> Outcome {
    let Some(words) = shlex::split(command) else {
        return Outcome::Failed("Bad command string".to_string());
    };
    let Some((program, args)) = words.split_first() else {
        return Outcome::Failed("Empty command".to_string());
    };
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => Outcome::TimedOut,
        Ok(Err(err)) => Outcome::Failed(err.to_string()),
        Ok(Ok(output)) => Outcome::Completed {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
    }
}

fn log_outcome(command: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Completed {
            code,
            stdout,
            stderr,
        } => {
            info!(target: "diagnostics", "$ {} (exit {:?})", command, code);
            for line in stdout.lines().take(MAX_LOGGED_LINES) {
                info!(target: "diagnostics", "{}", line);
            }
            for line in stderr.lines().take(MAX_LOGGED_LINES) {
                warn!(target: "diagnostics", "{}", line);
            }
        }
        Outcome::TimedOut => {
            warn!(target: "diagnostics", "$ {} timed out, output discarded", command)
        }
        Outcome::Failed(err) => error!(target: "diagnostics", "$ {} failed: {}", command, err),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_output() {
        let diagnostics = Diagnostics::new(vec!["echo 'low memory'".into()], Duration::from_secs(5));
        let snapshots = diagnostics.snapshot().await;
        assert_eq!(
            snapshots[0].outcome,
            Outcome::Completed {
                code: Some(0),
                stdout: "low memory\n".into(),
                stderr: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn slow_command_is_discarded() {
        let diagnostics = Diagnostics::new(vec!["sleep 10".into()], Duration::from_millis(100));
        let started = std::time::Instant::now();
        let snapshots = diagnostics.snapshot().await;
        assert_eq!(snapshots[0].outcome, Outcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_program_fails() {
        let diagnostics = Diagnostics::new(
            vec!["swapwatch-no-such-program --flag".into(), "echo ok".into()],
            Duration::from_secs(5),
        );
        let snapshots = diagnostics.snapshot().await;
        assert!(matches!(snapshots[0].outcome, Outcome::Failed(_)));
        assert!(matches!(snapshots[1].outcome, Outcome::Completed { .. }));
    }
}

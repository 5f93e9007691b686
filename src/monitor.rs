//! The sampling loop and the controller that starts and stops it.
//!
//! Everything that touches the log or the cached target handle runs on one
//! task, in order: rotate, resolve, sample, append, evaluate. The controller
//! only holds the stop signal, the task handle and a status receiver.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::*;
use tokio::{
    select,
    sync::{mpsc::UnboundedSender, oneshot, watch},
    task::JoinHandle,
    time::sleep,
};
use uuid::Uuid;

use crate::{
    alert::{Alert, Thresholds, evaluate},
    config::MonitorConfig,
    error::MonitorError,
    history::SampleLog,
    probe::Probe,
    sample::{RawCounters, Sample, take_sample},
    target::TargetResolver,
};

pub mod diagnostics;

pub use diagnostics::Diagnostics;

/// What one pass of the loop produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    TargetMissing,
    Unavailable(String),
    Sampled {
        sample: Sample,
        alerts: Vec<Alert>,
        /// False when the row could not be written.
        logged: bool,
    },
}

/// Owns the probe, the cached target and the previous counters.
#[derive(Debug)]
pub struct Sampler<P> {
    probe: P,
    resolver: TargetResolver,
    log: SampleLog,
    thresholds: Thresholds,
    previous: Option<RawCounters>,
}

impl<P: Probe> Sampler<P> {
    pub fn new(probe: P, resolver: TargetResolver, log: SampleLog, thresholds: Thresholds) -> Self {
        Self {
            probe,
            resolver,
            log,
            thresholds,
            previous: None,
        }
    }

    pub fn from_config(config: &MonitorConfig, probe: P) -> Self {
        Self::new(
            probe,
            TargetResolver::new(config.target.clone()),
            SampleLog::new(&config.log_path, config.max_log_bytes, config.log_backups),
            config.thresholds(),
        )
    }

    #[cfg(test)]
    pub fn probe(&self) -> &P {
        &self.probe
    }

    #[cfg(test)]
    pub fn probe_mut(&mut self) -> &mut P {
        &mut self.probe
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    /// One pass. Failures are logged here and folded into the result; none of
    /// them stop the loop.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Tick {
        if let Err(err) = self.log.rotate_if_needed() {
            error!(target: "history", "{}", err);
        }

        let handle = match self.resolver.resolve(&mut self.probe) {
            Ok(handle) => handle,
            Err(err) => {
                debug!(target: "sampler", "{}", err);
                return Tick::TargetMissing;
            }
        };

        let (sample, raw) =
            match take_sample(&mut self.probe, &handle, self.previous.as_ref(), now) {
                Ok(reading) => reading,
                Err(err) => {
                    warn!(target: "sampler", "{}", err);
                    return Tick::Unavailable(err.to_string());
                }
            };
        self.previous = Some(raw);

        let logged = match self.log.append(&sample) {
            Ok(()) => true,
            Err(err) => {
                error!(target: "history", "{}", err);
                false
            }
        };

        let alerts = evaluate(&sample, &self.thresholds);
        for alert in &alerts {
            warn!(target: "sampler", "PID {}: {}", sample.pid, alert);
        }
        debug!(
            target: "sampler",
            "PID {} rss={}B swapped={}B in={:.1}/s out={:.1}/s",
            sample.pid, sample.process_resident, sample.process_swapped,
            sample.swap_in_rate, sample.swap_out_rate
        );
        Tick::Sampled {
            sample,
            alerts,
            logged,
        }
    }
}

/// Sleep lengths for each outcome of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub interval: Duration,
    pub not_found_backoff: Duration,
    pub minimum_sleep: Duration,
}

impl Cadence {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            interval: config.interval(),
            not_found_backoff: config.not_found_backoff(),
            minimum_sleep: config.minimum_sleep(),
        }
    }

    /// Keep the cadence close to `interval` however long the tick took.
    pub fn next_sleep(&self, tick_took: Duration) -> Duration {
        self.interval
            .saturating_sub(tick_took)
            .max(self.minimum_sleep)
    }

    fn after(&self, tick: &Tick, tick_took: Duration) -> Duration {
        match tick {
            Tick::TargetMissing => self.not_found_backoff,
            Tick::Unavailable(_) => self.interval,
            Tick::Sampled { .. } => self.next_sleep(tick_took),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Starting,
    /// Polling for the target.
    NotFound,
    Sampling,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStatus {
    pub run: Uuid,
    pub state: MonitorState,
    pub target_pid: Option<u32>,
    pub samples: u64,
    pub alerts: u64,
    pub write_failures: u64,
    /// Times the diagnostics commands were run.
    pub diagnostics_runs: u64,
    /// Full process-table scans so far.
    pub scans: u64,
    pub last_sample: Option<Sample>,
    pub last_alerts: Vec<Alert>,
}

impl MonitorStatus {
    fn new(run: Uuid) -> Self {
        Self {
            run,
            state: MonitorState::Starting,
            target_pid: None,
            samples: 0,
            alerts: 0,
            write_failures: 0,
            diagnostics_runs: 0,
            scans: 0,
            last_sample: None,
            last_alerts: vec![],
        }
    }

    fn record(&mut self, tick: &Tick) {
        match tick {
            Tick::TargetMissing => {
                self.state = MonitorState::NotFound;
                self.target_pid = None;
            }
            // the target resolved; only its metrics could not be read
            Tick::Unavailable(_) => self.state = MonitorState::Sampling,
            Tick::Sampled {
                sample,
                alerts,
                logged,
            } => {
                self.state = MonitorState::Sampling;
                self.target_pid = Some(sample.pid);
                self.samples += 1;
                self.alerts += alerts.len() as u64;
                if !logged {
                    self.write_failures += 1;
                }
                self.last_sample = Some(*sample);
                self.last_alerts = alerts.clone();
            }
        }
    }
}

/// Remembers whether the last sampled tick raised alerts, so diagnostics run
/// once when alerts appear rather than on every tick they persist.
#[derive(Debug, Default)]
struct AlertEdge {
    alerting: bool,
}

impl AlertEdge {
    /// True when `tick` raises alerts and the previous sampled tick had none.
    /// Ticks without a sample leave the memory alone.
    fn rising(&mut self, tick: &Tick) -> bool {
        let Tick::Sampled { alerts, .. } = tick else {
            return false;
        };
        let raised = !alerts.is_empty();
        let rising = raised && !self.alerting;
        self.alerting = raised;
        rising
    }
}

/// A tick as seen by observers, tagged with the run that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorUpdate {
    pub run: Uuid,
    pub tick: Tick,
}

/// Handle on a running sampling loop.
#[derive(Debug)]
pub struct Monitor {
    run: Uuid,
    closer: Option<oneshot::Receiver<()>>,
    task: Option<JoinHandle<()>>,
    status: watch::Receiver<MonitorStatus>,
}

impl Monitor {
    /// Validate `config` and spawn the loop for it.
    pub fn start<P>(
        config: &MonitorConfig,
        probe: P,
        updates: Option<UnboundedSender<MonitorUpdate>>,
    ) -> Result<Monitor, MonitorError>
    where
        P: Probe + Send + 'static,
    {
        config.validate()?;
        let sampler = Sampler::from_config(config, probe);
        let diagnostics = Diagnostics::new(
            config.diagnostics.commands.clone(),
            config.diagnostics_timeout(),
        );
        info!(
            target: "monitor",
            "Watching {:?} every {}s, logging to {}",
            config.target, config.interval_secs, config.log_path.display()
        );
        Ok(Self::spawn(
            sampler,
            Cadence::from_config(config),
            diagnostics,
            updates,
        ))
    }

    pub fn spawn<P>(
        sampler: Sampler<P>,
        cadence: Cadence,
        diagnostics: Diagnostics,
        updates: Option<UnboundedSender<MonitorUpdate>>,
    ) -> Monitor
    where
        P: Probe + Send + 'static,
    {
        let run = Uuid::new_v4();
        let (closed, closer) = oneshot::channel();
        let (status_tx, status) = watch::channel(MonitorStatus::new(run));
        let task = tokio::spawn(sampling_loop(
            run,
            sampler,
            cadence,
            diagnostics,
            closed,
            status_tx,
            updates,
        ));
        Monitor {
            run,
            closer: Some(closer),
            task: Some(task),
            status,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run
    }

    pub fn status(&self) -> MonitorStatus {
        self.status.borrow().clone()
    }

    /// A receiver that sees every status change.
    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status.clone()
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signal the loop and wait for it to exit. A tick in progress completes
    /// first; a sleep in progress is cut short.
    pub async fn stop(&mut self) {
        drop(self.closer.take());
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!(target: "monitor", "Sampling task failed: {}", err);
            }
            info!(target: "monitor", "Run {} stopped", self.run);
        }
    }
}

async fn sampling_loop<P: Probe>(
    run: Uuid,
    mut sampler: Sampler<P>,
    cadence: Cadence,
    diagnostics: Diagnostics,
    mut closed: oneshot::Sender<()>,
    status: watch::Sender<MonitorStatus>,
    updates: Option<UnboundedSender<MonitorUpdate>>,
) {
    debug!(target: "monitor", "Run {} started", run);
    let mut edge = AlertEdge::default();
    while !closed.is_closed() {
        let started = Instant::now();
        let tick = sampler.tick(Utc::now());
        let scans = sampler.resolver().scans();
        status.send_modify(|s| {
            s.record(&tick);
            s.scans = scans;
        });
        if let Some(updates) = &updates {
            let _ = updates.send(MonitorUpdate {
                run,
                tick: tick.clone(),
            });
        }

        if edge.rising(&tick) && !diagnostics.is_empty() {
            diagnostics.snapshot().await;
            status.send_modify(|s| s.diagnostics_runs += 1);
        }

        // measured after diagnostics so a snapshot does not stretch the cadence
        let pause = cadence.after(&tick, started.elapsed());

        select! {
            _ = sleep(pause) => {}
            _ = closed.closed() => break,
        }
    }
    status.send_modify(|s| s.state = MonitorState::Stopped);
}

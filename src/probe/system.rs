use std::path::PathBuf;

use log::*;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use crate::{
    error::{MonitorError, Result},
    probe::{
        MetricSource, ProcessEntry, ProcessMemory, ProcessTable, SwapCounters, SystemMemory,
        procfs,
    },
};

/// The real host: sysinfo for the process table and memory totals, direct
/// reads under `proc_root` for the counters sysinfo does not expose.
#[derive(Debug)]
pub struct SystemProbe {
    sys: System,
    proc_root: PathBuf,
}

impl SystemProbe {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            sys: System::new(),
            proc_root: proc_root.into(),
        }
    }

    fn refresh(&mut self, which: ProcessesToUpdate<'_>) {
        self.sys.refresh_processes_specifics(
            which,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );
    }
}

fn command_line_of(process: &sysinfo::Process) -> String {
    process
        .cmd()
        .iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

impl ProcessTable for SystemProbe {
    fn command_line(&mut self, pid: u32) -> Option<String> {
        let pid = Pid::from_u32(pid);
        self.refresh(ProcessesToUpdate::Some(&[pid]));
        self.sys.process(pid).map(command_line_of)
    }

    fn scan(&mut self) -> Vec<ProcessEntry> {
        self.refresh(ProcessesToUpdate::All);
        let entries: Vec<ProcessEntry> = self
            .sys
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                command_line: command_line_of(process),
            })
            .collect();
        trace!(target: "probe", "Scanned {} processes", entries.len());
        entries
    }
}

impl MetricSource for SystemProbe {
    fn system_memory(&mut self) -> Result<SystemMemory> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Err(MonitorError::unavailable(
                "system memory",
                "total memory reported as zero",
            ));
        }
        Ok(SystemMemory {
            total,
            available: self.sys.available_memory(),
            swap_total: self.sys.total_swap(),
            swap_free: self.sys.free_swap(),
        })
    }

    fn swap_counters(&mut self) -> Result<SwapCounters> {
        procfs::read_vmstat(&self.proc_root)
    }

    fn process_memory(&mut self, pid: u32) -> Result<ProcessMemory> {
        procfs::read_process_memory(&self.proc_root, pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_come_from_proc_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("vmstat"), "pswpin 7\npswpout 9\n").unwrap();
        let mut probe = SystemProbe::new(root.path());
        assert_eq!(
            probe.swap_counters().unwrap(),
            SwapCounters {
                pages_in: 7,
                pages_out: 9
            }
        );
        assert!(probe.process_memory(u32::MAX).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn finds_this_process_in_the_table() {
        let mut probe = SystemProbe::new("/proc");
        let me = std::process::id();
        assert!(probe.scan().iter().any(|entry| entry.pid == me));
        assert!(probe.command_line(me).is_some());
    }
}

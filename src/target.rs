//! Locating the monitored process by a marker in its command line.

use log::*;

use crate::{
    error::{MonitorError, Result},
    probe::ProcessTable,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
    pub command_line: String,
}

/// Resolves and caches the target handle.
///
/// The cached pid is checked with a cheap single-process lookup on every call;
/// the full table scan only happens when that check fails.
#[derive(Debug)]
pub struct TargetResolver {
    marker: String,
    exclude_pid: Option<u32>,
    cached: Option<ProcessHandle>,
    scans: u64,
}

impl TargetResolver {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            exclude_pid: Some(std::process::id()),
            cached: None,
            scans: 0,
        }
    }

    /// Never pick `pid` as the target. Defaults to this process, whose own
    /// command line usually carries the marker as an argument.
    pub fn excluding(mut self, pid: Option<u32>) -> Self {
        self.exclude_pid = pid;
        self
    }

    /// Number of full table scans performed so far.
    pub fn scans(&self) -> u64 {
        self.scans
    }

    #[cfg(test)]
    pub fn cached(&self) -> Option<&ProcessHandle> {
        self.cached.as_ref()
    }

    pub fn resolve<T>(&mut self, table: &mut T) -> Result<ProcessHandle>
    where
        T: ProcessTable + ?Sized,
    {
        if let Some(handle) = &self.cached {
            match table.command_line(handle.pid) {
                Some(cmdline) if cmdline.contains(&self.marker) => return Ok(handle.clone()),
                Some(_) => debug!(target: "sampler", "PID {} was reused by another program", handle.pid),
                None => info!(target: "sampler", "Target PID {} has exited", handle.pid),
            }
            self.cached = None;
        }

        self.scans += 1;
        let found = table
            .scan()
            .into_iter()
            .filter(|entry| Some(entry.pid) != self.exclude_pid)
            .filter(|entry| entry.command_line.contains(&self.marker))
            .min_by_key(|entry| entry.pid);

        match found {
            Some(entry) => {
                info!(target: "sampler", "Found target PID {}: {}", entry.pid, entry.command_line);
                let handle = ProcessHandle {
                    pid: entry.pid,
                    command_line: entry.command_line,
                };
                self.cached = Some(handle.clone());
                Ok(handle)
            }
            None => Err(MonitorError::TargetNotFound {
                marker: self.marker.clone(),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::probe::ProcessEntry;

    /// A process table that counts how often it is scanned.
    #[derive(Debug, Default)]
    pub(crate) struct FakeTable {
        pub processes: BTreeMap<u32, String>,
        pub scans: usize,
        pub lookups: usize,
    }

    impl FakeTable {
        pub fn with(processes: &[(u32, &str)]) -> Self {
            Self {
                processes: processes
                    .iter()
                    .map(|(pid, cmd)| (*pid, cmd.to_string()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl ProcessTable for FakeTable {
        fn command_line(&mut self, pid: u32) -> Option<String> {
            self.lookups += 1;
            self.processes.get(&pid).cloned()
        }

        fn scan(&mut self) -> Vec<ProcessEntry> {
            self.scans += 1;
            self.processes
                .iter()
                .map(|(pid, cmd)| ProcessEntry {
                    pid: *pid,
                    command_line: cmd.clone(),
                })
                .collect()
        }
    }

    fn resolver() -> TargetResolver {
        TargetResolver::new("app.jar").excluding(None)
    }

    #[test]
    fn resolving_twice_scans_once() {
        let mut table = FakeTable::with(&[(1, "/sbin/init"), (300, "java -jar app.jar --port 80")]);
        let mut resolver = resolver();
        let first = resolver.resolve(&mut table).unwrap();
        let second = resolver.resolve(&mut table).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.pid, 300);
        assert_eq!(table.scans, 1);
        assert_eq!(resolver.scans(), 1);
    }

    #[test]
    fn not_found_is_reported_and_retried() {
        let mut table = FakeTable::with(&[(1, "/sbin/init")]);
        let mut resolver = resolver();
        assert!(matches!(
            resolver.resolve(&mut table),
            Err(MonitorError::TargetNotFound { .. })
        ));
        table.processes.insert(77, "java -jar app.jar".into());
        assert_eq!(resolver.resolve(&mut table).unwrap().pid, 77);
        assert_eq!(table.scans, 2);
    }

    #[test]
    fn exited_target_triggers_a_rescan() {
        let mut table = FakeTable::with(&[(10, "java -jar app.jar")]);
        let mut resolver = resolver();
        resolver.resolve(&mut table).unwrap();
        table.processes.remove(&10);
        table.processes.insert(11, "java -jar app.jar".into());
        assert_eq!(resolver.resolve(&mut table).unwrap().pid, 11);
        assert_eq!(table.scans, 2);
    }

    #[test]
    fn reused_pid_is_not_trusted() {
        let mut table = FakeTable::with(&[(10, "java -jar app.jar")]);
        let mut resolver = resolver();
        resolver.resolve(&mut table).unwrap();
        table.processes.insert(10, "bash".into());
        assert!(resolver.resolve(&mut table).is_err());
        assert!(resolver.cached().is_none());
    }

    #[test]
    fn own_process_is_skipped() {
        let mut table = FakeTable::with(&[(5, "swapwatch --target app.jar"), (9, "java -jar app.jar")]);
        let mut resolver = TargetResolver::new("app.jar").excluding(Some(5));
        assert_eq!(resolver.resolve(&mut table).unwrap().pid, 9);
    }
}

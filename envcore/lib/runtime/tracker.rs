use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

use super::ProcessInfo;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Discovers the process trees spawned by a container and reads their metrics.
///
/// The tracker keeps one [`System`] alive between scans so CPU usage can be computed from the
/// difference between two refreshes.
pub struct ProcessTracker {
    system: System,
}

/// The result of one scan.
#[derive(Debug, Default)]
pub struct ProcessScan {
    /// Every live descendant of the scanned roots, excluding the roots themselves.
    pub children: HashSet<u32>,

    /// Metrics of every live root and descendant.
    pub processes: Vec<ProcessInfo>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ProcessTracker {
    /// Creates a tracker with an empty process table.
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Takes a snapshot of the process table and walks the trees below `roots`.
    ///
    /// Dead roots are removed from `roots`. Previously known children that are still alive are
    /// walked as well, so subtrees that were reparented after their root exited stay tracked.
    pub fn scan(
        &mut self,
        roots: &mut HashSet<u32>,
        known_children: &HashSet<u32>,
    ) -> ProcessScan {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );

        roots.retain(|pid| self.is_live(*pid));

        let mut index: HashMap<u32, Vec<u32>> = HashMap::new();
        for (pid, process) in self.system.processes() {
            if let Some(parent) = process.parent() {
                index.entry(parent.as_u32()).or_default().push(pid.as_u32());
            }
        }

        let mut seen: HashSet<u32> = roots.iter().copied().collect();
        let mut stack: Vec<u32> = roots.iter().copied().collect();
        for pid in known_children {
            if self.is_live(*pid) && seen.insert(*pid) {
                stack.push(*pid);
            }
        }

        while let Some(pid) = stack.pop() {
            for child in index.get(&pid).into_iter().flatten() {
                if self.is_live(*child) && seen.insert(*child) {
                    stack.push(*child);
                }
            }
        }

        let processes = seen
            .iter()
            .filter_map(|pid| self.system.process(Pid::from_u32(*pid)))
            .map(process_info)
            .collect();

        let children = seen.into_iter().filter(|pid| !roots.contains(pid)).collect();

        ProcessScan {
            children,
            processes,
        }
    }

    /// Returns the subset of `pids` that still refer to live processes.
    pub fn alive(&mut self, pids: &[u32]) -> Vec<u32> {
        self.refresh(pids);
        pids.iter().copied().filter(|pid| self.is_live(*pid)).collect()
    }

    /// Reads the names of `pids`, skipping processes that no longer exist.
    pub fn names(&mut self, pids: &[u32]) -> HashMap<u32, String> {
        self.refresh(pids);
        pids.iter()
            .filter_map(|pid| {
                self.system
                    .process(Pid::from_u32(*pid))
                    .map(|process| (*pid, process.name().to_string_lossy().into_owned()))
            })
            .collect()
    }

    fn refresh(&mut self, pids: &[u32]) {
        let pids: Vec<Pid> = pids.iter().map(|pid| Pid::from_u32(*pid)).collect();
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            true,
            ProcessRefreshKind::everything(),
        );
    }

    fn is_live(&self, pid: u32) -> bool {
        self.system
            .process(Pid::from_u32(pid))
            .is_some_and(|process| {
                !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
            })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for ProcessTracker {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn process_info(process: &Process) -> ProcessInfo {
    let command_line = process
        .cmd()
        .iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");

    ProcessInfo {
        pid: process.pid().as_u32(),
        name: process.name().to_string_lossy().into_owned(),
        exe_path: process.exe().map(|path| path.display().to_string()),
        command_line,
        memory_mb: process.memory() as f64 / BYTES_PER_MB,
        cpu_percent: process.cpu_usage() as f64,
        start_time: i64::try_from(process.start_time())
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        parent_pid: process.parent().map(|pid| pid.as_u32()),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The lifecycle state of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Nothing is running. The initial and terminal state.
    #[default]
    Stopped,

    /// Items are being launched.
    Starting,

    /// Every item has been launched and the monitor is running.
    Running,

    /// Every tracked process is suspended.
    Paused,

    /// Tracked processes are being terminated.
    Stopping,

    /// The container could not be started. Only `stop` is accepted.
    Error,
}

/// A snapshot of the processes a container owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct ContainerStats {
    /// The number of live processes, roots and descendants.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) total_processes: usize,

    /// The resident memory of all processes, in megabytes.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) total_memory_mb: f64,

    /// The summed CPU usage of all processes, in percent of one core.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) total_cpu_percent: f64,

    /// Seconds since the container started.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) uptime_secs: u64,

    /// The isolation boundary the container runs in.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) boundary_index: Option<u32>,

    /// Per-process details.
    #[getset(get = "pub with_prefix")]
    pub(crate) processes: Vec<ProcessInfo>,
}

/// Details of one tracked process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct ProcessInfo {
    /// The process id.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) pid: u32,

    /// The process name.
    #[getset(get = "pub with_prefix")]
    pub(crate) name: String,

    /// The path of the executable, when readable.
    #[getset(get = "pub with_prefix")]
    pub(crate) exe_path: Option<String>,

    /// The command line, joined with spaces.
    #[getset(get = "pub with_prefix")]
    pub(crate) command_line: String,

    /// The resident memory, in megabytes.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) memory_mb: f64,

    /// The CPU usage since the previous refresh, in percent of one core.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) cpu_percent: f64,

    /// When the process started.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) start_time: Option<DateTime<Utc>>,

    /// The parent process id.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) parent_pid: Option<u32>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ContainerState {
    /// Returns `true` if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ContainerState) -> bool {
        use ContainerState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Error)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Stopping)
                | (Paused, Stopping)
                | (Error, Stopping)
                | (Stopping, Stopped)
        )
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ContainerState::Stopped => "stopped",
            ContainerState::Starting => "starting",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Stopping => "stopping",
            ContainerState::Error => "error",
        };

        write!(f, "{}", state)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

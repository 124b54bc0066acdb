use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};

use crate::runtime::{ContainerState, ContainerStats};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A read-only description of a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct ContainerInfo {
    /// The container id.
    #[getset(get = "pub with_prefix")]
    pub(crate) container_id: String,

    /// The name of the environment the container runs.
    #[getset(get = "pub with_prefix")]
    pub(crate) environment_name: String,

    /// The lifecycle state.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) state: ContainerState,

    /// The isolation boundary, if the container has one.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) boundary_index: Option<u32>,

    /// When the container finished starting.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) started_at: Option<DateTime<Utc>>,

    /// Seconds since the container started.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) uptime_secs: u64,

    /// The number of root processes.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) tracked_processes: usize,

    /// The number of discovered descendant processes.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) child_processes: usize,

    /// The latest resource snapshot.
    #[getset(get = "pub with_prefix")]
    pub(crate) stats: ContainerStats,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ContainerInfo {
    /// Returns `true` if the container is running.
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }
}

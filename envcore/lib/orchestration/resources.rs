use std::collections::HashMap;

use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};

use crate::{container::ContainerInfo, runtime::ContainerState};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Resource usage summed over every registered container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct SystemResources {
    /// The number of registered containers.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) total_containers: usize,

    /// The number of running containers.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) running_containers: usize,

    /// The number of paused containers.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) paused_containers: usize,

    /// The number of tracked processes.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) total_processes: usize,

    /// The memory of every tracked process, in megabytes.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) total_memory_mb: f64,

    /// The CPU usage of every tracked process, in percent of one core.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) total_cpu_percent: f64,

    /// The boundary indices in use, in ascending order.
    #[getset(get = "pub with_prefix")]
    pub(crate) active_boundaries: Vec<u32>,

    /// When the rollup was computed.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

/// A snapshot of the whole manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct SystemStatus {
    /// The latest resource rollup.
    #[getset(get = "pub with_prefix")]
    pub(crate) resources: SystemResources,

    /// Every registered container by id.
    #[getset(get = "pub with_prefix")]
    pub(crate) containers: HashMap<String, ContainerInfo>,

    /// The active container, if any.
    #[getset(get = "pub with_prefix")]
    pub(crate) active_container: Option<String>,

    /// The maximum number of active containers.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) max_containers: usize,

    /// The number of free boundary indices.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) available_boundaries: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SystemResources {
    /// Sums the stats of `containers`.
    pub fn rollup<'a>(
        containers: impl IntoIterator<Item = &'a ContainerInfo>,
        active_boundaries: Vec<u32>,
    ) -> Self {
        let mut resources = Self {
            active_boundaries,
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        for info in containers {
            resources.total_containers += 1;
            match info.get_state() {
                ContainerState::Running => resources.running_containers += 1,
                ContainerState::Paused => resources.paused_containers += 1,
                _ => {}
            }

            let stats = info.get_stats();
            resources.total_processes += stats.get_total_processes();
            resources.total_memory_mb += stats.get_total_memory_mb();
            resources.total_cpu_percent += stats.get_total_cpu_percent();
        }

        resources
    }
}

use std::{
    fmt::{self, Display},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};

use crate::config::Environment;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// How a scheduler run executes its queued jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    /// One job at a time, in priority order.
    Sequential,

    /// Batches of `max_concurrent_launches` jobs run in parallel.
    Concurrent,

    /// Batches of `batch_size` jobs run in parallel with a longer pause between batches.
    Batched,

    /// Every job starts at once, each offset by its position times the stagger interval.
    Staggered,
}

/// One queued start request.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct LaunchJob {
    /// The environment to start.
    #[getset(get = "pub with_prefix")]
    pub(crate) environment: Arc<Environment>,

    /// The id reserved for the container.
    #[getset(get = "pub with_prefix")]
    pub(crate) container_id: String,

    /// Lower values run first. Jobs with equal priority keep their queue order.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) priority: i32,

    /// How long to wait before starting the container.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) delay: Duration,

    /// Whether to switch to the container once it started.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) switch_to: bool,

    /// When the job was queued.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) created_at: DateTime<Utc>,
}

/// The outcome of one launch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct LaunchResult {
    /// The container the job launched.
    #[getset(get = "pub with_prefix")]
    pub(crate) container_id: String,

    /// The environment the job launched.
    #[getset(get = "pub with_prefix")]
    pub(crate) environment_name: String,

    /// Whether the container started.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) success: bool,

    /// Why the start failed.
    #[getset(get = "pub with_prefix")]
    pub(crate) error: Option<String>,

    /// When the job began, including its delay.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) started_at: DateTime<Utc>,

    /// When the job finished.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) finished_at: DateTime<Utc>,

    /// How long the job took.
    #[serde(with = "crate::config::duration")]
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) duration: Duration,
}

/// A snapshot of a scheduler's queue and progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, CopyGetters)]
#[getset(get_copy = "pub with_prefix")]
pub struct QueueStatus {
    /// The number of jobs waiting in the queue.
    pub(crate) queue_size: usize,

    /// The number of jobs currently launching.
    pub(crate) active_launches: usize,

    /// Whether a run is in progress.
    pub(crate) is_running: bool,

    /// The number of jobs in the current run.
    pub(crate) total_jobs: usize,

    /// The number of jobs of the current run that finished.
    pub(crate) completed_jobs: usize,

    /// The progress of the current run, from 0 to 100.
    pub(crate) progress_percent: f64,

    /// The mode used when a run does not name one.
    pub(crate) default_mode: LaunchMode,

    /// The batch size of the concurrent mode.
    pub(crate) max_concurrent_launches: usize,
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self {
            LaunchMode::Sequential => "sequential",
            LaunchMode::Concurrent => "concurrent",
            LaunchMode::Batched => "batched",
            LaunchMode::Staggered => "staggered",
        };

        write!(f, "{}", mode)
    }
}

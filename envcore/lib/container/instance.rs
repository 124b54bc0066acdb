use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use getset::Getters;
use tokio::{
    sync::{watch, Mutex},
    time::Instant,
};

use super::{Backends, ContainerInfo};
use crate::{
    config::{ContainerConfig, Environment, PROTECTED_PROCESS_NAMES},
    events::{EnvcoreEvent, EventBus},
    isolation::BoundaryHandle,
    runtime::{
        ContainerState, ContainerStats, MonitorContext, MonitorHandle, PidSets, ProcessTracker,
    },
    EnvcoreError, EnvcoreResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The environment variable holding the container id in every spawned application.
pub const CONTAINER_ID_ENV_VAR: &str = "ENVCORE_CONTAINER_ID";

/// The environment variable holding the environment name in every spawned application.
pub const ENVIRONMENT_ENV_VAR: &str = "ENVCORE_ENVIRONMENT";

/// How often liveness is polled while waiting for processes to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One running instance of an [`Environment`].
///
/// Lifecycle operations are serialized: `stop` called during an in-flight `start` waits for the
/// start to finish.
#[derive(Getters)]
pub struct Container {
    /// The container id.
    #[getset(get = "pub with_prefix")]
    id: String,

    /// The environment this container runs.
    #[getset(get = "pub with_prefix")]
    environment: Arc<Environment>,

    config: ContainerConfig,
    backends: Backends,
    events: EventBus,
    state: watch::Sender<ContainerState>,
    stats: Arc<watch::Sender<Arc<ContainerStats>>>,
    pids: Arc<Mutex<PidSets>>,
    lifecycle: Mutex<Lifecycle>,
    meta: Mutex<Meta>,
}

#[derive(Default)]
struct Lifecycle {
    monitor: Option<MonitorHandle>,
}

#[derive(Default)]
struct Meta {
    boundary: Option<BoundaryHandle>,
    started: Option<(Instant, DateTime<Utc>)>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Container {
    /// Creates a stopped container.
    pub fn new(
        id: impl Into<String>,
        environment: Arc<Environment>,
        config: ContainerConfig,
        backends: Backends,
        events: EventBus,
    ) -> Self {
        let (state, _) = watch::channel(ContainerState::Stopped);
        let (stats, _) = watch::channel(Arc::new(ContainerStats::default()));

        Self {
            id: id.into(),
            environment,
            config,
            backends,
            events,
            state,
            stats: Arc::new(stats),
            pids: Arc::new(Mutex::new(PidSets::default())),
            lifecycle: Mutex::new(Lifecycle::default()),
            meta: Mutex::new(Meta::default()),
        }
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ContainerState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ContainerState> {
        self.state.subscribe()
    }

    /// Returns the latest stats snapshot.
    pub fn stats(&self) -> Arc<ContainerStats> {
        self.stats.borrow().clone()
    }

    /// Returns a receiver that observes every new stats snapshot.
    pub fn subscribe_stats(&self) -> watch::Receiver<Arc<ContainerStats>> {
        self.stats.subscribe()
    }

    /// Returns the root PIDs of the container.
    pub async fn tracked_pids(&self) -> Vec<u32> {
        self.pids.lock().await.tracked.iter().copied().collect()
    }

    /// Returns every PID the container owns, roots and discovered descendants.
    pub async fn all_pids(&self) -> Vec<u32> {
        self.pids.lock().await.all()
    }

    /// Returns the boundary the container runs in.
    pub async fn boundary(&self) -> Option<BoundaryHandle> {
        self.meta.lock().await.boundary.clone()
    }

    /// Launches every item of the environment.
    ///
    /// ## Arguments
    ///
    /// * `boundary_index` - The pool index to create an isolation boundary for, if any
    ///
    /// ## Errors
    ///
    /// Returns [`EnvcoreError::Lifecycle`] unless the container is stopped, and
    /// [`EnvcoreError::Configuration`] if the environment is malformed, in which case the
    /// container moves to the error state. Items that fail to launch do not fail the start.
    pub async fn start(&self, boundary_index: Option<u32>) -> EnvcoreResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.expect_state("start", &[ContainerState::Stopped])?;
        self.set_state(ContainerState::Starting);

        if let Err(e) = self.environment.validate() {
            tracing::error!("container {} cannot start: {}", self.id, e);
            self.set_state(ContainerState::Error);
            return Err(e);
        }

        let boundary = self.create_boundary(boundary_index).await;
        self.meta.lock().await.boundary = boundary.clone();

        let delay = self.environment.get_startup_delay();
        if !delay.is_zero() {
            tracing::debug!("container {} waiting {:?} before launch", self.id, delay);
            tokio::time::sleep(delay).await;
        }

        self.launch_items().await;

        let started_at = Instant::now();
        self.meta.lock().await.started = Some((started_at, Utc::now()));

        self.set_state(ContainerState::Running);
        lifecycle.monitor = Some(MonitorHandle::spawn(MonitorContext {
            container_id: self.id.clone(),
            interval: self.config.get_monitor_interval(),
            pids: self.pids.clone(),
            state: self.state.subscribe(),
            stats: self.stats.clone(),
            started_at,
            boundary_index: boundary.map(|handle| handle.get_index()),
        }));

        tracing::info!(
            "container {} is running with {} processes",
            self.id,
            self.pids.lock().await.tracked.len()
        );

        Ok(())
    }

    /// Terminates every process the container owns.
    ///
    /// A graceful stop sends `SIGTERM` and kills what is still alive after the grace period;
    /// `force` kills immediately. Processes whose name is in [`PROTECTED_PROCESS_NAMES`] are
    /// never signalled. Stopping a stopped container does nothing.
    pub async fn stop(&self, force: bool) -> EnvcoreResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        let previous = self.state();
        if previous == ContainerState::Stopped {
            return Ok(());
        }

        self.expect_state(
            "stop",
            &[
                ContainerState::Running,
                ContainerState::Paused,
                ContainerState::Error,
            ],
        )?;
        self.set_state(ContainerState::Stopping);

        if let Some(monitor) = lifecycle.monitor.take() {
            monitor.stop().await;
        }

        let owned = self.sweep_owned().await;
        let targets = unprotected(owned).await;
        if force {
            signal_all(&targets, envutils::kill);
        } else {
            signal_all(&targets, envutils::terminate);
            if previous == ContainerState::Paused {
                signal_all(&targets, envutils::resume);
            }

            let survivors = wait_for_exit(targets, self.config.get_stop_grace_period()).await;
            if !survivors.is_empty() {
                tracing::warn!(
                    "container {}: killing {} processes that ignored SIGTERM",
                    self.id,
                    survivors.len()
                );
                signal_all(&survivors, envutils::kill);
            }
        }

        self.pids.lock().await.clear();

        let boundary = {
            let mut meta = self.meta.lock().await;
            meta.started = None;
            meta.boundary.take()
        };
        if let Some(handle) = boundary {
            if self.environment.get_close_on_stop() {
                self.backends.isolation.close(&handle).await;
            }
        }

        self.stats.send_replace(Arc::new(ContainerStats::default()));
        self.set_state(ContainerState::Stopped);
        tracing::info!("container {} stopped", self.id);

        Ok(())
    }

    /// Suspends every process the container owns.
    pub async fn pause(&self) -> EnvcoreResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.expect_state("pause", &[ContainerState::Running])?;
        self.signal_owned("pause", envutils::suspend).await?;
        self.set_state(ContainerState::Paused);
        Ok(())
    }

    /// Resumes every process the container owns.
    pub async fn resume(&self) -> EnvcoreResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.expect_state("resume", &[ContainerState::Paused])?;
        self.signal_owned("resume", envutils::resume).await?;
        self.set_state(ContainerState::Running);
        Ok(())
    }

    /// Brings the container's boundary to the foreground.
    ///
    /// A container without a boundary switches trivially; a boundary that cannot be focused is
    /// logged and otherwise ignored.
    pub async fn switch(&self) -> EnvcoreResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.expect_state("switch to", &[ContainerState::Running])?;

        if let Some(handle) = self.boundary().await {
            if !self.backends.isolation.focus(&handle).await {
                tracing::warn!(
                    "container {}: could not focus {}",
                    self.id,
                    handle.get_name()
                );
            }
        }

        Ok(())
    }

    /// Returns a description of the container.
    pub async fn info(&self) -> ContainerInfo {
        let (boundary_index, started) = {
            let meta = self.meta.lock().await;
            (
                meta.boundary.as_ref().map(|handle| handle.get_index()),
                meta.started,
            )
        };
        let (tracked_processes, child_processes) = {
            let pids = self.pids.lock().await;
            (pids.tracked.len(), pids.children.len())
        };

        ContainerInfo {
            container_id: self.id.clone(),
            environment_name: self.environment.get_name().clone(),
            state: self.state(),
            boundary_index,
            started_at: started.map(|(_, at)| at),
            uptime_secs: started.map_or(0, |(at, _)| at.elapsed().as_secs()),
            tracked_processes,
            child_processes,
            stats: self.stats().as_ref().clone(),
        }
    }

    async fn create_boundary(&self, index: Option<u32>) -> Option<BoundaryHandle> {
        let index = index.filter(|_| self.environment.get_use_isolation())?;
        let isolation = &self.backends.isolation;

        let Some(handle) = isolation
            .create_boundary(self.environment.get_name(), index)
            .await
        else {
            tracing::info!(
                "container {} runs without isolation, boundary {} is unavailable",
                self.id,
                index
            );
            return None;
        };

        if self.environment.get_auto_focus() && !isolation.focus(&handle).await {
            tracing::warn!("container {}: could not focus {}", self.id, handle.get_name());
        }

        Some(handle)
    }

    async fn launch_items(&self) {
        let envs = vec![
            (CONTAINER_ID_ENV_VAR.to_string(), self.id.clone()),
            (
                ENVIRONMENT_ENV_VAR.to_string(),
                self.environment.get_name().clone(),
            ),
        ];
        let interval = self.config.get_item_launch_interval();
        let mut first = true;

        for app in self.environment.get_applications() {
            if !std::mem::take(&mut first) && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }

            match self.backends.spawner.spawn(app, &envs).await {
                Ok(pid) => {
                    self.pids.lock().await.tracked.insert(pid);
                    self.events.emit(EnvcoreEvent::ItemSpawned {
                        container_id: self.id.clone(),
                        item: app.get_name().clone(),
                        pid,
                    });

                    if app.get_wait_for_exit() {
                        tracing::debug!("container {}: waiting for {} to exit", self.id, pid);
                        while !alive(vec![pid]).await.is_empty() {
                            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
                        }
                    }
                }
                Err(e) => self.item_failed(app.get_name(), e),
            }
        }

        for site in self.environment.get_websites() {
            if !std::mem::take(&mut first) && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }

            let browser = site.get_browser().as_deref();
            if let Err(e) = self.backends.url_opener.open(site.get_url(), browser).await {
                self.item_failed(site.get_name(), e);
            }
        }
    }

    fn item_failed(&self, item: &str, error: EnvcoreError) {
        tracing::warn!("container {}: {} failed to launch: {}", self.id, item, error);
        self.events.emit(EnvcoreEvent::ItemFailed {
            container_id: self.id.clone(),
            item: item.to_string(),
            error: error.to_string(),
        });
    }

    #[cfg(unix)]
    async fn signal_owned(
        &self,
        _operation: &'static str,
        signal: fn(u32) -> envutils::EnvutilsResult<()>,
    ) -> EnvcoreResult<()> {
        let pids = self.sweep_owned().await;
        signal_all(&unprotected(pids).await, signal);
        Ok(())
    }

    /// Walks the process trees below every owned PID and returns the full set.
    ///
    /// The monitor only sees descendants forked before its last tick, so every signalling
    /// operation rescans first.
    async fn sweep_owned(&self) -> Vec<u32> {
        let mut pids = self.pids.lock().await;
        let mut roots = pids.tracked.clone();
        let known = pids.children.clone();

        let scanned =
            tokio::task::spawn_blocking(move || ProcessTracker::new().scan(&mut roots, &known))
                .await;
        match scanned {
            Ok(scan) => pids.children.extend(scan.children),
            Err(e) => tracing::warn!("process sweep for container {} failed: {}", self.id, e),
        }

        pids.all()
    }

    #[cfg(not(unix))]
    async fn signal_owned(
        &self,
        operation: &'static str,
        _signal: fn(u32) -> envutils::EnvutilsResult<()>,
    ) -> EnvcoreResult<()> {
        Err(EnvcoreError::UnsupportedOperation(format!(
            "{} needs process suspension, which this platform lacks",
            operation
        )))
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[ContainerState],
    ) -> EnvcoreResult<()> {
        let state = self.state();
        if allowed.contains(&state) {
            return Ok(());
        }

        Err(EnvcoreError::Lifecycle {
            container_id: self.id.clone(),
            operation,
            state,
        })
    }

    fn set_state(&self, next: ContainerState) {
        let previous = self.state();
        if previous == next {
            return;
        }

        debug_assert!(
            previous.can_transition_to(next),
            "invalid transition {} -> {}",
            previous,
            next
        );
        self.state.send_replace(next);
        tracing::debug!("container {}: {} -> {}", self.id, previous, next);
        self.events.emit(EnvcoreEvent::ContainerStateChanged {
            container_id: self.id.clone(),
            state: next,
        });
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Returns the live PIDs among `pids`.
async fn alive(pids: Vec<u32>) -> Vec<u32> {
    tokio::task::spawn_blocking(move || ProcessTracker::new().alive(&pids))
        .await
        .unwrap_or_default()
}

/// Drops processes that have exited or whose name is protected.
async fn unprotected(pids: Vec<u32>) -> Vec<u32> {
    if pids.is_empty() {
        return pids;
    }

    let names = tokio::task::spawn_blocking(move || ProcessTracker::new().names(&pids))
        .await
        .unwrap_or_default();

    names
        .into_iter()
        .filter_map(|(pid, name)| {
            let protected = PROTECTED_PROCESS_NAMES
                .iter()
                .any(|protected| name.eq_ignore_ascii_case(protected));
            if protected {
                tracing::warn!("not signalling protected process {} ({})", name, pid);
                None
            } else {
                Some(pid)
            }
        })
        .collect()
}

/// Polls until every process in `pids` has exited or `grace` has passed. Returns the survivors.
async fn wait_for_exit(pids: Vec<u32>, grace: Duration) -> Vec<u32> {
    let deadline = Instant::now() + grace;
    let mut remaining = pids;

    while !remaining.is_empty() && Instant::now() < deadline {
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        remaining = alive(remaining).await;
    }

    remaining
}

fn signal_all(pids: &[u32], signal: fn(u32) -> envutils::EnvutilsResult<()>) {
    for pid in pids {
        if let Err(e) = signal(*pid) {
            if !e.is_no_such_process() {
                tracing::warn!("{}", e);
            }
        }
    }
}

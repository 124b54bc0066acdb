use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use chrono::Local;
use futures::future::join_all;
use tokio::{
    sync::{broadcast, oneshot, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use super::{generate_container_id, SystemResources, SystemStatus};
use crate::{
    config::{ContainerConfig, Environment, ManagerConfig, MIN_TICK_INTERVAL},
    container::{Backends, Container, ContainerInfo},
    events::{EnvcoreEvent, EventBus},
    isolation::{BoundaryPool, Isolation},
    runtime::{ContainerState, ProcessSpawner, UrlOpener},
    EnvcoreError, EnvcoreResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The registry of running containers and the only way to start, stop and query them.
///
/// The registry and the boundary pool share one lock that is never held across a container
/// operation, so containers with different ids start and stop independently.
pub struct ContainerManager {
    config: ManagerConfig,
    container_config: ContainerConfig,
    backends: Backends,
    events: EventBus,
    registry: Mutex<Registry>,
    resources: Mutex<SystemResources>,
    resource_monitor: Mutex<Option<ResourceMonitor>>,
}

/// Builder for [`ContainerManager`].
///
/// ### Optional fields:
/// - `config`: The manager settings
/// - `container_config`: The settings applied to every container
/// - `spawner`: The application spawner, [`CommandSpawner`](crate::runtime::CommandSpawner) by default
/// - `url_opener`: The website opener, [`SystemUrlOpener`](crate::runtime::SystemUrlOpener) by default
/// - `isolation`: The isolation backend, [`NoIsolation`](crate::isolation::NoIsolation) by default
/// - `events`: The event bus to emit on
#[derive(Default)]
pub struct ContainerManagerBuilder {
    config: ManagerConfig,
    container_config: ContainerConfig,
    backends: Backends,
    events: EventBus,
}

struct Registry {
    containers: HashMap<String, Arc<Container>>,
    boundaries: HashMap<String, u32>,
    pool: BoundaryPool,
    active: Option<String>,
}

struct ResourceMonitor {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ContainerManager {
    /// Returns a builder for the manager.
    pub fn builder() -> ContainerManagerBuilder {
        ContainerManagerBuilder::default()
    }

    /// Returns the manager settings.
    pub fn get_config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the event bus the manager and its containers emit on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribes to every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EnvcoreEvent> {
        self.events.subscribe()
    }

    /// Registers a container for `environment` and starts it.
    ///
    /// ## Arguments
    ///
    /// * `environment` - The environment to start
    /// * `container_id` - The id to use. Generated from the environment name if `None`
    /// * `switch_to` - Whether to switch to the container once it started
    ///
    /// ## Errors
    ///
    /// - [`EnvcoreError::Configuration`] if the environment is malformed
    /// - [`EnvcoreError::DuplicateContainer`] if the id is already registered
    /// - [`EnvcoreError::CapacityExceeded`] if the registry is full
    ///
    /// None of these change the registry. If the container itself fails to start, it is rolled
    /// back and the error is returned.
    pub async fn start_container(
        &self,
        environment: impl Into<Arc<Environment>>,
        container_id: Option<String>,
        switch_to: bool,
    ) -> EnvcoreResult<String> {
        let environment = environment.into();
        environment.validate()?;

        let (container, boundary_index) = {
            let mut registry = self.registry.lock().await;
            let id = match container_id {
                Some(id) if registry.containers.contains_key(&id) => {
                    return Err(EnvcoreError::DuplicateContainer(id));
                }
                Some(id) => id,
                None => generate_container_id(environment.get_name(), Local::now(), |id| {
                    registry.containers.contains_key(id)
                }),
            };

            let max = self.config.get_max_concurrent_containers();
            if registry.containers.len() >= max {
                tracing::warn!("cannot start {}: {} containers are active", id, max);
                self.events.emit(EnvcoreEvent::MaxContainersReached(max));
                return Err(EnvcoreError::CapacityExceeded(max));
            }

            let boundary_index = if environment.get_use_isolation() {
                let index = registry.pool.acquire();
                if index.is_none() {
                    tracing::warn!("no boundary left for {}, starting without isolation", id);
                }
                index
            } else {
                None
            };

            if let Some(index) = boundary_index {
                registry.boundaries.insert(id.clone(), index);
            }

            let container = Arc::new(Container::new(
                id.clone(),
                environment,
                self.container_config.clone(),
                self.backends.clone(),
                self.events.clone(),
            ));
            registry.containers.insert(id, container.clone());

            (container, boundary_index)
        };

        let id = container.get_id().clone();
        tracing::info!("starting container {}", id);

        if let Err(e) = container.start(boundary_index).await {
            tracing::error!("container {} failed to start: {}", id, e);
            if let Err(e) = container.stop(true).await {
                tracing::warn!("failed to roll back container {}: {}", id, e);
            }
            self.deregister(&container).await;
            return Err(e);
        }

        if boundary_index.is_some() && container.boundary().await.is_none() {
            let mut registry = self.registry.lock().await;
            if let Some(index) = registry.boundaries.remove(&id) {
                registry.pool.release(index);
            }
        }

        self.events.emit(EnvcoreEvent::ContainerStarted(id.clone()));

        if switch_to {
            self.switch_to(&id).await;
        }

        Ok(id)
    }

    /// Stops a container and removes it from the registry.
    ///
    /// Returns `false` if the id is unknown or the container refused to stop.
    pub async fn stop_container(&self, container_id: &str, force: bool) -> bool {
        let Some(container) = self.get_container(container_id).await else {
            return false;
        };

        if let Err(e) = container.stop(force).await {
            tracing::warn!("failed to stop container {}: {}", container_id, e);
            return false;
        }

        if self.deregister(&container).await {
            self.events
                .emit(EnvcoreEvent::ContainerStopped(container_id.to_string()));
        }

        true
    }

    /// Stops a container and starts its environment again under the same id.
    pub async fn restart_container(&self, container_id: &str) -> bool {
        let Some(container) = self.get_container(container_id).await else {
            return false;
        };

        let environment = container.get_environment().clone();
        if !self.stop_container(container_id, false).await {
            return false;
        }

        match self
            .start_container(environment, Some(container_id.to_string()), true)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("failed to restart container {}: {}", container_id, e);
                false
            }
        }
    }

    /// Makes a running container the active one and focuses its boundary.
    pub async fn switch_to(&self, container_id: &str) -> bool {
        let Some(container) = self.get_container(container_id).await else {
            return false;
        };

        if let Err(e) = container.switch().await {
            tracing::warn!("{}", e);
            return false;
        }

        self.registry.lock().await.active = Some(container_id.to_string());
        self.events
            .emit(EnvcoreEvent::ContainerSwitched(container_id.to_string()));

        true
    }

    /// Suspends a running container.
    pub async fn pause_container(&self, container_id: &str) -> bool {
        let Some(container) = self.get_container(container_id).await else {
            return false;
        };

        match container.pause().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    /// Resumes a paused container.
    pub async fn resume_container(&self, container_id: &str) -> bool {
        let Some(container) = self.get_container(container_id).await else {
            return false;
        };

        match container.resume().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    /// Stops every container concurrently and returns how many stopped.
    pub async fn stop_all(&self, force: bool) -> usize {
        let ids = self.container_ids().await;
        let stopped = join_all(ids.iter().map(|id| self.stop_container(id, force)))
            .await
            .into_iter()
            .filter(|stopped| *stopped)
            .count();

        if stopped < ids.len() {
            tracing::warn!("{} of {} containers failed to stop", ids.len() - stopped, ids.len());
        }

        stopped
    }

    /// Returns the container registered under `container_id`.
    pub async fn get_container(&self, container_id: &str) -> Option<Arc<Container>> {
        self.registry
            .lock()
            .await
            .containers
            .get(container_id)
            .cloned()
    }

    /// Returns the ids of every registered container.
    pub async fn container_ids(&self) -> Vec<String> {
        self.registry.lock().await.containers.keys().cloned().collect()
    }

    /// Describes every registered container.
    pub async fn get_all_containers(&self) -> HashMap<String, ContainerInfo> {
        let containers = self.snapshot().await;
        join_all(containers.iter().map(|container| container.info()))
            .await
            .into_iter()
            .map(|info| (info.get_container_id().clone(), info))
            .collect()
    }

    /// Returns the ids of the running containers.
    pub async fn running_containers(&self) -> Vec<String> {
        self.snapshot()
            .await
            .iter()
            .filter(|container| container.state() == ContainerState::Running)
            .map(|container| container.get_id().clone())
            .collect()
    }

    /// Returns `true` if another container would fit in the registry.
    pub async fn can_start_container(&self) -> bool {
        self.registry.lock().await.containers.len() < self.config.get_max_concurrent_containers()
    }

    /// Returns the id of the active container.
    pub async fn active_container(&self) -> Option<String> {
        self.registry.lock().await.active.clone()
    }

    /// Returns a snapshot of the manager and every container.
    pub async fn get_system_status(&self) -> SystemStatus {
        let containers = self.get_all_containers().await;
        let (active_container, available_boundaries, active_boundaries) = {
            let registry = self.registry.lock().await;
            (
                registry.active.clone(),
                registry.pool.available(),
                registry.pool.active(),
            )
        };

        SystemStatus {
            resources: SystemResources::rollup(containers.values(), active_boundaries),
            containers,
            active_container,
            max_containers: self.config.get_max_concurrent_containers(),
            available_boundaries,
        }
    }

    /// Returns the latest resource rollup.
    pub async fn resources(&self) -> SystemResources {
        self.resources.lock().await.clone()
    }

    /// Recomputes the resource rollup and emits [`EnvcoreEvent::ResourcesUpdated`].
    pub async fn refresh_resources(&self) -> SystemResources {
        let containers = self.get_all_containers().await;
        let active_boundaries = self.registry.lock().await.pool.active();
        let resources = SystemResources::rollup(containers.values(), active_boundaries);

        *self.resources.lock().await = resources.clone();
        self.events
            .emit(EnvcoreEvent::ResourcesUpdated(resources.clone()));

        resources
    }

    /// Starts the periodic resource rollup. Does nothing if it is already running.
    ///
    /// The task holds a weak reference and ends on its own once the manager is dropped.
    pub async fn start_resource_monitor(self: &Arc<Self>) {
        let mut monitor = self.resource_monitor.lock().await;
        if monitor.is_some() {
            return;
        }

        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let manager: Weak<Self> = Arc::downgrade(self);
        let mut ticker =
            tokio::time::interval(self.config.get_resource_interval().max(MIN_TICK_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {}
                }

                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.refresh_resources().await;
            }

            tracing::debug!("resource monitor stopped");
        });

        *monitor = Some(ResourceMonitor { shutdown, task });
    }

    /// Stops the resource rollup and force-stops every container.
    pub async fn shutdown(&self) -> usize {
        if let Some(monitor) = self.resource_monitor.lock().await.take() {
            let _ = monitor.shutdown.send(());
            if let Err(e) = monitor.task.await {
                tracing::warn!("resource monitor ended abnormally: {}", e);
            }
        }

        let stopped = self.stop_all(true).await;
        tracing::info!("shut down {} containers", stopped);
        stopped
    }

    async fn snapshot(&self) -> Vec<Arc<Container>> {
        self.registry
            .lock()
            .await
            .containers
            .values()
            .cloned()
            .collect()
    }

    /// Removes `container` if it is still the one registered under its id, returning its
    /// boundary index to the pool.
    async fn deregister(&self, container: &Arc<Container>) -> bool {
        let id = container.get_id();
        let mut registry = self.registry.lock().await;

        let registered = registry
            .containers
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, container));
        if !registered {
            return false;
        }

        registry.containers.remove(id);
        if let Some(index) = registry.boundaries.remove(id) {
            registry.pool.release(index);
        }
        if registry.active.as_deref() == Some(id.as_str()) {
            registry.active = None;
        }

        true
    }
}

impl ContainerManagerBuilder {
    /// Sets the manager settings
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the settings applied to every container
    pub fn container_config(mut self, container_config: ContainerConfig) -> Self {
        self.container_config = container_config;
        self
    }

    /// Sets the application spawner
    pub fn spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.backends.spawner = spawner;
        self
    }

    /// Sets the website opener
    pub fn url_opener(mut self, url_opener: Arc<dyn UrlOpener>) -> Self {
        self.backends.url_opener = url_opener;
        self
    }

    /// Sets the isolation backend
    pub fn isolation(mut self, isolation: Arc<dyn Isolation>) -> Self {
        self.backends.isolation = isolation;
        self
    }

    /// Sets the event bus
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Builds the manager
    pub fn build(self) -> ContainerManager {
        let pool = BoundaryPool::new(self.config.get_boundary_pool_size());

        ContainerManager {
            config: self.config,
            container_config: self.container_config,
            backends: self.backends,
            events: self.events,
            registry: Mutex::new(Registry {
                containers: HashMap::new(),
                boundaries: HashMap::new(),
                pool,
                active: None,
            }),
            resources: Mutex::new(SystemResources::default()),
            resource_monitor: Mutex::new(None),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for ContainerManager {
    fn default() -> Self {
        Self::builder().build()
    }
}

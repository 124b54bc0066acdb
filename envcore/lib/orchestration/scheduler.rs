use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{Local, Utc};
use futures::future::join_all;
use tokio::{
    sync::{Mutex, Notify},
    time::Instant,
};

use super::{
    generate_container_id, ContainerManager, LaunchJob, LaunchMode, LaunchResult, QueueStatus,
};
use crate::{
    config::{Environment, SchedulerConfig},
    events::{EnvcoreEvent, EventBus},
    EnvcoreError, EnvcoreResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Starts bursts of containers through a [`ContainerManager`].
///
/// Jobs are queued with [`enqueue`](Self::enqueue) and executed together by
/// [`run_queue`](Self::run_queue). Only one run may be in progress at a time.
pub struct LaunchScheduler {
    manager: Arc<ContainerManager>,
    config: SchedulerConfig,
    events: EventBus,
    queue: Mutex<Vec<LaunchJob>>,
    active: Mutex<HashMap<String, LaunchJob>>,
    in_run: Mutex<HashSet<String>>,
    running: AtomicBool,
    cancelled: AtomicBool,
    cancel: Notify,
    total_jobs: AtomicUsize,
    completed_jobs: AtomicUsize,
}

/// Clears the running flag when a run ends, including by panic.
struct RunGuard<'a>(&'a AtomicBool);

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LaunchScheduler {
    /// Creates a scheduler that emits on the manager's event bus.
    pub fn new(manager: Arc<ContainerManager>, config: SchedulerConfig) -> Self {
        let events = manager.events().clone();
        Self {
            manager,
            config,
            events,
            queue: Mutex::new(Vec::new()),
            active: Mutex::new(HashMap::new()),
            in_run: Mutex::new(HashSet::new()),
            running: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            cancel: Notify::new(),
            total_jobs: AtomicUsize::new(0),
            completed_jobs: AtomicUsize::new(0),
        }
    }

    /// Returns the scheduler settings.
    pub fn get_config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queues a start request and returns the container id reserved for it.
    ///
    /// ## Arguments
    ///
    /// * `environment` - The environment to start
    /// * `container_id` - The id to reserve. Generated from the environment name if `None`
    /// * `switch_to` - Whether to switch to the container once it started
    /// * `priority` - Lower values run first
    /// * `delay` - How long the job waits before starting its container
    ///
    /// ## Errors
    ///
    /// Returns [`EnvcoreError::DuplicateContainer`] if the id is already queued or registered.
    pub async fn enqueue(
        &self,
        environment: impl Into<Arc<Environment>>,
        container_id: Option<String>,
        switch_to: bool,
        priority: i32,
        delay: Duration,
    ) -> EnvcoreResult<String> {
        let environment = environment.into();
        let registered = self.manager.container_ids().await;
        let mut queue = self.queue.lock().await;
        let in_run = self.in_run.lock().await;
        let is_taken = |id: &str| {
            registered.iter().any(|taken| taken == id)
                || in_run.contains(id)
                || queue.iter().any(|job| job.container_id == id)
        };

        let container_id = match container_id {
            Some(id) if is_taken(&id) => return Err(EnvcoreError::DuplicateContainer(id)),
            Some(id) => id,
            None => generate_container_id(environment.get_name(), Local::now(), is_taken),
        };

        let position = queue
            .iter()
            .position(|job| job.priority > priority)
            .unwrap_or(queue.len());
        queue.insert(
            position,
            LaunchJob {
                environment,
                container_id: container_id.clone(),
                priority,
                delay,
                switch_to,
                created_at: Utc::now(),
            },
        );

        tracing::debug!("queued {} at position {}", container_id, position);
        self.events.emit(EnvcoreEvent::QueueUpdated(queue.len()));

        Ok(container_id)
    }

    /// Queues every environment with equal priority, switching only to the last one.
    pub async fn enqueue_many(
        &self,
        environments: impl IntoIterator<Item = Environment>,
        switch_to_last: bool,
    ) -> EnvcoreResult<Vec<String>> {
        let environments: Vec<Environment> = environments.into_iter().collect();
        let last = environments.len().saturating_sub(1);

        let mut ids = Vec::with_capacity(environments.len());
        for (index, environment) in environments.into_iter().enumerate() {
            let switch_to = switch_to_last && index == last;
            ids.push(
                self.enqueue(environment, None, switch_to, 0, Duration::ZERO)
                    .await?,
            );
        }

        Ok(ids)
    }

    /// Removes a queued job. Returns `false` if no job reserved `container_id`.
    pub async fn remove_from_queue(&self, container_id: &str) -> bool {
        let mut queue = self.queue.lock().await;
        let Some(position) = queue.iter().position(|job| job.container_id == container_id) else {
            return false;
        };

        queue.remove(position);
        self.events.emit(EnvcoreEvent::QueueUpdated(queue.len()));
        true
    }

    /// Removes every queued job and returns how many were removed.
    pub async fn clear_queue(&self) -> usize {
        let removed = std::mem::take(&mut *self.queue.lock().await).len();
        self.events.emit(EnvcoreEvent::QueueUpdated(0));
        removed
    }

    /// Executes every queued job and returns one result per job that started.
    ///
    /// Failed jobs produce a result with `success == false`; they never abort the run. Jobs
    /// queued while the run is in progress wait for the next run.
    ///
    /// ## Errors
    ///
    /// Returns [`EnvcoreError::AlreadyRunning`] if another run is in progress.
    pub async fn run_queue(&self, mode: Option<LaunchMode>) -> EnvcoreResult<Vec<LaunchResult>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EnvcoreError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);

        self.cancelled.store(false, Ordering::SeqCst);
        let jobs = std::mem::take(&mut *self.queue.lock().await);
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        self.events.emit(EnvcoreEvent::QueueUpdated(0));
        *self.in_run.lock().await = jobs.iter().map(|job| job.container_id.clone()).collect();

        let mode = mode.unwrap_or(self.config.get_default_mode());
        self.total_jobs.store(jobs.len(), Ordering::SeqCst);
        self.completed_jobs.store(0, Ordering::SeqCst);
        tracing::info!("launching {} environments ({})", jobs.len(), mode);

        let results = match mode {
            LaunchMode::Sequential => self.run_sequential(jobs).await,
            LaunchMode::Concurrent => {
                self.run_batches(
                    jobs,
                    self.config.get_max_concurrent_launches(),
                    self.config.get_concurrent_batch_pause(),
                )
                .await
            }
            LaunchMode::Batched => {
                self.run_batches(
                    jobs,
                    self.config.get_batch_size(),
                    self.config.get_batched_batch_pause(),
                )
                .await
            }
            LaunchMode::Staggered => self.run_staggered(jobs).await,
        };

        self.active.lock().await.clear();
        self.in_run.lock().await.clear();
        self.total_jobs.store(0, Ordering::SeqCst);
        self.completed_jobs.store(0, Ordering::SeqCst);

        let succeeded = results.iter().filter(|result| result.success).count();
        tracing::info!("{} of {} launches succeeded", succeeded, results.len());
        self.events
            .emit(EnvcoreEvent::AllLaunchesCompleted(results.clone()));

        Ok(results)
    }

    /// Discards every job that has not started yet and returns how many were queued.
    ///
    /// Jobs that are already starting their container run to completion; jobs still waiting
    /// for their offset or delay are woken and skipped.
    pub async fn emergency_stop(&self) -> usize {
        self.cancelled.store(true, Ordering::SeqCst);
        self.cancel.notify_waiters();
        let discarded = self.clear_queue().await;
        tracing::warn!("emergency stop, discarded {} queued launches", discarded);
        discarded
    }

    /// Returns a snapshot of the queue and the current run.
    pub async fn queue_status(&self) -> QueueStatus {
        let total_jobs = self.total_jobs.load(Ordering::SeqCst);
        let completed_jobs = self.completed_jobs.load(Ordering::SeqCst);
        let progress_percent = if total_jobs == 0 {
            0.0
        } else {
            completed_jobs as f64 / total_jobs as f64 * 100.0
        };

        QueueStatus {
            queue_size: self.queue.lock().await.len(),
            active_launches: self.active.lock().await.len(),
            is_running: self.running.load(Ordering::SeqCst),
            total_jobs,
            completed_jobs,
            progress_percent,
            default_mode: self.config.get_default_mode(),
            max_concurrent_launches: self.config.get_max_concurrent_launches(),
        }
    }

    /// Returns the jobs that are currently starting their container.
    pub async fn active_launches(&self) -> Vec<LaunchJob> {
        self.active.lock().await.values().cloned().collect()
    }

    /// Returns the jobs waiting in the queue, in execution order.
    pub async fn queued_jobs(&self) -> Vec<LaunchJob> {
        self.queue.lock().await.clone()
    }

    async fn run_sequential(&self, jobs: Vec<LaunchJob>) -> Vec<LaunchResult> {
        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            if let Some(result) = self.run_job(job, Duration::ZERO).await {
                results.push(result);
            }
        }

        results
    }

    async fn run_batches(
        &self,
        jobs: Vec<LaunchJob>,
        batch_size: usize,
        pause: Duration,
    ) -> Vec<LaunchResult> {
        let batches: Vec<Vec<LaunchJob>> = jobs
            .chunks(batch_size.max(1))
            .map(|batch| batch.to_vec())
            .collect();
        let count = batches.len();

        let mut results = Vec::new();
        for (index, batch) in batches.into_iter().enumerate() {
            if self.is_cancelled() {
                break;
            }

            let number = index + 1;
            tracing::debug!("batch {}/{}: {} jobs", number, count, batch.len());
            self.events.emit(EnvcoreEvent::BatchStarted {
                batch: number,
                size: batch.len(),
            });

            let finished: Vec<LaunchResult> =
                join_all(batch.into_iter().map(|job| self.run_job(job, Duration::ZERO)))
                    .await
                    .into_iter()
                    .flatten()
                    .collect();

            self.events.emit(EnvcoreEvent::BatchCompleted {
                batch: number,
                succeeded: finished.iter().filter(|result| result.success).count(),
                total: finished.len(),
            });
            results.extend(finished);

            if number < count {
                self.wait(pause).await;
            }
        }

        results
    }

    async fn run_staggered(&self, jobs: Vec<LaunchJob>) -> Vec<LaunchResult> {
        let stagger = self.config.get_stagger_interval();
        self.events.emit(EnvcoreEvent::BatchStarted {
            batch: 1,
            size: jobs.len(),
        });

        let launches = jobs.into_iter().enumerate().map(|(index, job)| {
            let offset = stagger.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
            self.run_job(job, offset)
        });
        let results: Vec<LaunchResult> = join_all(launches).await.into_iter().flatten().collect();

        self.events.emit(EnvcoreEvent::BatchCompleted {
            batch: 1,
            succeeded: results.iter().filter(|result| result.success).count(),
            total: results.len(),
        });

        results
    }

    /// Waits `offset` plus the job's own delay, then starts the container.
    ///
    /// Returns `None` if the run was cancelled before the container started.
    async fn run_job(&self, job: LaunchJob, offset: Duration) -> Option<LaunchResult> {
        let started_at = Utc::now();
        let clock = Instant::now();

        self.wait(offset.saturating_add(job.delay)).await;

        if self.is_cancelled() {
            tracing::debug!("skipping {}, the run was cancelled", job.container_id);
            return None;
        }

        let container_id = job.container_id.clone();
        let environment_name = job.environment.get_name().clone();
        self.active
            .lock()
            .await
            .insert(container_id.clone(), job.clone());

        self.events.emit(EnvcoreEvent::LaunchStarted {
            container_id: container_id.clone(),
            environment: environment_name.clone(),
        });
        self.progress(&container_id, 10, "preparing");
        self.progress(&container_id, 30, "starting container");

        let outcome = self
            .manager
            .start_container(
                job.environment.clone(),
                Some(container_id.clone()),
                job.switch_to,
            )
            .await;

        let (success, error) = match outcome {
            Ok(_) => (true, None),
            Err(e) => {
                tracing::warn!("launch of {} failed: {}", container_id, e);
                (false, Some(e.to_string()))
            }
        };

        self.progress(
            &container_id,
            100,
            if success { "started" } else { "failed" },
        );
        self.active.lock().await.remove(&container_id);
        self.completed_jobs.fetch_add(1, Ordering::SeqCst);
        self.events.emit(EnvcoreEvent::LaunchCompleted {
            container_id: container_id.clone(),
            success,
        });

        Some(LaunchResult {
            container_id,
            environment_name,
            success,
            error,
            started_at,
            finished_at: Utc::now(),
            duration: clock.elapsed(),
        })
    }

    fn progress(&self, container_id: &str, percent: u8, status: &str) {
        self.events.emit(EnvcoreEvent::LaunchProgress {
            container_id: container_id.to_string(),
            percent,
            status: status.to_string(),
        });
    }

    /// Sleeps for `duration` or until the run is cancelled, whichever comes first.
    async fn wait(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();
        if self.is_cancelled() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = &mut cancelled => {}
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

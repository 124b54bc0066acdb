use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::{
    sync::{oneshot, watch, Mutex},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use super::{ContainerState, ContainerStats, ProcessScan, ProcessTracker};
use crate::config::MIN_TICK_INTERVAL;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The PIDs a container is responsible for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PidSets {
    /// The root PIDs returned by the spawner.
    pub tracked: HashSet<u32>,

    /// Descendants of the roots discovered by the monitor.
    pub children: HashSet<u32>,
}

/// Everything a monitor task needs to refresh one container's stats.
pub struct MonitorContext {
    /// The id of the container, for logging.
    pub container_id: String,

    /// How often to scan.
    pub interval: Duration,

    /// The PID sets shared with the container.
    pub pids: Arc<Mutex<PidSets>>,

    /// The container's lifecycle state. Ticks are skipped unless it is running.
    pub state: watch::Receiver<ContainerState>,

    /// Where new snapshots are published.
    pub stats: Arc<watch::Sender<Arc<ContainerStats>>>,

    /// When the container started.
    pub started_at: Instant,

    /// The isolation boundary the container runs in.
    pub boundary_index: Option<u32>,
}

/// A handle to a running monitor task.
pub struct MonitorHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PidSets {
    /// Returns every PID the container owns, roots first.
    pub fn all(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.tracked.iter().copied().collect();
        pids.extend(self.children.difference(&self.tracked).copied());
        pids
    }

    /// Forgets every PID.
    pub fn clear(&mut self) {
        self.tracked.clear();
        self.children.clear();
    }
}

impl MonitorHandle {
    /// Starts the monitor task. The first scan runs immediately.
    pub fn spawn(context: MonitorContext) -> Self {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(context, shutdown_rx));
        Self { shutdown, task }
    }

    /// Stops the monitor and waits until its current scan, if any, has finished.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::warn!("monitor task ended abnormally: {}", e);
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

async fn run(context: MonitorContext, mut shutdown: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(context.interval.max(MIN_TICK_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut tracker = Some(ProcessTracker::new());
    tracing::debug!("monitor started for container {}", context.container_id);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        if *context.state.borrow() != ContainerState::Running {
            continue;
        }

        let Some(current) = tracker.take() else {
            break;
        };

        let snapshot = context.pids.lock().await.clone();
        let scanned = tokio::task::spawn_blocking(move || {
            let mut current = current;
            let mut roots = snapshot.tracked.clone();
            let scan = current.scan(&mut roots, &snapshot.children);
            (current, snapshot.tracked, roots, scan)
        })
        .await;

        let (current, before, alive, scan) = match scanned {
            Ok(scanned) => scanned,
            Err(e) => {
                tracing::warn!(
                    "process scan for container {} failed: {}",
                    context.container_id,
                    e
                );
                break;
            }
        };
        tracker = Some(current);

        {
            let mut pids = context.pids.lock().await;
            for dead in before.difference(&alive) {
                pids.tracked.remove(dead);
            }
            pids.children = scan.children.clone();
        }

        let stats = build_stats(&context, scan);
        tracing::trace!(
            "container {}: {} processes, {:.1} MB, {:.1}% cpu",
            context.container_id,
            stats.total_processes,
            stats.total_memory_mb,
            stats.total_cpu_percent
        );
        context.stats.send_replace(Arc::new(stats));
    }

    tracing::debug!("monitor stopped for container {}", context.container_id);
}

fn build_stats(context: &MonitorContext, scan: ProcessScan) -> ContainerStats {
    ContainerStats {
        total_processes: scan.processes.len(),
        total_memory_mb: scan.processes.iter().map(|p| p.memory_mb).sum(),
        total_cpu_percent: scan.processes.iter().map(|p| p.cpu_percent).sum(),
        uptime_secs: context.started_at.elapsed().as_secs(),
        boundary_index: context.boundary_index,
        processes: scan.processes,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;

    #[test]
    fn test_pid_sets_all_deduplicates() {
        let sets = PidSets {
            tracked: HashSet::from([10, 11]),
            children: HashSet::from([11, 12]),
        };

        let mut all = sets.all();
        all.sort();
        assert_eq!(all, vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn test_monitor_publishes_stats_and_prunes_dead_roots() -> anyhow::Result<()> {
        let mut sleeper = Command::new("sleep").arg("30").spawn()?;
        let mut finished = Command::new("true").spawn()?;
        finished.wait()?;

        let pids = Arc::new(Mutex::new(PidSets {
            tracked: HashSet::from([sleeper.id(), finished.id()]),
            children: HashSet::new(),
        }));
        let (_state_tx, state_rx) = watch::channel(ContainerState::Running);
        let (stats_tx, mut stats_rx) = watch::channel(Arc::new(ContainerStats::default()));

        let monitor = MonitorHandle::spawn(MonitorContext {
            container_id: "test".to_string(),
            interval: Duration::from_millis(100),
            pids: pids.clone(),
            state: state_rx,
            stats: Arc::new(stats_tx),
            started_at: Instant::now(),
            boundary_index: Some(4),
        });

        stats_rx.changed().await?;
        let stats = stats_rx.borrow().clone();
        monitor.stop().await;

        assert_eq!(stats.get_total_processes(), 1);
        assert_eq!(stats.get_boundary_index(), Some(4));
        assert_eq!(pids.lock().await.tracked, HashSet::from([sleeper.id()]));

        sleeper.kill()?;
        sleeper.wait()?;
        Ok(())
    }

    #[tokio::test]
    async fn test_monitor_skips_ticks_unless_running() -> anyhow::Result<()> {
        let pids = Arc::new(Mutex::new(PidSets::default()));
        let (_state_tx, state_rx) = watch::channel(ContainerState::Paused);
        let (stats_tx, stats_rx) = watch::channel(Arc::new(ContainerStats::default()));
        let stats_tx = Arc::new(stats_tx);

        let monitor = MonitorHandle::spawn(MonitorContext {
            container_id: "paused".to_string(),
            interval: Duration::from_millis(20),
            pids,
            state: state_rx,
            stats: stats_tx.clone(),
            started_at: Instant::now(),
            boundary_index: None,
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        monitor.stop().await;

        assert!(!stats_rx.has_changed()?);
        Ok(())
    }
}

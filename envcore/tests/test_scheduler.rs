use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use envcore::{
    config::{ContainerConfig, Environment, ManagerConfig, SchedulerConfig, Website},
    events::EnvcoreEvent,
    orchestration::{ContainerManager, LaunchMode, LaunchScheduler},
    runtime::UrlOpener,
    EnvcoreError, EnvcoreResult,
};
use tokio::{sync::broadcast, time::Instant};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Records the order in which URLs were opened.
#[derive(Default)]
struct RecordingOpener {
    opened: Mutex<Vec<String>>,
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_scheduler_concurrent_mode_batches_by_ceiling() -> anyhow::Result<()> {
    let (manager, _) = manager(10);
    let scheduler = LaunchScheduler::new(manager.clone(), config());
    let mut rx = manager.subscribe();

    for name in ["a", "b", "c", "d", "e"] {
        scheduler
            .enqueue(site(name), None, false, 0, Duration::ZERO)
            .await?;
    }

    let results = scheduler.run_queue(Some(LaunchMode::Concurrent)).await?;
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|result| result.get_success()));
    assert_eq!(manager.container_ids().await.len(), 5);

    let events = drain(&mut rx);
    let batches: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            EnvcoreEvent::BatchStarted { size, .. } => Some(*size),
            _ => None,
        })
        .collect();
    assert_eq!(batches, vec![2, 2, 1]);
    assert!(events.contains(&EnvcoreEvent::AllLaunchesCompleted(results.clone())));

    // Every job of a batch has a result before the next batch starts.
    let mut completed = 0;
    let mut completed_before_batch = Vec::new();
    for event in &events {
        match event {
            EnvcoreEvent::LaunchCompleted { .. } => completed += 1,
            EnvcoreEvent::BatchStarted { batch, .. } => {
                completed_before_batch.push((*batch, completed))
            }
            _ => {}
        }
    }
    assert_eq!(completed_before_batch, vec![(1, 0), (2, 2), (3, 4)]);
    assert_eq!(completed, 5);

    let status = scheduler.queue_status().await;
    assert!(!status.get_is_running());
    assert_eq!(status.get_queue_size(), 0);
    assert_eq!(status.get_active_launches(), 0);

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_scheduler_batched_mode_uses_batch_size() -> anyhow::Result<()> {
    let (manager, _) = manager(10);
    let scheduler = LaunchScheduler::new(manager.clone(), config());
    let mut rx = manager.subscribe();

    scheduler
        .enqueue_many(["a", "b", "c", "d", "e"].map(site), false)
        .await?;
    let results = scheduler.run_queue(Some(LaunchMode::Batched)).await?;
    assert_eq!(results.len(), 5);

    let completed: Vec<(usize, usize)> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            EnvcoreEvent::BatchCompleted {
                succeeded, total, ..
            } => Some((succeeded, total)),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![(3, 3), (2, 2)]);

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_scheduler_sequential_mode_follows_priority() -> anyhow::Result<()> {
    let (manager, opener) = manager(10);
    let scheduler = LaunchScheduler::new(manager.clone(), config());

    for (name, priority) in [("low", 9), ("high", 0), ("mid", 5), ("high-2", 0)] {
        scheduler
            .enqueue(site(name), Some(name.to_string()), false, priority, Duration::ZERO)
            .await?;
    }

    let results = scheduler.run_queue(Some(LaunchMode::Sequential)).await?;
    let order: Vec<&str> = results
        .iter()
        .map(|result| result.get_container_id().as_str())
        .collect();
    assert_eq!(order, vec!["high", "high-2", "mid", "low"]);
    assert_eq!(
        *opener.opened.lock().unwrap(),
        vec![
            "https://high.example.com",
            "https://high-2.example.com",
            "https://mid.example.com",
            "https://low.example.com",
        ]
    );

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_scheduler_isolates_failures() -> anyhow::Result<()> {
    let (manager, _) = manager(2);
    let scheduler = LaunchScheduler::new(manager.clone(), config());

    scheduler
        .enqueue_many(["a", "b", "c"].map(site), false)
        .await?;
    let results = scheduler.run_queue(Some(LaunchMode::Sequential)).await?;

    assert_eq!(results.len(), 3);
    let failed: Vec<_> = results
        .iter()
        .filter(|result| !result.get_success())
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].get_environment_name(), "c");
    assert!(failed[0]
        .get_error()
        .as_deref()
        .is_some_and(|error| error.contains("maximum concurrent containers")));

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_scheduler_rejects_reentrant_run() -> anyhow::Result<()> {
    let (manager, _) = manager(10);
    let scheduler = Arc::new(LaunchScheduler::new(manager.clone(), config()));

    scheduler
        .enqueue(site("slow"), None, false, 0, Duration::from_millis(500))
        .await?;

    let run = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_queue(Some(LaunchMode::Sequential)).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = scheduler.queue_status().await;
    assert!(status.get_is_running());
    assert_eq!(status.get_total_jobs(), 1);
    assert!(matches!(
        scheduler.run_queue(None).await,
        Err(EnvcoreError::AlreadyRunning)
    ));

    let results = run.await??;
    assert_eq!(results.len(), 1);
    assert!(results[0].get_duration() >= Duration::from_millis(500));
    assert!(!scheduler.queue_status().await.get_is_running());

    // The scheduler accepts another run once the first one finished.
    assert!(scheduler.run_queue(None).await?.is_empty());

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_scheduler_rejects_registered_id() -> anyhow::Result<()> {
    let (manager, _) = manager(10);
    let scheduler = LaunchScheduler::new(manager.clone(), config());
    manager
        .start_container(site("docs"), Some("docs".to_string()), false)
        .await?;

    let err = scheduler
        .enqueue(site("docs"), Some("docs".to_string()), false, 0, Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, EnvcoreError::DuplicateContainer(_)));

    let id = scheduler
        .enqueue(site("docs"), None, false, 0, Duration::ZERO)
        .await?;
    assert_ne!(id, "docs");

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_scheduler_staggered_mode_offsets_jobs() -> anyhow::Result<()> {
    let (manager, _) = manager(10);
    let scheduler = LaunchScheduler::new(manager.clone(), config());
    let mut rx = manager.subscribe();

    scheduler
        .enqueue_many(["a", "b", "c"].map(site), true)
        .await?;
    let clock = Instant::now();
    let results = scheduler.run_queue(Some(LaunchMode::Staggered)).await?;

    assert!(clock.elapsed() >= Duration::from_millis(200));
    assert_eq!(results.len(), 3);

    let events = drain(&mut rx);
    let batches = events
        .iter()
        .filter(|event| matches!(event, EnvcoreEvent::BatchStarted { .. }))
        .count();
    assert_eq!(batches, 1);

    let last = results
        .iter()
        .find(|result| result.get_environment_name() == "c")
        .expect("result for c");
    assert_eq!(
        manager.active_container().await.as_deref(),
        Some(last.get_container_id().as_str())
    );

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_scheduler_emergency_stop_skips_pending_jobs() -> anyhow::Result<()> {
    let (manager, _) = manager(10);
    let scheduler = Arc::new(LaunchScheduler::new(
        manager.clone(),
        SchedulerConfig::builder()
            .stagger_interval(Duration::from_secs(2))
            .build(),
    ));

    scheduler
        .enqueue_many(["a", "b", "c"].map(site), false)
        .await?;
    let run = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_queue(Some(LaunchMode::Staggered)).await }
    });
    tokio::time::sleep(Duration::from_millis(150)).await;

    scheduler
        .enqueue(site("late"), None, false, 0, Duration::ZERO)
        .await?;
    let clock = Instant::now();
    assert_eq!(scheduler.emergency_stop().await, 1);

    // Pending jobs are woken instead of sleeping out their offsets.
    let results = run.await??;
    assert!(
        clock.elapsed() < Duration::from_secs(1),
        "run took {:?} to end after the stop",
        clock.elapsed()
    );
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get_environment_name(), "a");
    assert!(scheduler.queued_jobs().await.is_empty());
    assert_eq!(manager.container_ids().await.len(), 1);

    manager.shutdown().await;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn config() -> SchedulerConfig {
    SchedulerConfig::builder()
        .max_concurrent_launches(2)
        .batch_size(3)
        .stagger_interval(Duration::from_millis(100))
        .concurrent_batch_pause(Duration::from_millis(10))
        .batched_batch_pause(Duration::from_millis(20))
        .build()
}

fn manager(max: usize) -> (Arc<ContainerManager>, Arc<RecordingOpener>) {
    let opener = Arc::new(RecordingOpener::default());
    let manager = ContainerManager::builder()
        .config(
            ManagerConfig::builder()
                .max_concurrent_containers(max)
                .build(),
        )
        .container_config(
            ContainerConfig::builder()
                .monitor_interval(Duration::from_millis(100))
                .item_launch_interval(Duration::ZERO)
                .build(),
        )
        .url_opener(opener.clone())
        .build();

    (Arc::new(manager), opener)
}

fn site(name: &str) -> Environment {
    Environment::builder()
        .name(name)
        .use_isolation(false)
        .websites(vec![Website::builder()
            .name(name)
            .url(format!("https://{name}.example.com"))
            .build()])
        .build()
}

fn drain(rx: &mut broadcast::Receiver<EnvcoreEvent>) -> Vec<EnvcoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl UrlOpener for RecordingOpener {
    async fn open(&self, url: &str, _browser: Option<&str>) -> EnvcoreResult<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

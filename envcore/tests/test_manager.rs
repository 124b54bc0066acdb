use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use envcore::{
    config::{Application, ContainerConfig, Environment, ManagerConfig, Website},
    events::EnvcoreEvent,
    isolation::{BoundaryHandle, Isolation, NoIsolation},
    orchestration::ContainerManager,
    runtime::{ContainerState, UrlOpener},
    EnvcoreError, EnvcoreResult,
};
use tokio::sync::broadcast;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Records every URL instead of opening a browser.
#[derive(Default)]
struct RecordingOpener {
    opened: Mutex<Vec<String>>,
}

/// Creates every boundary it is asked for.
#[derive(Default)]
struct FakeDesktops {
    closed: Mutex<Vec<u32>>,
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_manager_round_trip_frees_id_and_boundary() -> anyhow::Result<()> {
    let desktops = Arc::new(FakeDesktops::default());
    let manager = manager(4, 2, desktops.clone());

    let id = manager
        .start_container(site("docs", true), Some("docs".to_string()), false)
        .await?;
    assert_eq!(id, "docs");

    let status = manager.get_system_status().await;
    assert_eq!(status.get_available_boundaries(), 1);
    assert_eq!(
        status.get_containers()["docs"].get_boundary_index(),
        Some(1)
    );
    assert_eq!(status.get_resources().get_active_boundaries(), &vec![1]);

    assert!(manager.stop_container("docs", false).await);
    assert!(manager.get_container("docs").await.is_none());
    assert_eq!(manager.get_system_status().await.get_available_boundaries(), 2);
    assert_eq!(*desktops.closed.lock().unwrap(), vec![1]);

    // The id can be reused.
    manager
        .start_container(site("docs", true), Some("docs".to_string()), false)
        .await?;
    assert_eq!(manager.container_ids().await, vec!["docs".to_string()]);

    assert!(!manager.stop_container("missing", false).await);
    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_manager_rejects_duplicate_id() -> anyhow::Result<()> {
    let manager = manager(4, 4, Arc::new(NoIsolation));
    manager
        .start_container(site("docs", false), Some("docs".to_string()), false)
        .await?;

    let err = manager
        .start_container(site("other", false), Some("docs".to_string()), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EnvcoreError::DuplicateContainer(ref id) if id == "docs"));

    let containers = manager.get_all_containers().await;
    assert_eq!(containers.len(), 1);
    assert_eq!(containers["docs"].get_environment_name(), "docs");

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_manager_capacity_exceeded() -> anyhow::Result<()> {
    let manager = manager(1, 4, Arc::new(NoIsolation));
    let mut rx = manager.subscribe();

    manager.start_container(site("a", false), None, false).await?;
    assert!(!manager.can_start_container().await);

    let err = manager
        .start_container(site("b", false), None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, EnvcoreError::CapacityExceeded(1)));
    assert_eq!(manager.container_ids().await.len(), 1);
    assert!(drain(&mut rx).contains(&EnvcoreEvent::MaxContainersReached(1)));

    manager.shutdown().await;
    assert!(manager.can_start_container().await);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_manager_never_reuses_owned_boundaries() -> anyhow::Result<()> {
    let manager = manager(10, 10, Arc::new(FakeDesktops::default()));

    let mut ids = Vec::new();
    for index in 1..=7 {
        let id = format!("env-{index}");
        manager
            .start_container(site(&id, true), Some(id.clone()), false)
            .await?;
        ids.push(id);
    }

    for id in &ids {
        if id != "env-3" && id != "env-7" {
            assert!(manager.stop_container(id, true).await);
        }
    }

    for index in 8..=15 {
        let id = format!("env-{index}");
        manager
            .start_container(site(&id, true), Some(id.clone()), false)
            .await?;
    }

    let containers = manager.get_all_containers().await;
    assert_eq!(containers["env-3"].get_boundary_index(), Some(3));
    assert_eq!(containers["env-7"].get_boundary_index(), Some(7));

    let mut seen = HashSet::new();
    for info in containers.values() {
        let index = info.get_boundary_index().expect("every container is isolated");
        assert!(seen.insert(index), "boundary {} is shared", index);
    }
    assert_eq!(seen.len(), 10);
    assert!(matches!(
        manager.start_container(site("full", true), None, false).await,
        Err(EnvcoreError::CapacityExceeded(10))
    ));

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_manager_returns_boundary_when_isolation_is_unavailable() -> anyhow::Result<()> {
    let manager = manager(4, 2, Arc::new(NoIsolation));
    manager
        .start_container(site("docs", true), Some("docs".to_string()), false)
        .await?;

    let status = manager.get_system_status().await;
    assert_eq!(status.get_available_boundaries(), 2);
    assert_eq!(status.get_containers()["docs"].get_boundary_index(), None);

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_manager_rejects_invalid_environment() -> anyhow::Result<()> {
    let manager = manager(4, 2, Arc::new(NoIsolation));
    let env = Environment::builder()
        .name("broken")
        .websites(vec![Website::builder().name("bad").url("ftp://example.com").build()])
        .build();

    let err = manager.start_container(env, None, false).await.unwrap_err();
    assert!(matches!(err, EnvcoreError::Configuration(_)));
    assert!(manager.container_ids().await.is_empty());
    assert_eq!(manager.get_system_status().await.get_available_boundaries(), 2);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_manager_switch_pause_resume() -> anyhow::Result<()> {
    let manager = manager(4, 4, Arc::new(NoIsolation));
    let mut rx = manager.subscribe();
    let env = Environment::builder()
        .name("dev")
        .use_isolation(false)
        .applications(vec![Application::builder()
            .name("sleeper")
            .executable_path("sleep")
            .arguments(vec!["30".to_string()])
            .build()])
        .build();

    let id = manager.start_container(env, None, true).await?;
    assert!(id.starts_with("dev-"));
    assert_eq!(manager.active_container().await, Some(id.clone()));
    assert_eq!(manager.running_containers().await, vec![id.clone()]);

    let events = drain(&mut rx);
    assert!(events.contains(&EnvcoreEvent::ContainerStarted(id.clone())));
    assert!(events.contains(&EnvcoreEvent::ContainerSwitched(id.clone())));

    assert!(!manager.resume_container(&id).await);
    assert!(manager.pause_container(&id).await);
    assert!(!manager.pause_container(&id).await);
    assert!(!manager.switch_to(&id).await);

    let container = manager.get_container(&id).await.expect("registered");
    assert_eq!(container.state(), ContainerState::Paused);
    assert!(manager.running_containers().await.is_empty());

    assert!(manager.resume_container(&id).await);
    assert!(manager.switch_to(&id).await);
    assert!(!manager.pause_container("missing").await);

    assert!(manager.stop_container(&id, false).await);
    assert_eq!(manager.active_container().await, None);
    assert!(drain(&mut rx).contains(&EnvcoreEvent::ContainerStopped(id)));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_manager_restart_keeps_id() -> anyhow::Result<()> {
    let opener = Arc::new(RecordingOpener::default());
    let manager = ContainerManager::builder()
        .container_config(fast_container_config())
        .url_opener(opener.clone())
        .build();

    manager
        .start_container(site("docs", false), Some("docs".to_string()), false)
        .await?;
    assert!(manager.restart_container("docs").await);
    assert!(!manager.restart_container("missing").await);

    assert_eq!(manager.container_ids().await, vec!["docs".to_string()]);
    assert_eq!(manager.active_container().await, Some("docs".to_string()));
    assert_eq!(opener.opened.lock().unwrap().len(), 2);

    manager.shutdown().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_manager_stop_all_and_resource_rollup() -> anyhow::Result<()> {
    let manager = Arc::new(
        ContainerManager::builder()
            .config(
                ManagerConfig::builder()
                    .resource_interval(Duration::from_millis(50))
                    .build(),
            )
            .container_config(fast_container_config())
            .url_opener(Arc::new(RecordingOpener::default()))
            .isolation(Arc::new(FakeDesktops::default()))
            .build(),
    );
    let mut rx = manager.subscribe();

    for (name, isolated) in [("a", true), ("b", false), ("c", true)] {
        manager.start_container(site(name, isolated), None, false).await?;
    }

    let resources = manager.refresh_resources().await;
    assert_eq!(resources.get_total_containers(), 3);
    assert_eq!(resources.get_running_containers(), 3);
    assert_eq!(resources.get_active_boundaries(), &vec![1, 2]);
    assert_eq!(manager.resources().await, resources);
    assert_eq!(
        manager.get_system_status().await.get_resources().get_active_boundaries(),
        &vec![1, 2]
    );

    manager.start_resource_monitor().await;
    manager.start_resource_monitor().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let updates = drain(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, EnvcoreEvent::ResourcesUpdated(_)))
        .count();
    assert!(updates >= 2, "expected periodic rollups, got {}", updates);

    assert_eq!(manager.stop_all(false).await, 3);
    assert!(manager.container_ids().await.is_empty());
    assert!(manager
        .refresh_resources()
        .await
        .get_active_boundaries()
        .is_empty());
    assert_eq!(manager.shutdown().await, 0);

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn fast_container_config() -> ContainerConfig {
    ContainerConfig::builder()
        .monitor_interval(Duration::from_millis(100))
        .stop_grace_period(Duration::from_millis(500))
        .item_launch_interval(Duration::ZERO)
        .build()
}

fn manager(max: usize, pool: u32, isolation: Arc<dyn Isolation>) -> ContainerManager {
    ContainerManager::builder()
        .config(
            ManagerConfig::builder()
                .max_concurrent_containers(max)
                .boundary_pool_size(pool)
                .build(),
        )
        .container_config(fast_container_config())
        .url_opener(Arc::new(RecordingOpener::default()))
        .isolation(isolation)
        .build()
}

fn site(name: &str, use_isolation: bool) -> Environment {
    Environment::builder()
        .name(name)
        .use_isolation(use_isolation)
        .websites(vec![Website::builder()
            .name("docs")
            .url("https://docs.rs")
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

#[async_trait]
impl Isolation for FakeDesktops {
    async fn create_boundary(&self, name: &str, index: u32) -> Option<BoundaryHandle> {
        Some(BoundaryHandle::new(index, name))
    }

    async fn focus(&self, _handle: &BoundaryHandle) -> bool {
        true
    }

    async fn close(&self, handle: &BoundaryHandle) {
        self.closed.lock().unwrap().push(handle.get_index());
    }
}

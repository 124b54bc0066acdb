use std::{path::PathBuf, sync::Arc, time::Duration};

use envcore::{
    cli::AnsiStyles,
    config::{Environment, EnvcoreConfig, MIN_TICK_INTERVAL},
    isolation::WorkspaceIsolation,
    orchestration::{ContainerManager, LaunchMode, LaunchResult, LaunchScheduler, SystemStatus},
    EnvcoreError, EnvcoreResult,
};
use envutils::path::{envcore_home, ENVCORE_CONFIG_FILENAME};

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

pub async fn up_subcommand(
    config_path: Option<PathBuf>,
    names: Vec<String>,
    mode: Option<LaunchMode>,
    switch: bool,
    watch: Option<Duration>,
) -> EnvcoreResult<()> {
    let config = load_config(config_path).await?;
    let environments = names
        .iter()
        .map(|name| {
            config
                .get_environment(name)
                .cloned()
                .ok_or_else(|| EnvcoreError::EnvironmentNotFound(name.clone()))
        })
        .collect::<EnvcoreResult<Vec<Environment>>>()?;

    let manager = Arc::new(
        ContainerManager::builder()
            .config(config.get_manager().clone())
            .container_config(config.get_container().clone())
            .isolation(Arc::new(WorkspaceIsolation::new()))
            .build(),
    );
    manager.start_resource_monitor().await;

    let scheduler = LaunchScheduler::new(manager.clone(), config.get_scheduler().clone());
    scheduler.enqueue_many(environments, switch).await?;

    let results = scheduler.run_queue(mode).await?;
    print_results(&results);

    if !results.iter().any(|result| result.get_success()) {
        manager.shutdown().await;
        return Ok(());
    }

    println!("{}", "press ctrl-c to stop".placeholder());

    let mut ticker =
        watch.map(|period| tokio::time::interval(period.max(MIN_TICK_INTERVAL)));
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            _ = async {
                match ticker.as_mut() {
                    Some(ticker) => {
                        ticker.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            } => {
                print_status(&manager.get_system_status().await);
            }
        }
    }

    let stopped = manager.shutdown().await;
    println!("stopped {} container(s)", stopped);

    Ok(())
}

pub async fn list_subcommand(config_path: Option<PathBuf>, json: bool) -> EnvcoreResult<()> {
    let config = load_config(config_path).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(config.get_environments())?);
        return Ok(());
    }

    for environment in config.get_environments() {
        let description = environment.get_description();
        println!(
            "{} {}",
            environment.get_name().literal(),
            format!(
                "({} apps, {} websites)",
                environment.get_applications().len(),
                environment.get_websites().len()
            )
            .placeholder()
        );
        if !description.is_empty() {
            println!("    {}", description);
        }
    }

    Ok(())
}

pub async fn validate_subcommand(config_path: Option<PathBuf>) -> EnvcoreResult<()> {
    let path = resolve_config_path(config_path)?;
    match EnvcoreConfig::load(&path).await {
        Ok(config) => {
            println!(
                "{} {} ({} environments)",
                "valid".valid(),
                path.display(),
                config.get_environments().len()
            );
            Ok(())
        }
        Err(e) => {
            println!("{} {}: {}", "invalid".error(), path.display(), e);
            Err(e)
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn resolve_config_path(config_path: Option<PathBuf>) -> EnvcoreResult<PathBuf> {
    match config_path {
        Some(path) => Ok(path),
        None => Ok(envcore_home()?.join(ENVCORE_CONFIG_FILENAME)),
    }
}

async fn load_config(config_path: Option<PathBuf>) -> EnvcoreResult<EnvcoreConfig> {
    let path = resolve_config_path(config_path)?;
    tracing::debug!("loading configuration from {}", path.display());
    EnvcoreConfig::load(&path).await
}

fn print_results(results: &[LaunchResult]) {
    for result in results {
        let status = if result.get_success() {
            "started".valid()
        } else {
            "failed".error()
        };

        match result.get_error() {
            Some(error) => println!(
                "{} {} ({}): {}",
                status,
                result.get_container_id().literal(),
                result.get_environment_name(),
                error
            ),
            None => println!(
                "{} {} ({}) in {:.1}s",
                status,
                result.get_container_id().literal(),
                result.get_environment_name(),
                result.get_duration().as_secs_f64()
            ),
        }
    }
}

fn print_status(status: &SystemStatus) {
    let resources = status.get_resources();
    println!(
        "{} {}/{} containers, {} processes, {:.1} MB, {:.1}% cpu",
        "status".header(),
        resources.get_running_containers(),
        status.get_max_containers(),
        resources.get_total_processes(),
        resources.get_total_memory_mb(),
        resources.get_total_cpu_percent()
    );

    let mut containers: Vec<_> = status.get_containers().values().collect();
    containers.sort_by(|a, b| a.get_container_id().cmp(b.get_container_id()));
    for info in containers {
        let active = status.get_active_container().as_deref() == Some(info.get_container_id());
        println!(
            "  {}{} [{}] {} processes, up {}s",
            if active { "*" } else { " " },
            info.get_container_id().literal(),
            info.get_state(),
            info.get_stats().get_total_processes(),
            info.get_uptime_secs()
        );
    }
}

use std::process::Stdio;

use async_trait::async_trait;
use envutils::expand_home;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
};

use crate::{config::Application, EnvcoreError, EnvcoreResult};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Starts the applications of an environment.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Starts `app` with the extra environment variables `envs` and returns its PID.
    ///
    /// The spawned process must outlive this call; the container decides when it ends.
    async fn spawn(&self, app: &Application, envs: &[(String, String)]) -> EnvcoreResult<u32>;
}

/// Opens the websites of an environment.
#[async_trait]
pub trait UrlOpener: Send + Sync {
    /// Opens `url`, in `browser` if one is given or in the system default otherwise.
    async fn open(&self, url: &str, browser: Option<&str>) -> EnvcoreResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Spawns applications as child processes of the current process.
///
/// Output is forwarded to the log at debug level and the child is reaped by a background task
/// once it exits.
#[derive(Debug, Default, Clone)]
pub struct CommandSpawner;

/// Opens URLs with `xdg-open` (`open` on macOS) or a named browser executable.
#[derive(Debug, Default, Clone)]
pub struct SystemUrlOpener;

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ProcessSpawner for CommandSpawner {
    async fn spawn(&self, app: &Application, envs: &[(String, String)]) -> EnvcoreResult<u32> {
        let program = expand_home(app.get_executable_path());
        let mut command = Command::new(&program);
        command
            .args(app.get_arguments())
            .envs(envs.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = app.get_working_directory() {
            command.current_dir(expand_home(&dir.to_string_lossy()));
        }

        let child = command
            .spawn()
            .map_err(|e| EnvcoreError::spawn(app.get_name(), e))?;

        let pid = child.id().ok_or_else(|| {
            EnvcoreError::spawn(app.get_name(), "process exited before its pid was read")
        })?;

        tracing::info!("started {} ({}) with pid {}", app.get_name(), program.display(), pid);
        spawn_output_handler(child, app.get_name().to_string());

        Ok(pid)
    }
}

#[async_trait]
impl UrlOpener for SystemUrlOpener {
    async fn open(&self, url: &str, browser: Option<&str>) -> EnvcoreResult<()> {
        let program = match browser {
            Some(browser) => expand_home(browser).display().to_string(),
            None => default_opener().to_string(),
        };

        let child = Command::new(&program)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EnvcoreError::spawn(url, format!("{}: {}", program, e)))?;

        tracing::info!("opened {} with {}", url, program);
        spawn_output_handler(child, program);

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Forwards the output of a child process to the log and reaps it when it exits.
fn spawn_output_handler(mut child: Child, name: String) {
    if let Some(stdout) = child.stdout.take() {
        let name = name.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                tracing::debug!("[{}/stdout] {}", name, line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let name = name.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                tracing::debug!("[{}/stderr] {}", name, line);
            }
        });
    }

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => tracing::debug!("{} exited with status: {}", name, status),
            Err(e) => tracing::warn!("failed to wait for {}: {}", name, e),
        }
    });
}

fn default_opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_command_spawner_passes_environment() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let marker = dir.path().join("marker");
        let app = Application::builder()
            .name("writer")
            .executable_path("sh")
            .arguments(vec![
                "-c".to_string(),
                format!("echo $ENVCORE_CONTAINER_ID > {}", marker.display()),
            ])
            .build();

        let envs = vec![("ENVCORE_CONTAINER_ID".to_string(), "dev-1".to_string())];
        let pid = CommandSpawner.spawn(&app, &envs).await?;
        assert!(pid > 0);

        for _ in 0..50 {
            if let Ok(contents) = tokio::fs::read_to_string(&marker).await {
                if contents.trim() == "dev-1" {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        anyhow::bail!("marker file was never written")
    }

    #[tokio::test]
    async fn test_command_spawner_reports_missing_executable() {
        let app = Application::builder()
            .name("ghost")
            .executable_path("/nonexistent/envcore-ghost")
            .build();

        let err = CommandSpawner.spawn(&app, &[]).await.unwrap_err();
        assert!(matches!(err, EnvcoreError::Spawn { ref item, .. } if item == "ghost"));
    }

    #[tokio::test]
    async fn test_url_opener_reports_missing_browser() {
        let result = SystemUrlOpener
            .open("https://example.com", Some("/nonexistent/browser"))
            .await;
        assert!(matches!(result, Err(EnvcoreError::Spawn { .. })));
    }
}

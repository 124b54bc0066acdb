use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use super::{BoundaryHandle, Isolation};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Isolates containers on separate virtual desktops using `wmctrl`.
///
/// Desktop 0 is left to the user; the boundary with pool index `n` is desktop `n`. Without
/// `wmctrl` on the `PATH` no boundary is ever created.
#[derive(Debug, Clone)]
pub struct WorkspaceIsolation {
    wmctrl: Option<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl WorkspaceIsolation {
    /// Looks up `wmctrl` on the `PATH`.
    pub fn new() -> Self {
        let wmctrl = which::which("wmctrl").ok();
        if wmctrl.is_none() {
            tracing::info!("wmctrl not found, workspace isolation is disabled");
        }

        Self { wmctrl }
    }

    /// Returns `true` if workspaces can be created.
    pub fn is_available(&self) -> bool {
        self.wmctrl.is_some()
    }

    async fn wmctrl(&self, args: &[&str]) -> Option<String> {
        let wmctrl = self.wmctrl.as_ref()?;
        match Command::new(wmctrl).args(args).output().await {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                tracing::warn!(
                    "wmctrl {} failed: {}",
                    args.join(" "),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(e) => {
                tracing::warn!("failed to run wmctrl: {}", e);
                None
            }
        }
    }

    /// Lists desktops as `(number, is_current)`.
    async fn desktops(&self) -> Option<Vec<(u32, bool)>> {
        let listing = self.wmctrl(&["-d"]).await?;
        Some(
            listing
                .lines()
                .filter_map(|line| {
                    let mut fields = line.split_whitespace();
                    let number = fields.next()?.parse::<u32>().ok()?;
                    let current = fields.next() == Some("*");
                    Some((number, current))
                })
                .collect(),
        )
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for WorkspaceIsolation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Isolation for WorkspaceIsolation {
    async fn create_boundary(&self, name: &str, index: u32) -> Option<BoundaryHandle> {
        let count = self.desktops().await?.len() as u32;
        if count <= index {
            let wanted = (index + 1).to_string();
            self.wmctrl(&["-n", &wanted]).await?;
        }

        tracing::debug!("workspace {} assigned to {}", index, name);
        Some(BoundaryHandle::new(index, format!("{} [{}]", name, index)))
    }

    async fn focus(&self, handle: &BoundaryHandle) -> bool {
        let index = handle.get_index().to_string();
        self.wmctrl(&["-s", &index]).await.is_some()
    }

    async fn close(&self, handle: &BoundaryHandle) {
        let Some(desktops) = self.desktops().await else {
            return;
        };

        let on_boundary = desktops
            .iter()
            .any(|(number, current)| *current && *number == handle.get_index());
        if on_boundary {
            self.wmctrl(&["-s", "0"]).await;
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

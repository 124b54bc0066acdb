//! `envcore` starts, monitors and stops bundles of applications and websites as environment
//! containers.
//!
//! # Overview
//!
//! An [`Environment`](config::Environment) names a set of applications and websites. Starting it
//! creates a [`Container`](container::Container) that spawns every item, tracks the process trees
//! they create and terminates all of them again when the container stops.
//!
//! # Architecture
//!
//! - **Runtime**: process spawning, process tree discovery and the per-container monitor
//! - **Container**: the lifecycle state machine of one environment instance
//! - **Isolation**: optional visual workspaces that keep containers apart on screen
//! - **Orchestration**: the container registry and the batch launch scheduler
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use envcore::{
//!     config::{Application, Environment, SchedulerConfig},
//!     orchestration::{ContainerManager, LaunchMode, LaunchScheduler},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let env = Environment::builder()
//!         .name("notes")
//!         .applications(vec![Application::builder()
//!             .name("editor")
//!             .executable_path("gedit")
//!             .build()])
//!         .build();
//!
//!     let manager = Arc::new(ContainerManager::builder().build());
//!     let scheduler = LaunchScheduler::new(manager.clone(), SchedulerConfig::default());
//!
//!     scheduler.enqueue(env, None, true, 0, Duration::ZERO).await?;
//!     let results = scheduler.run_queue(Some(LaunchMode::Sequential)).await?;
//!     assert!(results[0].get_success());
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument parsing
//! - [`config`] - Configuration types and validation
//! - [`container`] - The environment container state machine
//! - [`events`] - Notifications broadcast by the orchestration core
//! - [`isolation`] - Workspace isolation and the boundary pool
//! - [`orchestration`] - The container manager and launch scheduler
//! - [`runtime`] - Process spawning, tracking and monitoring

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod config;
pub mod container;
pub mod events;
pub mod isolation;
pub mod orchestration;
pub mod runtime;

pub use error::*;

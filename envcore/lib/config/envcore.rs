//! The `envcore.yaml` configuration file.

use std::{collections::HashSet, path::Path, time::Duration};

use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::{
    Environment, DEFAULT_BATCHED_BATCH_PAUSE, DEFAULT_BATCH_SIZE, DEFAULT_BOUNDARY_POOL_SIZE,
    DEFAULT_CONCURRENT_BATCH_PAUSE, DEFAULT_ITEM_LAUNCH_INTERVAL, DEFAULT_LAUNCH_MODE,
    DEFAULT_MAX_CONCURRENT_CONTAINERS, DEFAULT_MAX_CONCURRENT_LAUNCHES, DEFAULT_MONITOR_INTERVAL,
    DEFAULT_RESOURCE_INTERVAL, DEFAULT_STAGGER_INTERVAL, DEFAULT_STOP_GRACE_PERIOD,
};
use crate::{orchestration::LaunchMode, EnvcoreError, EnvcoreResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The envcore configuration file.
#[derive(Debug, Default, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct EnvcoreConfig {
    /// Settings of the container manager.
    #[serde(default)]
    #[builder(default)]
    manager: ManagerConfig,

    /// Settings applied to every container.
    #[serde(default)]
    #[builder(default)]
    container: ContainerConfig,

    /// Settings of the launch scheduler.
    #[serde(default)]
    #[builder(default)]
    scheduler: SchedulerConfig,

    /// The environments that can be launched.
    #[serde(default)]
    #[builder(default)]
    environments: Vec<Environment>,
}

/// Settings of the container manager.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, CopyGetters)]
#[getset(get_copy = "pub with_prefix")]
#[serde(default)]
pub struct ManagerConfig {
    /// The maximum number of containers that may be active at once.
    #[builder(default = DEFAULT_MAX_CONCURRENT_CONTAINERS)]
    max_concurrent_containers: usize,

    /// The number of isolation boundary handles available, numbered from 1.
    #[builder(default = DEFAULT_BOUNDARY_POOL_SIZE)]
    boundary_pool_size: u32,

    /// How often the system-wide resource rollup runs.
    #[serde(with = "crate::config::duration")]
    #[builder(default = DEFAULT_RESOURCE_INTERVAL)]
    resource_interval: Duration,
}

/// Settings applied to every container.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, CopyGetters)]
#[getset(get_copy = "pub with_prefix")]
#[serde(default)]
pub struct ContainerConfig {
    /// How often a container refreshes its process stats.
    #[serde(with = "crate::config::duration")]
    #[builder(default = DEFAULT_MONITOR_INTERVAL)]
    monitor_interval: Duration,

    /// How long a graceful stop waits before killing surviving processes.
    #[serde(with = "crate::config::duration")]
    #[builder(default = DEFAULT_STOP_GRACE_PERIOD)]
    stop_grace_period: Duration,

    /// The pause between launching two items of the same environment.
    #[serde(with = "crate::config::duration")]
    #[builder(default = DEFAULT_ITEM_LAUNCH_INTERVAL)]
    item_launch_interval: Duration,
}

/// Settings of the launch scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, CopyGetters)]
#[getset(get_copy = "pub with_prefix")]
#[serde(default)]
pub struct SchedulerConfig {
    /// The batch size of the concurrent mode.
    #[builder(default = DEFAULT_MAX_CONCURRENT_LAUNCHES)]
    max_concurrent_launches: usize,

    /// The batch size of the batched mode.
    #[builder(default = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// The offset between consecutive jobs of the staggered mode.
    #[serde(with = "crate::config::duration")]
    #[builder(default = DEFAULT_STAGGER_INTERVAL)]
    stagger_interval: Duration,

    /// The pause between batches of the concurrent mode.
    #[serde(with = "crate::config::duration")]
    #[builder(default = DEFAULT_CONCURRENT_BATCH_PAUSE)]
    concurrent_batch_pause: Duration,

    /// The pause between batches of the batched mode.
    #[serde(with = "crate::config::duration")]
    #[builder(default = DEFAULT_BATCHED_BATCH_PAUSE)]
    batched_batch_pause: Duration,

    /// The mode used when a run does not name one.
    #[builder(default = DEFAULT_LAUNCH_MODE)]
    default_mode: LaunchMode,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EnvcoreConfig {
    /// Loads and validates a configuration file.
    pub async fn load(path: impl AsRef<Path>) -> EnvcoreResult<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            EnvcoreError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_yaml(&contents)?;
        tracing::debug!(
            "loaded {} environments from {}",
            config.environments.len(),
            path.display()
        );

        Ok(config)
    }

    /// Parses and validates a configuration from YAML.
    pub fn from_yaml(contents: &str) -> EnvcoreResult<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to YAML.
    pub fn to_yaml(&self) -> EnvcoreResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Looks up an environment by name, ignoring case.
    pub fn get_environment(&self, name: &str) -> Option<&Environment> {
        self.environments
            .iter()
            .find(|env| env.get_name().eq_ignore_ascii_case(name))
    }

    /// Checks the settings and every environment.
    pub fn validate(&self) -> EnvcoreResult<()> {
        if self.manager.max_concurrent_containers == 0 {
            return Err(EnvcoreError::Configuration(
                "manager.max_concurrent_containers must be at least 1".to_string(),
            ));
        }

        if self.scheduler.max_concurrent_launches == 0 || self.scheduler.batch_size == 0 {
            return Err(EnvcoreError::Configuration(
                "scheduler batch sizes must be at least 1".to_string(),
            ));
        }

        let periods = [
            ("manager.resource_interval", self.manager.resource_interval),
            ("container.monitor_interval", self.container.monitor_interval),
            ("container.stop_grace_period", self.container.stop_grace_period),
        ];
        for (key, period) in periods {
            if period.is_zero() {
                return Err(EnvcoreError::Configuration(format!(
                    "{} must be greater than zero",
                    key
                )));
            }
        }

        let mut names = HashSet::new();
        for env in &self.environments {
            env.validate()?;
            if !names.insert(env.get_name().to_lowercase()) {
                return Err(EnvcoreError::Configuration(format!(
                    "environment '{}' is defined more than once",
                    env.get_name()
                )));
            }
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
manager:
  max_concurrent_containers: 4
  resource_interval: 0.5
container:
  stop_grace_period: 1
scheduler:
  batch_size: 2
  default_mode: staggered
environments:
  - name: Development
    description: IDE and docs
    applications:
      - name: Editor
        executable_path: code
        arguments: --new-window
    websites:
      - name: GitHub
        url: https://github.com
  - name: Support
    use_isolation: false
    websites:
      - name: Tickets
        url: https://example.com/tickets
        browser: firefox
"#;

    #[test]
    fn test_config_parses_sample() -> anyhow::Result<()> {
        let config = EnvcoreConfig::from_yaml(SAMPLE)?;

        assert_eq!(config.get_manager().get_max_concurrent_containers(), 4);
        assert_eq!(
            config.get_manager().get_boundary_pool_size(),
            DEFAULT_BOUNDARY_POOL_SIZE
        );
        assert_eq!(
            config.get_manager().get_resource_interval(),
            Duration::from_millis(500)
        );
        assert_eq!(
            config.get_container().get_stop_grace_period(),
            Duration::from_secs(1)
        );
        assert_eq!(
            config.get_container().get_monitor_interval(),
            DEFAULT_MONITOR_INTERVAL
        );
        assert_eq!(config.get_scheduler().get_batch_size(), 2);
        assert_eq!(config.get_scheduler().get_default_mode(), LaunchMode::Staggered);
        assert_eq!(config.get_environments().len(), 2);

        let support = config.get_environment("support").expect("support environment");
        assert!(!support.get_use_isolation());
        assert_eq!(
            support.get_websites()[0].get_browser().as_deref(),
            Some("firefox")
        );

        Ok(())
    }

    #[test]
    fn test_config_defaults_when_sections_missing() -> anyhow::Result<()> {
        let config = EnvcoreConfig::from_yaml("environments: []\n")?;
        assert_eq!(config.get_manager(), &ManagerConfig::default());
        assert_eq!(config.get_scheduler(), &SchedulerConfig::default());
        assert_eq!(
            config.get_scheduler().get_default_mode(),
            DEFAULT_LAUNCH_MODE
        );
        Ok(())
    }

    #[test]
    fn test_config_rejects_duplicate_environment_names() {
        let yaml = r#"
environments:
  - name: Docs
    websites: [{ name: a, url: "https://a.example" }]
  - name: docs
    websites: [{ name: b, url: "https://b.example" }]
"#;

        let err = EnvcoreConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, EnvcoreError::Configuration(_)));
    }

    #[test]
    fn test_config_rejects_zero_capacity() {
        let yaml = "manager:\n  max_concurrent_containers: 0\n";
        assert!(matches!(
            EnvcoreConfig::from_yaml(yaml),
            Err(EnvcoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        for yaml in [
            "manager:\n  resource_interval: 0\n",
            "container:\n  monitor_interval: 0\n",
            "container:\n  stop_grace_period: 0.0\n",
        ] {
            let err = EnvcoreConfig::from_yaml(yaml).unwrap_err();
            assert!(
                matches!(&err, EnvcoreError::Configuration(msg) if msg.contains("greater than zero")),
                "{yaml:?} gave {err}"
            );
        }

        let yaml = "manager:\n  resource_interval: 0\ncontainer:\n  monitor_interval: 0\nenvironments: []";
        assert!(EnvcoreConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_config_rejects_negative_duration() {
        let yaml = "container:\n  monitor_interval: -1\n";
        assert!(matches!(
            EnvcoreConfig::from_yaml(yaml),
            Err(EnvcoreError::Yaml(_))
        ));
    }

    #[test]
    fn test_config_yaml_round_trip_keeps_settings() -> anyhow::Result<()> {
        let config = EnvcoreConfig::from_yaml(SAMPLE)?;
        let reparsed = EnvcoreConfig::from_yaml(&config.to_yaml()?)?;
        assert_eq!(config, reparsed);
        Ok(())
    }

    #[tokio::test]
    async fn test_config_load_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("envcore.yaml");
        tokio::fs::write(&path, SAMPLE).await?;

        let config = EnvcoreConfig::load(&path).await?;
        assert!(config.get_environment("Development").is_some());

        let missing = EnvcoreConfig::load(dir.path().join("missing.yaml")).await;
        assert!(matches!(missing, Err(EnvcoreError::Configuration(_))));

        Ok(())
    }
}

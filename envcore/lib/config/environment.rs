use std::{path::PathBuf, time::Duration};

use getset::{CopyGetters, Getters};
use serde::{Deserialize, Deserializer, Serialize};
use typed_builder::TypedBuilder;

use crate::{EnvcoreError, EnvcoreResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A named bundle of applications and websites that are started and stopped as a unit.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Getters, CopyGetters)]
pub struct Environment {
    /// The name of the environment.
    #[builder(setter(into))]
    #[getset(get = "pub with_prefix")]
    name: String,

    /// A human readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[builder(default, setter(into))]
    #[getset(get = "pub with_prefix")]
    description: String,

    /// The applications to spawn, in order.
    #[serde(default)]
    #[builder(default)]
    #[getset(get = "pub with_prefix")]
    applications: Vec<Application>,

    /// The websites to open, in order, after the applications.
    #[serde(default)]
    #[builder(default)]
    #[getset(get = "pub with_prefix")]
    websites: Vec<Website>,

    /// How long to wait before the first item is launched.
    #[serde(default, with = "crate::config::duration")]
    #[builder(default)]
    #[getset(get_copy = "pub with_prefix")]
    startup_delay: Duration,

    /// Whether to place the environment in its own isolation boundary.
    #[serde(default = "Environment::default_true")]
    #[builder(default = true)]
    #[getset(get_copy = "pub with_prefix")]
    use_isolation: bool,

    /// Whether to focus the boundary before launching so windows open there.
    #[serde(default)]
    #[builder(default)]
    #[getset(get_copy = "pub with_prefix")]
    auto_focus: bool,

    /// Whether to close the isolation boundary when the container stops.
    #[serde(default = "Environment::default_true")]
    #[builder(default = true)]
    #[getset(get_copy = "pub with_prefix")]
    close_on_stop: bool,
}

/// An application to spawn as part of an environment.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Getters, CopyGetters)]
pub struct Application {
    /// The display name of the application.
    #[builder(setter(into))]
    #[getset(get = "pub with_prefix")]
    name: String,

    /// The executable to run. A leading `~` is expanded to the home directory.
    #[serde(alias = "path")]
    #[builder(setter(into))]
    #[getset(get = "pub with_prefix")]
    executable_path: String,

    /// The arguments to pass. Accepts a list or a whitespace separated string.
    #[serde(default, deserialize_with = "deserialize_arguments")]
    #[builder(default)]
    #[getset(get = "pub with_prefix")]
    arguments: Vec<String>,

    /// The working directory of the spawned process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    #[getset(get = "pub with_prefix")]
    working_directory: Option<PathBuf>,

    /// Whether to wait for this application to exit before launching the next item.
    #[serde(default)]
    #[builder(default)]
    #[getset(get_copy = "pub with_prefix")]
    wait_for_exit: bool,
}

/// A website to open as part of an environment.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Getters, CopyGetters)]
pub struct Website {
    /// The display name of the website.
    #[builder(setter(into))]
    #[getset(get = "pub with_prefix")]
    name: String,

    /// The URL to open.
    #[builder(setter(into))]
    #[getset(get = "pub with_prefix")]
    url: String,

    /// The browser executable to open the URL with. `None` uses the system default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    #[getset(get = "pub with_prefix")]
    browser: Option<String>,

    /// Whether to open the URL in a new tab.
    #[serde(default = "Environment::default_true")]
    #[builder(default = true)]
    #[getset(get_copy = "pub with_prefix")]
    new_tab: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Arguments {
    Line(String),
    List(Vec<String>),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Environment {
    /// Returns the number of applications and websites in the environment.
    pub fn total_items(&self) -> usize {
        self.applications.len() + self.websites.len()
    }

    /// Checks that the environment can be launched.
    ///
    /// ## Errors
    ///
    /// Returns [`EnvcoreError::Configuration`] when:
    /// - the name is blank
    /// - there is nothing to launch
    /// - an application has a blank name or executable path
    /// - a website has a blank name or a URL that is not `http://` or `https://`
    pub fn validate(&self) -> EnvcoreResult<()> {
        let invalid = |reason: String| {
            Err(EnvcoreError::Configuration(format!(
                "environment '{}': {}",
                self.name, reason
            )))
        };

        if self.name.trim().is_empty() {
            return invalid("name must not be empty".to_string());
        }

        if self.total_items() == 0 {
            return invalid("no applications or websites to launch".to_string());
        }

        for (index, app) in self.applications.iter().enumerate() {
            if app.name.trim().is_empty() {
                return invalid(format!("application #{} has no name", index + 1));
            }

            if app.executable_path.trim().is_empty() {
                return invalid(format!("application '{}' has no executable path", app.name));
            }
        }

        for (index, site) in self.websites.iter().enumerate() {
            if site.name.trim().is_empty() {
                return invalid(format!("website #{} has no name", index + 1));
            }

            if !site.has_web_url() {
                return invalid(format!(
                    "website '{}' has an invalid url '{}'",
                    site.name, site.url
                ));
            }
        }

        Ok(())
    }

    fn default_true() -> bool {
        true
    }
}

impl Website {
    /// Returns `true` if the URL uses the `http` or `https` scheme.
    pub fn has_web_url(&self) -> bool {
        let url = self.url.trim();
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"));

        matches!(rest, Some(host) if !host.is_empty())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn deserialize_arguments<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Arguments::deserialize(deserializer)? {
        Arguments::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        Arguments::List(list) => list,
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

//! `envutils::path` is a module containing path utilities for the envcore project.

use std::path::PathBuf;

use crate::{EnvutilsError, EnvutilsResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The sub directory of the user's home where envcore configs and logs are stored.
pub const ENVCORE_HOME_DIR: &str = ".envcore";

/// The environment variable that overrides the envcore home directory.
pub const ENVCORE_HOME_ENV_VAR: &str = "ENVCORE_HOME";

/// The filename for the envcore configuration file.
pub const ENVCORE_CONFIG_FILENAME: &str = "envcore.yaml";

/// The sub directory where log files are stored.
pub const LOG_SUBDIR: &str = "log";

/// The prefix for the orchestrator's log files.
pub const LOG_PREFIX: &str = "envcore";

/// The suffix for log files
pub const LOG_SUFFIX: &str = "log";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolves the envcore home directory.
///
/// `ENVCORE_HOME` takes precedence; otherwise `~/.envcore` is used.
pub fn envcore_home() -> EnvutilsResult<PathBuf> {
    if let Some(home) = std::env::var_os(ENVCORE_HOME_ENV_VAR) {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    dirs::home_dir()
        .map(|home| home.join(ENVCORE_HOME_DIR))
        .ok_or(EnvutilsError::HomeDirNotFound)
}

/// Expands a leading `~` in a path to the user's home directory.
///
/// Paths without a leading `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let home = || dirs::home_dir();
    if path == "~" {
        if let Some(home) = home() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home() {
            return home.join(rest);
        }
    }

    PathBuf::from(path)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/usr/bin/env"), PathBuf::from("/usr/bin/env"));
        assert_eq!(expand_home("relative/bin"), PathBuf::from("relative/bin"));
        assert_eq!(expand_home("a~/b"), PathBuf::from("a~/b"));
    }

    #[test]
    fn test_expand_home_replaces_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~"), home);
            assert_eq!(expand_home("~/bin/tool"), home.join("bin/tool"));
        }
    }
}

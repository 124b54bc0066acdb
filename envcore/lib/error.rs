use std::{
    error::Error,
    fmt::{self, Display},
};
use thiserror::Error;

use crate::runtime::ContainerState;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of an envcore-related operation.
pub type EnvcoreResult<T> = Result<T, EnvcoreError>;

/// An error that occurred while orchestrating environment containers.
#[derive(pretty_error_debug::Debug, Error)]
pub enum EnvcoreError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),

    /// An error from the utilities crate.
    #[error("utils error: {0}")]
    Utils(#[from] envutils::EnvutilsError),

    /// An error that occurred while parsing a YAML configuration.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An error that occurred while serializing JSON output.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment or configuration file is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A container with the same id is already registered or queued.
    #[error("container '{0}' already exists")]
    DuplicateContainer(String),

    /// The registry already holds the maximum number of active containers.
    #[error("maximum concurrent containers ({0}) reached")]
    CapacityExceeded(usize),

    /// A launch run is already in progress on this scheduler.
    #[error("launch scheduler is already running")]
    AlreadyRunning,

    /// The requested environment does not exist in the configuration.
    #[error("environment '{0}' not found")]
    EnvironmentNotFound(String),

    /// An operation is not valid for the container's current state.
    #[error("cannot {operation} container '{container_id}' while it is {state}")]
    Lifecycle {
        /// The container the operation targeted.
        container_id: String,

        /// The operation that was attempted.
        operation: &'static str,

        /// The state the container was in.
        state: ContainerState,
    },

    /// A single application or website failed to launch.
    #[error("failed to launch '{item}': {reason}")]
    Spawn {
        /// The name of the item that failed.
        item: String,

        /// Why it failed.
        reason: String,
    },

    /// The platform has no primitive for the requested operation.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EnvcoreError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> EnvcoreError {
        EnvcoreError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// Creates a spawn failure for the named item.
    pub fn spawn(item: impl Into<String>, reason: impl Display) -> EnvcoreError {
        EnvcoreError::Spawn {
            item: item.into(),
            reason: reason.to_string(),
        }
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `EnvcoreResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> EnvcoreResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}

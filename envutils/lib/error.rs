//! `envutils::error` is a module containing error utilities for the envcore project.

use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of an envutils-related operation.
pub type EnvutilsResult<T> = Result<T, EnvutilsError>;

/// An error that occurred while performing a utility operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum EnvutilsError {
    /// An error that occurred when a process could not be signalled.
    #[error("failed to send {signal} to process {pid}: {source}")]
    Signal {
        /// The process that was targeted.
        pid: u32,

        /// The name of the signal.
        signal: &'static str,

        /// The underlying OS error.
        #[source]
        source: nix::Error,
    },

    /// An error that occurred when a PID does not fit the platform's pid type.
    #[error("invalid process id: {0}")]
    InvalidPid(u32),

    /// An error that occurred when the home directory could not be resolved.
    #[error("home directory could not be determined")]
    HomeDirNotFound,

    /// Custom error.
    #[error("Custom error: {0}")]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EnvutilsError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> EnvutilsError {
        EnvutilsError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// Returns `true` if the error means the target process no longer exists.
    pub fn is_no_such_process(&self) -> bool {
        matches!(
            self,
            EnvutilsError::Signal {
                source: nix::Error::ESRCH,
                ..
            }
        )
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

/// Creates an `Ok` `EnvutilsResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> EnvutilsResult<T> {
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

//! Visual isolation of containers.
//!
//! Isolation is best-effort: a backend that cannot create a boundary returns `None` and the
//! container simply runs without one.

mod pool;
mod workspace;

use async_trait::async_trait;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use pool::*;
pub use workspace::*;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A backend that gives each container its own visual boundary, such as a virtual desktop.
#[async_trait]
pub trait Isolation: Send + Sync {
    /// Creates or claims the boundary with the given pool index.
    async fn create_boundary(&self, name: &str, index: u32) -> Option<BoundaryHandle>;

    /// Brings the boundary to the foreground. Returns `false` if that was not possible.
    async fn focus(&self, handle: &BoundaryHandle) -> bool;

    /// Releases the boundary.
    async fn close(&self, handle: &BoundaryHandle);
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A boundary owned by one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct BoundaryHandle {
    /// The pool index of the boundary.
    #[getset(get_copy = "pub with_prefix")]
    index: u32,

    /// The display name of the boundary.
    #[getset(get = "pub with_prefix")]
    name: String,
}

/// An isolation backend that never creates boundaries.
#[derive(Debug, Default, Clone)]
pub struct NoIsolation;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BoundaryHandle {
    /// Creates a new boundary handle.
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Isolation for NoIsolation {
    async fn create_boundary(&self, _name: &str, _index: u32) -> Option<BoundaryHandle> {
        None
    }

    async fn focus(&self, _handle: &BoundaryHandle) -> bool {
        false
    }

    async fn close(&self, _handle: &BoundaryHandle) {}
}

use std::sync::Arc;

use crate::{
    isolation::{Isolation, NoIsolation},
    runtime::{CommandSpawner, ProcessSpawner, SystemUrlOpener, UrlOpener},
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The external collaborators a container launches its items through.
#[derive(Clone)]
pub struct Backends {
    /// Starts applications.
    pub spawner: Arc<dyn ProcessSpawner>,

    /// Opens websites.
    pub url_opener: Arc<dyn UrlOpener>,

    /// Creates isolation boundaries.
    pub isolation: Arc<dyn Isolation>,
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for Backends {
    fn default() -> Self {
        Self {
            spawner: Arc::new(CommandSpawner),
            url_opener: Arc::new(SystemUrlOpener),
            isolation: Arc::new(NoIsolation),
        }
    }
}

//! Process spawning, tracking and monitoring.

mod monitor;
mod spawn;
mod state;
mod tracker;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use monitor::*;
pub use spawn::*;
pub use state::*;
pub use tracker::*;

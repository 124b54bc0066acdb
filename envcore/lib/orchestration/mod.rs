//! The container registry and the launch scheduler.

mod job;
mod manager;
mod resources;
mod scheduler;
mod utils;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use job::*;
pub use manager::*;
pub use resources::*;
pub use scheduler::*;
pub use utils::*;

//! The environment container state machine.

mod backends;
mod info;
mod instance;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use backends::*;
pub use info::*;
pub use instance::*;

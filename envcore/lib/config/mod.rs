//! Configuration types and helpers.

mod defaults;
mod environment;
mod envcore;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod duration;

pub use defaults::*;
pub use environment::*;
pub use envcore::*;

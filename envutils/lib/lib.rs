//! `envutils` is a library containing general utilities for the envcore project.

#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod error;
pub mod path;
pub mod signal;
pub mod term;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use error::*;
pub use path::*;
pub use signal::*;

//! This module simply re-exports its submodules.

mod problems;
mod submissions;
mod users;

pub use problems::*;
pub use submissions::*;
pub use users::*;

//! Compute module - Transition rule, dispatch tiling, scheduling and the GPU backend.

mod rule;
mod scheduler;
mod workgroup;

pub mod gpu;

pub use rule::*;
pub use scheduler::*;
pub use workgroup::*;

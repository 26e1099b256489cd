//! Schema module - Grid configuration, seeding and control types.

mod config;
mod seed;
mod store;

pub use config::*;
pub use seed::*;
pub use store::*;

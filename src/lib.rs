//! Life GPU - Toroidal Game of Life simulated and rendered on the GPU.
//!
//! The cell state lives in two GPU storage buffers that swap roles every
//! step. A compute pass applies the transition rule from the current buffer
//! into the next one, and an instanced render pass draws one quad per live
//! cell, all in a single command buffer per frame.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Grid configuration, seed patterns and live controls
//! - `compute`: Transition rule, workgroup tiling, the frame scheduler and
//!   the wgpu backend
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Instant;
//!
//! use life_gpu::{
//!     compute::gpu::{DeviceContext, GpuSimulation},
//!     schema::{ControlStore, SimulationConfig},
//! };
//!
//! let mut controls = ControlStore::new(&SimulationConfig::default()).unwrap();
//! controls.set_playing(true);
//!
//! let context = pollster::block_on(DeviceContext::headless(512, 512)).unwrap();
//! let mut simulation = GpuSimulation::new(context, &controls).unwrap();
//!
//! // Call once per presented frame
//! simulation.frame(Instant::now(), &controls).unwrap();
//!
//! let cells = simulation.read_cells().unwrap();
//! println!("Live cells: {}", cells.iter().filter(|&&c| c == 1).count());
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{CpuPropagator, LifeState, Scheduler, TickAction, WorkgroupSize};
pub use schema::{ControlStore, Controls, Grid, Pattern, SimulationConfig};

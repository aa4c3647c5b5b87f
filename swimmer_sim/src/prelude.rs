// swimmer_sim/src/prelude.rs

// Re-export the entire swimmer_core prelude so the physics types are one import away.
pub use swimmer_core::prelude::*;

// Run-level types of this crate.
pub use crate::cli::Cli;
pub use crate::config::{ComputeConfig, LoggingConfig, OutputConfig, RunConfig, SimulationConfig};
pub use crate::engine::{run, run_with_config, RunError, RunSummary};
pub use crate::io::trajectory::{TrajectoryReader, TrajectoryWriter};

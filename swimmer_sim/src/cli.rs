// swimmer_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// Swimmer: potential-flow simulation of articulated rigid bodies.
///
/// Reads the starting configuration from a trajectory file and writes the
/// simulated trajectory and logs into the output directory.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Trajectory file holding the initial configuration.
    pub input: PathBuf,

    /// Directory receiving the output trajectory and logs.
    pub output_dir: PathBuf,
}

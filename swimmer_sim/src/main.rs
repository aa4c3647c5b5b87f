// swimmer_sim/src/main.rs

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use swimmer_sim::cli::Cli;
use swimmer_sim::engine;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match engine::run(&cli) {
        Ok(summary) => {
            info!(
                "Wrote {} frames to {}",
                summary.frames_written,
                summary.output.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            // Failures before the logger is installed go straight to stderr.
            if tracing::dispatcher::has_been_set() {
                error!("{err}");
            } else {
                eprintln!("swimmer: {err}");
            }
            ExitCode::FAILURE
        }
    }
}

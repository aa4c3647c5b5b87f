// swimmer_sim/src/engine.rs

//! The run driver: load the starting frame, integrate to `tf`, write frames.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use swimmer_core::prelude::{
    ComputeDevice, ConstrainedIntegrator, FreeSwimmingMode, ModelError, SnapshotError,
    SwimmerError, SystemState,
};

use crate::cli::Cli;
use crate::config::RunConfig;
use crate::io::trajectory::{TrajectoryReader, TrajectoryWriter};
use crate::logging::{self, LoggingError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error(transparent)]
    Swimmer(#[from] SwimmerError),

    #[error("trajectory output failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("cannot prepare output directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),
}

impl From<ModelError> for RunError {
    fn from(err: ModelError) -> Self {
        RunError::Swimmer(err.into())
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub frames_written: usize,
    pub final_step: u64,
    pub final_time: f64,
}

/// Entry point of the `swimmer` binary.
pub fn run(cli: &Cli) -> Result<RunSummary, RunError> {
    let log_dir = cli.output_dir.join("logs");
    fs::create_dir_all(&log_dir)?;

    let config = RunConfig::load()?;
    logging::init(&config.logging, config.logging.file.then_some(log_dir.as_path()))?;
    info!("Input: {}", cli.input.display());
    info!("Output directory: {}", cli.output_dir.display());
    debug!("{:?}", config);

    run_with_config(&cli.input, &cli.output_dir, &config)
}

/// Runs a simulation from `input` into `output_dir` with an already loaded configuration.
pub fn run_with_config(
    input: &Path,
    output_dir: &Path,
    config: &RunConfig,
) -> Result<RunSummary, RunError> {
    // --- 1. Initialize the system on a single worker ---
    let init_device = ComputeDevice::single_threaded()?;
    let mut reader = TrajectoryReader::open(input, config.simulation.input_frame)?;
    let mut system = SystemState::new(config.simulation.system_settings());
    system.initialize(&mut reader)?;
    system.update(&init_device)?;
    if config.simulation.free_swimming != FreeSwimmingMode::Off {
        system.solve_free_swimming(&init_device)?;
    }

    // --- 2. Build the worker pool for the main loop ---
    let device = match config.compute.threads {
        Some(threads) => ComputeDevice::new(threads)?,
        None => ComputeDevice::with_hardware_fraction(config.compute.thread_fraction)?,
    };
    info!("Using {} worker thread(s)", device.num_threads());

    // --- 3. Output ---
    let output = output_dir.join(&config.output.file_name);
    let mut writer = TrajectoryWriter::create(&output, config.output.double_precision)?;
    let integrator = ConstrainedIntegrator::new();

    let parameters = system.model()?.parameters.clone();
    let total = parameters.total_steps();
    let write_step = parameters.write_interval();
    info!(
        "Integrating {} steps, writing every {} steps to {}",
        total,
        write_step,
        output.display()
    );

    write_frame(&mut system, &device, &mut writer)?;
    let mut last_written = system.model()?.step;

    // --- 4. Main loop ---
    let mut last_percent = 0;
    for i in 1..=total {
        integrator.integrate(&mut system, &device)?;
        system.advance_time()?;

        let model = system.model()?;
        let (step, t) = (model.step, model.t);

        let percent = i * 100 / total;
        if percent > last_percent {
            info!("{:>3}% (step {}, t = {:.6})", percent, step, t);
            last_percent = percent;
        }

        if step % write_step == 0 || t >= parameters.tf {
            write_frame(&mut system, &device, &mut writer)?;
            last_written = step;
        }
    }

    let model = system.model()?;
    let (final_step, final_time) = (model.step, model.t);
    if last_written != final_step {
        write_frame(&mut system, &device, &mut writer)?;
    }

    info!(
        "Finished at step {} (t = {}); {} frames in {}",
        final_step,
        final_time,
        writer.frames_written(),
        output.display()
    );
    Ok(RunSummary {
        output,
        frames_written: writer.frames_written(),
        final_step,
        final_time,
    })
}

/// Normalizes the quaternions, refreshes the derived state and appends a frame.
fn write_frame(
    system: &mut SystemState,
    device: &ComputeDevice,
    writer: &mut TrajectoryWriter,
) -> Result<(), RunError> {
    system.normalize_quaternions()?;
    system.update(device)?;
    let snapshot = system.snapshot()?;
    writer.write_frame(&snapshot)?;
    debug!("Wrote frame {} (step {})", writer.frames_written() - 1, snapshot.step);
    Ok(())
}

// swimmer_core/src/utils/device.rs

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

/// A bounded worker pool that tensor work is dispatched onto.
///
/// The pool only accelerates work inside a single `update`; every call through
/// [`ComputeDevice::install`] returns after all of its parallel work has finished.
pub struct ComputeDevice {
    pool: ThreadPool,
}

impl ComputeDevice {
    /// Creates a pool with exactly `threads` workers (at least one).
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("swimmer-worker-{i}"))
            .build()?;
        debug!("Created compute pool with {} worker(s)", threads);
        Ok(Self { pool })
    }

    /// A one-worker pool, used while the system is initialized.
    pub fn single_threaded() -> Result<Self, ThreadPoolBuildError> {
        Self::new(1)
    }

    /// Sizes the pool as a fraction of the available hardware concurrency.
    pub fn with_hardware_fraction(fraction: f64) -> Result<Self, ThreadPoolBuildError> {
        Self::new(threads_for_fraction(available_cores(), fraction))
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` inside the pool; rayon work spawned by `op` stays on these workers.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl std::fmt::Debug for ComputeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeDevice")
            .field("threads", &self.num_threads())
            .finish()
    }
}

pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// `max(1, ceil(cores · fraction))`
pub fn threads_for_fraction(cores: usize, fraction: f64) -> usize {
    let fraction = fraction.clamp(0.0, 1.0);
    ((cores as f64 * fraction).ceil() as usize).max(1)
}

// swimmer_core/src/abstractions.rs

use dyn_clone::DynClone;
use std::fmt::Debug;

use crate::error::SwimmerError;
use crate::kinematics::ArticulationSample;
use crate::snapshot::Snapshot;

// --- KINEMATICS MODEL TRAIT ---
// Prescribed internal motion of the satellites. `ρ = f(t)`
/// Produces the articulation length of a satellite and its time derivatives.
/// Implementations are pure functions of time and their own fixed parameters.
pub trait KinematicsModel: DynClone + Debug + Send + Sync {
    /// Samples the articulation of a satellite.
    ///
    /// # Arguments
    /// * `t`: Dimensional simulation time (`τ · t`).
    /// * `ordinal`: Index of the satellite among the satellites of its body.
    ///
    /// # Returns
    /// Length, rate and acceleration along the satellite's articulation direction.
    fn sample(&self, t: f64, ordinal: usize) -> ArticulationSample;
}

dyn_clone::clone_trait_object!(KinematicsModel);

// --- SNAPSHOT SOURCE TRAIT ---
// This is the contract for anything that can hand the system its first configuration.
// The trajectory reader in the simulation crate implements it, as do test fixtures.
pub trait SnapshotSource {
    /// Loads the configuration frame the system is initialized from.
    fn load_snapshot(&mut self) -> Result<Snapshot, SwimmerError>;
}

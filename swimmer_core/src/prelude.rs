// swimmer_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::abstractions::{KinematicsModel, SnapshotSource};
pub use crate::error::{ModelError, NumericalError, SnapshotError, SwimmerError};
pub use crate::types::{Matrix, State, DOF, LINEAR_DOF, QUATERNION_DOF, QUATERNION_OFFSET};

// --- Core Data Structures ---
pub use crate::layout::{ParticleLayout, ParticleRole, LOCATER_TYPE_ID};
pub use crate::parameters::SystemParameters;
pub use crate::snapshot::Snapshot;
pub use crate::system::{SystemModel, SystemSettings, SystemState};

// --- Physics ---
pub use crate::constraints::ConstraintSystem;
pub use crate::free_swimming::{force_free_velocities, FreeSwimmingMode};
pub use crate::hydrodynamics::{HydrodynamicEngine, HydrodynamicTensors};
pub use crate::integrator::{udwadia_kalaba, ConstrainedIntegrator};
pub use crate::kinematics::{ArticulationSample, CollinearSwimmer, RigidKinematics};
pub use crate::pipeline::{compute_derived, DerivedTensors, ParticleKinematics};
pub use crate::rbm::RigidBodyMotion;

// --- Utilities ---
pub use crate::utils::device::ComputeDevice;
pub use crate::utils::integrators::{Integrator, RK4};

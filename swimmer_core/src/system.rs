// swimmer_core/src/system.rs

use nalgebra::{Vector3, Vector4};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::abstractions::{KinematicsModel, SnapshotSource};
use crate::error::{ModelError, SwimmerError};
use crate::free_swimming::{force_free_velocities, FreeSwimmingMode};
use crate::hydrodynamics::HydrodynamicEngine;
use crate::integrator::mirror_images;
use crate::kinematics::{CollinearSwimmer, RigidKinematics};
use crate::layout::ParticleLayout;
use crate::parameters::{positive, SystemParameters};
use crate::pipeline::{compute_derived, DerivedTensors};
use crate::snapshot::Snapshot;
use crate::types::{State, DOF, LINEAR_DOF, QUATERNION_DOF, QUATERNION_OFFSET};
use crate::utils::algebra::{lab_to_body, quaternion_from_wxyz};
use crate::utils::device::ComputeDevice;

/// Run-level switches that do not come from the input snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemSettings {
    /// Always-on physical invariant checks (mass symmetry, quaternion norms).
    pub validation_mode: bool,
    /// Largest accepted `|‖θ‖ − 1|` in validation mode.
    pub quaternion_tolerance: f64,
    pub free_swimming: FreeSwimmingMode,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            validation_mode: false,
            quaternion_tolerance: 1e-6,
            free_swimming: FreeSwimmingMode::Initial,
        }
    }
}

/// Everything fixed at initialization plus the raw kinematic vectors the derived
/// tensors are computed from.
#[derive(Debug, Clone)]
pub struct SystemModel {
    pub parameters: SystemParameters,
    pub layout: ParticleLayout,
    pub kinematics: Box<dyn KinematicsModel>,
    /// Swimmer parameters as loaded, kept for output.
    pub swimmer: Option<CollinearSwimmer>,
    pub hydro: HydrodynamicEngine,
    /// Body-fixed articulation direction of each particle, zero for locaters.
    pub body_directions: Vec<Vector3<f64>>,
    pub step: u64,
    /// Dimensionless time.
    pub t: f64,
    pub body_positions: State,
    pub body_velocities: State,
    pub body_accelerations: State,
}

impl SystemModel {
    /// Time seen by the kinematics, `τ · t`.
    pub fn dimensional_time(&self) -> f64 {
        self.parameters.tau * self.t
    }

    pub fn num_bodies(&self) -> usize {
        self.layout.num_bodies()
    }

    pub fn body_quaternion(&self, body: usize) -> Vector4<f64> {
        self.body_positions
            .fixed_rows::<QUATERNION_DOF>(DOF * body + QUATERNION_OFFSET)
            .into_owned()
    }
}

/// The simulation state. Built in two phases: [`SystemState::new`] fixes the run
/// settings, [`SystemState::initialize`] loads the first configuration.
#[derive(Debug)]
pub struct SystemState {
    settings: SystemSettings,
    model: Option<SystemModel>,
    derived: Option<DerivedTensors>,
}

impl SystemState {
    pub fn new(settings: SystemSettings) -> Self {
        Self {
            settings,
            model: None,
            derived: None,
        }
    }

    pub fn settings(&self) -> &SystemSettings {
        &self.settings
    }

    pub fn model(&self) -> Result<&SystemModel, ModelError> {
        self.model.as_ref().ok_or(ModelError::Uninitialized)
    }

    pub fn model_mut(&mut self) -> Result<&mut SystemModel, ModelError> {
        self.model.as_mut().ok_or(ModelError::Uninitialized)
    }

    /// Tensors from the last [`SystemState::update`].
    pub fn derived(&self) -> Result<&DerivedTensors, ModelError> {
        self.derived.as_ref().ok_or(ModelError::Uninitialized)
    }

    /// Loads the starting frame and derives layout, bodies and body-fixed directions.
    pub fn initialize(&mut self, source: &mut dyn SnapshotSource) -> Result<(), SwimmerError> {
        positive("quaternion tolerance", self.settings.quaternion_tolerance)?;

        let snapshot = source.load_snapshot()?;
        snapshot.check_lengths()?;
        snapshot.parameters.validate()?;
        let parameters = snapshot.parameters.clone();

        let layout = ParticleLayout::from_type_ids(&snapshot.type_ids, parameters.image_system)?;
        if layout.num_bodies() == 0 {
            return Err(ModelError::NoBodies.into());
        }

        let has_satellites = (0..layout.num_particles()).any(|p| !layout.is_locater(p));
        let kinematics: Box<dyn KinematicsModel> = match &snapshot.swimmer {
            Some(swimmer) => {
                swimmer.validate()?;
                Box::new(swimmer.clone())
            }
            None if has_satellites => return Err(ModelError::MissingKinematics.into()),
            None => Box::new(RigidKinematics { separation: 0.0 }),
        };

        let (body_positions, body_velocities, body_accelerations) = bodies_from(&snapshot, &layout);
        let body_directions = body_directions_from(&snapshot, &layout, &body_positions);
        let hydro = HydrodynamicEngine::new(
            layout.num_particles(),
            parameters.fluid_density,
            parameters.particle_density,
        );

        info!(
            "Initialized {} particles in {} bodies ({} real, image system {})",
            layout.num_particles(),
            layout.num_bodies(),
            layout.num_real_bodies(),
            layout.image_system()
        );
        info!(
            "t = {}, dt = {}, tf = {}, tau = {}, fluid density = {}, particle density = {}",
            parameters.t,
            parameters.dt,
            parameters.tf,
            parameters.tau,
            parameters.fluid_density,
            parameters.particle_density
        );
        if let Some(swimmer) = &snapshot.swimmer {
            info!(
                "Swimmer: U0 = {}, omega = {}, phase shift = {}, R = {}",
                swimmer.amplitude, swimmer.frequency, swimmer.phase_shift, swimmer.mean_separation
            );
        }

        self.model = Some(SystemModel {
            t: parameters.t,
            step: snapshot.step,
            parameters,
            layout,
            kinematics,
            swimmer: snapshot.swimmer.clone(),
            hydro,
            body_directions,
            body_positions,
            body_velocities,
            body_accelerations,
        });
        self.derived = None;
        Ok(())
    }

    /// Recomputes every derived tensor for the current time and body state.
    pub fn update(&mut self, device: &ComputeDevice) -> Result<(), SwimmerError> {
        let derived = compute_derived(self, device)?;
        self.derived = Some(derived);
        Ok(())
    }

    /// Sets time and body state; image bodies are overwritten by mirrors of the real ones.
    pub fn set_body_state(
        &mut self,
        t: f64,
        positions: &State,
        velocities: &State,
    ) -> Result<(), SwimmerError> {
        let model = self.model_mut()?;
        check_length("body positions", positions, model.body_positions.len())?;
        check_length("body velocities", velocities, model.body_velocities.len())?;

        model.t = t;
        model.body_positions.copy_from(positions);
        model.body_velocities.copy_from(velocities);
        if model.layout.image_system() {
            let m = model.num_bodies();
            mirror_images(&mut model.body_positions, m);
            mirror_images(&mut model.body_velocities, m);
        }
        Ok(())
    }

    /// Stores body accelerations and refreshes the particle accelerations they drive.
    pub fn set_body_accelerations(&mut self, accelerations: &State) -> Result<(), SwimmerError> {
        let model = self.model.as_mut().ok_or(ModelError::Uninitialized)?;
        check_length("body accelerations", accelerations, model.body_accelerations.len())?;
        model.body_accelerations.copy_from(accelerations);
        if let Some(derived) = self.derived.as_mut() {
            derived.refresh_particle_accelerations(accelerations);
        }
        Ok(())
    }

    /// Replaces the body linear velocities by the force-free solution and refreshes
    /// the derived tensors.
    pub fn solve_free_swimming(&mut self, device: &ComputeDevice) -> Result<(), SwimmerError> {
        if self.derived.is_none() {
            self.update(device)?;
        }
        let derived = self.derived()?;
        let model = self.model()?;
        let velocities = force_free_velocities(
            &derived.hydro.m3,
            &derived.hydro.m2,
            &derived.articulation.velocities,
            &model.body_velocities,
        )?;

        let model = self.model_mut()?;
        model.body_velocities = velocities;
        if model.layout.image_system() {
            let m = model.num_bodies();
            mirror_images(&mut model.body_velocities, m);
        }
        self.update(device)
    }

    /// Rescales every body quaternion to unit norm. Only called at output boundaries.
    pub fn normalize_quaternions(&mut self) -> Result<(), ModelError> {
        let model = self.model_mut()?;
        for body in 0..model.num_bodies() {
            let q = DOF * body + QUATERNION_OFFSET;
            let mut theta = model.body_positions.fixed_rows_mut::<QUATERNION_DOF>(q);
            let norm = theta.norm();
            if norm > 0.0 {
                theta /= norm;
            } else {
                warn!("Body {} has a zero quaternion; left unnormalized", body);
            }
        }
        Ok(())
    }

    /// Advances the clock by one step of `dt`.
    pub fn advance_time(&mut self) -> Result<(), ModelError> {
        let model = self.model_mut()?;
        model.t += model.parameters.dt;
        model.step += 1;
        Ok(())
    }

    /// The current configuration as a frame ready to be persisted.
    pub fn snapshot(&self) -> Result<Snapshot, ModelError> {
        let model = self.model()?;
        let derived = self.derived()?;
        let n = model.layout.num_particles();

        let positions = (0..n)
            .map(|p| derived.particles.positions.fixed_rows::<3>(LINEAR_DOF * p).into_owned())
            .collect();
        let velocities = (0..n)
            .map(|p| derived.particles.velocities.fixed_rows::<3>(DOF * p).into_owned())
            .collect();
        let accelerations = (0..n)
            .map(|p| derived.particles.accelerations.fixed_rows::<3>(DOF * p).into_owned())
            .collect();
        let orientations = (0..n)
            .map(|p| model.body_quaternion(model.layout.body_of(p)))
            .collect();

        let mut parameters = model.parameters.clone();
        parameters.t = model.t;

        Ok(Snapshot {
            step: model.step,
            parameters,
            swimmer: model.swimmer.clone(),
            type_ids: model.layout.type_ids().to_vec(),
            positions,
            velocities,
            accelerations,
            orientations,
        })
    }
}

fn check_length(name: &'static str, v: &State, expected: usize) -> Result<(), ModelError> {
    if v.len() == expected {
        Ok(())
    } else {
        Err(ModelError::LengthMismatch {
            name,
            expected,
            found: v.len(),
        })
    }
}

/// Body coordinates from the locater of each body. Quaternion rates start at zero.
fn bodies_from(snapshot: &Snapshot, layout: &ParticleLayout) -> (State, State, State) {
    let m = layout.num_bodies();
    let mut positions = State::zeros(DOF * m);
    let mut velocities = State::zeros(DOF * m);
    let mut accelerations = State::zeros(DOF * m);

    for body in 0..m {
        let loc = layout.locater_of_body(body);
        let b7 = DOF * body;
        positions
            .fixed_rows_mut::<3>(b7)
            .copy_from(&snapshot.positions[loc]);
        velocities
            .fixed_rows_mut::<3>(b7)
            .copy_from(&snapshot.velocities[loc]);
        accelerations
            .fixed_rows_mut::<3>(b7)
            .copy_from(&snapshot.accelerations[loc]);

        let theta = snapshot.orientations[loc];
        let theta = if theta.norm() > 0.0 {
            theta.normalize()
        } else {
            warn!("Body {} has no orientation; using the identity", body);
            Vector4::new(1.0, 0.0, 0.0, 0.0)
        };
        positions
            .fixed_rows_mut::<QUATERNION_DOF>(b7 + QUATERNION_OFFSET)
            .copy_from(&theta);
    }
    (positions, velocities, accelerations)
}

/// Body-fixed unit direction of each satellite, `vec(θ₀ ⊗ n₀ ⊗ θ₀*)` with `n₀` the
/// normalized locater-to-satellite offset of the first frame.
fn body_directions_from(
    snapshot: &Snapshot,
    layout: &ParticleLayout,
    body_positions: &State,
) -> Vec<Vector3<f64>> {
    (0..layout.num_particles())
        .map(|p| {
            if layout.is_locater(p) {
                return Vector3::zeros();
            }
            let body = layout.body_of(p);
            let offset = snapshot.positions[p] - snapshot.positions[layout.locater_of_body(body)];
            let Some(n0) = offset.try_normalize(f64::EPSILON) else {
                warn!("Satellite {} coincides with its locater; no articulation direction", p);
                return Vector3::zeros();
            };
            let b7 = DOF * body;
            let theta = quaternion_from_wxyz(&body_positions.as_slice()[b7 + QUATERNION_OFFSET..b7 + DOF]);
            let d = lab_to_body(&theta, &n0);
            debug!("Particle {} body-fixed direction {:?}", p, d.as_slice());
            d
        })
        .collect()
}

// swimmer_core/src/pipeline.rs

//! The dependency-ordered update: kinematics → RBM → constraints → particle
//! kinematics → hydrodynamics. Every call recomputes the whole bundle from the raw
//! body state; nothing is carried over between calls.

use tracing::trace;

use crate::constraints::ConstraintSystem;
use crate::error::{NumericalError, SwimmerError};
use crate::hydrodynamics::HydrodynamicTensors;
use crate::kinematics::{evaluate_articulation, ArticulationState};
use crate::rbm::RigidBodyMotion;
use crate::system::{SystemModel, SystemState};
use crate::types::{State, DOF, LINEAR_DOF};
use crate::utils::device::ComputeDevice;
use crate::utils::tensor::{contract_jik_jk, outer};

/// Lab-frame kinematics of every particle.
#[derive(Debug, Clone)]
pub struct ParticleKinematics {
    /// `X_i + r_α` (3N)
    pub positions: State,
    /// `Σᵀ ξ̇ + V_art` (7N)
    pub velocities: State,
    /// `Σᵀ ξ̈ + ∇Σ_jik ξ̇_j ξ̇_k + A_art` (7N)
    pub accelerations: State,
    /// The velocity-quadratic part `∇Σ_jik ξ̇_j ξ̇_k` (7N).
    pub convective: State,
}

/// Everything derived from one body state.
#[derive(Debug, Clone)]
pub struct DerivedTensors {
    pub articulation: ArticulationState,
    pub rbm: RigidBodyMotion,
    pub constraints: ConstraintSystem,
    pub particles: ParticleKinematics,
    pub hydro: HydrodynamicTensors,
}

impl DerivedTensors {
    /// Recomputes particle accelerations after the body accelerations were solved for.
    pub fn refresh_particle_accelerations(&mut self, body_accelerations: &State) {
        self.particles.accelerations = self.rbm.sigma.tr_mul(body_accelerations)
            + &self.particles.convective
            + &self.articulation.accelerations;
    }
}

/// Fails when any body quaternion norm is further than `tolerance` from one.
pub fn check_quaternions(model: &SystemModel, tolerance: f64) -> Result<(), NumericalError> {
    for body in 0..model.num_bodies() {
        let norm = model.body_quaternion(body).norm();
        if (norm - 1.0).abs() > tolerance {
            return Err(NumericalError::QuaternionDrift {
                body,
                norm,
                tolerance,
            });
        }
    }
    Ok(())
}

fn particle_kinematics(
    model: &SystemModel,
    rbm: &RigidBodyMotion,
    articulation: &ArticulationState,
) -> ParticleKinematics {
    let layout = &model.layout;
    let mut positions = articulation.positions.clone();
    for p in 0..layout.num_particles() {
        let b7 = DOF * layout.body_of(p);
        let mut x = positions.fixed_rows_mut::<3>(LINEAR_DOF * p);
        x += model.body_positions.fixed_rows::<3>(b7);
    }

    let xi_dot = &model.body_velocities;
    let convective = contract_jik_jk(&rbm.grad_sigma, &outer(xi_dot, xi_dot));
    let velocities = rbm.particle_velocities(xi_dot) + &articulation.velocities;
    let accelerations = rbm.sigma.tr_mul(&model.body_accelerations)
        + &convective
        + &articulation.accelerations;

    ParticleKinematics {
        positions,
        velocities,
        accelerations,
        convective,
    }
}

fn derive(model: &SystemModel) -> Result<DerivedTensors, SwimmerError> {
    let t = model.dimensional_time();
    let articulation = evaluate_articulation(
        model.kinematics.as_ref(),
        &model.layout,
        &model.body_directions,
        &model.body_positions,
        t,
    );
    let rbm = RigidBodyMotion::build(
        &model.layout,
        &model.body_positions,
        &model.body_directions,
        &articulation,
    );
    let constraints = ConstraintSystem::build(
        &model.body_positions,
        &model.body_velocities,
        model.layout.num_constraints(),
    );
    let particles = particle_kinematics(model, &rbm, &articulation);
    let hydro = model.hydro.evaluate(
        &particles.positions,
        &rbm,
        &model.body_velocities,
        &model.body_accelerations,
        &articulation,
    )?;

    Ok(DerivedTensors {
        articulation,
        rbm,
        constraints,
        particles,
        hydro,
    })
}

/// Computes the derived bundle for the state's current time and body coordinates,
/// running all tensor work on `device`.
pub fn compute_derived(
    state: &SystemState,
    device: &ComputeDevice,
) -> Result<DerivedTensors, SwimmerError> {
    let model = state.model()?;
    let settings = state.settings();
    if settings.validation_mode {
        check_quaternions(model, settings.quaternion_tolerance)?;
    }
    trace!("Deriving tensors at t = {}", model.t);
    device.install(|| derive(model))
}

// swimmer_core/src/kinematics.rs

//! Prescribed articulation of satellite particles relative to their body locater.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::abstractions::KinematicsModel;
use crate::error::ModelError;
use crate::layout::{ParticleLayout, ParticleRole};
use crate::parameters::{non_negative, positive};
use crate::types::{State, DOF, LINEAR_DOF, QUATERNION_OFFSET};
use crate::utils::algebra::{body_to_lab, quaternion_from_wxyz};

/// Articulation length of one satellite and its first two time derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArticulationSample {
    pub length: f64,
    pub rate: f64,
    pub acceleration: f64,
}

// --- Collinear Swimmer ---
/// Two satellites oscillating along a common axis on either side of the locater.
///
/// Even satellite ordinals lead with `R + (U0/ω) sin(ωt)`, odd ordinals trail with
/// `R − (U0/ω) sin(ωt + φ)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollinearSwimmer {
    /// Velocity amplitude `U0`.
    pub amplitude: f64,
    /// Angular frequency `ω`.
    pub frequency: f64,
    /// Phase shift `φ` of the trailing satellite.
    pub phase_shift: f64,
    /// Mean locater-satellite separation `R`.
    pub mean_separation: f64,
}

impl CollinearSwimmer {
    pub fn validate(&self) -> Result<(), ModelError> {
        positive("swimmer frequency", self.frequency)?;
        non_negative("swimmer mean separation", self.mean_separation)?;
        Ok(())
    }
}

impl KinematicsModel for CollinearSwimmer {
    fn sample(&self, t: f64, ordinal: usize) -> ArticulationSample {
        let u0 = self.amplitude;
        let omega = self.frequency;
        let r = self.mean_separation;

        if ordinal % 2 == 0 {
            let arg = omega * t;
            ArticulationSample {
                length: r + (u0 / omega) * arg.sin(),
                rate: u0 * arg.cos(),
                acceleration: -u0 * omega * arg.sin(),
            }
        } else {
            let arg = omega * t + self.phase_shift;
            ArticulationSample {
                length: r - (u0 / omega) * arg.sin(),
                rate: -u0 * arg.cos(),
                acceleration: u0 * omega * arg.sin(),
            }
        }
    }
}

/// A rigid configuration: every satellite keeps its mean separation.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidKinematics {
    pub separation: f64,
}

impl KinematicsModel for RigidKinematics {
    fn sample(&self, _t: f64, _ordinal: usize) -> ArticulationSample {
        ArticulationSample {
            length: self.separation,
            ..Default::default()
        }
    }
}

// --- Articulation State ---
/// Articulation of every particle at one instant, in lab-frame components.
#[derive(Debug, Clone)]
pub struct ArticulationState {
    /// Offsets `r` from the locater (3N).
    pub positions: State,
    /// Articulation velocities in the linear slots of each 7-block (7N).
    pub velocities: State,
    /// Articulation accelerations in the linear slots of each 7-block (7N).
    pub accelerations: State,
    /// Unit lab-frame articulation directions (3N); zero for locaters.
    pub orientations: State,
    /// Current articulation length of each particle; zero for locaters.
    pub lengths: Vec<f64>,
}

/// Samples `model` for every satellite at dimensional time `t` and orients the
/// result with each body's current quaternion.
///
/// # Arguments
/// * `body_directions`: body-fixed unit direction of each particle (zero for locaters).
/// * `body_positions`: body generalized coordinates (7M).
pub fn evaluate_articulation(
    model: &dyn KinematicsModel,
    layout: &ParticleLayout,
    body_directions: &[Vector3<f64>],
    body_positions: &State,
    t: f64,
) -> ArticulationState {
    let n = layout.num_particles();
    let mut state = ArticulationState {
        positions: State::zeros(LINEAR_DOF * n),
        velocities: State::zeros(DOF * n),
        accelerations: State::zeros(DOF * n),
        orientations: State::zeros(LINEAR_DOF * n),
        lengths: vec![0.0; n],
    };

    for p in 0..n {
        let ordinal = match layout.role(p) {
            ParticleRole::Locater => continue,
            ParticleRole::Satellite { ordinal } => ordinal,
        };

        let b7 = DOF * layout.body_of(p);
        let theta = quaternion_from_wxyz(
            &body_positions.as_slice()[b7 + QUATERNION_OFFSET..b7 + DOF],
        );
        let direction = body_to_lab(&theta, &body_directions[p]);
        let sample = model.sample(t, ordinal);

        let p3 = LINEAR_DOF * p;
        let p7 = DOF * p;
        state.orientations.fixed_rows_mut::<3>(p3).copy_from(&direction);
        state
            .positions
            .fixed_rows_mut::<3>(p3)
            .copy_from(&(direction * sample.length));
        state
            .velocities
            .fixed_rows_mut::<3>(p7)
            .copy_from(&(direction * sample.rate));
        state
            .accelerations
            .fixed_rows_mut::<3>(p7)
            .copy_from(&(direction * sample.acceleration));
        state.lengths[p] = sample.length;
    }

    state
}

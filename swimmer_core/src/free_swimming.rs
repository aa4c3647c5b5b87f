// swimmer_core/src/free_swimming.rs

//! Force-free velocity solve for self-propelled bodies.
//!
//! The generalized momentum of the bodies is `P_total = M3 ξ̇ + M2 V_art`. Only its
//! translational part is balanced: the body linear velocities `U_L` solve
//!
//! ```text
//! M3_LL U_L = −(P_L + M3_LQ U_Q)
//! ```
//!
//! with `U_Q` the current quaternion rates, which are left untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::NumericalError;
use crate::types::{Matrix, State, DOF, LINEAR_DOF, QUATERNION_DOF, QUATERNION_OFFSET};

/// When the force-free solve runs during a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeSwimmingMode {
    /// Body velocities come from the input snapshot and evolve only by integration.
    Off,
    /// Solve once, after initialization.
    #[default]
    Initial,
    /// Solve again inside every acceleration evaluation.
    EveryStage,
}

fn linear_indices(num_bodies: usize) -> Vec<usize> {
    (0..num_bodies)
        .flat_map(|b| (0..LINEAR_DOF).map(move |i| DOF * b + i))
        .collect()
}

fn quaternion_indices(num_bodies: usize) -> Vec<usize> {
    (0..num_bodies)
        .flat_map(|b| (0..QUATERNION_DOF).map(move |i| DOF * b + QUATERNION_OFFSET + i))
        .collect()
}

/// Returns `body_velocities` with the linear entries replaced by the force-free solution.
///
/// # Arguments
/// * `m3`: body mass `Σ M Σᵀ` (7M × 7M).
/// * `m2`: `Σ M` (7M × 7N).
/// * `articulation_velocities`: prescribed particle velocities `V_art` (7N).
/// * `body_velocities`: current body velocities ξ̇ (7M).
pub fn force_free_velocities(
    m3: &Matrix,
    m2: &Matrix,
    articulation_velocities: &State,
    body_velocities: &State,
) -> Result<State, NumericalError> {
    let num_bodies = body_velocities.len() / DOF;
    let lin = linear_indices(num_bodies);
    let quat = quaternion_indices(num_bodies);

    let momentum = m2 * articulation_velocities;
    let m_ll = m3.select_rows(&lin).select_columns(&lin);
    let m_lq = m3.select_rows(&lin).select_columns(&quat);
    let u_q = body_velocities.select_rows(&quat);

    let rhs = -(momentum.select_rows(&lin) + m_lq * u_q);
    let u_l = m_ll
        .full_piv_lu()
        .solve(&rhs)
        .ok_or(NumericalError::SingularMomentumSystem)?;

    let mut velocities = body_velocities.clone();
    for (&row, &u) in lin.iter().zip(u_l.iter()) {
        velocities[row] = u;
    }
    debug!(
        "Force-free solve: |U_L| = {:.3e} for {} bodies",
        u_l.norm(),
        num_bodies
    );
    Ok(velocities)
}

/// Translational part of `M3 ξ̇ + M2 V_art`, zero after [`force_free_velocities`].
pub fn linear_momentum(
    m3: &Matrix,
    m2: &Matrix,
    articulation_velocities: &State,
    body_velocities: &State,
) -> State {
    let total = m3 * body_velocities + m2 * articulation_velocities;
    total.select_rows(&linear_indices(body_velocities.len() / DOF))
}

// swimmer_core/src/integrator.rs

//! RK4 over the body state with Udwadia–Kalaba constrained accelerations.
//!
//! Every stage sets the body state, refreshes the derived tensors and solves
//!
//! ```text
//! M_eff ẍ = Q + K (b − A M_eff⁻¹ Q),   K = M_eff^½ (A M_eff^-½)⁺
//! ```
//!
//! for the real bodies. Image bodies, when present, mirror the real ones about `z = 0`.

use tracing::trace;

use crate::constraints::ConstraintSystem;
use crate::error::{NumericalError, SwimmerError};
use crate::free_swimming::FreeSwimmingMode;
use crate::system::SystemState;
use crate::types::{Matrix, State, DOF};
use crate::utils::device::ComputeDevice;
use crate::utils::integrators::{Integrator, RK4};

/// Relative tolerance of the symmetry check on `M_eff` in validation mode.
pub const SYMMETRY_TOLERANCE: f64 = 1e-10;
/// Singular values below this are dropped by the pseudo-inverse.
pub const PSEUDO_INVERSE_EPSILON: f64 = 1e-12;
/// Zero lets the eigen-solver iterate until convergence.
const MAX_EIGEN_ITERATIONS: usize = 0;

// --- Image System ---

/// Mirrors a single 7-block about `z = 0`: `(x, y, −z)` and `(w, −x, −y, z)`.
pub fn mirror_block(block: &mut [f64]) {
    block[2] = -block[2];
    block[4] = -block[4];
    block[5] = -block[5];
}

/// Overwrites the second half of the bodies in `state` with mirrors of the first half.
///
/// The mirror plane is `z = 0`: images have `z` negated and quaternion `(w, −x, −y, z)`.
pub fn mirror_images(state: &mut State, num_bodies: usize) {
    let half = num_bodies / 2;
    for body in 0..half {
        let mut block = state.fixed_rows::<DOF>(DOF * body).into_owned();
        mirror_block(block.as_mut_slice());
        state
            .fixed_rows_mut::<DOF>(DOF * (body + half))
            .copy_from(&block);
    }
}

// --- Udwadia–Kalaba ---

/// Constrained accelerations for mass `m_eff`, unconstrained force `q` and the
/// constraints `A ẍ = b`.
///
/// Fails when the eigen-decomposition of `m_eff` fails or finds a non-positive
/// eigenvalue; `validation_mode` also rejects an asymmetric `m_eff`.
pub fn udwadia_kalaba(
    m_eff: &Matrix,
    q: &State,
    constraints: &ConstraintSystem,
    validation_mode: bool,
) -> Result<State, NumericalError> {
    if validation_mode {
        let max_asymmetry = (m_eff - m_eff.transpose()).amax();
        if max_asymmetry > SYMMETRY_TOLERANCE * m_eff.amax().max(1.0) {
            return Err(NumericalError::AsymmetricMass { max_asymmetry });
        }
    }

    let eigen = m_eff
        .clone()
        .try_symmetric_eigen(f64::EPSILON, MAX_EIGEN_ITERATIONS)
        .ok_or(NumericalError::EigenDecomposition)?;
    let smallest = eigen.eigenvalues.min();
    if smallest <= 0.0 || smallest.is_nan() {
        return Err(NumericalError::NonPositiveEigenvalue {
            eigenvalue: smallest,
        });
    }

    let v = &eigen.eigenvectors;
    let sqrt = Matrix::from_diagonal(&eigen.eigenvalues.map(f64::sqrt));
    let inv_sqrt = Matrix::from_diagonal(&eigen.eigenvalues.map(|l| 1.0 / l.sqrt()));
    let m_half = v * sqrt * v.transpose();
    let m_neg_half = v * inv_sqrt * v.transpose();
    let m_inv = &m_neg_half * &m_neg_half;

    let scaled = &constraints.a * &m_neg_half;
    let pinv = scaled
        .pseudo_inverse(PSEUDO_INVERSE_EPSILON)
        .map_err(NumericalError::PseudoInverse)?;
    let k = m_half * pinv;

    let free = &m_inv * q;
    let q_con = k * (&constraints.b - &constraints.a * &free);
    Ok(m_inv * (q + q_con))
}

// --- Constrained Integrator ---

/// Drives one explicit step of the body state with constrained stage accelerations.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstrainedIntegrator<I = RK4> {
    scheme: I,
}

impl ConstrainedIntegrator<RK4> {
    pub fn new() -> Self {
        Self { scheme: RK4 }
    }
}

impl<I: Integrator<f64>> ConstrainedIntegrator<I> {
    /// Sets time and body state, refreshes the derived tensors and returns the
    /// constrained body accelerations (7M), which are also stored on `system`.
    ///
    /// # Arguments
    /// * `t`: dimensionless time of the evaluation.
    pub fn acceleration_update(
        &self,
        system: &mut SystemState,
        device: &ComputeDevice,
        t: f64,
        positions: &State,
        velocities: &State,
    ) -> Result<State, SwimmerError> {
        system.set_body_state(t, positions, velocities)?;
        system.update(device)?;
        if system.settings().free_swimming == FreeSwimmingMode::EveryStage {
            system.solve_free_swimming(device)?;
        }

        let validation_mode = system.settings().validation_mode;
        let model = system.model()?;
        let derived = system.derived()?;
        let num_bodies = model.num_bodies();
        let real = DOF * model.layout.num_real_bodies();

        let m_eff = derived.hydro.m3.view((0, 0), (real, real)).into_owned();
        let q = if model.parameters.fluid_density > 0.0 {
            derived.hydro.f_hydro_no_inertia.rows(0, real).into_owned()
        } else {
            State::zeros(real)
        };
        let real_acc = udwadia_kalaba(&m_eff, &q, &derived.constraints, validation_mode)?;

        let mut acc = State::zeros(DOF * num_bodies);
        acc.rows_mut(0, real).copy_from(&real_acc);
        if model.layout.image_system() {
            mirror_images(&mut acc, num_bodies);
        }
        trace!("t = {}: |acc| = {:.3e}", t, acc.norm());

        system.set_body_accelerations(&acc)?;
        Ok(acc)
    }

    /// Advances the body state by one step of `τ·dt`.
    ///
    /// The clock is left at its pre-step value; the caller advances it. A final
    /// acceleration evaluation at the new state leaves the derived tensors current.
    pub fn integrate(
        &self,
        system: &mut SystemState,
        device: &ComputeDevice,
    ) -> Result<(), SwimmerError> {
        let model = system.model()?;
        let t = model.t;
        let tau = model.parameters.tau;
        let dt = model.parameters.dt;
        let h = model.parameters.dimensional_dt();
        let n = model.body_positions.len();

        let mut x0 = State::zeros(2 * n);
        x0.rows_mut(0, n).copy_from(&model.body_positions);
        x0.rows_mut(n, n).copy_from(&model.body_velocities);

        let mut rhs = |x: &State, t_dim: f64| -> Result<State, SwimmerError> {
            let positions = x.rows(0, n).into_owned();
            let velocities = x.rows(n, n).into_owned();
            let acc = self.acceleration_update(system, device, t_dim / tau, &positions, &velocities)?;

            // The force-free solve may have replaced the stage velocities.
            let mut dx = State::zeros(2 * n);
            dx.rows_mut(0, n).copy_from(&system.model()?.body_velocities);
            dx.rows_mut(n, n).copy_from(&acc);
            Ok(dx)
        };
        let x = self.scheme.step(&mut rhs, &x0, tau * t, tau * t + h)?;

        let positions = x.rows(0, n).into_owned();
        let velocities = x.rows(n, n).into_owned();
        self.acceleration_update(system, device, t + dt, &positions, &velocities)?;
        system.model_mut()?.t = t;
        Ok(())
    }
}

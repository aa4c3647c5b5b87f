// swimmer_core/src/hydrodynamics.rs

//! Potential-flow hydrodynamics of unit spheres: pairwise added mass, its spatial
//! gradient, the body-space projections and the generalized hydrodynamic forces.
//!
//! With `T = ½ Vᵀ M V` and `V = Σᵀ ξ̇ + V_art` the generalized force on the bodies is
//!
//! ```text
//! F = −M3 ξ̈ − N3_ijk ξ̇_j ξ̇_k + ½ N3_jki ξ̇_j ξ̇_k          (locater motion)
//!     + N2_jki ξ̇_j V_k − N2_ijk V_j ξ̇_k                      (coupling)
//!     + ½ N1_jki V_j V_k − M2 A_art                          (articulation)
//! ```
//!
//! Coincident spheres make the added mass singular; non-overlap is a precondition.

use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use tracing::debug;

use crate::error::NumericalError;
use crate::kinematics::ArticulationState;
use crate::rbm::RigidBodyMotion;
use crate::types::{Matrix, State, DOF, LINEAR_DOF, QUATERNION_DOF, QUATERNION_OFFSET, UNIT_SPHERE_VOLUME};
use crate::utils::tensor::{
    contract_il_jlk, contract_il_ljk, contract_ijk_jk, contract_ijl_kl, contract_ilk_lj,
    contract_jki_jk, outer, Tensor3,
};

/// Isotropic coefficient of the pair block, `c2 / ρ³`.
pub const C2: f64 = 0.5;
/// Dyadic coefficient of the pair block, `c1 / ρ⁵`.
pub const C1: f64 = 1.5;
/// Self added mass of a sphere in units of its displaced fluid mass.
pub const SELF_ADDED_MASS: f64 = 0.5;
/// Moment of inertia of a solid sphere in units of `m a²`.
pub const SPHERE_INERTIA: f64 = 0.4;

/// Every derived hydrodynamic quantity for one configuration.
#[derive(Debug, Clone)]
pub struct HydrodynamicTensors {
    pub m_added: Matrix,
    pub m_total: Matrix,
    /// `∂M_added/∂x` (7N × 7N × 3N)
    pub grad_m_added: Tensor3,
    /// `Σ M` (7M × 7N)
    pub m2: Matrix,
    /// `Σ M Σᵀ` (7M × 7M)
    pub m3: Matrix,
    /// `∂M/∂ξ` (7N × 7N × 7M)
    pub n1: Tensor3,
    /// `∂M2/∂ξ` (7M × 7N × 7M)
    pub n2: Tensor3,
    /// `∂M3/∂ξ` (7M × 7M × 7M)
    pub n3: Tensor3,
    pub f_hydro: State,
    /// `F_hydro + M3 ξ̈`
    pub f_hydro_no_inertia: State,
}

#[derive(Debug, Clone)]
pub struct HydrodynamicEngine {
    num_particles: usize,
    fluid_density: f64,
    particle_density: f64,
    pairs: Vec<(usize, usize)>,
}

/// Maps a linear index onto the unordered pair `(α, β)`, `α < β`, by folding the
/// lower triangle of an `N × N` grid over its upper triangle.
fn folded_pair(index: usize, n: usize) -> (usize, usize) {
    let mut alpha = index / n;
    let mut beta = index % n;
    if beta <= alpha {
        alpha = n - alpha - 2;
        beta = n - beta - 1;
    }
    (alpha, beta)
}

struct PairBlock {
    alpha: usize,
    beta: usize,
    mass: Matrix3<f64>,
    /// `∂mass_ij/∂r_k`, indexed `[k]`.
    grad: [Matrix3<f64>; 3],
}

impl HydrodynamicEngine {
    pub fn new(num_particles: usize, fluid_density: f64, particle_density: f64) -> Self {
        let num_pairs = num_particles * num_particles.saturating_sub(1) / 2;
        let pairs = (0..num_pairs)
            .map(|i| folded_pair(i, num_particles))
            .collect();
        debug!(
            "Hydrodynamic engine: {} particles, {} pairs",
            num_particles, num_pairs
        );
        Self {
            num_particles,
            fluid_density,
            particle_density,
            pairs,
        }
    }

    /// Displaced-fluid mass of one particle, the scale of every added-mass entry.
    fn fluid_mass(&self) -> f64 {
        self.fluid_density * UNIT_SPHERE_VOLUME
    }

    fn pair_block(&self, positions: &State, alpha: usize, beta: usize) -> PairBlock {
        let r: Vector3<f64> = positions.fixed_rows::<3>(LINEAR_DOF * alpha)
            - positions.fixed_rows::<3>(LINEAR_DOF * beta);
        let dist = r.norm();
        let scale = self.fluid_mass();
        let identity = Matrix3::<f64>::identity();

        let mass = (identity * (C2 / dist.powi(3)) - r * r.transpose() * (C1 / dist.powi(5))) * scale;

        let iso = -3.0 * C2 / dist.powi(5);
        let dyad = -C1 / dist.powi(5);
        let cubic = 5.0 * C1 / dist.powi(7);
        let delta = |a: usize, b: usize| if a == b { 1.0 } else { 0.0 };
        let grad = std::array::from_fn(|k| {
            Matrix3::from_fn(|i, j| {
                scale
                    * (iso * delta(i, j) * r[k]
                        + dyad * (delta(j, k) * r[i] + delta(k, i) * r[j])
                        + cubic * r[i] * r[j] * r[k])
            })
        });

        PairBlock {
            alpha,
            beta,
            mass,
            grad,
        }
    }

    /// Added mass (7N × 7N) and its gradient w.r.t. particle positions (7N × 7N × 3N).
    ///
    /// # Arguments
    /// * `positions`: lab-frame particle positions (3N).
    pub fn added_mass(&self, positions: &State) -> (Matrix, Tensor3) {
        let n = self.num_particles;
        let blocks: Vec<PairBlock> = self
            .pairs
            .par_iter()
            .map(|&(alpha, beta)| self.pair_block(positions, alpha, beta))
            .collect();

        let mut m_added = Matrix::zeros(DOF * n, DOF * n);
        let mut grad = Tensor3::zeros((DOF * n, DOF * n, LINEAR_DOF * n));

        for blk in &blocks {
            let (a7, b7) = (DOF * blk.alpha, DOF * blk.beta);
            let (a3, b3) = (LINEAR_DOF * blk.alpha, LINEAR_DOF * blk.beta);
            m_added.fixed_view_mut::<3, 3>(a7, b7).copy_from(&blk.mass);
            m_added.fixed_view_mut::<3, 3>(b7, a7).copy_from(&blk.mass);

            // r = x_α − x_β, so ∂/∂x_α = +∂/∂r and ∂/∂x_β = −∂/∂r for both placements.
            for k in 0..3 {
                for i in 0..3 {
                    for j in 0..3 {
                        let d = blk.grad[k][(i, j)];
                        grad[[a7 + i, b7 + j, a3 + k]] = d;
                        grad[[a7 + i, b7 + j, b3 + k]] = -d;
                        grad[[b7 + i, a7 + j, a3 + k]] = d;
                        grad[[b7 + i, a7 + j, b3 + k]] = -d;
                    }
                }
            }
        }

        let self_mass = Matrix3::<f64>::identity() * (SELF_ADDED_MASS * self.fluid_mass());
        for p in 0..n {
            m_added
                .fixed_view_mut::<3, 3>(DOF * p, DOF * p)
                .copy_from(&self_mass);
        }

        (m_added, grad)
    }

    /// Intrinsic linear mass and rotational inertia of the particles (7N × 7N).
    pub fn intrinsic_mass(&self) -> Matrix {
        let n = self.num_particles;
        let mass = self.particle_density * UNIT_SPHERE_VOLUME;
        let inertia = SPHERE_INERTIA * mass;
        let mut m = Matrix::zeros(DOF * n, DOF * n);
        for p in 0..n {
            let p7 = DOF * p;
            for i in 0..LINEAR_DOF {
                m[(p7 + i, p7 + i)] = mass;
            }
            for i in 0..QUATERNION_DOF {
                m[(p7 + QUATERNION_OFFSET + i, p7 + QUATERNION_OFFSET + i)] = inertia;
            }
        }
        m
    }

    /// Evaluates the mass tensors and generalized forces for the current state.
    ///
    /// # Arguments
    /// * `positions`: lab-frame particle positions (3N).
    /// * `rbm`: Σ, χ, ∇Σ for the same configuration.
    /// * `body_velocities`, `body_accelerations`: ξ̇ and ξ̈ (7M).
    /// * `articulation`: prescribed articulation velocities and accelerations.
    pub fn evaluate(
        &self,
        positions: &State,
        rbm: &RigidBodyMotion,
        body_velocities: &State,
        body_accelerations: &State,
        articulation: &ArticulationState,
    ) -> Result<HydrodynamicTensors, NumericalError> {
        let (m_added, grad_m_added) = self.added_mass(positions);
        let m_total = &m_added + self.intrinsic_mass();

        // --- Body-space projections ---
        let m2 = &rbm.sigma * &m_total;
        let m3 = &m2 * rbm.sigma.transpose();

        let n1 = contract_ijl_kl(&grad_m_added, &rbm.chi);
        let n2 = contract_ilk_lj(&rbm.grad_sigma, &m_total) + contract_il_ljk(&rbm.sigma, &n1);
        let n3 = contract_ilk_lj(&n2, &rbm.sigma.transpose()) + contract_il_jlk(&m2, &rbm.grad_sigma);

        // --- Generalized forces ---
        let xi_dot = body_velocities;
        let v_art = &articulation.velocities;
        let xx = outer(xi_dot, xi_dot);

        let inertia = -(&m3 * body_accelerations);
        let locater =
            &inertia - contract_ijk_jk(&n3, &xx) + contract_jki_jk(&n3, &xx) * 0.5;
        let coupling =
            contract_jki_jk(&n2, &outer(xi_dot, v_art)) - contract_ijk_jk(&n2, &outer(v_art, xi_dot));
        let articulated =
            contract_jki_jk(&n1, &outer(v_art, v_art)) * 0.5 - &m2 * &articulation.accelerations;

        let f_hydro = locater + coupling + articulated;
        let f_hydro_no_inertia = &f_hydro - &inertia;

        if !f_hydro.iter().all(|f| f.is_finite()) {
            return Err(NumericalError::NonFiniteForce);
        }

        Ok(HydrodynamicTensors {
            m_added,
            m_total,
            grad_m_added,
            m2,
            m3,
            n1,
            n2,
            n3,
            f_hydro,
            f_hydro_no_inertia,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{evaluate_articulation, CollinearSwimmer, RigidKinematics};
    use crate::layout::ParticleLayout;
    use approx::assert_abs_diff_eq;
    use std::collections::HashSet;

    const EPSILON: f64 = 1e-12;

    fn scattered_positions() -> State {
        State::from_vec(vec![
            0.0, 0.0, 0.0, //
            3.1, 0.4, -0.2, //
            -2.8, 1.5, 0.9, //
            0.7, -3.3, 2.2, //
            4.0, 3.9, -1.6,
        ])
    }

    #[test]
    fn folded_pairs_cover_each_pair_once() {
        for n in 1..9 {
            let engine = HydrodynamicEngine::new(n, 1.0, 1.0);
            let pairs: HashSet<_> = engine.pairs.iter().copied().collect();
            assert_eq!(engine.pairs.len(), n * (n - 1) / 2);
            assert_eq!(pairs.len(), engine.pairs.len());
            assert!(pairs.iter().all(|&(a, b)| a < b && b < n));
        }
    }

    #[test]
    fn added_mass_is_symmetric() {
        let engine = HydrodynamicEngine::new(5, 1.3, 1.0);
        let (m, _) = engine.added_mass(&scattered_positions());
        assert_abs_diff_eq!(m.clone(), m.transpose(), epsilon = EPSILON);
    }

    #[test]
    fn two_particle_block_matches_closed_form() {
        let fluid_density = 2.0;
        let engine = HydrodynamicEngine::new(2, fluid_density, 1.0);
        let r = Vector3::new(1.0, -2.0, 2.0); // ρ = 3
        let positions = State::from_vec(vec![r.x, r.y, r.z, 0.0, 0.0, 0.0]);
        let (m, _) = engine.added_mass(&positions);

        let scale = fluid_density * UNIT_SPHERE_VOLUME;
        let expected = (Matrix3::identity() * (0.5 / 27.0) - r * r.transpose() * (1.5 / 243.0)) * scale;
        assert_abs_diff_eq!(m.fixed_view::<3, 3>(0, 7).into_owned(), expected, epsilon = EPSILON);
        assert_abs_diff_eq!(m.fixed_view::<3, 3>(7, 0).into_owned(), expected, epsilon = EPSILON);
        assert_abs_diff_eq!(
            m.fixed_view::<3, 3>(0, 0).into_owned(),
            Matrix3::identity() * (0.5 * scale),
            epsilon = EPSILON
        );
        // Angular slots carry no added mass.
        assert_abs_diff_eq!(m.fixed_view::<4, 4>(3, 3).norm(), 0.0);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let engine = HydrodynamicEngine::new(5, 1.0, 1.0);
        let x = scattered_positions();
        let (_, grad) = engine.added_mass(&x);
        let h = 1e-6;
        for c in 0..15 {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[c] += h;
            minus[c] -= h;
            let fd = (engine.added_mass(&plus).0 - engine.added_mass(&minus).0) / (2.0 * h);
            for a in 0..35 {
                for b in 0..35 {
                    assert_abs_diff_eq!(grad[[a, b, c]], fd[(a, b)], epsilon = 1e-8);
                }
            }
        }
    }

    #[test]
    fn gradient_is_antisymmetric_in_the_differentiated_particle() {
        let engine = HydrodynamicEngine::new(2, 1.0, 1.0);
        let x = State::from_vec(vec![0.0, 0.0, 0.0, 2.0, 1.0, -1.0]);
        let (_, grad) = engine.added_mass(&x);
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..3 {
                    let ij_i = grad[[i, 7 + j, k]];
                    assert_abs_diff_eq!(ij_i, -grad[[i, 7 + j, 3 + k]], epsilon = EPSILON);
                    assert_abs_diff_eq!(ij_i, grad[[7 + i, j, k]], epsilon = EPSILON);
                    assert_abs_diff_eq!(ij_i, -grad[[7 + i, j, 3 + k]], epsilon = EPSILON);
                }
            }
        }
    }

    fn swimmer_setup() -> (ParticleLayout, Vec<Vector3<f64>>, CollinearSwimmer, State) {
        let layout = ParticleLayout::from_type_ids(&[1, 0, 0], false).unwrap();
        let directions = vec![Vector3::zeros(), Vector3::x(), -Vector3::x()];
        let model = CollinearSwimmer {
            amplitude: 0.4,
            frequency: 2.0,
            phase_shift: 0.3,
            mean_separation: 3.5,
        };
        let mut bodies = State::zeros(7);
        bodies[3] = 1.0;
        (layout, directions, model, bodies)
    }

    fn positions_of(layout: &ParticleLayout, bodies: &State, art: &ArticulationState) -> State {
        let mut x = art.positions.clone();
        for p in 0..layout.num_particles() {
            let b7 = DOF * layout.body_of(p);
            let mut row = x.fixed_rows_mut::<3>(3 * p);
            row += bodies.fixed_rows::<3>(b7);
        }
        x
    }

    #[test]
    fn body_mass_is_symmetric_positive_definite() {
        let (layout, directions, model, bodies) = swimmer_setup();
        let art = evaluate_articulation(&model, &layout, &directions, &bodies, 0.2);
        let rbm = RigidBodyMotion::build(&layout, &bodies, &directions, &art);
        let engine = HydrodynamicEngine::new(3, 1.0, 1.0);
        let x = positions_of(&layout, &bodies, &art);
        let hydro = engine
            .evaluate(&x, &rbm, &State::zeros(7), &State::zeros(7), &art)
            .unwrap();

        assert_abs_diff_eq!(hydro.m3.clone(), hydro.m3.transpose(), epsilon = 1e-10);
        let eig = hydro.m3.clone().symmetric_eigen();
        assert!(eig.eigenvalues.iter().all(|&l| l > 0.0));
    }

    #[test]
    fn no_inertia_force_drops_only_the_acceleration_term() {
        let (layout, directions, model, bodies) = swimmer_setup();
        let art = evaluate_articulation(&model, &layout, &directions, &bodies, 0.2);
        let rbm = RigidBodyMotion::build(&layout, &bodies, &directions, &art);
        let engine = HydrodynamicEngine::new(3, 1.0, 1.0);
        let x = positions_of(&layout, &bodies, &art);

        let vel = State::from_vec(vec![0.1, -0.2, 0.05, 0.0, 0.01, 0.02, -0.03]);
        let acc = State::from_vec(vec![0.3, 0.1, -0.4, 0.0, 0.2, -0.1, 0.05]);
        let hydro = engine.evaluate(&x, &rbm, &vel, &acc, &art).unwrap();
        assert_abs_diff_eq!(
            &hydro.f_hydro - &hydro.f_hydro_no_inertia,
            -(&hydro.m3 * &acc),
            epsilon = 1e-12
        );
    }

    #[test]
    fn quiescent_rigid_system_feels_no_force() {
        let (layout, directions, mut model, bodies) = swimmer_setup();
        model.amplitude = 0.0;
        let art = evaluate_articulation(&model, &layout, &directions, &bodies, 0.0);
        let rbm = RigidBodyMotion::build(&layout, &bodies, &directions, &art);
        let engine = HydrodynamicEngine::new(3, 1.0, 1.0);
        let x = positions_of(&layout, &bodies, &art);
        let hydro = engine
            .evaluate(&x, &rbm, &State::zeros(7), &State::zeros(7), &art)
            .unwrap();
        assert_abs_diff_eq!(hydro.f_hydro.norm(), 0.0, epsilon = EPSILON);
    }

    #[test]
    fn n1_is_gradient_of_mass_along_body_coordinates() {
        // Translating the whole body leaves every pair separation unchanged.
        let (layout, directions, model, bodies) = swimmer_setup();
        let art = evaluate_articulation(&model, &layout, &directions, &bodies, 0.2);
        let rbm = RigidBodyMotion::build(&layout, &bodies, &directions, &art);
        let engine = HydrodynamicEngine::new(3, 1.0, 1.0);
        let x = positions_of(&layout, &bodies, &art);
        let hydro = engine
            .evaluate(&x, &rbm, &State::zeros(7), &State::zeros(7), &art)
            .unwrap();
        for k in 0..3 {
            let slice = hydro.n1.index_axis(ndarray::Axis(2), k);
            assert_abs_diff_eq!(slice.iter().map(|v| v.abs()).sum::<f64>(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn free_sphere_at_constant_velocity_feels_no_force() {
        let layout = ParticleLayout::from_type_ids(&[1], false).unwrap();
        let directions = vec![Vector3::zeros()];
        let model = RigidKinematics { separation: 0.0 };
        let mut bodies = State::zeros(7);
        bodies.fixed_rows_mut::<3>(0).copy_from(&Vector3::new(1.0, -2.0, 4.0));
        bodies[3] = 1.0;
        let art = evaluate_articulation(&model, &layout, &directions, &bodies, 0.0);
        let rbm = RigidBodyMotion::build(&layout, &bodies, &directions, &art);
        let engine = HydrodynamicEngine::new(1, 1.0, 1.0);
        let x = positions_of(&layout, &bodies, &art);

        let vel = State::from_vec(vec![0.7, -0.3, 0.2, 0.0, 0.0, 0.0, 0.0]);
        let hydro = engine
            .evaluate(&x, &rbm, &vel, &State::zeros(7), &art)
            .unwrap();
        assert_abs_diff_eq!(hydro.f_hydro.norm(), 0.0, epsilon = EPSILON);
    }

    /// `F_i = −d/dt (M3 ξ̇)_i + ½ ξ̇ᵀ (∂M3/∂ξ_i) ξ̇` with every derivative of `M3`
    /// taken by central differences.
    #[test]
    fn rigid_body_force_matches_lagrangian_of_body_mass() {
        const H: f64 = 1e-5;
        const FD_EPSILON: f64 = 1e-5;

        let (layout, directions, mut model, _) = swimmer_setup();
        model.amplitude = 0.0;
        let engine = HydrodynamicEngine::new(3, 1.0, 1.0);
        let evaluate = |bodies: &State, vel: &State, acc: &State| {
            let art = evaluate_articulation(&model, &layout, &directions, bodies, 0.0);
            let rbm = RigidBodyMotion::build(&layout, bodies, &directions, &art);
            let x = positions_of(&layout, bodies, &art);
            engine.evaluate(&x, &rbm, vel, acc, &art).unwrap()
        };
        let m3_at = |bodies: &State| evaluate(bodies, &State::zeros(7), &State::zeros(7)).m3;

        let mut bodies = State::from_vec(vec![0.4, -1.1, 2.0, 0.9, 0.1, -0.3, 0.2]);
        let theta = bodies.fixed_rows::<4>(3).normalize();
        bodies.fixed_rows_mut::<4>(3).copy_from(&theta);
        let vel = State::from_vec(vec![0.3, -0.2, 0.1, 0.05, -0.1, 0.2, 0.15]);
        let acc = State::from_vec(vec![-0.4, 0.2, 0.3, 0.1, 0.05, -0.2, 0.1]);

        let hydro = evaluate(&bodies, &vel, &acc);

        let dm3_dt = (m3_at(&(&bodies + &vel * H)) - m3_at(&(&bodies - &vel * H))) / (2.0 * H);
        let mut expected = -(&hydro.m3 * &acc) - &dm3_dt * &vel;
        for i in 0..7 {
            let mut step = State::zeros(7);
            step[i] = H;
            let dm3_di = (m3_at(&(&bodies + &step)) - m3_at(&(&bodies - &step))) / (2.0 * H);
            expected[i] += 0.5 * vel.dot(&(&dm3_di * &vel));
        }

        assert!(hydro.f_hydro.norm() > 1e-3);
        assert_abs_diff_eq!(hydro.f_hydro, expected, epsilon = FD_EPSILON);
    }
}

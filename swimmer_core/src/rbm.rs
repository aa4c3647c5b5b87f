// swimmer_core/src/rbm.rs

//! The rigid-body-motion map between particle and body generalized coordinates.
//!
//! Each particle carries 7 generalized velocities: its linear velocity `U` and the
//! 4-vector `Ω = −2 E(θ) θ̇ = (−2 θ·θ̇, ω)` of its body. With `V = Σᵀ ξ̇`:
//!
//! ```text
//! U_α = U_i + ω × r_α        ω = −2 Ē(θ) θ̇
//! ```
//!
//! so the body-row / particle-column block of `Σ` is
//! `[[I₃, 0], [−2 Ēᵀ [r]×, −2 Eᵀ]]`.

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Matrix4x3, Vector3, Vector4};
use rayon::prelude::*;

use crate::kinematics::ArticulationState;
use crate::layout::ParticleLayout;
use crate::types::{Matrix, State, DOF, LINEAR_DOF, QUATERNION_DOF, QUATERNION_OFFSET};
use crate::utils::algebra::{
    body_to_lab_jacobian, cross_prod_mat, e_matrix, kappa, quaternion_from_wxyz,
};
use crate::utils::tensor::Tensor3;

/// Σ, χ and ∇Σ for one configuration.
#[derive(Debug, Clone)]
pub struct RigidBodyMotion {
    /// Connectivity (7M × 7N).
    pub sigma: Matrix,
    /// Jacobian of particle positions w.r.t. body coordinates (7M × 3N), `χ_kc = ∂x_c/∂ξ_k`.
    pub chi: Matrix,
    /// `∂Σ_ia/∂ξ_k` (7M × 7N × 7M).
    pub grad_sigma: Tensor3,
}

/// The non-trivial blocks contributed by one particle.
struct ParticleBlocks {
    body: usize,
    /// `−2 Ēᵀ [r]×`
    sigma_lin: Matrix4x3<f64>,
    /// `−2 Eᵀ`
    sigma_quat: Matrix4<f64>,
    /// `∂r/∂θ`
    g: Matrix3x4<f64>,
    grad_lin: [Matrix4x3<f64>; QUATERNION_DOF],
    grad_quat: [Matrix4<f64>; QUATERNION_DOF],
}

fn particle_blocks(
    layout: &ParticleLayout,
    body_positions: &State,
    body_directions: &[Vector3<f64>],
    articulation: &ArticulationState,
    kappa: &[Matrix4<f64>; QUATERNION_DOF],
    p: usize,
) -> ParticleBlocks {
    let body = layout.body_of(p);
    let b7 = DOF * body;
    let theta = Vector4::from_column_slice(
        &body_positions.as_slice()[b7 + QUATERNION_OFFSET..b7 + DOF],
    );
    let r = articulation.positions.fixed_rows::<3>(LINEAR_DOF * p).into_owned();

    let e_t = e_matrix(&theta).transpose();
    let e_bar_t: Matrix4x3<f64> = e_t.fixed_columns::<3>(1).into_owned();
    let r_cross = cross_prod_mat(&r);

    // Locaters sit on the body origin: no moment arm and no rotation of the offset.
    let g = if layout.is_locater(p) {
        Matrix3x4::zeros()
    } else {
        let q = quaternion_from_wxyz(theta.as_slice());
        body_to_lab_jacobian(&q, &body_directions[p]) * articulation.lengths[p]
    };

    let grad_lin = std::array::from_fn(|k| {
        let kappa_bar: Matrix4x3<f64> = kappa[k].fixed_columns::<3>(1).into_owned();
        let g_k: Vector3<f64> = g.column(k).into_owned();
        let g_cross: Matrix3<f64> = cross_prod_mat(&g_k);
        (kappa_bar * r_cross + e_bar_t * g_cross) * -2.0
    });
    let grad_quat = std::array::from_fn(|k| kappa[k] * -2.0);

    ParticleBlocks {
        body,
        sigma_lin: e_bar_t * r_cross * -2.0,
        sigma_quat: e_t * -2.0,
        g,
        grad_lin,
        grad_quat,
    }
}

impl RigidBodyMotion {
    /// Assembles Σ, χ and ∇Σ for the current body coordinates and articulation.
    ///
    /// # Arguments
    /// * `body_positions`: body generalized coordinates (7M).
    /// * `body_directions`: body-fixed articulation direction of each particle.
    /// * `articulation`: articulation evaluated for the same body coordinates.
    pub fn build(
        layout: &ParticleLayout,
        body_positions: &State,
        body_directions: &[Vector3<f64>],
        articulation: &ArticulationState,
    ) -> Self {
        let n = layout.num_particles();
        let m = layout.num_bodies();
        let kappa = kappa();

        let blocks: Vec<ParticleBlocks> = (0..n)
            .into_par_iter()
            .map(|p| {
                particle_blocks(
                    layout,
                    body_positions,
                    body_directions,
                    articulation,
                    &kappa,
                    p,
                )
            })
            .collect();

        let mut sigma = Matrix::zeros(DOF * m, DOF * n);
        let mut chi = Matrix::zeros(DOF * m, LINEAR_DOF * n);
        let mut grad_sigma = Tensor3::zeros((DOF * m, DOF * n, DOF * m));

        for (p, blk) in blocks.iter().enumerate() {
            let b7 = DOF * blk.body;
            let bq = b7 + QUATERNION_OFFSET;
            let p7 = DOF * p;
            let p3 = LINEAR_DOF * p;

            // --- Σ ---
            sigma
                .fixed_view_mut::<3, 3>(b7, p7)
                .copy_from(&Matrix3::identity());
            sigma.fixed_view_mut::<4, 3>(bq, p7).copy_from(&blk.sigma_lin);
            sigma
                .fixed_view_mut::<4, 4>(bq, p7 + QUATERNION_OFFSET)
                .copy_from(&blk.sigma_quat);

            // --- χ ---
            chi.fixed_view_mut::<3, 3>(b7, p3)
                .copy_from(&Matrix3::identity());
            chi.fixed_view_mut::<4, 3>(bq, p3)
                .copy_from(&blk.g.transpose());

            // --- ∇Σ, only the quaternion coordinates of the owning body contribute ---
            for k in 0..QUATERNION_DOF {
                for l in 0..QUATERNION_DOF {
                    for j in 0..LINEAR_DOF {
                        grad_sigma[[bq + l, p7 + j, bq + k]] = blk.grad_lin[k][(l, j)];
                    }
                    for j in 0..QUATERNION_DOF {
                        grad_sigma[[bq + l, p7 + QUATERNION_OFFSET + j, bq + k]] =
                            blk.grad_quat[k][(l, j)];
                    }
                }
            }
        }

        Self {
            sigma,
            chi,
            grad_sigma,
        }
    }

    /// Particle generalized velocities driven by body motion, `Σᵀ ξ̇`.
    pub fn particle_velocities(&self, body_velocities: &State) -> State {
        self.sigma.tr_mul(body_velocities)
    }
}

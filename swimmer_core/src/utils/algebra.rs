// swimmer_core/src/utils/algebra.rs

//! Small fixed-size building blocks shared by the rigid-body map and the integrator:
//! the Levi-Civita symbol, moment-arm matrices, the quaternion composition matrix `E(θ)`,
//! its derivative tensor and the rotation helpers for body-fixed directions.
//!
//! Quaternions are laid out `(w, x, y, z)` everywhere in the generalized coordinates.
//! A body quaternion `θ` maps lab-frame vectors into the body frame, so a body-fixed
//! direction `d` is seen in the lab frame as `vec(θ* ⊗ d ⊗ θ)`.

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Quaternion, Vector3, Vector4};

// --- Index Symbols ---

/// The rank-3 Levi-Civita symbol `ε_ijk`.
pub fn levi_civita(i: usize, j: usize, k: usize) -> f64 {
    match (i, j, k) {
        (0, 1, 2) | (1, 2, 0) | (2, 0, 1) => 1.0,
        (0, 2, 1) | (2, 1, 0) | (1, 0, 2) => -1.0,
        _ => 0.0,
    }
}

/// Skew-symmetric moment-arm matrix, `crossProdMat(v) · w = v × w`.
///
/// Built as `M_ij = -ε_ijk v_k`.
pub fn cross_prod_mat(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| -(0..3).map(|k| levi_civita(i, j, k) * v[k]).sum::<f64>())
}

// --- Quaternion Matrices ---

/// The quaternion composition matrix `E(θ)`, satisfying `E(θ) · p = θ* ⊗ p`.
///
/// For a unit quaternion `E(θ) · E(θ)ᵀ = ‖θ‖² I₄`.
pub fn e_matrix(theta: &Vector4<f64>) -> Matrix4<f64> {
    let (t0, t1, t2, t3) = (theta[0], theta[1], theta[2], theta[3]);
    Matrix4::new(
        t0, t1, t2, t3, //
        -t1, t0, t3, -t2, //
        -t2, -t3, t0, t1, //
        -t3, t2, -t1, t0,
    )
}

/// `Kappa[k] = ∂Eᵀ/∂θ_k`. `E` is linear in `θ`, so these are constant.
pub fn kappa() -> [Matrix4<f64>; 4] {
    let basis = |k: usize| Vector4::from_fn(|i, _| if i == k { 1.0 } else { 0.0 });
    [
        e_matrix(&basis(0)).transpose(),
        e_matrix(&basis(1)).transpose(),
        e_matrix(&basis(2)).transpose(),
        e_matrix(&basis(3)).transpose(),
    ]
}

// --- Quaternion Conversions ---

/// Builds a quaternion from a `(w, x, y, z)` slice of a generalized coordinate vector.
pub fn quaternion_from_wxyz(coords: &[f64]) -> Quaternion<f64> {
    Quaternion::new(coords[0], coords[1], coords[2], coords[3])
}

/// The `(w, x, y, z)` components of a quaternion as a column vector.
pub fn wxyz(q: &Quaternion<f64>) -> Vector4<f64> {
    Vector4::new(q.w, q.i, q.j, q.k)
}

fn pure(v: &Vector3<f64>) -> Quaternion<f64> {
    Quaternion::from_imag(*v)
}

// --- Rotations ---

/// Lab-frame image of the body-fixed direction `d`, `vec(θ* ⊗ d ⊗ θ)`.
pub fn body_to_lab(theta: &Quaternion<f64>, d: &Vector3<f64>) -> Vector3<f64> {
    (theta.conjugate() * pure(d) * theta).imag()
}

/// Body-fixed direction whose lab-frame image is `n`, `vec(θ ⊗ n ⊗ θ*)`.
pub fn lab_to_body(theta: &Quaternion<f64>, n: &Vector3<f64>) -> Vector3<f64> {
    (theta * pure(n) * theta.conjugate()).imag()
}

/// Jacobian `∂/∂θ vec(θ* ⊗ d ⊗ θ)` (3×4), columns ordered `(w, x, y, z)`.
///
/// Column `k` is `vec(e_k* ⊗ d ⊗ θ + θ* ⊗ d ⊗ e_k)`.
pub fn body_to_lab_jacobian(theta: &Quaternion<f64>, d: &Vector3<f64>) -> Matrix3x4<f64> {
    let basis = [
        Quaternion::new(1.0, 0.0, 0.0, 0.0),
        Quaternion::new(0.0, 1.0, 0.0, 0.0),
        Quaternion::new(0.0, 0.0, 1.0, 0.0),
        Quaternion::new(0.0, 0.0, 0.0, 1.0),
    ];
    let d = pure(d);
    let left = d * theta;
    let right = theta.conjugate() * d;

    let mut jac = Matrix3x4::zeros();
    for (k, e_k) in basis.iter().enumerate() {
        let column = (e_k.conjugate() * left + right * e_k).imag();
        jac.set_column(k, &column);
    }
    jac
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const EPSILON: f64 = 1e-12;
    const FD_EPSILON: f64 = 1e-6;

    fn unit_quaternion() -> Vector4<f64> {
        Vector4::new(0.9, -0.2, 0.3, 0.25).normalize()
    }

    #[test]
    fn cross_prod_mat_matches_cross_product() {
        let v = Vector3::new(1.5, -2.0, 0.25);
        let w = Vector3::new(-0.75, 3.0, 4.0);
        let expected = v.cross(&w);
        let got = cross_prod_mat(&v) * w;
        assert_abs_diff_eq!(got, expected, epsilon = EPSILON);
    }

    #[test]
    fn cross_prod_mat_is_antisymmetric() {
        let m = cross_prod_mat(&Vector3::new(0.3, -1.1, 2.7));
        assert_abs_diff_eq!(m.transpose(), -m, epsilon = EPSILON);
    }

    #[test]
    fn e_matrix_is_orthogonal_up_to_scale() {
        let theta = unit_quaternion();
        let e = e_matrix(&theta);
        assert_abs_diff_eq!(e * e.transpose(), Matrix4::identity(), epsilon = EPSILON);

        // The scale follows the squared norm for non-unit quaternions too.
        let scaled = theta * 2.0;
        let e = e_matrix(&scaled);
        assert_abs_diff_eq!(e * e.transpose(), Matrix4::identity() * 4.0, epsilon = EPSILON);
    }

    #[test]
    fn e_matrix_composes_with_conjugate() {
        let theta = unit_quaternion();
        let p = Vector4::new(0.1, 0.7, -0.4, 0.2);
        let expected = wxyz(&(quaternion_from_wxyz(theta.as_slice()).conjugate()
            * quaternion_from_wxyz(p.as_slice())));
        assert_abs_diff_eq!(e_matrix(&theta) * p, expected, epsilon = EPSILON);
    }

    #[test]
    fn kappa_is_derivative_of_e_transpose() {
        let k = kappa();
        assert_abs_diff_eq!(k[0], Matrix4::identity(), epsilon = EPSILON);
        assert_eq!(k[1][(0, 1)], -1.0);
        assert_eq!(k[1][(1, 0)], 1.0);
        assert_eq!(k[1][(2, 3)], -1.0);
        assert_eq!(k[1][(3, 2)], 1.0);
        assert_eq!(k[3][(1, 2)], -1.0);
        assert_eq!(k[3][(3, 0)], 1.0);

        // E(θ)ᵀ = Σ_k θ_k Kappa[k]
        let theta = unit_quaternion();
        let rebuilt = (0..4).fold(Matrix4::zeros(), |acc, i| acc + k[i] * theta[i]);
        assert_abs_diff_eq!(rebuilt, e_matrix(&theta).transpose(), epsilon = EPSILON);
    }

    #[test]
    fn lab_and_body_frames_round_trip() {
        let theta = quaternion_from_wxyz(unit_quaternion().as_slice());
        let d = Vector3::new(0.0, 0.6, -0.8);
        let n = body_to_lab(&theta, &d);
        assert_abs_diff_eq!(n.norm(), 1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(lab_to_body(&theta, &n), d, epsilon = EPSILON);
        // θ* ⊗ d ⊗ θ stays a pure quaternion.
        assert_abs_diff_eq!((theta.conjugate() * pure(&d) * theta).w, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn body_to_lab_jacobian_matches_finite_differences() {
        let theta = unit_quaternion();
        let d = Vector3::new(1.0, 0.0, 0.0);
        let jac = body_to_lab_jacobian(&quaternion_from_wxyz(theta.as_slice()), &d);

        for k in 0..4 {
            let mut plus = theta;
            let mut minus = theta;
            plus[k] += FD_EPSILON;
            minus[k] -= FD_EPSILON;
            let fd = (body_to_lab(&quaternion_from_wxyz(plus.as_slice()), &d)
                - body_to_lab(&quaternion_from_wxyz(minus.as_slice()), &d))
                / (2.0 * FD_EPSILON);
            assert_abs_diff_eq!(jac.column(k).into_owned(), fd, epsilon = 1e-8);
        }
    }

    #[test]
    fn jacobian_along_tangent_is_rigid_rotation() {
        // For θ·θ̇ = 0 the direction moves as ω × n with ω = -2 Ē(θ) θ̇.
        let theta = unit_quaternion();
        let raw = Vector4::new(0.3, 0.1, -0.5, 0.2);
        let theta_dot = raw - theta * theta.dot(&raw);
        let q = quaternion_from_wxyz(theta.as_slice());
        let d = Vector3::new(0.0, 0.0, 1.0);

        let n = body_to_lab(&q, &d);
        let e = e_matrix(&theta);
        let omega = -2.0 * e.fixed_rows::<3>(1) * theta_dot;
        let expected = omega.cross(&n);
        let got = body_to_lab_jacobian(&q, &d) * theta_dot;
        assert_abs_diff_eq!(got, expected, epsilon = 1e-12);
    }
}

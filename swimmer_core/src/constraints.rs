// swimmer_core/src/constraints.rs

use crate::types::{Matrix, State, DOF, QUATERNION_DOF, QUATERNION_OFFSET};

/// Differential unit-quaternion constraints `A ξ̈ = b` for the real bodies.
///
/// Differentiating `‖θ‖² = 1` twice gives `θ · θ̈ = −‖θ̇‖²`, one row per body.
#[derive(Debug, Clone)]
pub struct ConstraintSystem {
    /// `num_constraints × 7·num_constraints`
    pub a: Matrix,
    pub b: State,
}

impl ConstraintSystem {
    /// Builds one row per body for the first `num_constraints` bodies.
    pub fn build(body_positions: &State, body_velocities: &State, num_constraints: usize) -> Self {
        let mut a = Matrix::zeros(num_constraints, DOF * num_constraints);
        let mut b = State::zeros(num_constraints);

        for body in 0..num_constraints {
            let q = DOF * body + QUATERNION_OFFSET;
            let theta = body_positions.fixed_rows::<QUATERNION_DOF>(q);
            let theta_dot = body_velocities.fixed_rows::<QUATERNION_DOF>(q);

            a.fixed_view_mut::<1, QUATERNION_DOF>(body, q)
                .copy_from(&theta.transpose());
            b[body] = -theta_dot.norm_squared();
        }

        Self { a, b }
    }

    pub fn num_constraints(&self) -> usize {
        self.b.len()
    }

    /// `A ẍ − b`, zero when the accelerations honour the constraints.
    pub fn residual(&self, body_accelerations: &State) -> State {
        &self.a * body_accelerations.rows(0, self.a.ncols()) - &self.b
    }
}

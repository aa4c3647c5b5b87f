// swimmer_core/src/utils/integrators.rs

use nalgebra::{DVector, Scalar};

/// A one-step explicit scheme for `x' = f(x, t)`.
///
/// The right-hand side is fallible and may mutate captured state, which lets the
/// constrained integrator run a full system update inside every stage.
pub trait Integrator<T> {
    fn step<E>(
        &self,
        func: &mut dyn FnMut(&DVector<T>, T) -> Result<DVector<T>, E>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> Result<DVector<T>, E>;
}

// Runge-Kutta methods
#[derive(Debug, Default, Clone, Copy)]
pub struct RK4;

impl<T> Integrator<T> for RK4
where
    T: Scalar + Copy + num_traits::Float,
{
    fn step<E>(
        &self,
        func: &mut dyn FnMut(&DVector<T>, T) -> Result<DVector<T>, E>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> Result<DVector<T>, E> {
        let dt = tf - t0;
        let two = T::one() + T::one();
        let half = T::one() / two;
        let sixth = T::one() / (two + two + two);

        let advance = |k: &DVector<T>, h: T| x0.zip_map(k, |x, k| x + h * k);

        let k1 = func(x0, t0)?;
        let k2 = func(&advance(&k1, half * dt), t0 + half * dt)?;
        let k3 = func(&advance(&k2, half * dt), t0 + half * dt)?;
        let k4 = func(&advance(&k3, dt), tf)?;

        let inner = k1.zip_zip_map(&k2, &k3, |a, b, c| a + two * b + two * c);
        Ok(x0.zip_zip_map(&inner, &k4, |x, s, d| x + dt * sixth * (s + d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::convert::Infallible;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn rk4_integrates_harmonic_oscillator() {
        // x'' = -x as a first-order system, exact solution (cos t, -sin t).
        let mut rhs = |x: &DVector<f64>, _t: f64| -> Result<DVector<f64>, Infallible> {
            Ok(DVector::from_vec(vec![x[1], -x[0]]))
        };
        let mut x = DVector::from_vec(vec![1.0, 0.0]);
        let dt = 1e-3;
        let mut t = 0.0;
        for _ in 0..1000 {
            x = RK4.step(&mut rhs, &x, t, t + dt).unwrap();
            t += dt;
        }
        assert_abs_diff_eq!(x[0], t.cos(), epsilon = EPSILON);
        assert_abs_diff_eq!(x[1], -t.sin(), epsilon = EPSILON);
    }

    #[test]
    fn rk4_is_exact_for_cubic_in_time() {
        // x' = 3t², exact for a fourth-order scheme.
        let mut rhs =
            |_x: &DVector<f64>, t: f64| -> Result<DVector<f64>, Infallible> {
                Ok(DVector::from_element(1, 3.0 * t * t))
            };
        let x = RK4
            .step(&mut rhs, &DVector::from_element(1, 0.0), 0.0, 2.0)
            .unwrap();
        assert_abs_diff_eq!(x[0], 8.0, epsilon = 1e-12);
    }

    #[test]
    fn rk4_propagates_stage_errors() {
        let mut calls = 0;
        let mut rhs = |x: &DVector<f64>, _t: f64| -> Result<DVector<f64>, &'static str> {
            calls += 1;
            if calls == 2 {
                Err("stage failed")
            } else {
                Ok(x.clone())
            }
        };
        let result = RK4.step(&mut rhs, &DVector::from_element(2, 1.0), 0.0, 0.1);
        assert_eq!(result.unwrap_err(), "stage failed");
    }
}

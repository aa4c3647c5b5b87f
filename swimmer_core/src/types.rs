// swimmer_core/src/types.rs

use nalgebra::{DMatrix, DVector};

// --- Core Type Aliases ---
/// A generalized coordinate vector (body `7M` or particle `7N`/`3N` layouts).
pub type State = DVector<f64>;
pub type Matrix = DMatrix<f64>;

// --- Layout Constants ---
/// Generalized coordinates per body or particle: 3 linear + 4 quaternion.
pub const DOF: usize = 7;
/// Linear coordinates per body or particle.
pub const LINEAR_DOF: usize = 3;
/// Quaternion coordinates per body or particle.
pub const QUATERNION_DOF: usize = 4;
/// Offset of the quaternion sub-block inside a 7-block.
pub const QUATERNION_OFFSET: usize = 3;

/// Volume of a unit-radius sphere, the reference volume for every particle.
pub const UNIT_SPHERE_VOLUME: f64 = 4.0 / 3.0 * std::f64::consts::PI;

/// Spatial dimension the model is written for.
pub const SPATIAL_DIMENSIONS: u8 = 3;

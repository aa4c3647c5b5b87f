// swimmer_core/src/snapshot.rs

use nalgebra::{Vector3, Vector4};

use crate::abstractions::SnapshotSource;
use crate::error::{ModelError, SwimmerError};
use crate::kinematics::CollinearSwimmer;
use crate::parameters::SystemParameters;

/// One configuration frame, decoupled from how it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub step: u64,
    pub parameters: SystemParameters,
    /// Articulation parameters; required only when satellites are present.
    pub swimmer: Option<CollinearSwimmer>,
    pub type_ids: Vec<u32>,
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub accelerations: Vec<Vector3<f64>>,
    /// Orientation quaternion of each particle, `(w, x, y, z)`.
    pub orientations: Vec<Vector4<f64>>,
}

impl Snapshot {
    pub fn num_particles(&self) -> usize {
        self.type_ids.len()
    }

    /// Checks that every per-particle array has one entry per particle.
    pub fn check_lengths(&self) -> Result<(), ModelError> {
        let n = self.num_particles();
        if n == 0 {
            return Err(ModelError::NoParticles);
        }
        let arrays = [
            ("positions", self.positions.len()),
            ("velocities", self.velocities.len()),
            ("accelerations", self.accelerations.len()),
            ("orientations", self.orientations.len()),
        ];
        for (name, found) in arrays {
            if found != n {
                return Err(ModelError::LengthMismatch {
                    name,
                    expected: n,
                    found,
                });
            }
        }
        Ok(())
    }
}

/// A snapshot already held in memory.
impl SnapshotSource for Snapshot {
    fn load_snapshot(&mut self) -> Result<Snapshot, SwimmerError> {
        Ok(self.clone())
    }
}

/// Small configurations shared by the unit tests of the crate.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::f64::consts::PI;

    pub(crate) const HEIGHT: f64 = 5.0;
    pub(crate) const SEPARATION: f64 = 3.0;

    fn parameters(fluid_density: f64, image_system: bool) -> SystemParameters {
        SystemParameters {
            dt: 1e-3,
            tf: 1.0,
            num_steps_output: 10,
            fluid_density,
            image_system,
            ..SystemParameters::default()
        }
    }

    fn swimmer_at(height: f64) -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(0.0, 0.0, height),
            Vector3::new(SEPARATION, 0.0, height),
            Vector3::new(-SEPARATION, 0.0, height),
        ]
    }

    fn swimmer(amplitude: f64) -> CollinearSwimmer {
        CollinearSwimmer {
            amplitude,
            frequency: 2.0 * PI,
            phase_shift: 0.5,
            mean_separation: SEPARATION,
        }
    }

    /// A locater at `(0, 0, 5)` with satellites along `±x`, at rest.
    pub(crate) fn single_swimmer(amplitude: f64, fluid_density: f64) -> Snapshot {
        Snapshot {
            step: 0,
            parameters: parameters(fluid_density, false),
            swimmer: Some(swimmer(amplitude)),
            type_ids: vec![1, 0, 0],
            positions: swimmer_at(HEIGHT),
            velocities: vec![Vector3::zeros(); 3],
            accelerations: vec![Vector3::zeros(); 3],
            orientations: vec![Vector4::new(1.0, 0.0, 0.0, 0.0); 3],
        }
    }

    /// The single swimmer and its mirror image below `z = 0`.
    pub(crate) fn image_swimmer() -> Snapshot {
        let mut positions = swimmer_at(HEIGHT);
        positions.extend(swimmer_at(-HEIGHT));
        Snapshot {
            step: 0,
            parameters: parameters(1.0, true),
            swimmer: Some(swimmer(0.3)),
            type_ids: vec![1, 0, 0, 1, 0, 0],
            positions,
            velocities: vec![Vector3::zeros(); 6],
            accelerations: vec![Vector3::zeros(); 6],
            orientations: vec![Vector4::new(1.0, 0.0, 0.0, 0.0); 6],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_particles() -> Snapshot {
        Snapshot {
            step: 0,
            parameters: SystemParameters::default(),
            swimmer: None,
            type_ids: vec![1, 1],
            positions: vec![Vector3::zeros(), Vector3::new(3.0, 0.0, 0.0)],
            velocities: vec![Vector3::zeros(); 2],
            accelerations: vec![Vector3::zeros(); 2],
            orientations: vec![Vector4::new(1.0, 0.0, 0.0, 0.0); 2],
        }
    }

    #[test]
    fn consistent_snapshot_passes() {
        assert_eq!(two_particles().check_lengths(), Ok(()));
    }

    #[test]
    fn short_velocity_array_is_reported() {
        let mut snapshot = two_particles();
        snapshot.velocities.pop();
        assert_eq!(
            snapshot.check_lengths(),
            Err(ModelError::LengthMismatch {
                name: "velocities",
                expected: 2,
                found: 1
            })
        );
    }
}

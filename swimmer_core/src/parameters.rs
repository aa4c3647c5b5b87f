// swimmer_core/src/parameters.rs

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::types::SPATIAL_DIMENSIONS;

/// Physical and integration parameters of a run, as carried by the input snapshot.
///
/// Times `t`, `dt` and `tf` are dimensionless; `tau` converts them to the time used by the
/// kinematics and by the integrator step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemParameters {
    pub dimensions: u8,
    pub t: f64,
    pub dt: f64,
    pub tf: f64,
    /// Characteristic time.
    pub tau: f64,
    pub num_steps_output: u64,
    pub fluid_density: f64,
    pub particle_density: f64,
    pub wca_epsilon: f64,
    pub wca_sigma: f64,
    /// Second half of bodies and particles mirror the first half about `z = 0`.
    #[serde(default)]
    pub image_system: bool,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            dimensions: SPATIAL_DIMENSIONS,
            t: 0.0,
            dt: 1e-5,
            tf: 1.0,
            tau: 1.0,
            num_steps_output: 100,
            fluid_density: 1.0,
            particle_density: 1.0,
            wca_epsilon: 0.0,
            wca_sigma: 0.0,
            image_system: false,
        }
    }
}

impl SystemParameters {
    /// Rejects non-physical settings before anything is computed.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.dimensions != SPATIAL_DIMENSIONS {
            return Err(ModelError::UnsupportedDimensions {
                expected: SPATIAL_DIMENSIONS,
                found: self.dimensions,
            });
        }
        positive("dt", self.dt)?;
        positive("tf", self.tf)?;
        positive("tau", self.tau)?;
        positive("num_steps_output", self.num_steps_output as f64)?;
        if self.tf <= self.t {
            return Err(ModelError::FinalTimeNotAfterStart {
                t: self.t,
                tf: self.tf,
            });
        }
        non_negative("fluid_density", self.fluid_density)?;
        non_negative("particle_density", self.particle_density)?;
        non_negative("wca_epsilon", self.wca_epsilon)?;
        non_negative("wca_sigma", self.wca_sigma)?;
        Ok(())
    }

    /// Step length in the time units of the kinematics, `τ · dt`.
    pub fn dimensional_dt(&self) -> f64 {
        self.tau * self.dt
    }

    /// Number of integration steps needed to reach `tf`.
    pub fn total_steps(&self) -> u64 {
        ((self.tf - self.t) / self.dt).ceil().max(0.0) as u64
    }

    /// Steps between written frames.
    pub fn write_interval(&self) -> u64 {
        let total = self.total_steps();
        let outputs = self.num_steps_output.max(1);
        total.div_ceil(outputs).max(1)
    }
}

pub(crate) fn positive(name: &'static str, value: f64) -> Result<(), ModelError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ModelError::NonPositive { name, value })
    }
}

pub(crate) fn non_negative(name: &'static str, value: f64) -> Result<(), ModelError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::Negative { name, value })
    }
}

// swimmer_sim/src/config.rs

//! Run configuration: everything that is not carried by the input snapshot.
//!
//! Layers, last wins: built-in defaults, `swimmer.toml` in the working directory,
//! then `SWIMMER_`-prefixed environment variables (`__` separates sections, e.g.
//! `SWIMMER_COMPUTE__THREADS=4`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use swimmer_core::prelude::{FreeSwimmingMode, SystemSettings};

pub const CONFIG_FILE: &str = "swimmer.toml";
pub const ENV_PREFIX: &str = "SWIMMER_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub validation_mode: bool,
    pub quaternion_tolerance: f64,
    pub free_swimming: FreeSwimmingMode,
    /// Frame of the input file the run starts from.
    pub input_frame: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let system = SystemSettings::default();
        Self {
            validation_mode: system.validation_mode,
            quaternion_tolerance: system.quaternion_tolerance,
            free_swimming: system.free_swimming,
            input_frame: 0,
        }
    }
}

impl SimulationConfig {
    pub fn system_settings(&self) -> SystemSettings {
        SystemSettings {
            validation_mode: self.validation_mode,
            quaternion_tolerance: self.quaternion_tolerance,
            free_swimming: self.free_swimming,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComputeConfig {
    /// Share of the hardware threads given to the worker pool.
    pub thread_fraction: f64,
    /// Explicit pool size; overrides `thread_fraction`.
    pub threads: Option<usize>,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            thread_fraction: 0.25,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub file_name: String,
    /// Also write `f64` copies of the particle arrays.
    pub double_precision: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_name: "trajectory.bin".to_string(),
            double_precision: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Mirror the log into `<output_dir>/logs/swimmer.log`.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub simulation: SimulationConfig,
    pub compute: ComputeConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl RunConfig {
    /// The layered figment the configuration is extracted from.
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(RunConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads `swimmer.toml` from the working directory (if any) and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(config_file: &Path) -> Result<Self, figment::Error> {
        Self::figment(config_file).extract()
    }
}

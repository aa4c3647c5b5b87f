// swimmer_core/src/lib.rs

// This file defines the public modules of the library.
pub mod abstractions;
pub mod constraints;
pub mod error;
pub mod free_swimming;
pub mod hydrodynamics;
pub mod integrator;
pub mod kinematics;
pub mod layout;
pub mod parameters;
pub mod pipeline;
pub mod prelude;
pub mod rbm;
pub mod snapshot;
pub mod system;
pub mod types;
pub mod utils;

// swimmer_core/src/error.rs

use thiserror::Error;

/// Failures reading or writing trajectory snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk '{name}' not found in frame {frame}")]
    ChunkNotFound { name: String, frame: usize },

    #[error("chunk '{name}' holds {found} values, expected {expected}")]
    SizeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("chunk '{name}' stores {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("frame {frame} requested but the file holds {frames} frames")]
    FrameOutOfRange { frame: usize, frames: usize },

    #[error("not a trajectory file (bad header)")]
    InvalidHeader,

    #[error("corrupt trajectory file: {0}")]
    Corrupt(String),
}

/// Non-physical or inconsistent model configuration. Always fatal at initialization.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("the configuration holds no particles")]
    NoParticles,

    #[error("the configuration holds no bodies (no locater particles)")]
    NoBodies,

    #[error("only {expected}-dimensional systems are supported, got {found}")]
    UnsupportedDimensions { expected: u8, found: u8 },

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("final time {tf} must be greater than start time {t}")]
    FinalTimeNotAfterStart { t: f64, tf: f64 },

    #[error("particle 0 must be a locater, found satellite (type id {type_id})")]
    LocaterNotFirst { type_id: u32 },

    #[error("image system requires an even number of {what}, got {count}")]
    OddImageSystem { what: &'static str, count: usize },

    #[error("{name} has {found} entries, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("satellite particles present but no swimmer kinematics were provided")]
    MissingKinematics,

    #[error("system used before initialize() was called")]
    Uninitialized,
}

/// Fatal numerical failures. These point at a modeling or step-size problem.
#[derive(Debug, Error)]
pub enum NumericalError {
    #[error("symmetric eigen-decomposition of the effective mass matrix failed")]
    EigenDecomposition,

    #[error("effective mass matrix is not symmetric (max |M - Mᵀ| = {max_asymmetry:e})")]
    AsymmetricMass { max_asymmetry: f64 },

    #[error("effective mass matrix has eigenvalue {eigenvalue:e}, expected a positive value")]
    NonPositiveEigenvalue { eigenvalue: f64 },

    #[error("pseudo-inverse of the scaled constraint matrix failed: {0}")]
    PseudoInverse(&'static str),

    #[error("hydrodynamic force is not finite; particles may overlap")]
    NonFiniteForce,

    #[error("force-free momentum system is singular")]
    SingularMomentumSystem,

    #[error("body {body} quaternion norm drifted to {norm} (tolerance {tolerance:e})")]
    QuaternionDrift {
        body: usize,
        norm: f64,
        tolerance: f64,
    },
}

/// Umbrella error for every fallible operation of the library.
#[derive(Debug, Error)]
pub enum SwimmerError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Numerical(#[from] NumericalError),
}

impl From<std::io::Error> for SwimmerError {
    fn from(err: std::io::Error) -> Self {
        SwimmerError::Snapshot(SnapshotError::Io(err))
    }
}

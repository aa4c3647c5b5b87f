// swimmer_sim/src/io/trajectory.rs

//! Snapshot frames on top of the chunk container.

use nalgebra::{Vector3, Vector4};
use std::path::Path;
use tracing::{debug, warn};

use swimmer_core::prelude::{
    CollinearSwimmer, ModelError, Snapshot, SnapshotError, SnapshotSource, SwimmerError,
    SystemParameters,
};

use super::chunks::{ChunkReader, ChunkWriter};

/// Chunk names of a trajectory frame.
pub mod names {
    pub const STEP: &str = "log/configuration/step";
    pub const DIMENSIONS: &str = "configuration/dimensions";
    pub const NUM_PARTICLES: &str = "particles/N";
    pub const DT: &str = "log/integrator/dt";
    pub const T: &str = "log/integrator/t";
    pub const TF: &str = "log/integrator/tf";
    pub const TAU: &str = "log/integrator/tau";
    pub const NUM_STEPS_OUTPUT: &str = "log/integrator/num_steps_output";
    pub const FLUID_DENSITY: &str = "log/material_parameters/fluid_density";
    pub const PARTICLE_DENSITY: &str = "log/material_parameters/particle_density";
    pub const WCA_EPSILON: &str = "log/wca/epsilon";
    pub const WCA_SIGMA: &str = "log/wca/sigma";
    pub const IMAGE_SYSTEM: &str = "log/parameters/image_system";
    pub const TYPE_ID: &str = "particles/typeid";
    pub const POSITION: &str = "particles/position";
    pub const VELOCITY: &str = "particles/velocity";
    /// Particle accelerations. The name is historical.
    pub const ACCELERATION: &str = "particles/moment_inertia";
    pub const ORIENTATION: &str = "particles/orientation";
    pub const DOUBLE_POSITION: &str = "log/particles/double_position";
    pub const DOUBLE_VELOCITY: &str = "log/particles/double_velocity";
    pub const DOUBLE_ACCELERATION: &str = "log/particles/double_acceleration";
    pub const SWIMMER_U0: &str = "log/swimmer/U0";
    pub const SWIMMER_OMEGA: &str = "log/swimmer/omega";
    pub const SWIMMER_PHASE_SHIFT: &str = "log/swimmer/phase_shift";
    pub const SWIMMER_R_AVG: &str = "log/swimmer/R_avg";
}

/// `Ok(None)` for a chunk that is absent from the file.
fn optional<T>(result: Result<T, SnapshotError>) -> Result<Option<T>, SnapshotError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SnapshotError::ChunkNotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

fn vectors3<T: Copy + Into<f64>>(data: &[T]) -> Vec<Vector3<f64>> {
    data.chunks_exact(3)
        .map(|v| Vector3::new(v[0].into(), v[1].into(), v[2].into()))
        .collect()
}

fn flatten3(vectors: &[Vector3<f64>]) -> Vec<f32> {
    vectors.iter().flat_map(|v| v.iter().map(|&x| x as f32)).collect()
}

fn flatten3_f64(vectors: &[Vector3<f64>]) -> Vec<f64> {
    vectors.iter().flat_map(|v| v.iter().copied()).collect()
}

// --- Reader ---

pub struct TrajectoryReader {
    chunks: ChunkReader,
    /// Frame handed out by [`SnapshotSource::load_snapshot`].
    frame: usize,
}

impl TrajectoryReader {
    pub fn open(path: &Path, frame: usize) -> Result<Self, SnapshotError> {
        Ok(Self {
            chunks: ChunkReader::open(path)?,
            frame,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.chunks.num_frames()
    }

    /// Per-particle `N × 3` array, preferring the `f64` copy stored in the same frame.
    fn read_vectors(
        &mut self,
        frame: usize,
        single: &str,
        double: &str,
        n: usize,
    ) -> Result<Vec<Vector3<f64>>, SnapshotError> {
        if self.chunks.contains(frame, double) {
            let data = self.chunks.read_shaped::<f64>(frame, double, n, 3)?;
            return Ok(vectors3(&data));
        }
        let data = self.chunks.read_shaped::<f32>(frame, single, n, 3)?;
        Ok(vectors3(&data))
    }

    fn read_swimmer(&mut self, frame: usize) -> Result<Option<CollinearSwimmer>, SnapshotError> {
        let c = &mut self.chunks;
        let values = (
            optional(c.read_float(frame, names::SWIMMER_U0))?,
            optional(c.read_float(frame, names::SWIMMER_OMEGA))?,
            optional(c.read_float(frame, names::SWIMMER_PHASE_SHIFT))?,
            optional(c.read_float(frame, names::SWIMMER_R_AVG))?,
        );
        Ok(match values {
            (Some(amplitude), Some(frequency), Some(phase_shift), Some(mean_separation)) => {
                Some(CollinearSwimmer {
                    amplitude,
                    frequency,
                    phase_shift,
                    mean_separation,
                })
            }
            _ => None,
        })
    }

    /// Reads one frame into a [`Snapshot`].
    pub fn read_snapshot(&mut self, frame: usize) -> Result<Snapshot, SwimmerError> {
        let frames = self.num_frames();
        if frame >= frames {
            return Err(SnapshotError::FrameOutOfRange { frame, frames }.into());
        }

        let n = self.chunks.read_scalar::<u32>(frame, names::NUM_PARTICLES)? as usize;
        if n == 0 {
            return Err(ModelError::NoParticles.into());
        }

        let c = &mut self.chunks;
        let tau = optional(c.read_float(frame, names::TAU))?.unwrap_or_else(|| {
            warn!("No '{}' chunk; using tau = 1", names::TAU);
            1.0
        });
        let parameters = SystemParameters {
            dimensions: c.read_scalar::<u8>(frame, names::DIMENSIONS)?,
            t: c.read_float(frame, names::T)?,
            dt: c.read_float(frame, names::DT)?,
            tf: c.read_float(frame, names::TF)?,
            tau,
            num_steps_output: c.read_scalar::<u64>(frame, names::NUM_STEPS_OUTPUT)?,
            fluid_density: c.read_float(frame, names::FLUID_DENSITY)?,
            particle_density: c.read_float(frame, names::PARTICLE_DENSITY)?,
            wca_epsilon: c.read_float(frame, names::WCA_EPSILON)?,
            wca_sigma: c.read_float(frame, names::WCA_SIGMA)?,
            image_system: optional(c.read_scalar::<i32>(frame, names::IMAGE_SYSTEM))?
                .is_some_and(|flag| flag != 0),
        };
        let step = c.read_scalar::<u64>(frame, names::STEP)?;
        let type_ids = c.read_shaped::<u32>(frame, names::TYPE_ID, n, 1)?;

        let positions = self.read_vectors(frame, names::POSITION, names::DOUBLE_POSITION, n)?;
        let velocities = self.read_vectors(frame, names::VELOCITY, names::DOUBLE_VELOCITY, n)?;
        let accelerations = optional(self.read_vectors(
            frame,
            names::ACCELERATION,
            names::DOUBLE_ACCELERATION,
            n,
        ))?
        .unwrap_or_else(|| vec![Vector3::zeros(); n]);

        let orientations = match optional(self.chunks.read_shaped::<f32>(frame, names::ORIENTATION, n, 4))? {
            Some(data) => data
                .chunks_exact(4)
                .map(|q| Vector4::new(q[0] as f64, q[1] as f64, q[2] as f64, q[3] as f64))
                .collect(),
            None => vec![Vector4::new(1.0, 0.0, 0.0, 0.0); n],
        };
        let swimmer = self.read_swimmer(frame)?;

        debug!("Read frame {} (step {}, {} particles)", frame, step, n);
        Ok(Snapshot {
            step,
            parameters,
            swimmer,
            type_ids,
            positions,
            velocities,
            accelerations,
            orientations,
        })
    }
}

impl SnapshotSource for TrajectoryReader {
    fn load_snapshot(&mut self) -> Result<Snapshot, SwimmerError> {
        self.read_snapshot(self.frame)
    }
}

// --- Writer ---

pub struct TrajectoryWriter {
    chunks: ChunkWriter,
    double_precision: bool,
}

impl TrajectoryWriter {
    pub fn create(path: &Path, double_precision: bool) -> Result<Self, SnapshotError> {
        Ok(Self {
            chunks: ChunkWriter::create(path)?,
            double_precision,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.chunks.frames_written()
    }

    /// Appends `snapshot` as a new frame. Run constants go into the first frame only.
    pub fn write_frame(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let first = self.frames_written() == 0;
        let n = snapshot.num_particles();
        let p = &snapshot.parameters;
        let c = &mut self.chunks;

        c.begin_frame()?;
        c.write_scalar(names::STEP, snapshot.step)?;
        if first {
            c.write_scalar(names::DIMENSIONS, p.dimensions)?;
        }
        c.write_scalar(names::NUM_PARTICLES, n as u32)?;
        c.write_scalar(names::DT, p.dt as f32)?;
        c.write_scalar(names::T, p.t as f32)?;
        c.write_scalar(names::TF, p.tf as f32)?;
        c.write_scalar(names::TAU, p.tau as f32)?;
        c.write_scalar(names::NUM_STEPS_OUTPUT, p.num_steps_output)?;
        c.write_scalar(names::FLUID_DENSITY, p.fluid_density as f32)?;
        c.write_scalar(names::PARTICLE_DENSITY, p.particle_density as f32)?;
        c.write_scalar(names::WCA_EPSILON, p.wca_epsilon as f32)?;
        c.write_scalar(names::WCA_SIGMA, p.wca_sigma as f32)?;

        c.write_chunk(names::POSITION, n, 3, &flatten3(&snapshot.positions))?;
        c.write_chunk(names::VELOCITY, n, 3, &flatten3(&snapshot.velocities))?;
        c.write_chunk(names::ACCELERATION, n, 3, &flatten3(&snapshot.accelerations))?;
        let orientations: Vec<f32> = snapshot
            .orientations
            .iter()
            .flat_map(|q| q.iter().map(|&x| x as f32))
            .collect();
        c.write_chunk(names::ORIENTATION, n, 4, &orientations)?;

        if self.double_precision {
            c.write_chunk(names::DOUBLE_POSITION, n, 3, &flatten3_f64(&snapshot.positions))?;
            c.write_chunk(names::DOUBLE_VELOCITY, n, 3, &flatten3_f64(&snapshot.velocities))?;
            c.write_chunk(
                names::DOUBLE_ACCELERATION,
                n,
                3,
                &flatten3_f64(&snapshot.accelerations),
            )?;
        }

        if first {
            c.write_chunk(names::TYPE_ID, n, 1, &snapshot.type_ids)?;
            c.write_scalar(names::IMAGE_SYSTEM, p.image_system as i32)?;
            if let Some(swimmer) = &snapshot.swimmer {
                c.write_scalar(names::SWIMMER_U0, swimmer.amplitude as f32)?;
                c.write_scalar(names::SWIMMER_OMEGA, swimmer.frequency as f32)?;
                c.write_scalar(names::SWIMMER_PHASE_SHIFT, swimmer.phase_shift as f32)?;
                c.write_scalar(names::SWIMMER_R_AVG, swimmer.mean_separation as f32)?;
            }
        }
        c.end_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    const F32_EPSILON: f64 = 1e-6;

    fn snapshot(step: u64) -> Snapshot {
        Snapshot {
            step,
            parameters: SystemParameters {
                t: 0.1 * step as f64,
                dt: 1e-3,
                tf: 2.0,
                tau: 0.5,
                num_steps_output: 20,
                image_system: false,
                ..SystemParameters::default()
            },
            swimmer: Some(CollinearSwimmer {
                amplitude: 0.1,
                frequency: 6.25,
                phase_shift: 0.5,
                mean_separation: 3.0,
            }),
            type_ids: vec![1, 0, 0],
            positions: vec![
                Vector3::new(0.1, 0.2, 5.3),
                Vector3::new(3.1, 0.2, 5.3),
                Vector3::new(-2.9, 0.2, 5.3),
            ],
            velocities: vec![Vector3::new(0.01, 0.0, -0.02); 3],
            accelerations: vec![Vector3::new(1.0 / 3.0, 0.0, 2.0 / 7.0); 3],
            orientations: vec![Vector4::new(1.0, 0.0, 0.0, 0.0); 3],
        }
    }

    fn assert_vectors_close(a: &[Vector3<f64>], b: &[Vector3<f64>], epsilon: f64) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert_abs_diff_eq!(x, y, epsilon = epsilon);
        }
    }

    #[test]
    fn single_precision_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.bin");
        let original = snapshot(0);
        let mut writer = TrajectoryWriter::create(&path, false).unwrap();
        writer.write_frame(&original).unwrap();

        let mut reader = TrajectoryReader::open(&path, 0).unwrap();
        let read = reader.load_snapshot().unwrap();
        assert_eq!(read.step, 0);
        assert_eq!(read.type_ids, original.type_ids);
        assert_vectors_close(&read.positions, &original.positions, F32_EPSILON);
        assert_vectors_close(&read.velocities, &original.velocities, F32_EPSILON);
        assert_vectors_close(&read.accelerations, &original.accelerations, F32_EPSILON);
        assert_abs_diff_eq!(read.parameters.tau, 0.5);
        assert_abs_diff_eq!(read.parameters.dt, 1e-3, epsilon = 1e-9);
        let swimmer = read.swimmer.unwrap();
        assert_abs_diff_eq!(swimmer.frequency, 6.25);
    }

    #[test]
    fn double_precision_copies_are_preferred() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.bin");
        let original = snapshot(0);
        TrajectoryWriter::create(&path, true)
            .unwrap()
            .write_frame(&original)
            .unwrap();

        let read = TrajectoryReader::open(&path, 0)
            .unwrap()
            .read_snapshot(0)
            .unwrap();
        assert_eq!(read.positions, original.positions);
        assert_eq!(read.accelerations, original.accelerations);
    }

    #[test]
    fn later_frames_inherit_run_constants() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.bin");
        let mut writer = TrajectoryWriter::create(&path, true).unwrap();
        writer.write_frame(&snapshot(0)).unwrap();
        writer.write_frame(&snapshot(7)).unwrap();
        assert_eq!(writer.frames_written(), 2);

        let mut reader = TrajectoryReader::open(&path, 1).unwrap();
        assert_eq!(reader.num_frames(), 2);
        let read = reader.load_snapshot().unwrap();
        assert_eq!(read.step, 7);
        assert_eq!(read.parameters.dimensions, 3);
        assert_eq!(read.type_ids, vec![1, 0, 0]);
        assert!(read.swimmer.is_some());
        assert_abs_diff_eq!(read.parameters.t, 0.7, epsilon = F32_EPSILON);
    }

    #[test]
    fn frame_past_the_end_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.bin");
        TrajectoryWriter::create(&path, false)
            .unwrap()
            .write_frame(&snapshot(0))
            .unwrap();
        let err = TrajectoryReader::open(&path, 3)
            .unwrap()
            .load_snapshot()
            .unwrap_err();
        assert!(matches!(
            err,
            SwimmerError::Snapshot(SnapshotError::FrameOutOfRange { frame: 3, frames: 1 })
        ));
    }

    #[test]
    fn particle_count_must_match_arrays() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.bin");
        let mut chunks = ChunkWriter::create(&path).unwrap();
        chunks.begin_frame().unwrap();
        chunks.write_scalar(names::NUM_PARTICLES, 4u32).unwrap();
        chunks.write_scalar(names::DIMENSIONS, 3u8).unwrap();
        for name in [
            names::T,
            names::DT,
            names::TF,
            names::TAU,
            names::FLUID_DENSITY,
            names::PARTICLE_DENSITY,
            names::WCA_EPSILON,
            names::WCA_SIGMA,
        ] {
            chunks.write_scalar(name, 1.0f32).unwrap();
        }
        chunks.write_scalar(names::NUM_STEPS_OUTPUT, 10u64).unwrap();
        chunks.write_scalar(names::STEP, 0u64).unwrap();
        chunks.write_chunk(names::TYPE_ID, 4, 1, &[1u32, 0, 0, 0]).unwrap();
        chunks.write_chunk(names::POSITION, 3, 3, &[0.0f32; 9]).unwrap();
        chunks.end_frame().unwrap();

        let err = TrajectoryReader::open(&path, 0)
            .unwrap()
            .load_snapshot()
            .unwrap_err();
        assert!(matches!(
            err,
            SwimmerError::Snapshot(SnapshotError::SizeMismatch { expected: 12, found: 9, .. })
        ));
    }

    #[test]
    fn zero_particles_is_a_model_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.bin");
        let mut chunks = ChunkWriter::create(&path).unwrap();
        chunks.begin_frame().unwrap();
        chunks.write_scalar(names::NUM_PARTICLES, 0u32).unwrap();
        chunks.end_frame().unwrap();

        let err = TrajectoryReader::open(&path, 0)
            .unwrap()
            .load_snapshot()
            .unwrap_err();
        assert!(matches!(err, SwimmerError::Model(ModelError::NoParticles)));
    }
}

// swimmer_core/src/layout.rs

//! Particle ↔ body bookkeeping. Particles are stored body by body: each body's
//! locater comes first, followed by its satellites.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Type id marking a locater particle in snapshot data.
pub const LOCATER_TYPE_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleRole {
    /// The reference particle of a body.
    Locater,
    /// An articulated particle; `ordinal` counts satellites inside the body from 0.
    Satellite { ordinal: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleLayout {
    type_ids: Vec<u32>,
    roles: Vec<ParticleRole>,
    /// Owning body of each particle.
    body_of: Vec<usize>,
    /// Particle index of each body's locater.
    locaters: Vec<usize>,
    image_system: bool,
}

impl ParticleLayout {
    /// Derives roles and groups from per-particle type ids.
    ///
    /// The owning body of particle `p` is the number of locaters in `[0, p]` minus one,
    /// so the first particle must be a locater.
    pub fn from_type_ids(type_ids: &[u32], image_system: bool) -> Result<Self, ModelError> {
        let first = *type_ids.first().ok_or(ModelError::NoParticles)?;
        if first != LOCATER_TYPE_ID {
            return Err(ModelError::LocaterNotFirst { type_id: first });
        }

        let mut roles = Vec::with_capacity(type_ids.len());
        let mut body_of = Vec::with_capacity(type_ids.len());
        let mut locaters = Vec::new();
        let mut ordinal = 0;

        for (p, &type_id) in type_ids.iter().enumerate() {
            if type_id == LOCATER_TYPE_ID {
                locaters.push(p);
                ordinal = 0;
                roles.push(ParticleRole::Locater);
            } else {
                roles.push(ParticleRole::Satellite { ordinal });
                ordinal += 1;
            }
            body_of.push(locaters.len() - 1);
        }

        if image_system {
            if type_ids.len() % 2 != 0 {
                return Err(ModelError::OddImageSystem {
                    what: "particles",
                    count: type_ids.len(),
                });
            }
            if locaters.len() % 2 != 0 {
                return Err(ModelError::OddImageSystem {
                    what: "bodies",
                    count: locaters.len(),
                });
            }
        }

        Ok(Self {
            type_ids: type_ids.to_vec(),
            roles,
            body_of,
            locaters,
            image_system,
        })
    }

    pub fn num_particles(&self) -> usize {
        self.roles.len()
    }

    pub fn num_bodies(&self) -> usize {
        self.locaters.len()
    }

    pub fn image_system(&self) -> bool {
        self.image_system
    }

    /// Bodies whose motion is solved for; the rest mirror them.
    pub fn num_real_bodies(&self) -> usize {
        if self.image_system {
            self.num_bodies() / 2
        } else {
            self.num_bodies()
        }
    }

    /// One unit-quaternion constraint per real body.
    pub fn num_constraints(&self) -> usize {
        self.num_real_bodies()
    }

    pub fn type_ids(&self) -> &[u32] {
        &self.type_ids
    }

    pub fn role(&self, particle: usize) -> ParticleRole {
        self.roles[particle]
    }

    pub fn body_of(&self, particle: usize) -> usize {
        self.body_of[particle]
    }

    pub fn locater_of_body(&self, body: usize) -> usize {
        self.locaters[body]
    }

    pub fn is_locater(&self, particle: usize) -> bool {
        matches!(self.roles[particle], ParticleRole::Locater)
    }
}

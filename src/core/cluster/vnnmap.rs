// src/core/cluster/vnnmap.rs

//! The virtual node number map, recovery mode and generation counter.

use crate::core::protocol::{INVALID_GENERATION, VnnMapData};
use rand::{Rng, SeedableRng};
use strum_macros::{Display, FromRepr};

/// Whether the cluster is serving normally or in the middle of a recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[strum(serialize_all = "UPPERCASE")]
#[repr(u32)]
pub enum RecoveryMode {
    Normal = 0,
    Active = 1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnnMap {
    pub recmode: RecoveryMode,
    pub generation: u32,
    /// Lmaster PNN for each hash slot.
    pub map: Vec<u32>,
}

impl Default for VnnMap {
    fn default() -> Self {
        Self {
            recmode: RecoveryMode::Active,
            generation: INVALID_GENERATION,
            map: Vec::new(),
        }
    }
}

impl VnnMap {
    pub fn snapshot(&self) -> VnnMapData {
        VnnMapData {
            generation: self.generation,
            map: self.map.clone(),
        }
    }

    /// Replaces the generation with a fresh one.
    pub fn roll_generation(&mut self) {
        self.generation = next_generation(self.generation);
    }
}

/// Picks a random generation that differs from `old` and is never the invalid
/// sentinel.
pub fn next_generation(old: u32) -> u32 {
    let mut rng = rand::rngs::SmallRng::from_entropy();
    next_generation_with(&mut rng, old)
}

pub fn next_generation_with<R: Rng + ?Sized>(rng: &mut R, old: u32) -> u32 {
    loop {
        let generation: u32 = rng.r#gen();
        if generation != INVALID_GENERATION && generation != old {
            return generation;
        }
    }
}

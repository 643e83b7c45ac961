use crate::geo::LatLon;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named place the player has to find
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub location: LatLon,
}

impl Target {
    pub fn new(name: impl Into<String>, location: LatLon) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}

/// Targets still available to be drawn in a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePool {
    targets: Vec<Target>,
}

impl CandidatePool {
    /// Builds a pool, keeping the first target for each name
    pub fn new(targets: Vec<Target>) -> Self {
        let mut seen = HashSet::new();
        let targets: Vec<Target> = targets
            .into_iter()
            .filter(|t| seen.insert(t.name.clone()))
            .collect();

        Self { targets }
    }

    pub fn size(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn remaining(&self) -> &[Target] {
        &self.targets
    }

    /// Draws one target uniformly at random and removes it from the pool
    pub fn pick_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Target> {
        if self.targets.is_empty() {
            return None;
        }

        let idx = rng.gen_range(0..self.targets.len());
        Some(self.targets.remove(idx))
    }
}

impl From<Vec<Target>> for CandidatePool {
    fn from(targets: Vec<Target>) -> Self {
        Self::new(targets)
    }
}

//! Serializable world snapshots with BLAKE3 state hashing.
//!
//! The hash is what tests use to assert that a tracked operation did (or did
//! not) touch the world: capture the hash, run the operation, compare.

use serde::{Deserialize, Serialize};

use crate::block::{BlockPos, BlockState};
use crate::entity::EntityRecord;
use crate::world::World;

/// Every non-air block and every live entity, in deterministic order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Non-air blocks sorted by position.
    pub blocks: Vec<(BlockPos, BlockState)>,
    /// Live entities sorted by handle.
    pub entities: Vec<EntityRecord>,
}

impl WorldSnapshot {
    /// BLAKE3 hex digest (64 lowercase hex chars) of the canonical JSON form.
    pub fn hash(&self) -> String {
        // Positions and handles come out of BTreeMaps, so the encoding is
        // canonical without further sorting.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

impl World {
    /// Capture every block and entity.
    pub fn capture_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            blocks: self
                .blocks
                .iter()
                .map(|(pos, state)| (*pos, state.clone()))
                .collect(),
            entities: self.entities.values().cloned().collect(),
        }
    }

    /// Hash of the current world state.
    pub fn state_hash(&self) -> String {
        self.capture_snapshot().hash()
    }
}

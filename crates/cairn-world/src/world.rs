//! In-memory block and entity store.
//!
//! [`World`] applies every write it is given and knows nothing about phases.
//! Whether a write is captured, ignored or applied is decided by the mutation
//! hooks in front of it.

use std::collections::BTreeMap;

use tracing::trace;

use crate::block::{BlockPos, BlockSnapshot, BlockState};
use crate::entity::{EntityAllocator, EntityId, EntityKind, EntityRecord};
use crate::WorldError;

/// Blocks keyed by position (absent = air) plus live entities.
#[derive(Debug, Default)]
pub struct World {
    pub(crate) blocks: BTreeMap<BlockPos, BlockState>,
    pub(crate) entities: BTreeMap<EntityId, EntityRecord>,
    allocator: EntityAllocator,
}

impl World {
    /// Create an empty world. Every position reads as air.
    pub fn new() -> Self {
        Self::default()
    }

    // -- blocks -------------------------------------------------------------

    /// The state at `pos`.
    pub fn block(&self, pos: BlockPos) -> BlockState {
        self.blocks.get(&pos).cloned().unwrap_or_else(BlockState::air)
    }

    /// Write `state` at `pos`, returning the state it replaced.
    pub fn set_block(&mut self, pos: BlockPos, state: BlockState) -> BlockState {
        trace!(%pos, %state, "block write");
        let previous = if state.is_air() {
            self.blocks.remove(&pos)
        } else {
            self.blocks.insert(pos, state)
        };
        previous.unwrap_or_else(BlockState::air)
    }

    /// Write a snapshot's state back to its position.
    pub fn restore(&mut self, snapshot: &BlockSnapshot) -> BlockState {
        self.set_block(snapshot.pos, snapshot.state.clone())
    }

    /// Number of non-air blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    // -- entities -----------------------------------------------------------

    /// Spawn an entity and return its handle.
    pub fn spawn(&mut self, kind: EntityKind, pos: [f64; 3]) -> EntityId {
        let id = self.allocator.allocate();
        trace!(entity = %id, kind = kind.type_name(), "entity spawned");
        self.entities.insert(id, EntityRecord { id, kind, pos });
        id
    }

    /// Remove an entity, returning its record.
    pub fn despawn(&mut self, id: EntityId) -> Result<EntityRecord, WorldError> {
        if !self.allocator.free(id) {
            return Err(WorldError::StaleEntity { entity: id });
        }
        self.entities
            .remove(&id)
            .ok_or(WorldError::StaleEntity { entity: id })
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.allocator.is_alive(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// All live entities in handle order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.values()
    }

    /// Entities whose position lies within `radius` of `center`.
    pub fn entities_within(&self, center: [f64; 3], radius: f64) -> Vec<EntityId> {
        let r2 = radius * radius;
        self.entities
            .values()
            .filter(|record| {
                let d: f64 = record
                    .pos
                    .iter()
                    .zip(center.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                d <= r2
            })
            .map(|record| record.id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockChangeFlags;

    #[test]
    fn unset_positions_read_as_air() {
        let world = World::new();
        assert!(world.block(BlockPos::new(3, 4, 5)).is_air());
        assert_eq!(world.block_count(), 0);
    }

    #[test]
    fn set_block_returns_previous_and_air_clears() {
        let mut world = World::new();
        let pos = BlockPos::new(0, 64, 0);
        assert!(world.set_block(pos, BlockState::of("stone")).is_air());
        assert_eq!(world.set_block(pos, BlockState::air()), BlockState::of("stone"));
        assert_eq!(world.block_count(), 0);
    }

    #[test]
    fn restore_writes_snapshot_state() {
        let mut world = World::new();
        let pos = BlockPos::new(1, 1, 1);
        let snap = BlockSnapshot::new(pos, BlockState::of("leaves"), BlockChangeFlags::ALL);
        world.restore(&snap);
        assert_eq!(world.block(pos), BlockState::of("leaves"));
    }

    #[test]
    fn despawn_twice_is_stale() {
        let mut world = World::new();
        let e = world.spawn(EntityKind::Living("cow".to_owned()), [0.0, 64.0, 0.0]);
        assert!(world.is_alive(e));
        let record = world.despawn(e).unwrap();
        assert_eq!(record.kind, EntityKind::Living("cow".to_owned()));
        assert!(matches!(
            world.despawn(e),
            Err(WorldError::StaleEntity { entity }) if entity == e
        ));
    }

    #[test]
    fn entities_within_radius() {
        let mut world = World::new();
        let near = world.spawn(EntityKind::Orb(1), [0.0, 0.0, 0.0]);
        let _far = world.spawn(EntityKind::Orb(1), [10.0, 0.0, 0.0]);
        assert_eq!(world.entities_within([1.0, 0.0, 0.0], 2.0), vec![near]);
    }
}

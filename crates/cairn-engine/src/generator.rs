//! Chunk population.
//!
//! A [`ChunkGenerator`] decorates one chunk at a time through a
//! [`GenerationRegion`], which routes every write through the tracker so
//! spawns made during population are captured under `TerrainGeneration` and
//! attributed to the chunk.

use std::collections::BTreeMap;

use cairn_tracking::tracker::CauseTracker;
use cairn_world::block::{BlockChangeFlags, BlockPos, BlockState, BlockTransition, ChunkPos};
use cairn_world::entity::{EntityId, EntityKind};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::debug;

use crate::server::WorldState;
use crate::EngineError;

/// Width of a chunk along x and z.
pub const CHUNK_SIZE: i32 = 16;

// ---------------------------------------------------------------------------
// ChunkGenerator
// ---------------------------------------------------------------------------

/// Something that can populate a chunk.
pub trait ChunkGenerator {
    /// Recorded as the `ChunkProvider` cause.
    fn name(&self) -> &str;

    fn populate(&mut self, region: &mut GenerationRegion<'_>) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// GenerationRegion
// ---------------------------------------------------------------------------

/// Write access to a single chunk while it is being populated.
pub struct GenerationRegion<'a> {
    chunk: ChunkPos,
    tracker: &'a mut CauseTracker,
    state: &'a mut WorldState,
}

impl<'a> GenerationRegion<'a> {
    pub fn new(chunk: ChunkPos, tracker: &'a mut CauseTracker, state: &'a mut WorldState) -> Self {
        Self {
            chunk,
            tracker,
            state,
        }
    }

    pub fn chunk(&self) -> ChunkPos {
        self.chunk
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        pos.chunk() == self.chunk
    }

    pub fn block(&self, pos: BlockPos) -> BlockState {
        self.state.world.block(pos)
    }

    /// Write a block inside the chunk.
    pub fn set_block(
        &mut self,
        pos: BlockPos,
        block: BlockState,
    ) -> Result<BlockTransition, EngineError> {
        if !self.contains(pos) {
            return Err(EngineError::OutsideChunk {
                pos,
                chunk: self.chunk,
            });
        }
        Ok(self
            .state
            .set_block_state(self.tracker, pos, block, BlockChangeFlags::CLIENT_SYNC))
    }

    /// Spawn an entity. Population captures spawns, so this normally
    /// returns `None` and the entity appears once the chunk is finalized.
    pub fn spawn_entity(&mut self, kind: EntityKind, pos: [f64; 3]) -> Option<EntityId> {
        self.state.spawn_entity(self.tracker, kind, pos)
    }
}

// ---------------------------------------------------------------------------
// SeededPopulator
// ---------------------------------------------------------------------------

const PASSIVE_MOBS: [&str; 3] = ["cow", "pig", "sheep"];

/// Deterministic terrain decorator.
///
/// Each chunk gets its own PCG stream derived from the world seed and the
/// chunk coordinates, so a chunk always populates identically no matter the
/// order chunks are visited in.
#[derive(Debug, Clone)]
pub struct SeededPopulator {
    name: String,
    seed: u64,
    /// Base ground height. Columns rise up to three blocks above it.
    pub sea_level: i32,
    /// Upper bound on trees per chunk.
    pub max_trees: u32,
    /// Upper bound on passive mobs per chunk.
    pub max_mobs: u32,
}

impl SeededPopulator {
    pub fn new(seed: u64) -> Self {
        Self {
            name: "seeded".to_owned(),
            seed,
            sea_level: 62,
            max_trees: 2,
            max_mobs: 3,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn rng_for(&self, chunk: ChunkPos) -> Pcg64 {
        let key = ((chunk.x as u32 as u64) << 32) | chunk.z as u32 as u64;
        Pcg64::seed_from_u64(self.seed ^ key.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

impl ChunkGenerator for SeededPopulator {
    fn name(&self) -> &str {
        &self.name
    }

    fn populate(&mut self, region: &mut GenerationRegion<'_>) -> Result<(), EngineError> {
        let chunk = region.chunk();
        let origin = chunk.origin(0);
        let mut rng = self.rng_for(chunk);

        // -- ground ---------------------------------------------------------
        let mut heights = BTreeMap::new();
        for dx in 0..CHUNK_SIZE {
            for dz in 0..CHUNK_SIZE {
                let (x, z) = (origin.x + dx, origin.z + dz);
                let height = self.sea_level + rng.gen_range(0..4);
                region.set_block(BlockPos::new(x, height - 1, z), BlockState::of("dirt"))?;
                region.set_block(BlockPos::new(x, height, z), BlockState::of("grass"))?;
                heights.insert((dx, dz), height);
            }
        }

        // -- trees ----------------------------------------------------------
        let trees = rng.gen_range(0..=self.max_trees);
        for _ in 0..trees {
            let (dx, dz) = (rng.gen_range(2..CHUNK_SIZE - 2), rng.gen_range(2..CHUNK_SIZE - 2));
            let (x, z) = (origin.x + dx, origin.z + dz);
            let ground = heights.get(&(dx, dz)).copied().unwrap_or(self.sea_level);
            for y in ground + 1..=ground + 3 {
                region.set_block(BlockPos::new(x, y, z), BlockState::of("log"))?;
            }
            region.set_block(BlockPos::new(x, ground + 4, z), BlockState::of("leaves"))?;
        }

        // -- mobs -----------------------------------------------------------
        let mobs = rng.gen_range(1..=self.max_mobs.max(1));
        for _ in 0..mobs {
            let (dx, dz) = (rng.gen_range(0..CHUNK_SIZE), rng.gen_range(0..CHUNK_SIZE));
            let ground = heights.get(&(dx, dz)).copied().unwrap_or(self.sea_level);
            let species = PASSIVE_MOBS[rng.gen_range(0..PASSIVE_MOBS.len())];
            let pos = BlockPos::new(origin.x + dx, ground + 1, origin.z + dz).center();
            region.spawn_entity(EntityKind::Living(species.to_owned()), pos);
        }

        debug!(%chunk, trees, mobs, "chunk decorated");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

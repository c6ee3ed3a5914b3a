//! Cairn World -- the block and entity vocabulary shared by the cause tracker.
//!
//! This crate defines what the phase engine captures and what the engine
//! mutates: block positions, block states, change flags, snapshots tagged
//! with a [`CaptureType`](block::CaptureType), generational entity handles,
//! and a small in-memory [`World`](world::World) store with BLAKE3 state
//! hashing.
//!
//! # Quick Start
//!
//! ```
//! use cairn_world::prelude::*;
//!
//! let mut world = World::new();
//! let pos = BlockPos::new(0, 64, 0);
//! world.set_block(pos, BlockState::of("stone"));
//!
//! let original = BlockSnapshot::new(pos, world.block(pos), BlockChangeFlags::ALL)
//!     .tagged(CaptureType::Decay);
//! assert_eq!(original.state, BlockState::of("stone"));
//! ```

#![deny(unsafe_code)]

pub mod block;
pub mod entity;
pub mod snapshot;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::block::{
        BlockChangeFlags, BlockPos, BlockSnapshot, BlockState, BlockTransition, BlockType,
        CaptureType, ChunkPos,
    };
    pub use crate::entity::{EntityAllocator, EntityId, EntityKind, EntityRecord};
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::world::World;
    pub use crate::WorldError;
}

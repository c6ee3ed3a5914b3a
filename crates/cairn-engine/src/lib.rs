//! Cairn Engine -- world simulation driven through the cause tracker.
//!
//! This crate builds on [`cairn_tracking`] to provide everything around the
//! phase engine: a per-world [`WorldServer`](server::WorldServer) that owns
//! one tracker, the mutation hooks that consult it, the finalizers that fire
//! notifications into an [`EventJournal`](events::EventJournal), chunk
//! population, entity death handling and a fixed-timestep tick loop.
//!
//! # Quick Start
//!
//! ```
//! use cairn_engine::prelude::*;
//!
//! let mut server = WorldServer::new(World::new());
//! let pos = BlockPos::new(0, 64, 0);
//! server.set_block_state(pos, BlockState::of("leaves"), BlockChangeFlags::ALL);
//!
//! assert!(server.decay_block(pos)?);
//! assert!(server.state.world.block(pos).is_air());
//! assert_eq!(server.state.journal.block_changes().count(), 1);
//! # Ok::<(), EngineError>(())
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod events;
pub mod generator;
pub mod logging;
pub mod server;
pub mod tick;

use cairn_tracking::TrackingError;
use cairn_world::block::{BlockPos, ChunkPos};
use cairn_world::WorldError;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the tracking crate for convenience.
pub use cairn_tracking;

/// Re-export the world crate for convenience.
pub use cairn_world;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while driving a world.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    World(#[from] WorldError),

    /// A system returned while a phase it pushed was still open.
    #[error("system `{system}` left the phase stack at depth {depth}")]
    LeakedPhase { system: String, depth: usize },

    #[error("{pos} lies outside chunk {chunk}")]
    OutsideChunk { pos: BlockPos, chunk: ChunkPos },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use cairn_tracking::prelude::*;
    pub use cairn_world::prelude::*;

    pub use crate::config::EngineConfig;
    pub use crate::events::{
        CauseSummary, EventFilter, EventJournal, EventSource, SpawnReason, WorldEvent,
        WorldEventKind,
    };
    pub use crate::generator::{ChunkGenerator, GenerationRegion, SeededPopulator};
    pub use crate::server::{DeathLoot, WorldServer, WorldState};
    pub use crate::tick::{SystemFn, TickConfig, TickDiagnostics, TickLoop};
    pub use crate::EngineError;
}

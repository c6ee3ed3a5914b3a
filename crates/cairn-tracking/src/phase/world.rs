//! World-level phases.
//!
//! Chunk population runs under [`WorldPhaseState::TerrainGeneration`]. Blocks
//! placed by a populator are written straight through; entities it spawns
//! (passive mobs, generated loot) are captured and handed to
//! [`UnwindHost::process_generated`] once population completes.

use std::rc::Rc;

use cairn_world::block::ChunkPos;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{BlockPhaseState, PhasePolicy, PhaseState};
use crate::cause::keys;
use crate::context::PhaseContext;
use crate::function::UnwindHost;
use crate::tracker::CauseTracker;
use crate::TrackingError;

/// States of the world phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldPhaseState {
    /// A chunk column is being populated by a generator.
    TerrainGeneration,
}

impl WorldPhaseState {
    /// Population may decay leaves it placed and fire neighbour updates.
    pub fn can_switch_to(self, candidate: PhaseState) -> bool {
        matches!(
            candidate,
            PhaseState::Block(BlockPhaseState::BlockDecay)
                | PhaseState::Block(BlockPhaseState::PostNotificationEvent)
        )
    }
}

/// Policy record for [`WorldPhaseState`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldPhase;

impl PhasePolicy for WorldPhase {
    type State = WorldPhaseState;

    fn requires_block_capturing(&self, _state: WorldPhaseState) -> bool {
        false
    }

    fn captures_entity_spawns(&self, _state: WorldPhaseState) -> bool {
        true
    }

    fn unwind(
        &self,
        tracker: &mut CauseTracker,
        state: WorldPhaseState,
        mut context: PhaseContext,
        host: &mut dyn UnwindHost,
    ) -> Result<(), TrackingError> {
        let chunk = *context
            .first_named::<ChunkPos>(keys::CHUNK_POS)
            .ok_or_else(|| {
                TrackingError::missing_cause(keys::CHUNK_POS, "populated chunk not found", &context)
            })?;

        let mut spawns = context.take_captured_entities();
        spawns.append(&mut context.take_captured_items());
        trace!(?state, %chunk, spawns = spawns.len(), "unwinding generation");
        if spawns.is_empty() {
            return Ok(());
        }
        let context = Rc::new(context);
        host.process_generated(chunk, tracker, &context, spawns)
    }
}

//! Block-level phases: decay, restoration and post-notification.
//!
//! Block operations are atomic leaves: no block state allows another phase
//! to be pushed on top of it. The block phase never fires anything itself on
//! unwind; its captures belong to whichever caller pushed it and reads them
//! back before completing.

use cairn_world::block::{BlockTransition, CaptureType};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{capture_paired, BlockChange, PhasePolicy, PhaseState};
use crate::context::PhaseContext;
use crate::function::UnwindHost;
use crate::tracker::CauseTracker;
use crate::TrackingError;

/// States of the block phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockPhaseState {
    /// A block is decaying away (leaves, fire burning out).
    BlockDecay,
    /// Previously captured snapshots are being written back.
    RestoringBlocks,
    /// Neighbour notifications fired after a block change.
    PostNotificationEvent,
}

impl BlockPhaseState {
    pub fn can_switch_to(self, _candidate: PhaseState) -> bool {
        false
    }
}

/// Policy record for [`BlockPhaseState`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockPhase;

impl PhasePolicy for BlockPhase {
    type State = BlockPhaseState;

    /// Restoration writes apply directly.
    fn requires_block_capturing(&self, state: BlockPhaseState) -> bool {
        state != BlockPhaseState::RestoringBlocks
    }

    fn ignores_entity_spawns(&self, state: BlockPhaseState) -> bool {
        state == BlockPhaseState::RestoringBlocks
    }

    /// Only the final removal of a decaying block is kept.
    fn capture_block_change(
        &self,
        state: BlockPhaseState,
        change: BlockChange<'_>,
        context: &mut PhaseContext,
    ) -> BlockTransition {
        if !change.new.is_air() {
            return capture_paired(change, context);
        }
        let original = change.original().tagged(CaptureType::Decay);
        trace!(?state, pos = %change.pos, block = %change.current, "captured decay");
        context.captured_blocks_mut().push(original.clone());
        BlockTransition {
            original,
            replacement: None,
        }
    }

    fn unwind(
        &self,
        _tracker: &mut CauseTracker,
        _state: BlockPhaseState,
        _context: PhaseContext,
        _host: &mut dyn UnwindHost,
    ) -> Result<(), TrackingError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

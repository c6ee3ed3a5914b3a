//! General phases: the idle baseline and post-unwind spawning.

use serde::{Deserialize, Serialize};

use super::{PhasePolicy, PhaseState};
use crate::context::PhaseContext;
use crate::function::UnwindHost;
use crate::tracker::CauseTracker;
use crate::TrackingError;

/// States of the general phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneralPhaseState {
    /// Nothing tracked is in progress. Sits at the bottom of every stack.
    Idle,
    /// A finalizer is applying effects it took out of an unwound context.
    PostUnwinding,
}

impl GeneralPhaseState {
    pub fn is_busy(self) -> bool {
        self != GeneralPhaseState::Idle
    }

    pub fn can_switch_to(self, candidate: PhaseState) -> bool {
        match self {
            GeneralPhaseState::Idle => candidate != PhaseState::IDLE,
            GeneralPhaseState::PostUnwinding => matches!(
                candidate,
                PhaseState::Block(_)
                    | PhaseState::Entity(_)
                    | PhaseState::General(GeneralPhaseState::PostUnwinding)
            ),
        }
    }
}

/// Policy record for [`GeneralPhaseState`]s.
///
/// Neither state captures anything: writes and spawns made at baseline or
/// while applying unwound effects go straight to the world.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralPhase;

impl PhasePolicy for GeneralPhase {
    type State = GeneralPhaseState;

    fn requires_block_capturing(&self, _state: GeneralPhaseState) -> bool {
        false
    }

    fn unwind(
        &self,
        _tracker: &mut CauseTracker,
        _state: GeneralPhaseState,
        _context: PhaseContext,
        _host: &mut dyn UnwindHost,
    ) -> Result<(), TrackingError> {
        Ok(())
    }
}

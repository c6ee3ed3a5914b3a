//! Phase states and the tracking phases that own them.
//!
//! A [`PhaseState`] names one kind of in-progress operation. Every state
//! belongs to exactly one [`TrackingPhase`], the policy record that decides
//! whether block writes are captured, whether entity spawns are ignored or
//! captured, and what happens when the state's frame is popped.
//!
//! Both are closed enums. Dispatch is an exhaustive `match`, so adding a
//! state forces every policy question to be answered for it.
//!
//! | Phase | States |
//! |-------|--------|
//! | [`General`](TrackingPhase::General) | `Idle` (baseline), `PostUnwinding` |
//! | [`Block`](TrackingPhase::Block) | `BlockDecay`, `RestoringBlocks`, `PostNotificationEvent` |
//! | [`Entity`](TrackingPhase::Entity) | `DeathDropsSpawning`, `DeathUpdate` |
//! | [`World`](TrackingPhase::World) | `TerrainGeneration` |

pub mod block;
pub mod entity;
pub mod general;
pub mod world;

use std::fmt;

use cairn_world::block::{
    BlockChangeFlags, BlockPos, BlockSnapshot, BlockState, BlockTransition, CaptureType,
};
use serde::{Deserialize, Serialize};

use crate::context::PhaseContext;
use crate::function::UnwindHost;
use crate::tracker::CauseTracker;
use crate::TrackingError;

pub use block::{BlockPhase, BlockPhaseState};
pub use entity::{EntityPhase, EntityPhaseState};
pub use general::{GeneralPhase, GeneralPhaseState};
pub use world::{WorldPhase, WorldPhaseState};

// ---------------------------------------------------------------------------
// PhaseState
// ---------------------------------------------------------------------------

/// One kind of tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseState {
    General(GeneralPhaseState),
    Block(BlockPhaseState),
    Entity(EntityPhaseState),
    World(WorldPhaseState),
}

impl PhaseState {
    /// The baseline state every stack starts with.
    pub const IDLE: PhaseState = PhaseState::General(GeneralPhaseState::Idle);

    /// The tracking phase owning this state.
    pub fn phase(self) -> TrackingPhase {
        match self {
            PhaseState::General(_) => TrackingPhase::General,
            PhaseState::Block(_) => TrackingPhase::Block,
            PhaseState::Entity(_) => TrackingPhase::Entity,
            PhaseState::World(_) => TrackingPhase::World,
        }
    }

    /// Whether this state represents work rather than an idle baseline.
    pub fn is_busy(self) -> bool {
        match self {
            PhaseState::General(state) => state.is_busy(),
            PhaseState::Block(_) | PhaseState::Entity(_) | PhaseState::World(_) => true,
        }
    }

    /// Whether this state has bespoke completion semantics instead of the
    /// generic capture-then-fire flow. No current state is managed.
    pub fn is_managed(self) -> bool {
        match self {
            PhaseState::General(_)
            | PhaseState::Block(_)
            | PhaseState::Entity(_)
            | PhaseState::World(_) => false,
        }
    }

    /// Whether `candidate` may be pushed while this state is on top.
    pub fn can_switch_to(self, candidate: PhaseState) -> bool {
        match self {
            PhaseState::General(state) => state.can_switch_to(candidate),
            PhaseState::Block(state) => state.can_switch_to(candidate),
            PhaseState::Entity(state) => state.can_switch_to(candidate),
            PhaseState::World(state) => state.can_switch_to(candidate),
        }
    }

    /// Whether collision candidate queries should skip collision events.
    pub fn ignores_entity_collisions(self) -> bool {
        match self {
            PhaseState::Block(state) => state == BlockPhaseState::RestoringBlocks,
            PhaseState::World(WorldPhaseState::TerrainGeneration) => true,
            PhaseState::General(_) | PhaseState::Entity(_) => false,
        }
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseState::General(state) => write!(f, "General::{state:?}"),
            PhaseState::Block(state) => write!(f, "Block::{state:?}"),
            PhaseState::Entity(state) => write!(f, "Entity::{state:?}"),
            PhaseState::World(state) => write!(f, "World::{state:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// BlockChange
// ---------------------------------------------------------------------------

/// A block write about to happen, as seen by a capture hook.
#[derive(Debug, Clone, Copy)]
pub struct BlockChange<'a> {
    pub current: &'a BlockState,
    pub new: &'a BlockState,
    pub pos: BlockPos,
    pub flags: BlockChangeFlags,
}

impl BlockChange<'_> {
    /// Snapshot of the state being replaced, untagged.
    pub fn original(&self) -> BlockSnapshot {
        BlockSnapshot::new(self.pos, self.current.clone(), self.flags)
    }

    /// Snapshot of the state about to be written.
    pub fn replacement(&self) -> BlockSnapshot {
        BlockSnapshot::new(self.pos, self.new.clone(), self.flags)
    }

    /// A transition that captured nothing and lets the caller write.
    pub fn pass_through(&self) -> BlockTransition {
        BlockTransition {
            original: self.original(),
            replacement: Some(self.replacement()),
        }
    }
}

/// Record the original snapshot, tagged by how the write changes it, and
/// hand the replacement back so the caller performs the write.
pub(crate) fn capture_paired(change: BlockChange<'_>, context: &mut PhaseContext) -> BlockTransition {
    let capture_type = CaptureType::classify(change.current, change.new);
    let original = change.original().tagged(capture_type);
    context.captured_blocks_mut().push(original.clone());
    BlockTransition {
        original,
        replacement: Some(change.replacement()),
    }
}

// ---------------------------------------------------------------------------
// PhasePolicy
// ---------------------------------------------------------------------------

/// Capture and unwind policy shared by all states of one phase.
///
/// The provided methods are the generic behaviour; phases override what they
/// special-case.
pub(crate) trait PhasePolicy {
    type State: Copy + fmt::Debug;

    fn requires_block_capturing(&self, _state: Self::State) -> bool {
        true
    }

    fn ignores_entity_spawns(&self, _state: Self::State) -> bool {
        false
    }

    fn captures_entity_spawns(&self, _state: Self::State) -> bool {
        false
    }

    fn capture_block_change(
        &self,
        _state: Self::State,
        change: BlockChange<'_>,
        context: &mut PhaseContext,
    ) -> BlockTransition {
        capture_paired(change, context)
    }

    fn unwind(
        &self,
        tracker: &mut CauseTracker,
        state: Self::State,
        context: PhaseContext,
        host: &mut dyn UnwindHost,
    ) -> Result<(), TrackingError>;
}

// ---------------------------------------------------------------------------
// TrackingPhase
// ---------------------------------------------------------------------------

/// The policy record owning a family of states.
///
/// Dispatch methods take the state explicitly; it must belong to `self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackingPhase {
    General,
    Block,
    Entity,
    World,
}

impl TrackingPhase {
    /// Whether block writes are buffered rather than applied while `state`
    /// is active.
    pub fn requires_block_capturing(self, state: PhaseState) -> bool {
        debug_assert_eq!(state.phase(), self, "{state} dispatched to {self:?}");
        match state {
            PhaseState::General(s) => GeneralPhase.requires_block_capturing(s),
            PhaseState::Block(s) => BlockPhase.requires_block_capturing(s),
            PhaseState::Entity(s) => EntityPhase.requires_block_capturing(s),
            PhaseState::World(s) => WorldPhase.requires_block_capturing(s),
        }
    }

    /// Whether entity spawns are dropped while `state` is active.
    pub fn ignores_entity_spawns(self, state: PhaseState) -> bool {
        debug_assert_eq!(state.phase(), self, "{state} dispatched to {self:?}");
        match state {
            PhaseState::General(s) => GeneralPhase.ignores_entity_spawns(s),
            PhaseState::Block(s) => BlockPhase.ignores_entity_spawns(s),
            PhaseState::Entity(s) => EntityPhase.ignores_entity_spawns(s),
            PhaseState::World(s) => WorldPhase.ignores_entity_spawns(s),
        }
    }

    /// Whether entity spawns are queued into the context while `state` is
    /// active.
    pub fn captures_entity_spawns(self, state: PhaseState) -> bool {
        debug_assert_eq!(state.phase(), self, "{state} dispatched to {self:?}");
        match state {
            PhaseState::General(s) => GeneralPhase.captures_entity_spawns(s),
            PhaseState::Block(s) => BlockPhase.captures_entity_spawns(s),
            PhaseState::Entity(s) => EntityPhase.captures_entity_spawns(s),
            PhaseState::World(s) => WorldPhase.captures_entity_spawns(s),
        }
    }

    pub(crate) fn capture_block_change(
        self,
        state: PhaseState,
        change: BlockChange<'_>,
        context: &mut PhaseContext,
    ) -> BlockTransition {
        debug_assert_eq!(state.phase(), self, "{state} dispatched to {self:?}");
        match state {
            PhaseState::General(s) => GeneralPhase.capture_block_change(s, change, context),
            PhaseState::Block(s) => BlockPhase.capture_block_change(s, change, context),
            PhaseState::Entity(s) => EntityPhase.capture_block_change(s, change, context),
            PhaseState::World(s) => WorldPhase.capture_block_change(s, change, context),
        }
    }

    /// Finalize a popped frame. Runs exactly once per push.
    pub(crate) fn unwind(
        self,
        tracker: &mut CauseTracker,
        state: PhaseState,
        context: PhaseContext,
        host: &mut dyn UnwindHost,
    ) -> Result<(), TrackingError> {
        debug_assert_eq!(state.phase(), self, "{state} dispatched to {self:?}");
        match state {
            PhaseState::General(s) => GeneralPhase.unwind(tracker, s, context, host),
            PhaseState::Block(s) => BlockPhase.unwind(tracker, s, context, host),
            PhaseState::Entity(s) => EntityPhase.unwind(tracker, s, context, host),
            PhaseState::World(s) => WorldPhase.unwind(tracker, s, context, host),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [PhaseState; 8] = [
        PhaseState::General(GeneralPhaseState::Idle),
        PhaseState::General(GeneralPhaseState::PostUnwinding),
        PhaseState::Block(BlockPhaseState::BlockDecay),
        PhaseState::Block(BlockPhaseState::RestoringBlocks),
        PhaseState::Block(BlockPhaseState::PostNotificationEvent),
        PhaseState::Entity(EntityPhaseState::DeathDropsSpawning),
        PhaseState::Entity(EntityPhaseState::DeathUpdate),
        PhaseState::World(WorldPhaseState::TerrainGeneration),
    ];

    #[test]
    fn only_idle_is_not_busy_and_nothing_is_managed() {
        for state in ALL_STATES {
            assert_eq!(state.is_busy(), state != PhaseState::IDLE, "{state}");
            assert!(!state.is_managed(), "{state}");
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "dispatched to Block")]
    fn dispatching_a_foreign_state_panics() {
        TrackingPhase::Block.requires_block_capturing(PhaseState::Entity(EntityPhaseState::DeathUpdate));
    }

    #[test]
    fn nothing_may_switch_back_to_idle() {
        for state in ALL_STATES {
            assert!(!state.can_switch_to(PhaseState::IDLE), "{state}");
        }
    }

    #[test]
    fn ignoring_and_capturing_spawns_are_exclusive() {
        for state in ALL_STATES {
            let phase = state.phase();
            assert!(
                !(phase.ignores_entity_spawns(state) && phase.captures_entity_spawns(state)),
                "{state} both ignores and captures spawns"
            );
        }
    }

    #[test]
    fn display_names_phase_and_state() {
        assert_eq!(
            PhaseState::Block(BlockPhaseState::BlockDecay).to_string(),
            "Block::BlockDecay"
        );
        assert_eq!(PhaseState::IDLE.to_string(), "General::Idle");
    }
}

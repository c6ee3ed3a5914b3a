//! The cause tracker: one phase stack per world.
//!
//! Orchestration code pushes a phase before an operation and completes it
//! afterwards; mutation code consults the tracker before every block write,
//! entity spawn and collision query.
//!
//! Completing a phase pops its frame *before* running the phase's unwind.
//! Anything the unwind (or a finalizer it calls) pushes therefore nests on
//! the enclosing frame, and every push made during the unwind is completed
//! before the unwind returns.
//!
//! # Example
//!
//! ```
//! use cairn_tracking::prelude::*;
//! use cairn_world::prelude::*;
//!
//! # struct NoHost;
//! # impl UnwindHost for NoHost {
//! #     fn process_drops(&mut self, _: DropFunction, _: EntityId, _: &mut CauseTracker,
//! #         _: &std::rc::Rc<PhaseContext>, _: Vec<EntitySpawn>) -> Result<(), TrackingError> { Ok(()) }
//! #     fn process_entities(&mut self, _: EntityFunction, _: EntityId, _: &mut CauseTracker,
//! #         _: &std::rc::Rc<PhaseContext>, _: Vec<EntitySpawn>) -> Result<(), TrackingError> { Ok(()) }
//! #     fn process_generated(&mut self, _: ChunkPos, _: &mut CauseTracker,
//! #         _: &std::rc::Rc<PhaseContext>, _: Vec<EntitySpawn>) -> Result<(), TrackingError> { Ok(()) }
//! # }
//! let mut tracker = CauseTracker::new();
//! let decay = PhaseState::Block(BlockPhaseState::BlockDecay);
//! tracker.switch_to_phase(TrackingPhase::Block, decay, PhaseContext::start().complete())?;
//!
//! let stone = BlockState::of("stone");
//! let air = BlockState::air();
//! let transition =
//!     tracker.capture_block_change(&stone, &air, BlockPos::new(0, 64, 0), BlockChangeFlags::ALL);
//! assert!(transition.replacement.is_none());
//!
//! tracker.complete_phase(&mut NoHost)?;
//! assert_eq!(tracker.depth(), 1);
//! # Ok::<(), TrackingError>(())
//! ```

use cairn_world::block::{BlockChangeFlags, BlockPos, BlockState, BlockTransition};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::context::{EntitySpawn, PhaseContext};
use crate::function::UnwindHost;
use crate::phase::{BlockChange, PhaseState, TrackingPhase};
use crate::stack::{PhaseData, PhaseStack};
use crate::TrackingError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tracker limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum number of frames, baseline included.
    pub max_depth: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

// ---------------------------------------------------------------------------
// SpawnDisposition
// ---------------------------------------------------------------------------

/// What the tracker did with an entity spawn.
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnDisposition {
    /// The active phase ignores spawns; the entity must not appear.
    Ignored,
    /// The spawn was queued into the active context.
    Captured,
    /// Nothing captured it; the caller spawns it now.
    Direct(EntitySpawn),
}

// ---------------------------------------------------------------------------
// CauseTracker
// ---------------------------------------------------------------------------

/// Per-world phase stack and the entry points into it.
#[derive(Debug)]
pub struct CauseTracker {
    stack: PhaseStack,
    config: TrackerConfig,
}

impl Default for CauseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CauseTracker {
    /// A tracker with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    /// A tracker whose stack holds only the `General(Idle)` baseline.
    pub fn with_config(config: TrackerConfig) -> Self {
        let mut stack = PhaseStack::new();
        stack.push(PhaseState::IDLE, PhaseContext::start().complete());
        Self { stack, config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // -- push / pop ---------------------------------------------------------

    /// Push `state` with `context` on top of the stack.
    pub fn switch_to_phase(
        &mut self,
        phase: TrackingPhase,
        state: PhaseState,
        context: PhaseContext,
    ) -> Result<(), TrackingError> {
        if state.phase() != phase {
            return Err(TrackingError::PhaseMismatch { phase, state });
        }
        if !context.is_complete() {
            return Err(TrackingError::IncompleteContext { state });
        }
        let current = self.current_state();
        if !current.can_switch_to(state) {
            return Err(TrackingError::IllegalTransition {
                current,
                requested: state,
            });
        }
        if self.stack.len() >= self.config.max_depth {
            return Err(TrackingError::StackOverflow {
                max_depth: self.config.max_depth,
                state,
            });
        }

        self.stack.push(state, context);
        debug!(%state, ?phase, depth = self.stack.len(), "switched phase");
        Ok(())
    }

    /// Pop the top frame and run its phase's unwind.
    ///
    /// The frame is gone from the stack before the unwind starts. An unwind
    /// error is returned as-is; the stack stays popped.
    pub fn complete_phase(&mut self, host: &mut dyn UnwindHost) -> Result<(), TrackingError> {
        if self.stack.len() <= 1 {
            return Err(TrackingError::CompletingBaseline);
        }
        let Some(frame) = self.stack.pop() else {
            return Err(TrackingError::CompletingBaseline);
        };
        let (state, context) = frame.into_parts();
        debug!(%state, depth = self.stack.len(), "completing phase");
        state.phase().unwind(self, state, context, host)
    }

    /// Like [`complete_phase`](Self::complete_phase), but refuses to pop
    /// anything other than `expected`.
    pub fn complete_phase_checked(
        &mut self,
        expected: PhaseState,
        host: &mut dyn UnwindHost,
    ) -> Result<(), TrackingError> {
        let found = self.current_state();
        if found != expected {
            return Err(TrackingError::UnbalancedCompletion { expected, found });
        }
        self.complete_phase(host)
    }

    /// Run `f` inside a phase.
    ///
    /// The phase is pushed, `f` runs, and the phase is completed. If `f`
    /// fails or panics the stack is cut back to its entry depth and the
    /// aborted frames are discarded without unwinding. If `f` leaves a
    /// different frame on top, nothing is unwound and
    /// [`TrackingError::UnbalancedCompletion`] is returned.
    pub fn with_phase<H, R, E>(
        &mut self,
        state: PhaseState,
        context: PhaseContext,
        host: &mut H,
        f: impl FnOnce(&mut CauseTracker, &mut H) -> Result<R, E>,
    ) -> Result<R, E>
    where
        H: UnwindHost,
        E: From<TrackingError>,
    {
        let entry_depth = self.stack.len();
        self.switch_to_phase(state.phase(), state, context)?;

        let mut guard = PhaseGuard {
            tracker: self,
            depth: entry_depth,
            armed: true,
        };
        let value = f(&mut *guard.tracker, &mut *host)?;

        let found = guard.tracker.current_state();
        if guard.tracker.depth() != entry_depth + 1 || found != state {
            return Err(TrackingError::UnbalancedCompletion {
                expected: state,
                found,
            }
            .into());
        }
        guard.armed = false;
        guard.tracker.complete_phase(host)?;
        Ok(value)
    }

    // -- capture hooks ------------------------------------------------------

    /// Offer a block write to the active phase.
    ///
    /// When the returned transition has no replacement the change has been
    /// queued and the caller must not write the block.
    pub fn capture_block_change(
        &mut self,
        current: &BlockState,
        new: &BlockState,
        pos: BlockPos,
        flags: BlockChangeFlags,
    ) -> BlockTransition {
        let change = BlockChange {
            current,
            new,
            pos,
            flags,
        };
        let frame = self.top_mut();
        let state = frame.state();
        let phase = state.phase();
        if !phase.requires_block_capturing(state) {
            return change.pass_through();
        }
        trace!(%state, %pos, from = %current, to = %new, "capturing block change");
        phase.capture_block_change(state, change, frame.context_mut())
    }

    /// Offer an entity spawn to the active phase.
    pub fn capture_entity_spawn(&mut self, spawn: EntitySpawn) -> SpawnDisposition {
        let frame = self.top_mut();
        let state = frame.state();
        let phase = state.phase();
        if phase.ignores_entity_spawns(state) {
            trace!(%state, kind = spawn.kind.type_name(), "ignoring spawn");
            return SpawnDisposition::Ignored;
        }
        if !phase.captures_entity_spawns(state) {
            return SpawnDisposition::Direct(spawn);
        }
        trace!(%state, kind = spawn.kind.type_name(), "capturing spawn");
        let context = frame.context_mut();
        if spawn.kind.is_item() {
            context.captured_items_mut().push(spawn);
        } else {
            context.captured_entities_mut().push(spawn);
        }
        SpawnDisposition::Captured
    }

    // -- queries ------------------------------------------------------------

    pub fn requires_block_capturing(&self) -> bool {
        let state = self.current_state();
        state.phase().requires_block_capturing(state)
    }

    pub fn ignores_entity_spawns(&self) -> bool {
        let state = self.current_state();
        state.phase().ignores_entity_spawns(state)
    }

    /// Whether collision candidate queries should come back empty.
    pub fn ignores_entity_collisions(&self) -> bool {
        self.current_state().ignores_entity_collisions()
    }

    pub fn current_state(&self) -> PhaseState {
        self.top().state()
    }

    pub fn current_context(&self) -> &PhaseContext {
        self.top().context()
    }

    /// Number of frames, baseline included. Never zero.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn stack(&self) -> &PhaseStack {
        &self.stack
    }

    /// Discard every frame above the baseline without unwinding it.
    ///
    /// Recovery for callers that find phases left open after a failed or
    /// unbalanced operation. Returns the number of frames dropped.
    pub fn reset_to_baseline(&mut self) -> usize {
        let dropped = self.stack.truncate(1);
        if dropped > 0 {
            warn!(dropped, "discarding phases left above the baseline");
        }
        dropped
    }

    fn top(&self) -> &PhaseData {
        match self.stack.peek() {
            Some(frame) => frame,
            None => unreachable!("phase stack lost its baseline frame"),
        }
    }

    fn top_mut(&mut self) -> &mut PhaseData {
        match self.stack.peek_mut() {
            Some(frame) => frame,
            None => unreachable!("phase stack lost its baseline frame"),
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseGuard
// ---------------------------------------------------------------------------

/// Cuts the stack back to `depth` when dropped while armed.
struct PhaseGuard<'a> {
    tracker: &'a mut CauseTracker,
    depth: usize,
    armed: bool,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let dropped = self.tracker.stack.truncate(self.depth);
        if dropped > 0 {
            warn!(
                dropped,
                depth = self.depth,
                "aborted phase; discarding frames without unwinding"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

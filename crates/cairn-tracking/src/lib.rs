//! # cairn-tracking
//!
//! Cause tracking for world mutations. Every block write, entity spawn and
//! item drop made while a phase is active is either captured into that
//! phase's context, ignored, or passed straight through, and every captured
//! effect is attributed to the named causes the phase was pushed with.
//!
//! ## Architecture
//!
//! - [`PhaseContext`](context::PhaseContext): named causes plus capture buffers.
//! - [`PhaseState`](phase::PhaseState) and [`TrackingPhase`](phase::TrackingPhase):
//!   closed enums of states and the capture/unwind policy owning them.
//! - [`PhaseStack`](stack::PhaseStack): LIFO frames of `(state, context)`.
//! - [`CauseTracker`](tracker::CauseTracker): the per-world entry point.
//! - [`UnwindHost`](function::UnwindHost): finalizers the owning world
//!   provides to fire notifications and apply captured effects.
//!
//! ## Quick Start
//!
//! ```
//! use cairn_tracking::prelude::*;
//! use cairn_world::prelude::*;
//!
//! let mut tracker = CauseTracker::new();
//! let dying = EntityId::new(0, 0);
//! let context = PhaseContext::start()
//!     .add(NamedCause::source(dying))
//!     .add_captures()
//!     .complete();
//! let state = PhaseState::Entity(EntityPhaseState::DeathUpdate);
//! tracker.switch_to_phase(TrackingPhase::Entity, state, context)?;
//!
//! let drop = EntitySpawn::new(EntityKind::Item { item: "bone".into(), count: 1 }, [0.0; 3]);
//! assert_eq!(tracker.capture_entity_spawn(drop), SpawnDisposition::Captured);
//! assert_eq!(tracker.current_context().captured_items().map(|i| i.len()), Some(1));
//! # Ok::<(), TrackingError>(())
//! ```

#![deny(unsafe_code)]

pub mod cause;
pub mod context;
pub mod function;
pub mod phase;
pub mod stack;
pub mod tracker;
pub mod unwinding;

use phase::{PhaseState, TrackingPhase};

/// Errors raised by the phase engine.
///
/// Everything except [`MissingCause`](Self::MissingCause) and
/// [`Finalizer`](Self::Finalizer) is a protocol violation by the caller.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("cannot switch from {current} to {requested}")]
    IllegalTransition {
        current: PhaseState,
        requested: PhaseState,
    },

    #[error("state {state} does not belong to phase {phase:?}")]
    PhaseMismatch {
        phase: TrackingPhase,
        state: PhaseState,
    },

    #[error("context for {state} must be completed before it is pushed")]
    IncompleteContext { state: PhaseState },

    #[error("cannot add cause `{name}`: context is already complete")]
    ContextAlreadyComplete { name: String },

    #[error("cannot complete the baseline phase")]
    CompletingBaseline,

    #[error("expected {expected} on top of the phase stack, found {found}")]
    UnbalancedCompletion {
        expected: PhaseState,
        found: PhaseState,
    },

    #[error("phase stack is full ({max_depth} frames) while pushing {state}")]
    StackOverflow { max_depth: usize, state: PhaseState },

    #[error("missing cause `{key}` ({message}) in {context}")]
    MissingCause {
        key: &'static str,
        message: &'static str,
        context: String,
    },

    #[error("finalizer failed: {0}")]
    Finalizer(String),
}

impl TrackingError {
    /// A [`MissingCause`](Self::MissingCause) describing `context`.
    pub fn missing_cause(
        key: &'static str,
        message: &'static str,
        context: &context::PhaseContext,
    ) -> Self {
        TrackingError::MissingCause {
            key,
            message,
            context: format!("{context:?}"),
        }
    }
}

/// Commonly used types.
pub mod prelude {
    pub use crate::cause::{keys, NamedCause};
    pub use crate::context::{EntitySpawn, PhaseContext};
    pub use crate::function::{DropFunction, EntityFunction, UnwindHost};
    pub use crate::phase::{
        BlockPhaseState, EntityPhaseState, GeneralPhaseState, PhaseState, TrackingPhase,
        WorldPhaseState,
    };
    pub use crate::stack::{PhaseData, PhaseStack};
    pub use crate::tracker::{CauseTracker, SpawnDisposition, TrackerConfig};
    pub use crate::TrackingError;
}

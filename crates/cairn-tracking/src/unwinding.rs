//! Unwinding contexts.
//!
//! When a phase's unwind has to run further mutation-triggering code (spawning
//! the drops it captured, say) it pushes a new phase whose context is an
//! *unwinding* context. That context carries two synthetic causes, the state
//! being unwound and the original context, and answers `first`/`first_named`
//! from its own causes first and from the original context second. Nested
//! mutations can therefore still resolve the original `Source`.

use std::rc::Rc;

use crate::cause::{keys, NamedCause};
use crate::context::PhaseContext;
use crate::phase::PhaseState;

impl PhaseContext {
    /// Build a complete unwinding context for `state` wrapping `original`.
    ///
    /// Entity and item capture buffers are requested so that spawns made
    /// during the unwind can be captured by phases that want them.
    pub fn unwinding(state: PhaseState, original: Rc<PhaseContext>) -> PhaseContext {
        let mut context = PhaseContext::start()
            .add(NamedCause::of(keys::UNWINDING_CONTEXT, original))
            .add(NamedCause::of(keys::UNWINDING_STATE, state))
            .add_entity_captures()
            .add_item_captures()
            .complete();
        context.unwinding = true;
        context
    }

    /// Whether lookups on this context chain to an unwound context.
    pub fn is_unwinding(&self) -> bool {
        self.unwinding
    }

    /// The state whose unwind created this context.
    pub fn unwinding_state(&self) -> Option<PhaseState> {
        if !self.unwinding {
            return None;
        }
        self.first_named_local::<PhaseState>(keys::UNWINDING_STATE)
            .copied()
    }

    /// The original context being unwound.
    pub fn unwound_context(&self) -> Option<&Rc<PhaseContext>> {
        if !self.unwinding {
            return None;
        }
        self.first_named_local::<Rc<PhaseContext>>(keys::UNWINDING_CONTEXT)
    }
}

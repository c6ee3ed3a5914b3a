//! Phase contexts: the cause bag and capture buffers of one stack frame.
//!
//! A [`PhaseContext`] is built by the code about to push a phase, marked
//! complete, pushed, consulted by capture hooks while it is on top of the
//! stack, and finally consumed by the phase's unwind. It never outlives that
//! single push/pop cycle.
//!
//! # Example
//!
//! ```
//! use cairn_tracking::prelude::*;
//! use cairn_world::prelude::*;
//!
//! let context = PhaseContext::start()
//!     .add(NamedCause::source(EntityId::new(0, 0)))
//!     .add(NamedCause::of("ChunkPos", ChunkPos::new(2, -1)))
//!     .add_captures()
//!     .complete();
//!
//! assert!(context.is_complete());
//! assert_eq!(context.first::<ChunkPos>(), Some(&ChunkPos::new(2, -1)));
//! assert_eq!(context.captured_blocks().map(|b| b.len()), Some(0));
//! ```

use std::any::Any;
use std::fmt;

use cairn_world::block::BlockSnapshot;
use cairn_world::entity::EntityKind;
use serde::{Deserialize, Serialize};

use crate::cause::NamedCause;
use crate::TrackingError;

// ---------------------------------------------------------------------------
// EntitySpawn
// ---------------------------------------------------------------------------

/// An entity spawn that has not reached the world yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpawn {
    pub kind: EntityKind,
    pub pos: [f64; 3],
}

impl EntitySpawn {
    pub fn new(kind: EntityKind, pos: [f64; 3]) -> Self {
        Self { kind, pos }
    }
}

// ---------------------------------------------------------------------------
// PhaseContext
// ---------------------------------------------------------------------------

/// Named causes plus lazily created capture buffers.
///
/// A buffer that has been requested once (through the builder or a `*_mut`
/// accessor) stays allocated for the rest of the context's life; draining it
/// with a `take_*` method leaves it empty, not absent.
#[derive(Default)]
pub struct PhaseContext {
    causes: Vec<NamedCause>,
    captured_blocks: Option<Vec<BlockSnapshot>>,
    captured_entities: Option<Vec<EntitySpawn>>,
    captured_items: Option<Vec<EntitySpawn>>,
    complete: bool,
    /// Lookups fall through to the context named `UNWINDING_CONTEXT`.
    pub(crate) unwinding: bool,
}

impl PhaseContext {
    /// Begin building a context.
    pub fn start() -> Self {
        Self::default()
    }

    // -- building -----------------------------------------------------------

    /// Add a cause.
    ///
    /// # Panics
    ///
    /// Panics if the context is already complete. Use
    /// [`try_add`](Self::try_add) when that is not statically known.
    pub fn add(mut self, cause: NamedCause) -> Self {
        if let Err(err) = self.try_add(cause) {
            panic!("{err}");
        }
        self
    }

    /// Add a cause, failing if the context is already complete.
    pub fn try_add(&mut self, cause: NamedCause) -> Result<(), TrackingError> {
        if self.complete {
            return Err(TrackingError::ContextAlreadyComplete {
                name: cause.name().to_owned(),
            });
        }
        self.causes.push(cause);
        Ok(())
    }

    /// Request all three capture buffers.
    pub fn add_captures(self) -> Self {
        self.add_block_captures()
            .add_entity_captures()
            .add_item_captures()
    }

    pub fn add_block_captures(mut self) -> Self {
        self.captured_blocks.get_or_insert_with(Vec::new);
        self
    }

    pub fn add_entity_captures(mut self) -> Self {
        self.captured_entities.get_or_insert_with(Vec::new);
        self
    }

    pub fn add_item_captures(mut self) -> Self {
        self.captured_items.get_or_insert_with(Vec::new);
        self
    }

    /// Mark the context fully populated. No further causes may be added.
    pub fn complete(mut self) -> Self {
        self.complete = true;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    // -- lookups ------------------------------------------------------------

    /// All causes in insertion order.
    pub fn causes(&self) -> &[NamedCause] {
        &self.causes
    }

    /// The first cause value of type `T`, in insertion order.
    ///
    /// Unwinding contexts fall back to the unwound context when none of
    /// their own causes match.
    pub fn first<T: Any>(&self) -> Option<&T> {
        self.first_local::<T>()
            .or_else(|| self.unwound_context().and_then(|ctx| ctx.first::<T>()))
    }

    /// The value of the cause named exactly `name`, if it is a `T`.
    ///
    /// Unwinding contexts fall back to the unwound context.
    pub fn first_named<T: Any>(&self, name: &str) -> Option<&T> {
        self.first_named_local::<T>(name).or_else(|| {
            self.unwound_context()
                .and_then(|ctx| ctx.first_named::<T>(name))
        })
    }

    pub(crate) fn first_local<T: Any>(&self) -> Option<&T> {
        self.causes.iter().find_map(|cause| cause.value::<T>())
    }

    pub(crate) fn first_named_local<T: Any>(&self, name: &str) -> Option<&T> {
        self.causes
            .iter()
            .filter(|cause| cause.name() == name)
            .find_map(|cause| cause.value::<T>())
    }

    // -- captures -----------------------------------------------------------

    /// Captured block snapshots, or `None` if never requested.
    pub fn captured_blocks(&self) -> Option<&[BlockSnapshot]> {
        self.captured_blocks.as_deref()
    }

    pub fn captured_entities(&self) -> Option<&[EntitySpawn]> {
        self.captured_entities.as_deref()
    }

    pub fn captured_items(&self) -> Option<&[EntitySpawn]> {
        self.captured_items.as_deref()
    }

    /// Block capture buffer, created on first access.
    pub fn captured_blocks_mut(&mut self) -> &mut Vec<BlockSnapshot> {
        self.captured_blocks.get_or_insert_with(Vec::new)
    }

    pub fn captured_entities_mut(&mut self) -> &mut Vec<EntitySpawn> {
        self.captured_entities.get_or_insert_with(Vec::new)
    }

    pub fn captured_items_mut(&mut self) -> &mut Vec<EntitySpawn> {
        self.captured_items.get_or_insert_with(Vec::new)
    }

    pub fn take_captured_entities(&mut self) -> Vec<EntitySpawn> {
        self.captured_entities
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub fn take_captured_items(&mut self) -> Vec<EntitySpawn> {
        self.captured_items
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Whether any buffer holds at least one capture.
    pub fn has_captures(&self) -> bool {
        self.captured_blocks.as_ref().is_some_and(|v| !v.is_empty())
            || self.captured_entities.as_ref().is_some_and(|v| !v.is_empty())
            || self.captured_items.as_ref().is_some_and(|v| !v.is_empty())
    }
}

impl fmt::Debug for PhaseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseContext")
            .field("causes", &self.causes)
            .field("captured_blocks", &self.captured_blocks.as_ref().map(Vec::len))
            .field("captured_entities", &self.captured_entities.as_ref().map(Vec::len))
            .field("captured_items", &self.captured_items.as_ref().map(Vec::len))
            .field("complete", &self.complete)
            .field("unwinding", &self.unwinding)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! The finalizer boundary.
//!
//! Unwinding a phase decides *which* captured effects go where; actually
//! firing the notifications and applying or discarding the effects is the
//! job of the world that owns the tracker. That world implements
//! [`UnwindHost`].
//!
//! Every finalizer receives the tracker so it can push its own phases (for
//! example a [`PostUnwinding`](crate::phase::GeneralPhaseState::PostUnwinding)
//! phase with an [unwinding context](crate::context::PhaseContext::unwinding)
//! while it spawns drops), and the original context behind an `Rc` so that
//! context can be wrapped without being copied.

use std::rc::Rc;

use cairn_world::block::ChunkPos;
use cairn_world::entity::EntityId;
use serde::{Deserialize, Serialize};

use crate::context::{EntitySpawn, PhaseContext};
use crate::tracker::CauseTracker;
use crate::TrackingError;

/// Which finalizer processes captured item drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropFunction {
    /// Items dropped while the dying entity spawned its loot.
    DeathDrops,
    /// Items dropped during the dying entity's death update.
    DeathUpdates,
}

/// Which finalizer processes captured non-item entity spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityFunction {
    /// Entities (experience orbs, split slimes) spawned with the loot.
    DeathDrops,
    /// Entities spawned during the death update.
    DeathUpdates,
}

/// Finalizers invoked by phase unwinds.
///
/// Implementations fire the downstream notifications and then apply or
/// discard the captured spawns. Errors abort the unwind and propagate out of
/// [`CauseTracker::complete_phase`].
pub trait UnwindHost {
    /// Process item drops captured while `dying` was dying.
    fn process_drops(
        &mut self,
        function: DropFunction,
        dying: EntityId,
        tracker: &mut CauseTracker,
        context: &Rc<PhaseContext>,
        items: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError>;

    /// Process non-item entity spawns captured while `dying` was dying.
    fn process_entities(
        &mut self,
        function: EntityFunction,
        dying: EntityId,
        tracker: &mut CauseTracker,
        context: &Rc<PhaseContext>,
        entities: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError>;

    /// Process spawns captured while `chunk` was being populated.
    fn process_generated(
        &mut self,
        chunk: ChunkPos,
        tracker: &mut CauseTracker,
        context: &Rc<PhaseContext>,
        spawns: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError>;
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// A host that records every finalizer call instead of applying anything.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingHost {
    pub drops: Vec<(DropFunction, EntityId, Vec<EntitySpawn>)>,
    pub entities: Vec<(EntityFunction, EntityId, Vec<EntitySpawn>)>,
    pub generated: Vec<(ChunkPos, Vec<EntitySpawn>)>,
    /// Depth of the tracker observed by each finalizer call.
    pub depths: Vec<usize>,
}

#[cfg(test)]
impl UnwindHost for RecordingHost {
    fn process_drops(
        &mut self,
        function: DropFunction,
        dying: EntityId,
        tracker: &mut CauseTracker,
        _context: &Rc<PhaseContext>,
        items: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError> {
        self.depths.push(tracker.depth());
        self.drops.push((function, dying, items));
        Ok(())
    }

    fn process_entities(
        &mut self,
        function: EntityFunction,
        dying: EntityId,
        tracker: &mut CauseTracker,
        _context: &Rc<PhaseContext>,
        entities: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError> {
        self.depths.push(tracker.depth());
        self.entities.push((function, dying, entities));
        Ok(())
    }

    fn process_generated(
        &mut self,
        chunk: ChunkPos,
        tracker: &mut CauseTracker,
        _context: &Rc<PhaseContext>,
        spawns: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError> {
        self.depths.push(tracker.depth());
        self.generated.push((chunk, spawns));
        Ok(())
    }
}

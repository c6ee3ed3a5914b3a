//! Notification journal with resolved cause chains.
//!
//! Finalizers do not talk to listeners directly. They record a
//! [`WorldEvent`] into the [`EventJournal`], consult the [`EventFilter`] to
//! decide which captured effects a listener cancelled, and then apply the
//! rest. The journal is cleared at the start of every tick.
//!
//! # Example
//!
//! ```
//! use cairn_engine::events::{CauseSummary, EventJournal, SpawnReason, WorldEvent, WorldEventKind};
//! use cairn_tracking::prelude::*;
//! use cairn_world::prelude::*;
//!
//! let dying = EntityId::new(2, 0);
//! let context = PhaseContext::start().add(NamedCause::source(dying)).complete();
//!
//! let mut journal = EventJournal::new();
//! journal.record(WorldEvent {
//!     tick: 1,
//!     kind: WorldEventKind::DropItem {
//!         reason: SpawnReason::DeathDrops,
//!         items: vec![EntitySpawn::new(EntityKind::Item { item: "bone".into(), count: 1 }, [0.0; 3])],
//!     },
//!     cause: CauseSummary::of(&context),
//!     rejected: 0,
//! });
//!
//! assert_eq!(journal.caused_by_entity(dying).count(), 1);
//! ```

use std::collections::BTreeSet;

use cairn_tracking::cause::keys;
use cairn_tracking::context::{EntitySpawn, PhaseContext};
use cairn_tracking::function::{DropFunction, EntityFunction};
use cairn_world::block::{BlockPos, BlockSnapshot, ChunkPos};
use cairn_world::entity::EntityId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CauseSummary
// ---------------------------------------------------------------------------

/// The direct source of an event, resolved from the `Source` cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    Entity(EntityId),
    Chunk(ChunkPos),
    Block(BlockPos),
}

/// A serializable rendering of a phase context's causes.
///
/// `chain` lists cause names from the innermost context outwards, following
/// unwinding contexts to the context they unwound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseSummary {
    pub source: Option<EventSource>,
    pub chain: Vec<String>,
}

impl CauseSummary {
    pub fn of(context: &PhaseContext) -> Self {
        let source = if let Some(entity) = context.first_named::<EntityId>(keys::SOURCE) {
            Some(EventSource::Entity(*entity))
        } else if let Some(chunk) = context.first_named::<ChunkPos>(keys::SOURCE) {
            Some(EventSource::Chunk(*chunk))
        } else {
            context
                .first_named::<BlockPos>(keys::SOURCE)
                .or_else(|| context.first_named::<BlockPos>(keys::NOTIFIER))
                .map(|pos| EventSource::Block(*pos))
        };

        let mut chain = Vec::new();
        let mut current = Some(context);
        while let Some(ctx) = current {
            chain.extend(ctx.causes().iter().map(|cause| cause.name().to_owned()));
            current = ctx.unwound_context().map(|rc| &**rc);
        }
        Self { source, chain }
    }
}

// ---------------------------------------------------------------------------
// WorldEvent
// ---------------------------------------------------------------------------

/// Why a batch of entities is being spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnReason {
    DeathDrops,
    DeathUpdates,
    ChunkGeneration,
}

impl From<DropFunction> for SpawnReason {
    fn from(function: DropFunction) -> Self {
        match function {
            DropFunction::DeathDrops => SpawnReason::DeathDrops,
            DropFunction::DeathUpdates => SpawnReason::DeathUpdates,
        }
    }
}

impl From<EntityFunction> for SpawnReason {
    fn from(function: EntityFunction) -> Self {
        match function {
            EntityFunction::DeathDrops => SpawnReason::DeathDrops,
            EntityFunction::DeathUpdates => SpawnReason::DeathUpdates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEventKind {
    /// Captured block transactions, originals as they were before the change.
    ChangeBlock { transactions: Vec<BlockSnapshot> },
    /// Non-item entities about to enter the world.
    SpawnEntity {
        reason: SpawnReason,
        spawns: Vec<EntitySpawn>,
    },
    /// Item entities about to enter the world.
    DropItem {
        reason: SpawnReason,
        items: Vec<EntitySpawn>,
    },
}

/// One fired notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    /// Tick during which the event fired.
    pub tick: u64,
    pub kind: WorldEventKind,
    pub cause: CauseSummary,
    /// How many of the event's entries a listener cancelled.
    pub rejected: usize,
}

impl WorldEvent {
    /// Number of entries the event carried.
    pub fn len(&self) -> usize {
        match &self.kind {
            WorldEventKind::ChangeBlock { transactions } => transactions.len(),
            WorldEventKind::SpawnEntity { spawns, .. } => spawns.len(),
            WorldEventKind::DropItem { items, .. } => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// EventJournal
// ---------------------------------------------------------------------------

/// Events fired during the current tick, in firing order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventJournal {
    events: Vec<WorldEvent>,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: WorldEvent) {
        self.events.push(event);
    }

    /// Clear all recorded events. Called at the start of each tick.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn all(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn block_changes(&self) -> impl Iterator<Item = &WorldEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, WorldEventKind::ChangeBlock { .. }))
    }

    pub fn spawns(&self) -> impl Iterator<Item = &WorldEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, WorldEventKind::SpawnEntity { .. }))
    }

    pub fn drops(&self) -> impl Iterator<Item = &WorldEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, WorldEventKind::DropItem { .. }))
    }

    /// Events whose resolved source is `entity`.
    pub fn caused_by_entity(&self, entity: EntityId) -> impl Iterator<Item = &WorldEvent> {
        self.events
            .iter()
            .filter(move |e| e.cause.source == Some(EventSource::Entity(entity)))
    }

    /// Serialize the tick's events for external inspection.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.events)
    }
}

// ---------------------------------------------------------------------------
// EventFilter
// ---------------------------------------------------------------------------

/// Listener-side cancellation.
///
/// Spawns whose [`type_name`](cairn_world::entity::EntityKind::type_name) is
/// denied are cancelled individually; block change events are cancelled as a
/// whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    denied_spawns: BTreeSet<String>,
    cancel_block_changes: bool,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every spawn of the given type.
    pub fn deny_spawns(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.denied_spawns.insert(type_name.into());
        self
    }

    pub fn allow_spawns(&mut self, type_name: &str) -> &mut Self {
        self.denied_spawns.remove(type_name);
        self
    }

    pub fn set_cancel_block_changes(&mut self, cancel: bool) -> &mut Self {
        self.cancel_block_changes = cancel;
        self
    }

    pub fn allows_spawn(&self, spawn: &EntitySpawn) -> bool {
        !self.denied_spawns.contains(spawn.kind.type_name())
    }

    pub fn cancels_block_changes(&self) -> bool {
        self.cancel_block_changes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

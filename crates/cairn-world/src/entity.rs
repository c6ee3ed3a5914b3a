//! Entity handles, kinds and allocation.
//!
//! An [`EntityId`] packs a *generation* in the high 32 bits and a slot
//! *index* in the low 32 bits. Freed slots are recycled with a bumped
//! generation, so a handle held by a captured spawn or a cause value can be
//! checked for staleness after the entity died.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Build a handle from a slot index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// Slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityKind / EntityRecord
// ---------------------------------------------------------------------------

/// What kind of thing an entity is.
///
/// Item entities are tracked separately from everything else by the phase
/// engine: deaths produce item drops through a different finalizer than the
/// other entities they spawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// A mob, animal or player, named by its type (`"zombie"`, `"cow"`).
    Living(String),
    /// A dropped item stack lying in the world.
    Item {
        /// Item type name (`"rotten_flesh"`).
        item: String,
        /// Stack size.
        count: u32,
    },
    /// An experience orb carrying the given amount.
    Orb(u32),
}

impl EntityKind {
    /// Whether this is an item entity.
    pub fn is_item(&self) -> bool {
        matches!(self, EntityKind::Item { .. })
    }

    /// Short type name used in logs and event records.
    pub fn type_name(&self) -> &str {
        match self {
            EntityKind::Living(name) => name,
            EntityKind::Item { item, .. } => item,
            EntityKind::Orb(_) => "experience_orb",
        }
    }
}

/// A live entity as stored by the [`World`](crate::world::World).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Handle of this entity.
    pub id: EntityId,
    /// What the entity is.
    pub kind: EntityKind,
    /// Position in world coordinates.
    pub pos: [f64; 3],
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Hands out [`EntityId`]s and recycles freed slots in FIFO order.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
}

impl EntityAllocator {
    /// Create an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle, reusing the oldest freed slot when one exists.
    pub fn allocate(&mut self) -> EntityId {
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            return EntityId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        EntityId::new(index, 0)
    }

    /// Free a handle. Returns `false` if it was already dead or stale.
    pub fn free(&mut self, id: EntityId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index() as usize) else {
            return false;
        };
        if !slot.alive || slot.generation != id.generation() {
            return false;
        }
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(id.index());
        true
    }

    /// Whether `id` refers to a live entity of the current generation.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.slots
            .get(id.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == id.generation())
    }

    /// Number of live handles.
    pub fn alive_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.alive).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

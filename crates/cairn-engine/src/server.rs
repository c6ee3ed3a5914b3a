//! Per-world simulation context.
//!
//! A [`WorldServer`] is split into two fields so the tracker can drive
//! finalizers that mutate the world while it is itself mutably borrowed:
//!
//! - [`WorldState`]: blocks, entities, the event journal and the listener
//!   filter. Implements [`UnwindHost`].
//! - [`CauseTracker`]: the phase stack.
//!
//! Mutation hooks live on `WorldState` and take the tracker explicitly;
//! `WorldServer` offers the same hooks with the split already done.

use std::rc::Rc;

use cairn_tracking::cause::{keys, NamedCause};
use cairn_tracking::context::{EntitySpawn, PhaseContext};
use cairn_tracking::function::{DropFunction, EntityFunction, UnwindHost};
use cairn_tracking::phase::{
    BlockPhaseState, EntityPhaseState, GeneralPhaseState, PhaseState, TrackingPhase,
    WorldPhaseState,
};
use cairn_tracking::tracker::{CauseTracker, SpawnDisposition, TrackerConfig};
use cairn_tracking::TrackingError;
use cairn_world::block::{
    BlockChangeFlags, BlockPos, BlockSnapshot, BlockState, BlockTransition, CaptureType, ChunkPos,
};
use cairn_world::entity::{EntityId, EntityKind};
use cairn_world::world::World;
use cairn_world::WorldError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{
    CauseSummary, EventFilter, EventJournal, SpawnReason, WorldEvent, WorldEventKind,
};
use crate::generator::{ChunkGenerator, GenerationRegion};
use crate::EngineError;

const POST_UNWINDING: PhaseState = PhaseState::General(GeneralPhaseState::PostUnwinding);

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

/// Everything a world owns except its tracker.
#[derive(Debug, Default)]
pub struct WorldState {
    pub world: World,
    pub journal: EventJournal,
    pub filter: EventFilter,
    tick: u64,
}

impl WorldState {
    pub fn new(world: World) -> Self {
        Self {
            world,
            ..Self::default()
        }
    }

    /// The tick events are currently stamped with.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    // -- mutation hooks -----------------------------------------------------

    /// Write a block through the tracker.
    ///
    /// The world is only written when the returned transition carries a
    /// replacement.
    pub fn set_block_state(
        &mut self,
        tracker: &mut CauseTracker,
        pos: BlockPos,
        state: BlockState,
        flags: BlockChangeFlags,
    ) -> BlockTransition {
        let current = self.world.block(pos);
        let transition = tracker.capture_block_change(&current, &state, pos, flags);
        if let Some(replacement) = &transition.replacement {
            self.world.set_block(pos, replacement.state.clone());
        }
        transition
    }

    /// Spawn an entity through the tracker. Returns the handle only when the
    /// entity entered the world immediately.
    pub fn spawn_entity(
        &mut self,
        tracker: &mut CauseTracker,
        kind: EntityKind,
        pos: [f64; 3],
    ) -> Option<EntityId> {
        match tracker.capture_entity_spawn(EntitySpawn::new(kind, pos)) {
            SpawnDisposition::Direct(spawn) => Some(self.world.spawn(spawn.kind, spawn.pos)),
            SpawnDisposition::Captured | SpawnDisposition::Ignored => None,
        }
    }

    /// Collision candidates around `center`, or none while the active phase
    /// ignores collisions.
    pub fn colliding_entities(
        &self,
        tracker: &CauseTracker,
        center: [f64; 3],
        radius: f64,
    ) -> Vec<EntityId> {
        if tracker.ignores_entity_collisions() {
            return Vec::new();
        }
        self.world.entities_within(center, radius)
    }

    // -- finalizer support --------------------------------------------------

    /// Fire a spawn notification, drop what the filter cancels, and spawn
    /// the rest under a `PostUnwinding` phase.
    fn finalize_spawns(
        &mut self,
        tracker: &mut CauseTracker,
        unwound: PhaseState,
        context: &Rc<PhaseContext>,
        spawns: Vec<EntitySpawn>,
        kind: impl FnOnce(Vec<EntitySpawn>) -> WorldEventKind,
    ) -> Result<(), TrackingError> {
        let accepted: Vec<EntitySpawn> = spawns
            .iter()
            .filter(|spawn| self.filter.allows_spawn(spawn))
            .cloned()
            .collect();
        let rejected = spawns.len() - accepted.len();
        if rejected > 0 {
            warn!(rejected, state = %unwound, "listener cancelled captured spawns");
        }
        self.journal.record(WorldEvent {
            tick: self.tick,
            kind: kind(spawns),
            cause: CauseSummary::of(context),
            rejected,
        });
        if accepted.is_empty() {
            return Ok(());
        }

        let unwinding = PhaseContext::unwinding(unwound, Rc::clone(context));
        tracker.switch_to_phase(TrackingPhase::General, POST_UNWINDING, unwinding)?;
        let mut spawned = 0usize;
        for spawn in accepted {
            if self.spawn_entity(tracker, spawn.kind, spawn.pos).is_some() {
                spawned += 1;
            }
        }
        debug!(spawned, state = %unwound, "applied unwound spawns");
        tracker.complete_phase_checked(POST_UNWINDING, self)
    }
}

impl UnwindHost for WorldState {
    fn process_drops(
        &mut self,
        function: DropFunction,
        _dying: EntityId,
        tracker: &mut CauseTracker,
        context: &Rc<PhaseContext>,
        items: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError> {
        let unwound = PhaseState::Entity(match function {
            DropFunction::DeathDrops => EntityPhaseState::DeathDropsSpawning,
            DropFunction::DeathUpdates => EntityPhaseState::DeathUpdate,
        });
        self.finalize_spawns(tracker, unwound, context, items, |items| {
            WorldEventKind::DropItem {
                reason: function.into(),
                items,
            }
        })
    }

    fn process_entities(
        &mut self,
        function: EntityFunction,
        _dying: EntityId,
        tracker: &mut CauseTracker,
        context: &Rc<PhaseContext>,
        entities: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError> {
        let unwound = PhaseState::Entity(match function {
            EntityFunction::DeathDrops => EntityPhaseState::DeathDropsSpawning,
            EntityFunction::DeathUpdates => EntityPhaseState::DeathUpdate,
        });
        self.finalize_spawns(tracker, unwound, context, entities, |spawns| {
            WorldEventKind::SpawnEntity {
                reason: function.into(),
                spawns,
            }
        })
    }

    fn process_generated(
        &mut self,
        chunk: ChunkPos,
        tracker: &mut CauseTracker,
        context: &Rc<PhaseContext>,
        spawns: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError> {
        debug!(%chunk, spawns = spawns.len(), "finalizing generated spawns");
        let unwound = PhaseState::World(WorldPhaseState::TerrainGeneration);
        self.finalize_spawns(tracker, unwound, context, spawns, |spawns| {
            WorldEventKind::SpawnEntity {
                reason: SpawnReason::ChunkGeneration,
                spawns,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// DeathLoot
// ---------------------------------------------------------------------------

/// What a dying entity leaves behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeathLoot {
    /// Entities spawned while the loot is dropped, usually item stacks.
    pub drops: Vec<EntityKind>,
    /// Experience released during the death update. Zero spawns no orb.
    pub experience: u32,
}

// ---------------------------------------------------------------------------
// WorldServer
// ---------------------------------------------------------------------------

/// One world and the tracker that owns its mutations.
#[derive(Debug)]
pub struct WorldServer {
    pub state: WorldState,
    pub tracker: CauseTracker,
}

impl WorldServer {
    pub fn new(world: World) -> Self {
        Self::with_config(world, TrackerConfig::default())
    }

    pub fn with_config(world: World, config: TrackerConfig) -> Self {
        Self {
            state: WorldState::new(world),
            tracker: CauseTracker::with_config(config),
        }
    }

    // -- hooks --------------------------------------------------------------

    pub fn set_block_state(
        &mut self,
        pos: BlockPos,
        state: BlockState,
        flags: BlockChangeFlags,
    ) -> BlockTransition {
        self.state.set_block_state(&mut self.tracker, pos, state, flags)
    }

    pub fn spawn_entity(&mut self, kind: EntityKind, pos: [f64; 3]) -> Option<EntityId> {
        self.state.spawn_entity(&mut self.tracker, kind, pos)
    }

    pub fn colliding_entities(&self, center: [f64; 3], radius: f64) -> Vec<EntityId> {
        self.state.colliding_entities(&self.tracker, center, radius)
    }

    // -- orchestration ------------------------------------------------------

    /// Decay the block at `pos` to air.
    ///
    /// The removal is captured under `BlockDecay`, announced as a
    /// `ChangeBlock` event once the phase completes, and applied unless a
    /// listener cancels block changes. Returns whether the block decayed.
    pub fn decay_block(&mut self, pos: BlockPos) -> Result<bool, EngineError> {
        if self.state.world.block(pos).is_air() {
            return Ok(false);
        }
        let context = PhaseContext::start()
            .add(NamedCause::of(keys::NOTIFIER, pos))
            .add_block_captures()
            .complete();
        let state = PhaseState::Block(BlockPhaseState::BlockDecay);

        let (captured, cause) =
            self.tracker
                .with_phase(state, context, &mut self.state, |tracker, host| {
                    host.set_block_state(tracker, pos, BlockState::air(), BlockChangeFlags::ALL);
                    let context = tracker.current_context();
                    let captured = context
                        .captured_blocks()
                        .map(<[BlockSnapshot]>::to_vec)
                        .unwrap_or_default();
                    Ok::<_, EngineError>((captured, CauseSummary::of(context)))
                })?;

        let cancelled = self.state.filter.cancels_block_changes();
        self.state.journal.record(WorldEvent {
            tick: self.state.tick,
            kind: WorldEventKind::ChangeBlock {
                transactions: captured.clone(),
            },
            cause,
            rejected: if cancelled { captured.len() } else { 0 },
        });

        let (decays, written): (Vec<_>, Vec<_>) = captured
            .into_iter()
            .partition(|snapshot| snapshot.capture_type == Some(CaptureType::Decay));
        if cancelled {
            warn!(%pos, "listener cancelled block decay");
            if !written.is_empty() {
                self.restore_blocks(&written)?;
            }
            return Ok(false);
        }
        for snapshot in &decays {
            self.set_block_state(snapshot.pos, BlockState::air(), snapshot.flags);
        }
        Ok(!decays.is_empty())
    }

    /// Write `snapshots` back under `RestoringBlocks`.
    ///
    /// Nothing is captured and entity spawns triggered by the writes are
    /// ignored.
    pub fn restore_blocks(&mut self, snapshots: &[BlockSnapshot]) -> Result<(), EngineError> {
        let state = PhaseState::Block(BlockPhaseState::RestoringBlocks);
        let context = PhaseContext::start().complete();
        self.tracker
            .with_phase(state, context, &mut self.state, |tracker, host| {
                for snapshot in snapshots {
                    let current = host.world.block(snapshot.pos);
                    let transition = tracker.capture_block_change(
                        &current,
                        &snapshot.state,
                        snapshot.pos,
                        snapshot.flags,
                    );
                    if transition.applies_directly() {
                        host.world.restore(snapshot);
                    }
                }
                Ok::<_, EngineError>(())
            })?;
        debug!(restored = snapshots.len(), "restored block snapshots");
        Ok(())
    }

    /// Kill `entity`, releasing its loot.
    ///
    /// The death update runs under `DeathUpdate` and spawns the experience
    /// orb; the drops are spawned under a nested `DeathDropsSpawning`. Both
    /// are captured and finalized with the entity as their source.
    pub fn kill_entity(&mut self, entity: EntityId, loot: &DeathLoot) -> Result<(), EngineError> {
        let pos = self
            .state
            .world
            .entity(entity)
            .map(|record| record.pos)
            .ok_or(WorldError::StaleEntity { entity })?;
        let death_context = || {
            PhaseContext::start()
                .add(NamedCause::source(entity))
                .add_captures()
                .complete()
        };
        let update = PhaseState::Entity(EntityPhaseState::DeathUpdate);
        let drops = PhaseState::Entity(EntityPhaseState::DeathDropsSpawning);

        info!(%entity, drops = loot.drops.len(), experience = loot.experience, "entity dying");
        self.tracker
            .with_phase(update, death_context(), &mut self.state, |tracker, host| {
                if loot.experience > 0 {
                    host.spawn_entity(tracker, EntityKind::Orb(loot.experience), pos);
                }
                tracker.with_phase(drops, death_context(), host, |tracker, host| {
                    for kind in &loot.drops {
                        host.spawn_entity(tracker, kind.clone(), pos);
                    }
                    Ok::<_, EngineError>(())
                })?;
                host.world.despawn(entity)?;
                Ok::<_, EngineError>(())
            })
    }

    /// Populate `chunk` with `generator` under `TerrainGeneration`.
    pub fn populate_chunk(
        &mut self,
        chunk: ChunkPos,
        generator: &mut dyn ChunkGenerator,
    ) -> Result<(), EngineError> {
        let context = PhaseContext::start()
            .add(NamedCause::source(chunk))
            .add(NamedCause::of(keys::CHUNK_PROVIDER, generator.name().to_owned()))
            .add(NamedCause::of(keys::CHUNK_POS, chunk))
            .add_captures()
            .complete();
        let state = PhaseState::World(WorldPhaseState::TerrainGeneration);

        info!(%chunk, generator = generator.name(), "populating chunk");
        self.tracker
            .with_phase(state, context, &mut self.state, |tracker, host| {
                let mut region = GenerationRegion::new(chunk, tracker, host);
                generator.populate(&mut region)
            })
    }

    /// BLAKE3 hash of the world's blocks and entities.
    pub fn state_hash(&self) -> String {
        self.state.world.state_hash()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

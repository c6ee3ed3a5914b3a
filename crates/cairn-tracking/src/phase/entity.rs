//! Entity death phases.
//!
//! A dying entity first runs its death update, which may in turn spawn its
//! loot. Spawns made in either state are captured and handed to the
//! matching finalizer on unwind, with the dying entity as the cause.
//!
//! Block changes made during entity death are not captured: the phase
//! reports `requires_block_capturing == false`, so they pass straight
//! through to the world.

use std::rc::Rc;

use cairn_world::entity::EntityId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GeneralPhaseState, PhasePolicy, PhaseState};
use crate::cause::keys;
use crate::context::PhaseContext;
use crate::function::{DropFunction, EntityFunction, UnwindHost};
use crate::tracker::CauseTracker;
use crate::TrackingError;

/// States of the entity phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityPhaseState {
    /// The dying entity is spawning its drops.
    DeathDropsSpawning,
    /// The dying entity's per-tick death update is running.
    DeathUpdate,
}

impl EntityPhaseState {
    /// A death update may spawn loot, and the loot's finalizers apply their
    /// spawns on top of the death update. Nothing else nests inside a death.
    pub fn can_switch_to(self, candidate: PhaseState) -> bool {
        self == EntityPhaseState::DeathUpdate
            && matches!(
                candidate,
                PhaseState::Entity(EntityPhaseState::DeathDropsSpawning)
                    | PhaseState::General(GeneralPhaseState::PostUnwinding)
            )
    }

    fn functions(self) -> (DropFunction, EntityFunction) {
        match self {
            EntityPhaseState::DeathDropsSpawning => {
                (DropFunction::DeathDrops, EntityFunction::DeathDrops)
            }
            EntityPhaseState::DeathUpdate => {
                (DropFunction::DeathUpdates, EntityFunction::DeathUpdates)
            }
        }
    }
}

/// Policy record for [`EntityPhaseState`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityPhase;

impl PhasePolicy for EntityPhase {
    type State = EntityPhaseState;

    fn requires_block_capturing(&self, _state: EntityPhaseState) -> bool {
        false
    }

    fn captures_entity_spawns(&self, _state: EntityPhaseState) -> bool {
        true
    }

    fn unwind(
        &self,
        tracker: &mut CauseTracker,
        state: EntityPhaseState,
        mut context: PhaseContext,
        host: &mut dyn UnwindHost,
    ) -> Result<(), TrackingError> {
        let dying = *context
            .first_named::<EntityId>(keys::SOURCE)
            .ok_or_else(|| {
                TrackingError::missing_cause(keys::SOURCE, "dying entity not found", &context)
            })?;

        let items = context.take_captured_items();
        let entities = context.take_captured_entities();
        if context.captured_blocks().is_some_and(|blocks| !blocks.is_empty()) {
            debug!(
                ?state,
                entity = %dying,
                "block changes captured during entity death are not processed"
            );
        }

        let (drops, spawns) = state.functions();
        let context = Rc::new(context);
        if !items.is_empty() {
            host.process_drops(drops, dying, tracker, &context, items)?;
        }
        if !entities.is_empty() {
            host.process_entities(spawns, dying, tracker, &context, entities)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cause::NamedCause;
    use crate::context::EntitySpawn;
    use crate::function::RecordingHost;
    use crate::phase::{BlockPhaseState, TrackingPhase};
    use cairn_world::prelude::*;

    fn bone() -> EntitySpawn {
        EntitySpawn::new(
            EntityKind::Item {
                item: "bone".to_owned(),
                count: 1,
            },
            [0.5, 64.0, 0.5],
        )
    }

    fn orb() -> EntitySpawn {
        EntitySpawn::new(EntityKind::Orb(5), [0.5, 64.0, 0.5])
    }

    fn context_with(source: Option<EntityId>) -> PhaseContext {
        let mut ctx = PhaseContext::start();
        if let Some(entity) = source {
            ctx = ctx.add(NamedCause::source(entity));
        }
        let mut ctx = ctx.add_captures().complete();
        ctx.captured_items_mut().push(bone());
        ctx.captured_entities_mut().push(orb());
        ctx
    }

    #[test]
    fn entity_phase_never_captures_blocks() {
        for state in [
            EntityPhaseState::DeathDropsSpawning,
            EntityPhaseState::DeathUpdate,
        ] {
            let state = PhaseState::Entity(state);
            assert!(!TrackingPhase::Entity.requires_block_capturing(state));
            assert!(TrackingPhase::Entity.captures_entity_spawns(state));
            assert!(!TrackingPhase::Entity.ignores_entity_spawns(state));
        }
    }

    #[test]
    fn only_death_update_nests_drop_spawning() {
        let drops = PhaseState::Entity(EntityPhaseState::DeathDropsSpawning);
        let post = PhaseState::General(GeneralPhaseState::PostUnwinding);
        assert!(EntityPhaseState::DeathUpdate.can_switch_to(drops));
        assert!(EntityPhaseState::DeathUpdate.can_switch_to(post));
        assert!(!EntityPhaseState::DeathDropsSpawning.can_switch_to(drops));
        assert!(!EntityPhaseState::DeathDropsSpawning.can_switch_to(post));
        assert!(!EntityPhaseState::DeathUpdate
            .can_switch_to(PhaseState::Block(BlockPhaseState::BlockDecay)));
    }

    #[test]
    fn death_drops_route_to_death_drop_finalizers() {
        let dying = EntityId::new(4, 0);
        let mut tracker = CauseTracker::new();
        let mut host = RecordingHost::default();

        EntityPhase
            .unwind(
                &mut tracker,
                EntityPhaseState::DeathDropsSpawning,
                context_with(Some(dying)),
                &mut host,
            )
            .unwrap();

        assert_eq!(host.drops, vec![(DropFunction::DeathDrops, dying, vec![bone()])]);
        assert_eq!(
            host.entities,
            vec![(EntityFunction::DeathDrops, dying, vec![orb()])]
        );
    }

    #[test]
    fn death_update_routes_to_update_finalizers() {
        let dying = EntityId::new(4, 1);
        let mut tracker = CauseTracker::new();
        let mut host = RecordingHost::default();

        EntityPhase
            .unwind(
                &mut tracker,
                EntityPhaseState::DeathUpdate,
                context_with(Some(dying)),
                &mut host,
            )
            .unwrap();

        assert_eq!(host.drops[0].0, DropFunction::DeathUpdates);
        assert_eq!(host.entities[0].0, EntityFunction::DeathUpdates);
    }

    #[test]
    fn empty_buffers_skip_finalizers() {
        let mut tracker = CauseTracker::new();
        let mut host = RecordingHost::default();
        let ctx = PhaseContext::start()
            .add(NamedCause::source(EntityId::new(0, 0)))
            .add_captures()
            .complete();

        EntityPhase
            .unwind(&mut tracker, EntityPhaseState::DeathUpdate, ctx, &mut host)
            .unwrap();

        assert!(host.drops.is_empty());
        assert!(host.entities.is_empty());
    }

    #[test]
    fn missing_source_fails_before_any_finalizer() {
        let mut tracker = CauseTracker::new();
        let mut host = RecordingHost::default();

        let err = EntityPhase
            .unwind(
                &mut tracker,
                EntityPhaseState::DeathDropsSpawning,
                context_with(None),
                &mut host,
            )
            .unwrap_err();

        match err {
            TrackingError::MissingCause { key, context, .. } => {
                assert_eq!(key, keys::SOURCE);
                assert!(context.contains("captured_items: Some(1)"), "{context}");
            }
            other => panic!("expected MissingCause, got {other:?}"),
        }
        assert!(host.drops.is_empty());
        assert!(host.entities.is_empty());
    }

    #[test]
    fn source_of_wrong_type_counts_as_missing() {
        let mut tracker = CauseTracker::new();
        let mut host = RecordingHost::default();
        let ctx = PhaseContext::start()
            .add(NamedCause::source(ChunkPos::new(0, 0)))
            .complete();

        let err = EntityPhase
            .unwind(&mut tracker, EntityPhaseState::DeathUpdate, ctx, &mut host)
            .unwrap_err();
        assert!(matches!(err, TrackingError::MissingCause { .. }));
    }
}

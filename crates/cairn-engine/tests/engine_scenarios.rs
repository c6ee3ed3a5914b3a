//! Whole-server scenarios: population, deaths, cancellation and the tick loop.

use cairn_engine::prelude::*;

fn living(world: &World) -> Vec<EntityId> {
    world
        .entities()
        .filter(|record| matches!(record.kind, EntityKind::Living(_)))
        .map(|record| record.id)
        .collect()
}

fn loot() -> DeathLoot {
    DeathLoot {
        drops: vec![EntityKind::Item {
            item: "leather".to_owned(),
            count: 1,
        }],
        experience: 3,
    }
}

#[test]
fn population_spawns_are_attributed_to_the_chunk() {
    let mut server = WorldServer::new(World::new());
    let chunk = ChunkPos::new(-1, 2);
    server
        .populate_chunk(chunk, &mut SeededPopulator::new(99).named("overworld"))
        .unwrap();

    let spawns: Vec<_> = server.state.journal.spawns().collect();
    assert_eq!(spawns.len(), 1);
    let event = spawns[0];
    assert_eq!(event.cause.source, Some(EventSource::Chunk(chunk)));
    assert!(event.cause.chain.iter().any(|name| name == keys::CHUNK_PROVIDER));
    assert!(matches!(
        event.kind,
        WorldEventKind::SpawnEntity {
            reason: SpawnReason::ChunkGeneration,
            ..
        }
    ));
    assert_eq!(event.len(), living(&server.state.world).len());

    for id in living(&server.state.world) {
        let pos = server.state.world.entity(id).unwrap().pos;
        let block = BlockPos::new(pos[0].floor() as i32, 0, pos[2].floor() as i32);
        assert_eq!(block.chunk(), chunk);
    }
}

#[test]
fn killing_populated_mobs_drops_their_loot() {
    let mut server = WorldServer::new(World::new());
    server
        .populate_chunk(ChunkPos::new(0, 0), &mut SeededPopulator::new(5))
        .unwrap();
    let mobs = living(&server.state.world);
    assert!(!mobs.is_empty());
    server.state.journal.clear();

    for &mob in &mobs {
        server.kill_entity(mob, &loot()).unwrap();
    }

    assert!(living(&server.state.world).is_empty());
    assert_eq!(server.state.world.entity_count(), mobs.len() * 2);
    for &mob in &mobs {
        assert_eq!(server.state.journal.caused_by_entity(mob).count(), 2);
    }
    let json = server.state.journal.to_json().unwrap();
    assert!(json.contains("DeathDrops"));
    assert!(json.contains("DeathUpdates"));
}

#[test]
fn denied_mobs_never_spawn_during_population() {
    let mut server = WorldServer::new(World::new());
    for species in ["cow", "pig", "sheep"] {
        server.state.filter.deny_spawns(species);
    }
    server
        .populate_chunk(ChunkPos::new(0, 0), &mut SeededPopulator::new(5))
        .unwrap();

    assert_eq!(server.state.world.entity_count(), 0);
    let event = server.state.journal.spawns().next().unwrap();
    assert_eq!(event.rejected, event.len());
}

#[test]
fn stack_limit_aborts_death_without_side_effects() {
    let mut server = WorldServer::with_config(World::new(), TrackerConfig { max_depth: 2 });
    let wolf = server
        .spawn_entity(EntityKind::Living("wolf".to_owned()), [0.0, 64.0, 0.0])
        .unwrap();

    let err = server.kill_entity(wolf, &loot()).unwrap_err();

    assert!(matches!(
        err,
        EngineError::Tracking(TrackingError::StackOverflow { max_depth: 2, .. })
    ));
    assert_eq!(server.tracker.depth(), 1);
    assert!(server.state.world.is_alive(wolf));
    assert_eq!(server.state.world.entity_count(), 1);
    assert!(server.state.journal.is_empty());
}

#[test]
fn collisions_are_ignored_while_generating() {
    let mut server = WorldServer::new(World::new());
    server.spawn_entity(EntityKind::Living("cow".to_owned()), [1.0, 64.0, 1.0]);

    let context = PhaseContext::start()
        .add(NamedCause::source(ChunkPos::new(0, 0)))
        .add(NamedCause::of(keys::CHUNK_POS, ChunkPos::new(0, 0)))
        .add_captures()
        .complete();
    let state = PhaseState::World(WorldPhaseState::TerrainGeneration);
    server
        .tracker
        .switch_to_phase(TrackingPhase::World, state, context)
        .unwrap();
    assert!(server.colliding_entities([1.0, 64.0, 1.0], 2.0).is_empty());
    server
        .tracker
        .complete_phase_checked(state, &mut server.state)
        .unwrap();

    assert_eq!(server.colliding_entities([1.0, 64.0, 1.0], 2.0).len(), 1);
}

fn populate_origin(server: &mut WorldServer) -> Result<(), EngineError> {
    if server.state.tick() == 1 {
        server.populate_chunk(ChunkPos::new(0, 0), &mut SeededPopulator::new(11))?;
    }
    Ok(())
}

fn cull_one(server: &mut WorldServer) -> Result<(), EngineError> {
    if let Some(&mob) = living(&server.state.world).first() {
        server.kill_entity(mob, &DeathLoot::default())?;
    }
    Ok(())
}

#[test]
fn tick_loop_culls_population_over_time() {
    let config = EngineConfig::from_json_str(r#"{ "tick": { "fixed_dt": 0.05 } }"#).unwrap();
    let mut tick_loop = config.build(World::new());
    tick_loop.add_system("populate", populate_origin);
    tick_loop.add_system_after("cull", &["populate"], cull_one);

    tick_loop.run_ticks(4).unwrap();

    let server = tick_loop.server();
    assert!(living(&server.state.world).is_empty());
    assert_eq!(server.tracker.depth(), 1);
    assert!(server.state.world.block_count() >= 512);
}

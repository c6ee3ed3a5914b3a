//! Populate a few chunks, let the mobs die over a handful of ticks and print
//! the resulting event journal.
//!
//! Run with:
//! ```sh
//! RUST_LOG=cairn=debug cargo run -p cairn-engine --example chunk_demo [config.json]
//! ```

use anyhow::Context;
use cairn_engine::prelude::*;

fn populate(server: &mut WorldServer) -> Result<(), EngineError> {
    if server.state.tick() == 1 {
        let mut populator = SeededPopulator::new(0xCA1B).named("demo");
        for x in -1..=1 {
            server.populate_chunk(ChunkPos::new(x, 0), &mut populator)?;
        }
    }
    Ok(())
}

fn hunt(server: &mut WorldServer) -> Result<(), EngineError> {
    let prey = server
        .state
        .world
        .entities()
        .find(|record| matches!(record.kind, EntityKind::Living(_)))
        .map(|record| record.id);
    if let Some(prey) = prey {
        let loot = DeathLoot {
            drops: vec![EntityKind::Item {
                item: "leather".to_owned(),
                count: 1,
            }],
            experience: 2,
        };
        server.kill_entity(prey, &loot)?;
    }
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    cairn_engine::logging::init(&config.log_filter);

    let mut tick_loop = config.build(World::new());
    tick_loop.add_system("populate", populate);
    tick_loop.add_system_after("hunt", &["populate"], hunt);

    for _ in 0..5 {
        let events = tick_loop.tick().context("tick failed")?;
        let server = tick_loop.server();
        println!(
            "tick {}: {events} events, {} entities, {} blocks",
            tick_loop.tick_count(),
            server.state.world.entity_count(),
            server.state.world.block_count(),
        );
        println!("{}", server.state.journal.to_json()?);
    }

    println!("final state hash: {}", tick_loop.server().state_hash());
    Ok(())
}

//! Phase stack throughput.
//!
//! Measures the per-operation cost a world pays for cause tracking:
//!
//! - pushing and completing a block phase with no captures,
//! - capturing block changes under `BlockDecay`,
//! - capturing entity spawns under a death phase and unwinding them through
//!   a finalizer.
//!
//! Run with: `cargo bench --bench tracker_benchmarks`

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cairn_tracking::prelude::*;
use cairn_world::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Counts finalized spawns without applying them.
#[derive(Default)]
struct CountingHost {
    finalized: usize,
}

impl UnwindHost for CountingHost {
    fn process_drops(
        &mut self,
        _: DropFunction,
        _: EntityId,
        _: &mut CauseTracker,
        _: &Rc<PhaseContext>,
        items: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError> {
        self.finalized += items.len();
        Ok(())
    }

    fn process_entities(
        &mut self,
        _: EntityFunction,
        _: EntityId,
        _: &mut CauseTracker,
        _: &Rc<PhaseContext>,
        entities: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError> {
        self.finalized += entities.len();
        Ok(())
    }

    fn process_generated(
        &mut self,
        _: ChunkPos,
        _: &mut CauseTracker,
        _: &Rc<PhaseContext>,
        spawns: Vec<EntitySpawn>,
    ) -> Result<(), TrackingError> {
        self.finalized += spawns.len();
        Ok(())
    }
}

const DECAY: PhaseState = PhaseState::Block(BlockPhaseState::BlockDecay);
const DEATH: PhaseState = PhaseState::Entity(EntityPhaseState::DeathDropsSpawning);

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_push_complete(c: &mut Criterion) {
    let mut tracker = CauseTracker::new();
    let mut host = CountingHost::default();
    c.bench_function("push_complete_block_phase", |b| {
        b.iter(|| {
            tracker
                .switch_to_phase(TrackingPhase::Block, DECAY, PhaseContext::start().complete())
                .unwrap();
            tracker.complete_phase(&mut host).unwrap();
            black_box(tracker.depth());
        });
    });
}

fn bench_block_capture(c: &mut Criterion) {
    let mut group = c.benchmark_group("decay_capture");
    let leaves = BlockState::of("leaves");
    let air = BlockState::air();
    for &count in &[16, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut tracker = CauseTracker::new();
            let mut host = CountingHost::default();
            b.iter(|| {
                tracker
                    .switch_to_phase(TrackingPhase::Block, DECAY, PhaseContext::start().complete())
                    .unwrap();
                for i in 0..count {
                    let pos = BlockPos::new(i % 16, 64 + i / 256, (i / 16) % 16);
                    black_box(tracker.capture_block_change(&leaves, &air, pos, BlockChangeFlags::ALL));
                }
                tracker.complete_phase(&mut host).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_death_unwind(c: &mut Criterion) {
    let mut group = c.benchmark_group("death_drops_unwind");
    let dying = EntityId::new(0, 0);
    for &count in &[1usize, 32, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut tracker = CauseTracker::new();
            let mut host = CountingHost::default();
            b.iter(|| {
                let context = PhaseContext::start()
                    .add(NamedCause::source(dying))
                    .add_captures()
                    .complete();
                tracker
                    .switch_to_phase(TrackingPhase::Entity, DEATH, context)
                    .unwrap();
                for i in 0..count {
                    let kind = if i % 4 == 0 {
                        EntityKind::Orb(1)
                    } else {
                        EntityKind::Item {
                            item: "rotten_flesh".to_owned(),
                            count: 1,
                        }
                    };
                    tracker.capture_entity_spawn(EntitySpawn::new(kind, [0.0, 64.0, 0.0]));
                }
                tracker.complete_phase(&mut host).unwrap();
            });
            black_box(host.finalized);
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_push_complete,
    bench_block_capture,
    bench_death_unwind,
);
criterion_main!(benches);

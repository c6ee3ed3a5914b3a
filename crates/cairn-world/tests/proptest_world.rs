//! Property tests for the block store.
//!
//! Restoring the original snapshots of a sequence of writes, newest first,
//! must bring the world back to its starting hash. This is exactly what a
//! cancelled capture does during unwind.

use cairn_world::prelude::*;
use proptest::prelude::*;

const BLOCKS: &[&str] = &["air", "stone", "dirt", "leaves", "glass"];

fn write_strategy() -> impl Strategy<Value = (i32, i32, usize, u8)> {
    (-4..4i32, -4..4i32, 0..BLOCKS.len(), 0..3u8)
}

proptest! {
    #[test]
    fn undoing_writes_in_reverse_restores_hash(
        writes in prop::collection::vec(write_strategy(), 0..60)
    ) {
        let mut world = World::new();
        world.set_block(BlockPos::new(0, 64, 0), BlockState::of("bedrock"));
        let start = world.state_hash();

        let mut originals = Vec::new();
        for (x, z, block, meta) in writes {
            let pos = BlockPos::new(x, 64, z);
            let new = BlockState::of(BLOCKS[block]).with_meta(if block == 0 { 0 } else { meta });
            let current = world.block(pos);
            originals.push(BlockSnapshot::new(pos, current.clone(), BlockChangeFlags::ALL)
                .tagged(CaptureType::classify(&current, &new)));
            world.set_block(pos, new);
        }

        for snapshot in originals.iter().rev() {
            world.restore(snapshot);
        }
        prop_assert_eq!(world.state_hash(), start);
    }

    #[test]
    fn air_writes_never_count_as_blocks(
        xs in prop::collection::vec(-8..8i32, 0..30)
    ) {
        let mut world = World::new();
        for x in &xs {
            world.set_block(BlockPos::new(*x, 0, 0), BlockState::air());
        }
        prop_assert_eq!(world.block_count(), 0);
    }
}

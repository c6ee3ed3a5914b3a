//! Block vocabulary: positions, states, change flags and snapshots.
//!
//! A [`BlockSnapshot`] is the unit the phase engine captures: the state that
//! occupied a position at the moment a write was intercepted, tagged with the
//! [`CaptureType`] that explains how the write would have changed it. A
//! [`BlockTransition`] pairs that original snapshot with the replacement the
//! caller is about to write, or with nothing when the write was absorbed into
//! a capture buffer.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The column of 16x16 blocks containing this position.
    pub fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.x >> 4, self.z >> 4)
    }

    /// Block-center coordinates, used when an entity spawns at a block.
    pub fn center(self) -> [f64; 3] {
        [
            self.x as f64 + 0.5,
            self.y as f64 + 0.5,
            self.z as f64 + 0.5,
        ]
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk column coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Lowest-corner block of this chunk at the given height.
    pub fn origin(self, y: i32) -> BlockPos {
        BlockPos::new(self.x << 4, y, self.z << 4)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

// ---------------------------------------------------------------------------
// BlockType / BlockState
// ---------------------------------------------------------------------------

/// Name of the designated empty block.
pub const AIR: &str = "air";

/// A block kind, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockType(String);

impl BlockType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The empty block.
    pub fn air() -> Self {
        Self(AIR.to_owned())
    }

    pub fn is_air(&self) -> bool {
        self.0 == AIR
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A block kind plus its variant bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    pub block: BlockType,
    pub meta: u8,
}

impl BlockState {
    /// Default variant of the named block.
    pub fn of(name: &str) -> Self {
        Self {
            block: BlockType::new(name),
            meta: 0,
        }
    }

    pub fn air() -> Self {
        Self {
            block: BlockType::air(),
            meta: 0,
        }
    }

    pub fn with_meta(mut self, meta: u8) -> Self {
        self.meta = meta;
        self
    }

    pub fn is_air(&self) -> bool {
        self.block.is_air()
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.meta == 0 {
            write!(f, "{}", self.block)
        } else {
            write!(f, "{}:{}", self.block, self.meta)
        }
    }
}

// ---------------------------------------------------------------------------
// BlockChangeFlags
// ---------------------------------------------------------------------------

/// Side-effect flags carried with a block write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockChangeFlags(u8);

impl BlockChangeFlags {
    pub const NONE: Self = Self(0);
    /// Notify neighbouring blocks of the change.
    pub const NEIGHBOR_NOTIFY: Self = Self(1);
    /// Send the change to observing clients.
    pub const CLIENT_SYNC: Self = Self(2);
    /// Suppress re-rendering on the client.
    pub const NO_RERENDER: Self = Self(4);
    pub const ALL: Self = Self(1 | 2);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for BlockChangeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// CaptureType
// ---------------------------------------------------------------------------

/// How a captured original snapshot relates to the write that displaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureType {
    /// A block was replaced by air.
    Break,
    /// A block was replaced by a different block.
    Change,
    /// A block decayed away (leaves, fire); only the removal is kept.
    Decay,
    /// A block's variant changed but its kind did not.
    Modify,
    /// Air was replaced by a block.
    Place,
}

impl CaptureType {
    /// Classify a write from `current` to `new`.
    pub fn classify(current: &BlockState, new: &BlockState) -> Self {
        if new.is_air() {
            CaptureType::Break
        } else if current.is_air() {
            CaptureType::Place
        } else if current.block == new.block {
            CaptureType::Modify
        } else {
            CaptureType::Change
        }
    }
}

// ---------------------------------------------------------------------------
// BlockSnapshot / BlockTransition
// ---------------------------------------------------------------------------

/// The state of one position at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub pos: BlockPos,
    pub state: BlockState,
    pub flags: BlockChangeFlags,
    /// Set on original snapshots that were placed in a capture buffer.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub capture_type: Option<CaptureType>,
}

impl BlockSnapshot {
    pub fn new(pos: BlockPos, state: BlockState, flags: BlockChangeFlags) -> Self {
        Self {
            pos,
            state,
            flags,
            capture_type: None,
        }
    }

    pub fn tagged(mut self, capture_type: CaptureType) -> Self {
        self.capture_type = Some(capture_type);
        self
    }
}

/// An intercepted block write: what was there, and what will replace it.
///
/// `replacement` is `None` when the write was absorbed into a capture buffer
/// and the caller must not apply it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTransition {
    pub original: BlockSnapshot,
    pub replacement: Option<BlockSnapshot>,
}

impl BlockTransition {
    /// Whether the caller should go on and write the replacement itself.
    pub fn applies_directly(&self) -> bool {
        self.replacement.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_of_negative_positions_rounds_down() {
        assert_eq!(BlockPos::new(0, 64, 0).chunk(), ChunkPos::new(0, 0));
        assert_eq!(BlockPos::new(15, 0, 16).chunk(), ChunkPos::new(0, 1));
        assert_eq!(BlockPos::new(-1, 0, -17).chunk(), ChunkPos::new(-1, -2));
        assert_eq!(ChunkPos::new(-1, 2).origin(70), BlockPos::new(-16, 70, 32));
    }

    #[test]
    fn capture_type_classification() {
        let stone = BlockState::of("stone");
        let dirt = BlockState::of("dirt");
        let air = BlockState::air();
        assert_eq!(CaptureType::classify(&stone, &air), CaptureType::Break);
        assert_eq!(CaptureType::classify(&air, &stone), CaptureType::Place);
        assert_eq!(CaptureType::classify(&stone, &dirt), CaptureType::Change);
        assert_eq!(
            CaptureType::classify(&stone, &stone.clone().with_meta(2)),
            CaptureType::Modify
        );
    }

    #[test]
    fn flags_compose() {
        let flags = BlockChangeFlags::NEIGHBOR_NOTIFY | BlockChangeFlags::NO_RERENDER;
        assert!(flags.contains(BlockChangeFlags::NEIGHBOR_NOTIFY));
        assert!(!flags.contains(BlockChangeFlags::CLIENT_SYNC));
        assert_eq!(BlockChangeFlags::ALL.bits(), 3);
    }

    #[test]
    fn untagged_snapshot_omits_capture_type_in_json() {
        let snap = BlockSnapshot::new(
            BlockPos::new(1, 2, 3),
            BlockState::of("stone"),
            BlockChangeFlags::ALL,
        );
        let json = serde_json::to_value(&snap).unwrap();
        assert!(json.get("capture_type").is_none());

        let tagged = snap.tagged(CaptureType::Decay);
        let json = serde_json::to_value(&tagged).unwrap();
        assert_eq!(json["capture_type"], "Decay");
    }
}

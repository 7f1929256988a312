//! Destination quadtree.
//!
//! The quadtree is stored as an arena: [`CompositeDestination`] nodes are
//! addressed by [`CompositeId`], [`DestinationTile`]s by [`TileKey`], and a
//! quad map indexes composites by `level → row → column`. Neighbour links
//! between tiles are keys into the arena, so there are no reference cycles
//! and reciprocity can be checked over the whole tree.
//!
//! # Neighbour Positions
//!
//! Positions are numbered anticlockwise starting at the left edge; `y`
//! grows northwards:
//!
//! ```text
//!   AboveLeft(7)   Above(6)   RightAbove(5)
//!   Left(0)         tile      Right(4)
//!   LeftBelow(1)   Below(2)   BelowRight(3)
//! ```
//!
//! The opposite of position `p` is `(p + 4) % 8`.

mod buffers;
mod composite;
mod graph;
mod tile;

pub use buffers::{HeightDelta, HeightField, PixelFormat, TileImage};
pub use composite::{CompositeDestination, CompositeKind};
pub use graph::DestinationGraph;
pub use tile::{DestinationTile, ImageryLayer, TerrainLayer};

use serde::{Deserialize, Serialize};

/// Address of a tile: quadtree level and column/row within the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub level: u32,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// Key of the tile at `position` relative to this one, if it can exist.
    pub fn offset(&self, position: Position) -> Option<TileKey> {
        let (dx, dy) = position.offset();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        Some(TileKey::new(self.level, x, y))
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{} X{} Y{}", self.level, self.x, self.y)
    }
}

/// Index of a composite in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeId(pub(crate) usize);

impl CompositeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One of the eight compass positions around a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Left = 0,
    LeftBelow = 1,
    Below = 2,
    BelowRight = 3,
    Right = 4,
    RightAbove = 5,
    Above = 6,
    AboveLeft = 7,
}

impl Position {
    /// All positions in index order.
    pub const ALL: [Position; 8] = [
        Position::Left,
        Position::LeftBelow,
        Position::Below,
        Position::BelowRight,
        Position::Right,
        Position::RightAbove,
        Position::Above,
        Position::AboveLeft,
    ];

    /// Corner positions in equalization order.
    pub const CORNERS: [Position; 4] = [
        Position::LeftBelow,
        Position::BelowRight,
        Position::RightAbove,
        Position::AboveLeft,
    ];

    /// Edge positions in equalization order.
    pub const EDGES: [Position; 4] = [Position::Left, Position::Below, Position::Right, Position::Above];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Position from an index, wrapping modulo 8.
    #[inline]
    pub fn from_index(index: usize) -> Position {
        Position::ALL[index % 8]
    }

    /// The position facing this one from the neighbour's side.
    #[inline]
    pub fn opposite(self) -> Position {
        Position::from_index(self.index() + 4)
    }

    /// Position `steps` places further round, wrapping.
    #[inline]
    pub fn rotate(self, steps: usize) -> Position {
        Position::from_index(self.index() + steps)
    }

    pub fn is_corner(self) -> bool {
        self.index() % 2 == 1
    }

    /// `(dx, dy)` step to the neighbour at this position.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Position::Left => (-1, 0),
            Position::LeftBelow => (-1, -1),
            Position::Below => (0, -1),
            Position::BelowRight => (1, -1),
            Position::Right => (1, 0),
            Position::RightAbove => (1, 1),
            Position::Above => (0, 1),
            Position::AboveLeft => (-1, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_is_involution() {
        for p in Position::ALL {
            assert_eq!(p.opposite().opposite(), p);
            let (dx, dy) = p.offset();
            assert_eq!(p.opposite().offset(), (-dx, -dy));
        }
        assert_eq!(Position::Left.opposite(), Position::Right);
        assert_eq!(Position::LeftBelow.opposite(), Position::RightAbove);
    }

    #[test]
    fn test_corners_and_edges() {
        assert!(Position::CORNERS.iter().all(|p| p.is_corner()));
        assert!(Position::EDGES.iter().all(|p| !p.is_corner()));
    }

    #[test]
    fn test_rotate_wraps() {
        assert_eq!(Position::AboveLeft.rotate(1), Position::Left);
        assert_eq!(Position::LeftBelow.rotate(7), Position::Left);
    }

    #[test]
    fn test_key_offset() {
        let key = TileKey::new(2, 0, 3);
        assert_eq!(key.offset(Position::Left), None);
        assert_eq!(key.offset(Position::RightAbove), Some(TileKey::new(2, 1, 4)));
        assert_eq!(key.offset(Position::Below), Some(TileKey::new(2, 0, 2)));
    }
}

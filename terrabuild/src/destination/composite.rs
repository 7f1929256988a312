//! Composite quadtree nodes.

use serde::{Deserialize, Serialize};

use super::{CompositeId, TileKey};
use crate::extents::GeospatialExtents;

/// How a composite presents its tiles and children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeKind {
    /// Plain container; used at the deepest level.
    Group,
    /// Level-of-detail switch between own tiles and children.
    Lod,
}

/// A quadtree node owning the tiles of one cell and up to four children.
#[derive(Debug, Clone)]
pub struct CompositeDestination {
    pub id: CompositeId,
    pub kind: CompositeKind,
    /// Name of the cell, same scheme as tile names.
    pub name: String,
    pub level: u32,
    pub tile_x: u32,
    pub tile_y: u32,
    pub extents: GeospatialExtents,
    pub tiles: Vec<TileKey>,
    pub children: Vec<CompositeId>,
    pub parent: Option<CompositeId>,
    /// Distance beyond which this node's tiles are no longer shown.
    pub max_visible_distance: f64,
    /// Set once the children's sub-tile group has been emitted.
    pub sub_tiles_generated: bool,
}

impl CompositeDestination {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// File name of the group holding this node's children.
    pub fn sub_tile_name(&self, extension: &str) -> String {
        format!("{}_subtile{}", self.name, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_tile_name() {
        let composite = CompositeDestination {
            id: CompositeId(0),
            kind: CompositeKind::Lod,
            name: "out_L1_X0_Y1".to_string(),
            level: 1,
            tile_x: 0,
            tile_y: 1,
            extents: GeospatialExtents::new(0.0, 0.0, 1.0, 1.0, false),
            tiles: Vec::new(),
            children: Vec::new(),
            parent: Some(CompositeId(0)),
            max_visible_distance: 1.0,
            sub_tiles_generated: false,
        };
        assert_eq!(composite.sub_tile_name(".json"), "out_L1_X0_Y1_subtile.json");
        assert!(composite.is_leaf());
        assert!(!composite.is_root());
    }
}

//! Tile and group output.
//!
//! Population strategies hand every completed tile and every LOD group to a
//! [`TileEmitter`]. The emitter decides how they are persisted; the engine
//! only fixes the names and the visibility ranges.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │ TilePopulationStrategy   │
//! │                          │
//! │   &mut dyn TileEmitter   │
//! └────────────┬─────────────┘
//!              │ emit_tile / emit_group
//!              ▼
//! ┌──────────────────────────┐
//! │      TileEmitter         │ (trait)
//! └────────────┬─────────────┘
//!              │
//!              ▼
//! ┌──────────────────────────┐
//! │    DirectoryEmitter      │  PNG layers + JSON descriptors
//! └──────────────────────────┘
//! ```
//!
//! # Naming
//!
//! | Item | Name |
//! |------|------|
//! | Tile | `<basename>_L<level>_X<x>_Y<y>` |
//! | Paged sub-tile group | `<composite name>_subtile<ext>` |
//! | Root group | `<basename><ext>` |
//! | Non-root group (single tree) | `<composite name><ext>` |

mod directory;
mod error;
mod group;

pub use directory::DirectoryEmitter;
pub use error::EmitError;
pub use group::{paged_root_group, sub_tile_group, tree_group, EmittedGroup, GroupContent, GroupEntry};

use crate::destination::{DestinationTile, HeightDelta, HeightField, TileImage, TileKey};
use crate::extents::GeospatialExtents;
use crate::source::ModelRef;

/// Name of the tile at `(level, x, y)`.
pub fn tile_name(basename: &str, level: u32, x: u32, y: u32) -> String {
    format!("{}_L{}_X{}_Y{}", basename, level, x, y)
}

/// File name of the root group.
pub fn root_file_name(basename: &str, extension: &str) -> String {
    format!("{}{}", basename, extension)
}

/// A completed tile, borrowed for output.
#[derive(Debug, Clone)]
pub struct EmittedTile<'a> {
    pub name: &'a str,
    pub key: TileKey,
    pub extents: GeospatialExtents,
    /// One entry per imagery layer; `None` where no source covered it.
    pub images: Vec<Option<&'a TileImage>>,
    pub height_field: Option<&'a HeightField>,
    /// Boundary gradients indexed by neighbour position.
    pub height_deltas: [Option<HeightDelta>; 8],
    pub models: &'a [ModelRef],
}

impl<'a> EmittedTile<'a> {
    /// Borrow the output view of `tile`.
    pub fn from_tile(tile: &'a DestinationTile) -> Self {
        Self {
            name: &tile.name,
            key: tile.key,
            extents: tile.extents,
            images: tile.imagery.iter().map(|layer| layer.image.as_ref()).collect(),
            height_field: tile.height_field(),
            height_deltas: tile.height_deltas,
            models: &tile.models,
        }
    }
}

/// Receives completed tiles and LOD groups.
pub trait TileEmitter {
    /// Persist one tile.
    fn emit_tile(&mut self, tile: &EmittedTile<'_>) -> Result<(), EmitError>;

    /// Persist one group.
    fn emit_group(&mut self, group: &EmittedGroup) -> Result<(), EmitError>;

    /// Called once after the last tile and group.
    fn finish(&mut self) -> Result<(), EmitError> {
        Ok(())
    }
}

/// Emitter that keeps names in memory, for asserting on emission order.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingEmitter {
    pub tiles: Vec<TileKey>,
    pub groups: Vec<EmittedGroup>,
    /// Interleaved record of tile names and group file names.
    pub order: Vec<String>,
}

#[cfg(test)]
impl TileEmitter for RecordingEmitter {
    fn emit_tile(&mut self, tile: &EmittedTile<'_>) -> Result<(), EmitError> {
        self.tiles.push(tile.key);
        self.order.push(tile.name.to_string());
        Ok(())
    }

    fn emit_group(&mut self, group: &EmittedGroup) -> Result<(), EmitError> {
        self.order.push(group.file_name.clone());
        self.groups.push(group.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{CompositeId, PixelFormat};

    #[test]
    fn test_tile_name() {
        assert_eq!(tile_name("output", 3, 5, 2), "output_L3_X5_Y2");
        assert_eq!(root_file_name("output", ".json"), "output.json");
    }

    #[test]
    fn test_emitted_tile_borrows_layers() {
        let mut tile = DestinationTile::new(
            TileKey::new(1, 0, 1),
            "t_L1_X0_Y1".to_string(),
            GeospatialExtents::new(0.0, 0.0, 1.0, 1.0, false),
            CompositeId(0),
        );
        tile.imagery_layer_mut(1).image = Some(TileImage::new(4, 4, PixelFormat::Rgb));

        let emitted = EmittedTile::from_tile(&tile);
        assert_eq!(emitted.images.len(), 2);
        assert!(emitted.images[0].is_none());
        assert_eq!(emitted.images[1].map(|i| i.width()), Some(4));
        assert!(emitted.height_field.is_none());
    }
}

//! Quadtree tiles.

use super::{CompositeId, HeightDelta, HeightField, Position, TileImage, TileKey};
use crate::builder::{compute_image_resolution, compute_terrain_resolution, ResolutionSizing};
use crate::config::DataSetConfig;
use crate::extents::GeospatialExtents;
use crate::source::ModelRef;

/// One imagery layer of a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageryLayer {
    /// Finest pixel spacing among overlapping sources; infinite when none.
    pub max_source_resolution_x: f64,
    pub max_source_resolution_y: f64,
    /// Colour buffer, allocated during population.
    pub image: Option<TileImage>,
}

impl Default for ImageryLayer {
    fn default() -> Self {
        Self {
            max_source_resolution_x: f64::INFINITY,
            max_source_resolution_y: f64::INFINITY,
            image: None,
        }
    }
}

/// Terrain of a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainLayer {
    /// Finest sample spacing among overlapping sources; infinite when none.
    pub max_source_resolution_x: f64,
    pub max_source_resolution_y: f64,
    /// Height buffer, allocated during population.
    pub height_field: Option<HeightField>,
}

impl Default for TerrainLayer {
    fn default() -> Self {
        Self {
            max_source_resolution_x: f64::INFINITY,
            max_source_resolution_y: f64::INFINITY,
            height_field: None,
        }
    }
}

/// A single quadtree leaf at `(level, x, y)`.
#[derive(Debug, Clone)]
pub struct DestinationTile {
    pub key: TileKey,
    /// `<basename>_L<level>_X<x>_Y<y>`
    pub name: String,
    pub extents: GeospatialExtents,
    /// Composite owning this tile.
    pub composite: CompositeId,
    /// One entry per texture layer.
    pub imagery: Vec<ImageryLayer>,
    pub terrain: TerrainLayer,
    /// Models overlapping this tile.
    pub models: Vec<ModelRef>,
    /// Same-level neighbours, indexed by [`Position`].
    pub neighbours: [Option<TileKey>; 8],
    /// Per-position equalization flags.
    pub equalized: [bool; 8],
    /// Boundary height gradients, indexed by [`Position`].
    pub height_deltas: [Option<HeightDelta>; 8],
    /// Deepest level any overlapping source contributes to.
    pub max_source_level: u32,
    /// Set once the tile is populated and equalized.
    pub complete: bool,
}

impl DestinationTile {
    pub fn new(key: TileKey, name: String, extents: GeospatialExtents, composite: CompositeId) -> Self {
        Self {
            key,
            name,
            extents,
            composite,
            imagery: Vec::new(),
            terrain: TerrainLayer::default(),
            models: Vec::new(),
            neighbours: [None; 8],
            equalized: [false; 8],
            height_deltas: [None; 8],
            max_source_level: 0,
            complete: false,
        }
    }

    /// Neighbour at `position`.
    #[inline]
    pub fn neighbour(&self, position: Position) -> Option<TileKey> {
        self.neighbours[position.index()]
    }

    /// Imagery layer `layer`, created on demand.
    pub fn imagery_layer_mut(&mut self, layer: usize) -> &mut ImageryLayer {
        if self.imagery.len() <= layer {
            self.imagery.resize_with(layer + 1, ImageryLayer::default);
        }
        &mut self.imagery[layer]
    }

    /// Buffer size and spacing of imagery layer `layer`.
    pub fn image_sizing(&self, layer: usize, config: &DataSetConfig) -> Option<ResolutionSizing> {
        let imagery = self.imagery.get(layer)?;
        compute_image_resolution(
            &self.extents,
            imagery.max_source_resolution_x,
            imagery.max_source_resolution_y,
            config.max_image_tile_size,
            config.max_image_tile_size,
        )
    }

    /// Grid size and spacing of the terrain.
    pub fn terrain_sizing(&self, config: &DataSetConfig) -> Option<ResolutionSizing> {
        compute_terrain_resolution(
            &self.extents,
            self.terrain.max_source_resolution_x,
            self.terrain.max_source_resolution_y,
            config.max_terrain_tile_size,
            config.max_terrain_tile_size,
        )
    }

    /// Image buffer of `layer`, if allocated.
    pub fn image(&self, layer: usize) -> Option<&TileImage> {
        self.imagery.get(layer)?.image.as_ref()
    }

    pub fn height_field(&self) -> Option<&HeightField> {
        self.terrain.height_field.as_ref()
    }

    /// Returns true if any buffer is allocated.
    pub fn has_buffers(&self) -> bool {
        self.terrain.height_field.is_some() || self.imagery.iter().any(|l| l.image.is_some())
    }

    /// Drop all pixel and height buffers.
    pub fn release_buffers(&mut self) {
        for layer in &mut self.imagery {
            layer.image = None;
        }
        self.terrain.height_field = None;
        self.models.clear();
    }
}

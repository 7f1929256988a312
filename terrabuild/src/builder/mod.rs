//! Quadtree construction.
//!
//! The builder decides, from extents and resolution metadata alone, how
//! finely the destination area must be subdivided. No raster is read.
//!
//! # Subdivision
//!
//! Each node gets one tile. The tile's maximum source resolution is the
//! finest pixel spacing among level-eligible sources overlapping it; from
//! that the image and terrain sizing follow. An axis is divided when the
//! tile would render coarser than its sources can supply:
//!
//! ```text
//! need_to_divide_x = tile_res_x * sensitivity > source_res_x
//! ```
//!
//! | Divide | Children | Indices |
//! |--------|----------|---------|
//! | X and Y | 4 quadrants | `(2x, 2y) (2x+1, 2y) (2x, 2y+1) (2x+1, 2y+1)` |
//! | X only | 2 halves | `(2x, y') (2x+1, y')` with `y' = 2y` |
//! | Y only | 2 halves | `(x', 2y) (x', 2y+1)` with `x' = 2x` |
//!
//! Very tall tiles (`h / w > 1.414`) are never divided in X and very wide
//! ones (`h / w < 0.707`) never in Y, which keeps tiles near square.
//! Recursion stops at the configured level count, at the deepest level any
//! overlapping source allows, or when no axis needs dividing.
//!
//! # Visibility
//!
//! The root is visible up to `radius * radius_to_max_visible_distance_ratio`;
//! each generation halves the distance, so all siblings switch together.

mod sizing;

pub use sizing::{
    compute_image_resolution, compute_terrain_resolution, ResolutionSizing, MIN_IMAGE_TILE_SIZE,
    MIN_TERRAIN_TILE_SIZE,
};

use tracing::{debug, info};

use crate::config::DataSetConfig;
use crate::destination::{CompositeId, CompositeKind, DestinationGraph, DestinationTile, TileKey};
use crate::emit::tile_name;
use crate::extents::GeospatialExtents;
use crate::source::{SourceGraph, SourceType};
use crate::spatial::CoordinateSystem;

/// Aspect ratio above which a tile is not divided in X.
pub const MAX_ASPECT_FOR_X_DIVISION: f64 = 1.414;

/// Aspect ratio below which a tile is not divided in Y.
pub const MIN_ASPECT_FOR_Y_DIVISION: f64 = 0.707;

/// Record on `tile` the finest resolution of every source overlapping it.
///
/// Only sources eligible at the tile's level count. Models are ignored.
/// Also records the deepest level any contributing source allows.
pub fn compute_maximum_source_resolution(tile: &mut DestinationTile, sources: &SourceGraph, cs: &CoordinateSystem) {
    let level = tile.key.level;
    for source in sources {
        if source.source_type() == SourceType::Model || !source.is_level_eligible(level) {
            continue;
        }
        if !source.intersects(&tile.extents, cs) {
            continue;
        }
        let Some((res_x, res_y)) = source.resolution(cs) else {
            continue;
        };

        match source.source_type() {
            SourceType::Image => {
                let layer = tile.imagery_layer_mut(source.layer());
                layer.max_source_resolution_x = layer.max_source_resolution_x.min(res_x);
                layer.max_source_resolution_y = layer.max_source_resolution_y.min(res_y);
            }
            SourceType::HeightField => {
                tile.terrain.max_source_resolution_x = tile.terrain.max_source_resolution_x.min(res_x);
                tile.terrain.max_source_resolution_y = tile.terrain.max_source_resolution_y.min(res_y);
            }
            SourceType::Model => {}
        }
        tile.max_source_level = tile.max_source_level.max(source.max_level());
    }
}

/// Build the destination quadtree over `extents` in `cs`.
///
/// Neighbour links are computed before returning.
pub fn build_destination_graph(
    config: &DataSetConfig,
    sources: &SourceGraph,
    extents: GeospatialExtents,
    cs: &CoordinateSystem,
) -> DestinationGraph {
    let mut builder = QuadtreeBuilder {
        config,
        sources,
        cs,
        graph: DestinationGraph::new(cs.clone()),
    };

    let root_distance = extents.radius() * config.radius_to_max_visible_distance_ratio;
    builder.build_composite(None, extents, 0, 0, 0, root_distance);

    let mut graph = builder.graph;
    graph.compute_neighbours();

    info!(
        composites = graph.num_composites(),
        tiles = graph.num_tiles(),
        levels = graph.levels().len(),
        "Built destination graph"
    );
    graph
}

struct QuadtreeBuilder<'a> {
    config: &'a DataSetConfig,
    sources: &'a SourceGraph,
    cs: &'a CoordinateSystem,
    graph: DestinationGraph,
}

impl QuadtreeBuilder<'_> {
    fn build_composite(
        &mut self,
        parent: Option<CompositeId>,
        extents: GeospatialExtents,
        level: u32,
        x: u32,
        y: u32,
        max_visible_distance: f64,
    ) -> CompositeId {
        let bottom = level + 1 >= self.config.num_levels;
        let kind = if bottom { CompositeKind::Group } else { CompositeKind::Lod };
        let name = tile_name(&self.config.basename, level, x, y);

        let id = self
            .graph
            .add_composite(kind, name.clone(), level, x, y, extents, parent, max_visible_distance);

        let mut tile = DestinationTile::new(TileKey::new(level, x, y), name, extents, id);
        compute_maximum_source_resolution(&mut tile, self.sources, self.cs);

        let (divide_x, divide_y) = if bottom || level >= tile.max_source_level {
            (false, false)
        } else {
            self.need_to_divide(&tile)
        };
        self.graph.add_tile(tile);

        let child_distance = max_visible_distance * 0.5;
        let (nx, ny) = (x * 2, y * 2);
        let next = level + 1;

        match (divide_x, divide_y) {
            (true, true) => {
                debug!(level, tile_x = x, tile_y = y, "Dividing in X and Y");
                let [bottom_left, bottom_right, top_left, top_right] = extents.split_quadrants();
                self.build_composite(Some(id), bottom_left, next, nx, ny, child_distance);
                self.build_composite(Some(id), bottom_right, next, nx + 1, ny, child_distance);
                self.build_composite(Some(id), top_left, next, nx, ny + 1, child_distance);
                self.build_composite(Some(id), top_right, next, nx + 1, ny + 1, child_distance);
            }
            (true, false) => {
                debug!(level, tile_x = x, tile_y = y, "Dividing in X");
                let [left, right] = extents.split_x();
                self.build_composite(Some(id), left, next, nx, ny, child_distance);
                self.build_composite(Some(id), right, next, nx + 1, ny, child_distance);
            }
            (false, true) => {
                debug!(level, tile_x = x, tile_y = y, "Dividing in Y");
                let [below, above] = extents.split_y();
                self.build_composite(Some(id), below, next, nx, ny, child_distance);
                self.build_composite(Some(id), above, next, nx, ny + 1, child_distance);
            }
            (false, false) => {
                debug!(level, tile_x = x, tile_y = y, "Leaf");
            }
        }

        id
    }

    fn need_to_divide(&self, tile: &DestinationTile) -> (bool, bool) {
        let sensitivity = self.config.resolution_sensitivity;
        let mut divide_x = false;
        let mut divide_y = false;

        for (layer, imagery) in tile.imagery.iter().enumerate() {
            if let Some(sizing) = tile.image_sizing(layer, self.config) {
                divide_x |= sizing.res_x * sensitivity > imagery.max_source_resolution_x;
                divide_y |= sizing.res_y * sensitivity > imagery.max_source_resolution_y;
            }
        }

        if let Some(sizing) = tile.terrain_sizing(self.config) {
            divide_x |= sizing.res_x * sensitivity > tile.terrain.max_source_resolution_x;
            divide_y |= sizing.res_y * sensitivity > tile.terrain.max_source_resolution_y;
        }

        if divide_x && divide_y {
            let aspect = tile.extents.aspect_ratio();
            if aspect > MAX_ASPECT_FOR_X_DIVISION {
                divide_x = false;
            } else if aspect < MIN_ASPECT_FOR_Y_DIVISION {
                divide_y = false;
            }
        }

        (divide_x, divide_y)
    }
}

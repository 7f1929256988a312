//! Tile population.
//!
//! Populating a tile allocates its buffers from the sizing decided by the
//! builder, then draws every eligible source into them in source graph
//! order (coarsest first, so finer data ends up on top).
//!
//! ```text
//! allocate ──► for each source ──► optimize_resolution ──► skirt
//!                 │
//!                 ├─ Image       → read_image   (composite into layer)
//!                 ├─ HeightField → read_heights (bilinear probe | bulk)
//!                 └─ Model       → attach when extents overlap
//! ```
//!
//! # Window Mapping
//!
//! The overlap of tile and source is mapped onto both pixel grids by linear
//! ratio of its position within each extents, rounding outwards. Raster
//! windows have their origin at the top-left; destination rows are counted
//! from the south and flipped where written.
//!
//! # Strategies
//!
//! [`TilePopulationStrategy`] decides when tiles are read, equalized,
//! emitted and released. See [`WholeTreeStrategy`] and
//! [`RowStreamingStrategy`].

mod height;
mod imagery;
mod strategy;
mod window;

pub use strategy::{strategy_for_mode, RowStreamingStrategy, TilePopulationStrategy, WholeTreeStrategy};

use tracing::debug;

use crate::config::DataSetConfig;
use crate::destination::{DestinationTile, HeightField, TileImage};
use crate::raster::RasterError;
use crate::source::{SourceData, SourceGraph, SourceType};
use crate::spatial::CoordinateSystem;

/// Destination/source density ratio above which imagery is resampled
/// bilinearly instead of read at destination size.
pub const IMAGE_RESAMPLE_TOLERANCE: f64 = 1.1;

/// Grid size a flat height field collapses to.
pub const FLAT_TILE_SIZE: u32 = 8;

/// Aspect ratios beyond which a flat grid gains rows or columns.
const FLAT_TALL_RATIO: f64 = 1.2;
const FLAT_WIDE_RATIO: f64 = 0.8;

/// Allocate zero-filled buffers for every layer the builder sized.
pub fn allocate(tile: &mut DestinationTile, config: &DataSetConfig) {
    for layer in 0..tile.imagery.len() {
        if let Some(sizing) = tile.image_sizing(layer, config) {
            tile.imagery[layer].image = Some(TileImage::new(
                sizing.num_columns,
                sizing.num_rows,
                config.image_format,
            ));
        }
    }

    if let Some(sizing) = tile.terrain_sizing(config) {
        tile.terrain.height_field = Some(HeightField::new(
            sizing.num_columns,
            sizing.num_rows,
            (tile.extents.x_min, tile.extents.y_min),
            sizing.res_x,
            sizing.res_y,
        ));
    }
}

/// Populate `tile` from every level-eligible source.
pub fn read_tile(
    tile: &mut DestinationTile,
    sources: &SourceGraph,
    cs: &CoordinateSystem,
    config: &DataSetConfig,
) -> Result<(), RasterError> {
    allocate(tile, config);

    let level = tile.key.level;
    let extents = tile.extents;
    for source in sources {
        if !source.is_level_eligible(level) || !source.intersects(&extents, cs) {
            continue;
        }
        let Some(data) = source.data() else {
            continue;
        };

        match (source.source_type(), data) {
            (SourceType::Image, SourceData::Raster(raster)) => {
                let Some(image) = tile.imagery.get_mut(source.layer()).and_then(|l| l.image.as_mut()) else {
                    continue;
                };
                imagery::read_image(image, &extents, raster, cs)?;
            }
            (SourceType::HeightField, SourceData::Raster(raster)) => {
                let Some(height_field) = tile.terrain.height_field.as_mut() else {
                    continue;
                };
                height::read_heights(height_field, &extents, raster, cs, config)?;
            }
            (SourceType::Model, SourceData::Model(model)) => {
                tile.models.push(model.model.clone());
            }
            (source_type, _) => {
                debug!(source = %source.path().display(), %source_type, "Payload does not match source type");
            }
        }
    }

    optimize_resolution(tile);
    apply_skirt(tile, config);

    debug!(
        level,
        tile_x = tile.key.x,
        tile_y = tile.key.y,
        layers = tile.imagery.iter().filter(|l| l.image.is_some()).count(),
        terrain = tile.terrain.height_field.is_some(),
        models = tile.models.len(),
        "Read tile"
    );
    Ok(())
}

/// Shrink a flat height field to a small grid over the same extents.
///
/// The grid is [`FLAT_TILE_SIZE`] square, stretched along the longer axis
/// of elongated tiles.
pub fn optimize_resolution(tile: &mut DestinationTile) {
    let extents = tile.extents;
    let Some(height_field) = tile.terrain.height_field.as_mut() else {
        return;
    };
    let Some((min, max)) = height_field.min_max() else {
        return;
    };
    if min != max {
        return;
    }

    let mut columns = FLAT_TILE_SIZE;
    let mut rows = FLAT_TILE_SIZE;
    if extents.width() > 0.0 {
        let ratio = extents.height() / extents.width();
        if ratio > FLAT_TALL_RATIO {
            rows = (rows as f64 * ratio).ceil() as u32;
        } else if ratio < FLAT_WIDE_RATIO && ratio > 0.0 {
            columns = (columns as f64 / ratio).ceil() as u32;
        }
    }

    height_field.collapse(columns, rows, min);
    debug!(tile = %tile.key, columns, rows, height = min, "Collapsed flat tile");
}

/// Record the skirt depth on the tile's height field.
pub fn apply_skirt(tile: &mut DestinationTile, config: &DataSetConfig) {
    let radius = tile.extents.radius();
    if let Some(height_field) = tile.terrain.height_field.as_mut() {
        height_field.skirt_height = (radius * config.skirt_ratio as f64) as f32;
    }
}

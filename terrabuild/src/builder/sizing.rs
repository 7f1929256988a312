//! Tile buffer sizing from source resolution.
//!
//! A tile never needs more samples than its finest overlapping source can
//! supply, and never more than the configured maximum:
//!
//! ```text
//! full = 1 + ceil(extent / source_res)
//! n    = min(max, full)          terrain (at least 2)
//! n    = next_pow2(min(max, full)) imagery (at least 4)
//! res  = extent / (n - 1)
//! ```

use crate::extents::GeospatialExtents;

/// Smallest image edge in pixels.
pub const MIN_IMAGE_TILE_SIZE: u32 = 4;

/// Smallest height field edge in samples.
pub const MIN_TERRAIN_TILE_SIZE: u32 = 2;

/// Buffer dimensions and the sample spacing they imply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionSizing {
    pub num_columns: u32,
    pub num_rows: u32,
    pub res_x: f64,
    pub res_y: f64,
}

impl ResolutionSizing {
    fn new(extents: &GeospatialExtents, num_columns: u32, num_rows: u32) -> Self {
        Self {
            num_columns,
            num_rows,
            res_x: extents.width() / (num_columns - 1) as f64,
            res_y: extents.height() / (num_rows - 1) as f64,
        }
    }
}

fn usable(resolution: f64) -> bool {
    resolution.is_finite() && resolution > 0.0
}

/// Sample count needed along an axis at `resolution`, clamped to `max`.
fn required_samples(extent: f64, resolution: f64, max: u32) -> u32 {
    let full = 1.0 + (extent / resolution).ceil();
    if full >= max as f64 {
        max
    } else {
        full.max(1.0) as u32
    }
}

/// Image size for a tile over `extents` fed by sources of the given pixel
/// spacing.
///
/// Returns `None` when there is no usable source resolution, meaning no
/// imagery source overlaps the tile.
pub fn compute_image_resolution(
    extents: &GeospatialExtents,
    source_res_x: f64,
    source_res_y: f64,
    max_num_columns: u32,
    max_num_rows: u32,
) -> Option<ResolutionSizing> {
    if !usable(source_res_x) || !usable(source_res_y) || max_num_columns == 0 || max_num_rows == 0 {
        return None;
    }

    let num_columns = required_samples(extents.width(), source_res_x, max_num_columns)
        .next_power_of_two()
        .max(MIN_IMAGE_TILE_SIZE);
    let num_rows = required_samples(extents.height(), source_res_y, max_num_rows)
        .next_power_of_two()
        .max(MIN_IMAGE_TILE_SIZE);

    Some(ResolutionSizing::new(extents, num_columns, num_rows))
}

/// Height field size for a tile over `extents` fed by sources of the given
/// sample spacing.
///
/// Returns `None` when there is no usable source resolution.
pub fn compute_terrain_resolution(
    extents: &GeospatialExtents,
    source_res_x: f64,
    source_res_y: f64,
    max_num_columns: u32,
    max_num_rows: u32,
) -> Option<ResolutionSizing> {
    if !usable(source_res_x) || !usable(source_res_y) || max_num_columns == 0 || max_num_rows == 0 {
        return None;
    }

    let num_columns = required_samples(extents.width(), source_res_x, max_num_columns).max(MIN_TERRAIN_TILE_SIZE);
    let num_rows = required_samples(extents.height(), source_res_y, max_num_rows).max(MIN_TERRAIN_TILE_SIZE);

    Some(ResolutionSizing::new(extents, num_columns, num_rows))
}

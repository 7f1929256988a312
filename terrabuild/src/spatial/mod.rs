//! Spatial reference types.
//!
//! - [`GeoTransform`]: affine pixel-to-world mapping
//! - [`CoordinateSystem`]: a coordinate system definition with semantic equality
//! - [`SpatialProperties`]: raster dimensions, transform and coordinate
//!   system, together with the extents derived from them
//!
//! ```text
//!   pixel (0,0) ──────────── pixel (nx,0)
//!        │                        │
//!        │   geo_transform.apply  │   ──►  extents (union of the four
//!        │                        │         transformed corners)
//!   pixel (0,ny) ─────────── pixel (nx,ny)
//! ```

mod coordinate_system;
mod transform;

pub use coordinate_system::{CoordinateSystem, CoordinateSystemKind};
pub use transform::GeoTransform;

use crate::extents::GeospatialExtents;

/// Dimensions, transform and coordinate system of one raster in one
/// coordinate system.
///
/// A source keeps one instance for its native coordinate system and caches
/// further instances per destination coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialProperties {
    /// Raster width in pixels.
    pub num_values_x: u32,
    /// Raster height in pixels.
    pub num_values_y: u32,
    /// Pixel-to-world transform.
    pub geo_transform: GeoTransform,
    /// Coordinate system of the world coordinates.
    pub cs: Option<CoordinateSystem>,
    /// Derived extents; refreshed by [`compute_extents`](Self::compute_extents).
    pub extents: GeospatialExtents,
}

impl SpatialProperties {
    /// Create properties and compute their extents.
    pub fn new(
        num_values_x: u32,
        num_values_y: u32,
        geo_transform: GeoTransform,
        cs: Option<CoordinateSystem>,
    ) -> Self {
        let mut properties = Self {
            num_values_x,
            num_values_y,
            geo_transform,
            cs,
            extents: GeospatialExtents::empty(),
        };
        properties.compute_extents();
        properties
    }

    /// Recompute `extents` from the four raster corners.
    pub fn compute_extents(&mut self) {
        let nx = self.num_values_x as f64;
        let ny = self.num_values_y as f64;

        let mut extents = GeospatialExtents::empty();
        for (px, py) in [(0.0, 0.0), (nx, 0.0), (nx, ny), (0.0, ny)] {
            let (x, y) = self.geo_transform.apply(px, py);
            extents.expand_by_point(x, y);
        }
        extents.is_geographic = self.cs.as_ref().is_some_and(|cs| cs.is_geographic());

        self.extents = extents;
    }

    /// Pixel spacing along x: extents width over the number of values.
    pub fn resolution_x(&self) -> f64 {
        if self.num_values_x == 0 {
            return f64::INFINITY;
        }
        self.extents.width() / self.num_values_x as f64
    }

    /// Pixel spacing along y: extents height over the number of values.
    pub fn resolution_y(&self) -> f64 {
        if self.num_values_y == 0 {
            return f64::INFINITY;
        }
        self.extents.height() / self.num_values_y as f64
    }

    /// Diagonal resolution used to order sources from coarsest to finest.
    pub fn sort_value(&self) -> f64 {
        let rx = self.resolution_x();
        let ry = self.resolution_y();
        (rx * rx + ry * ry).sqrt()
    }
}

//! Raster access and warping interfaces.
//!
//! The engine never decodes file formats or performs projection math. It
//! consumes rasters through the [`RasterService`] / [`RasterDataset`] traits
//! and asks a [`WarpService`] for reprojected copies.
//!
//! # Provided Implementations
//!
//! | Type | Trait | Purpose |
//! |------|-------|---------|
//! | [`MemoryRaster`] | `RasterDataset` | In-memory bands, synthetic data and decoded images |
//! | [`ImageFileService`] | `RasterService` | PNG/JPEG/TIFF via the `image` crate plus world-file sidecars |
//! | [`NoWarpService`] | `WarpService` | Always reports transformer creation failure |
//! | [`GridResampleWarpService`] | `WarpService` | Regrids within one coordinate system |
//!
//! # Pixel Windows
//!
//! Windows are expressed in source pixels with `(0, 0)` at the top-left
//! corner. [`RasterDataset::read_window`] returns `out_width * out_height`
//! values, row-major, top row first, resampled with nearest neighbour when
//! the output size differs from the window size.

mod error;
mod image_file;
mod memory;
mod warp;

pub use error::{RasterError, WarpError};
pub use image_file::{world_file_path, ImageFileService};
pub use memory::MemoryRaster;
pub use warp::{GridResampleWarpService, NoWarpService};

use std::path::Path;
use std::sync::Arc;

use crate::spatial::{CoordinateSystem, GeoTransform};

/// Colour interpretation of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorInterpretation {
    /// Single-channel intensity or elevation.
    #[default]
    Gray,
    Red,
    Green,
    Blue,
    Alpha,
    /// No interpretation recorded.
    Undefined,
}

/// Per-band metadata.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandInfo {
    /// Colour interpretation.
    pub color: ColorInterpretation,
    /// Value marking missing samples.
    pub no_data: Option<f64>,
    /// Multiplier applied to raw values.
    pub scale: Option<f64>,
    /// Offset added after scaling.
    pub offset: Option<f64>,
}

impl BandInfo {
    /// Band info with the given colour interpretation and no other metadata.
    pub fn with_color(color: ColorInterpretation) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    /// Returns true if `value` equals this band's no-data value.
    #[inline]
    pub fn is_no_data(&self, value: f32) -> bool {
        self.no_data.is_some_and(|nd| value as f64 == nd)
    }
}

/// Rectangular pixel window in raster space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RasterWindow {
    /// Create a window.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns true if the window has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// An opened raster.
///
/// Implementations must be shareable across threads: tile reading within a
/// row runs in parallel against the same datasets.
pub trait RasterDataset: Send + Sync {
    /// Raster size `(width, height)` in pixels.
    fn size(&self) -> (u32, u32);

    /// Number of bands.
    fn band_count(&self) -> usize;

    /// Metadata for band `band` (0-based).
    fn band_info(&self, band: usize) -> BandInfo;

    /// Affine pixel-to-world transform, if the raster carries one.
    fn geo_transform(&self) -> Option<GeoTransform>;

    /// Coordinate system definition, if the raster carries one.
    fn projection(&self) -> Option<String>;

    /// Number of ground control points.
    fn gcp_count(&self) -> usize {
        0
    }

    /// Coordinate system of the ground control points.
    fn gcp_projection(&self) -> Option<String> {
        None
    }

    /// Read `window` of band `band`, resampled to `out_width * out_height`.
    fn read_window(
        &self,
        band: usize,
        window: RasterWindow,
        out_width: u32,
        out_height: u32,
    ) -> Result<Vec<f32>, RasterError>;
}

/// Opens rasters by path.
pub trait RasterService: Send + Sync {
    /// Open the raster at `path`.
    fn open(&self, path: &Path) -> Result<Arc<dyn RasterDataset>, RasterError>;
}

/// Output grid proposed by a [`WarpService`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpOutput {
    /// Output width in pixels.
    pub pixels: u32,
    /// Output height in lines.
    pub lines: u32,
    /// Output pixel-to-world transform in the target coordinate system.
    pub geo_transform: GeoTransform,
}

/// Reprojects rasters into another coordinate system.
pub trait WarpService: Send + Sync {
    /// Compute the output grid that covers `dataset` in `target_cs` at about
    /// its native density.
    fn suggested_output(
        &self,
        dataset: &dyn RasterDataset,
        source_cs: &CoordinateSystem,
        target_cs: &CoordinateSystem,
    ) -> Result<WarpOutput, WarpError>;

    /// Warp `dataset` onto `output`, writing the result to `path`.
    fn warp(
        &self,
        dataset: &dyn RasterDataset,
        source_cs: &CoordinateSystem,
        target_cs: &CoordinateSystem,
        output: &WarpOutput,
        path: &Path,
    ) -> Result<Arc<dyn RasterDataset>, WarpError>;
}

/// Validate a window against a raster size.
pub(crate) fn check_window(window: RasterWindow, size: (u32, u32)) -> Result<(), RasterError> {
    let fits_x = window.x.checked_add(window.width).is_some_and(|end| end <= size.0);
    let fits_y = window.y.checked_add(window.height).is_some_and(|end| end <= size.1);
    if fits_x && fits_y {
        Ok(())
    } else {
        Err(RasterError::WindowOutOfBounds {
            x: window.x,
            y: window.y,
            width: window.width,
            height: window.height,
            raster_width: size.0,
            raster_height: size.1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_info_no_data() {
        let info = BandInfo {
            no_data: Some(-9999.0),
            ..Default::default()
        };
        assert!(info.is_no_data(-9999.0));
        assert!(!info.is_no_data(0.0));
        assert!(!BandInfo::default().is_no_data(0.0));
    }

    #[test]
    fn test_check_window() {
        assert!(check_window(RasterWindow::new(0, 0, 10, 10), (10, 10)).is_ok());
        assert!(check_window(RasterWindow::new(5, 0, 6, 10), (10, 10)).is_err());
        assert!(check_window(RasterWindow::new(u32::MAX, 0, 2, 1), (10, 10)).is_err());
    }
}

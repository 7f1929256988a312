//! Reference warp services.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::{MemoryRaster, RasterDataset, RasterWindow, WarpError, WarpOutput, WarpService};
use crate::spatial::CoordinateSystem;

/// A warp service without any transformations.
///
/// Every request fails with [`WarpError::TransformerCreation`], so sources
/// that would need reprojection are kept as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWarpService;

impl WarpService for NoWarpService {
    fn suggested_output(
        &self,
        _dataset: &dyn RasterDataset,
        source_cs: &CoordinateSystem,
        target_cs: &CoordinateSystem,
    ) -> Result<WarpOutput, WarpError> {
        Err(transformer_error(source_cs, target_cs))
    }

    fn warp(
        &self,
        _dataset: &dyn RasterDataset,
        source_cs: &CoordinateSystem,
        target_cs: &CoordinateSystem,
        _output: &WarpOutput,
        _path: &Path,
    ) -> Result<Arc<dyn RasterDataset>, WarpError> {
        Err(transformer_error(source_cs, target_cs))
    }
}

/// Regrids a raster within a single coordinate system.
///
/// Handles the case where a source is already in the destination
/// coordinate system but sits at the wrong resolution. Requests between
/// non-equivalent coordinate systems fail with
/// [`WarpError::TransformerCreation`]. Output pixels take the nearest
/// source sample; pixels outside the source get the band's no-data value,
/// or zero.
///
/// The warped raster is kept in memory; `path` only names it in logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridResampleWarpService;

impl WarpService for GridResampleWarpService {
    fn suggested_output(
        &self,
        dataset: &dyn RasterDataset,
        source_cs: &CoordinateSystem,
        target_cs: &CoordinateSystem,
    ) -> Result<WarpOutput, WarpError> {
        if !source_cs.is_equivalent(target_cs) {
            return Err(transformer_error(source_cs, target_cs));
        }
        let geo_transform = dataset
            .geo_transform()
            .ok_or_else(|| WarpError::SuggestedOutput("raster has no geotransform".to_string()))?;
        let (pixels, lines) = dataset.size();
        Ok(WarpOutput {
            pixels,
            lines,
            geo_transform,
        })
    }

    fn warp(
        &self,
        dataset: &dyn RasterDataset,
        source_cs: &CoordinateSystem,
        target_cs: &CoordinateSystem,
        output: &WarpOutput,
        path: &Path,
    ) -> Result<Arc<dyn RasterDataset>, WarpError> {
        if !source_cs.is_equivalent(target_cs) {
            return Err(transformer_error(source_cs, target_cs));
        }
        let to_pixel = dataset
            .geo_transform()
            .and_then(|t| t.inverse())
            .ok_or_else(|| WarpError::SuggestedOutput("raster has no invertible geotransform".to_string()))?;

        let (width, height) = dataset.size();
        let band_count = dataset.band_count();
        let mut bands = Vec::with_capacity(band_count);
        let mut infos = Vec::with_capacity(band_count);

        for band in 0..band_count {
            let info = dataset.band_info(band);
            let source = dataset.read_window(band, RasterWindow::new(0, 0, width, height), width, height)?;
            let fill = info.no_data.unwrap_or(0.0) as f32;

            let mut values = Vec::with_capacity(output.pixels as usize * output.lines as usize);
            for j in 0..output.lines {
                for i in 0..output.pixels {
                    let (wx, wy) = output.geo_transform.apply(i as f64 + 0.5, j as f64 + 0.5);
                    let (px, py) = to_pixel.apply(wx, wy);
                    let inside = px >= 0.0 && py >= 0.0 && px < width as f64 && py < height as f64;
                    values.push(if inside {
                        source[py as usize * width as usize + px as usize]
                    } else {
                        fill
                    });
                }
            }
            bands.push(values);
            infos.push(info);
        }

        let warped = MemoryRaster::new(output.pixels, output.lines, bands, infos)?
            .with_geo_transform(output.geo_transform)
            .with_projection(target_cs.definition());

        debug!(
            path = %path.display(),
            pixels = output.pixels,
            lines = output.lines,
            "Regridded raster"
        );
        Ok(Arc::new(warped))
    }
}

fn transformer_error(source_cs: &CoordinateSystem, target_cs: &CoordinateSystem) -> WarpError {
    WarpError::TransformerCreation {
        source_cs: source_cs.to_string(),
        target_cs: target_cs.to_string(),
    }
}

//! In-memory raster dataset.

use super::{check_window, BandInfo, ColorInterpretation, RasterDataset, RasterError, RasterWindow};
use crate::spatial::GeoTransform;

/// A raster held entirely in memory.
///
/// Band values are stored row-major, top row first. Used for synthetic
/// sources in tests, for decoded image files, and as the output of
/// [`GridResampleWarpService`](super::GridResampleWarpService).
///
/// # Example
///
/// ```
/// use terrabuild::raster::{MemoryRaster, RasterDataset, RasterWindow};
/// use terrabuild::spatial::GeoTransform;
///
/// let raster = MemoryRaster::elevation(4, 4, vec![1.0; 16], GeoTransform::identity())
///     .expect("band size matches");
///
/// let values = raster.read_window(0, RasterWindow::new(0, 0, 4, 4), 2, 2).unwrap();
/// assert_eq!(values, vec![1.0; 4]);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    width: u32,
    height: u32,
    bands: Vec<Vec<f32>>,
    band_infos: Vec<BandInfo>,
    geo_transform: Option<GeoTransform>,
    projection: Option<String>,
    gcp_count: usize,
    gcp_projection: Option<String>,
}

impl MemoryRaster {
    /// Create a raster from band data, one `BandInfo` per band.
    pub fn new(
        width: u32,
        height: u32,
        bands: Vec<Vec<f32>>,
        band_infos: Vec<BandInfo>,
    ) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize;
        for (band, values) in bands.iter().enumerate() {
            if values.len() != expected {
                return Err(RasterError::BandSize {
                    band,
                    expected,
                    actual: values.len(),
                });
            }
        }
        if band_infos.len() != bands.len() {
            return Err(RasterError::BandOutOfRange {
                band: band_infos.len(),
                count: bands.len(),
            });
        }

        Ok(Self {
            width,
            height,
            bands,
            band_infos,
            geo_transform: None,
            projection: None,
            gcp_count: 0,
            gcp_projection: None,
        })
    }

    /// Single gray band of elevations.
    pub fn elevation(
        width: u32,
        height: u32,
        heights: Vec<f32>,
        geo_transform: GeoTransform,
    ) -> Result<Self, RasterError> {
        Ok(Self::new(width, height, vec![heights], vec![BandInfo::default()])?
            .with_geo_transform(geo_transform))
    }

    /// Three band RGB raster filled with one colour.
    pub fn solid_rgb(
        width: u32,
        height: u32,
        rgb: [u8; 3],
        geo_transform: GeoTransform,
    ) -> Result<Self, RasterError> {
        let n = width as usize * height as usize;
        let bands = rgb.iter().map(|&c| vec![c as f32; n]).collect();
        let infos = vec![
            BandInfo::with_color(ColorInterpretation::Red),
            BandInfo::with_color(ColorInterpretation::Green),
            BandInfo::with_color(ColorInterpretation::Blue),
        ];
        Ok(Self::new(width, height, bands, infos)?.with_geo_transform(geo_transform))
    }

    /// Set the geotransform.
    pub fn with_geo_transform(mut self, geo_transform: GeoTransform) -> Self {
        self.geo_transform = Some(geo_transform);
        self
    }

    /// Set the coordinate system definition.
    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Record ground control points in the given coordinate system.
    pub fn with_gcps(mut self, count: usize, projection: impl Into<String>) -> Self {
        self.gcp_count = count;
        self.gcp_projection = Some(projection.into());
        self
    }

    /// Set the no-data value of every band.
    pub fn with_no_data(mut self, no_data: f64) -> Self {
        for info in &mut self.band_infos {
            info.no_data = Some(no_data);
        }
        self
    }

    /// Replace the metadata of one band.
    pub fn with_band_info(mut self, band: usize, info: BandInfo) -> Self {
        if let Some(slot) = self.band_infos.get_mut(band) {
            *slot = info;
        }
        self
    }

    /// Raw value at `(x, y)` of `band`.
    pub fn value(&self, band: usize, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.bands
            .get(band)
            .map(|values| values[y as usize * self.width as usize + x as usize])
    }
}

impl RasterDataset for MemoryRaster {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn band_info(&self, band: usize) -> BandInfo {
        self.band_infos.get(band).copied().unwrap_or_default()
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    fn projection(&self) -> Option<String> {
        self.projection.clone()
    }

    fn gcp_count(&self) -> usize {
        self.gcp_count
    }

    fn gcp_projection(&self) -> Option<String> {
        self.gcp_projection.clone()
    }

    fn read_window(
        &self,
        band: usize,
        window: RasterWindow,
        out_width: u32,
        out_height: u32,
    ) -> Result<Vec<f32>, RasterError> {
        let values = self.bands.get(band).ok_or(RasterError::BandOutOfRange {
            band,
            count: self.bands.len(),
        })?;
        check_window(window, (self.width, self.height))?;

        let mut out = Vec::with_capacity(out_width as usize * out_height as usize);
        if window.is_empty() {
            out.resize(out_width as usize * out_height as usize, 0.0);
            return Ok(out);
        }

        let step_x = window.width as f64 / out_width.max(1) as f64;
        let step_y = window.height as f64 / out_height.max(1) as f64;
        for j in 0..out_height {
            let sy = window.y + (((j as f64 + 0.5) * step_y) as u32).min(window.height - 1);
            let row = sy as usize * self.width as usize;
            for i in 0..out_width {
                let sx = window.x + (((i as f64 + 0.5) * step_x) as u32).min(window.width - 1);
                out.push(values[row + sx as usize]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: u32, height: u32) -> MemoryRaster {
        let values = (0..width * height).map(|v| v as f32).collect();
        MemoryRaster::elevation(width, height, values, GeoTransform::identity()).unwrap()
    }

    #[test]
    fn test_band_size_mismatch() {
        let err = MemoryRaster::elevation(2, 2, vec![0.0; 3], GeoTransform::identity());
        assert!(matches!(err, Err(RasterError::BandSize { .. })));
    }

    #[test]
    fn test_read_native_window() {
        let raster = ramp(4, 3);
        let values = raster
            .read_window(0, RasterWindow::new(1, 1, 2, 2), 2, 2)
            .unwrap();
        assert_eq!(values, vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn test_read_downsampled_nearest() {
        let raster = ramp(4, 4);
        let values = raster
            .read_window(0, RasterWindow::new(0, 0, 4, 4), 2, 2)
            .unwrap();
        // Centres of each 2x2 block round to the lower-right pixel.
        assert_eq!(values, vec![5.0, 7.0, 13.0, 15.0]);
    }

    #[test]
    fn test_read_upsampled_nearest() {
        let raster = ramp(2, 1);
        let values = raster
            .read_window(0, RasterWindow::new(0, 0, 2, 1), 4, 1)
            .unwrap();
        assert_eq!(values, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_out_of_bounds_window() {
        let raster = ramp(4, 4);
        assert!(raster
            .read_window(0, RasterWindow::new(3, 3, 2, 2), 2, 2)
            .is_err());
        assert!(raster
            .read_window(1, RasterWindow::new(0, 0, 1, 1), 1, 1)
            .is_err());
    }

    #[test]
    fn test_solid_rgb_bands() {
        let raster = MemoryRaster::solid_rgb(2, 2, [10, 20, 30], GeoTransform::identity()).unwrap();
        assert_eq!(raster.band_count(), 3);
        assert_eq!(raster.band_info(1).color, ColorInterpretation::Green);
        assert_eq!(raster.value(2, 1, 1), Some(30.0));
    }

    #[test]
    fn test_metadata_builders() {
        let raster = ramp(2, 2)
            .with_projection("EPSG:4326")
            .with_gcps(4, "EPSG:4326")
            .with_no_data(-1.0);
        assert_eq!(raster.projection().as_deref(), Some("EPSG:4326"));
        assert_eq!(raster.gcp_count(), 4);
        assert_eq!(raster.band_info(0).no_data, Some(-1.0));
    }
}

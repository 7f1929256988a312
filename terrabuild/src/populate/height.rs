//! Sampling elevation sources into tile height fields.

use tracing::{debug, warn};

use super::window::{height_band, map_window, probe_bilinear};
use crate::config::{DataSetConfig, HeightSampling};
use crate::destination::HeightField;
use crate::extents::GeospatialExtents;
use crate::raster::{BandInfo, RasterDataset, RasterError, RasterWindow};
use crate::source::RasterData;
use crate::spatial::CoordinateSystem;

/// Tolerance when deciding whether a vertex lies inside an overlap.
const VERTEX_EPSILON: f64 = 1e-9;

/// Height transform of one band: `offset + raw * scale`.
#[derive(Debug, Clone, Copy)]
struct HeightScaling {
    scale: f64,
    offset: f64,
}

impl HeightScaling {
    fn new(info: &BandInfo, config: &DataSetConfig) -> Self {
        Self {
            scale: info.scale.unwrap_or(config.vertical_scale as f64),
            offset: info.offset.unwrap_or(0.0),
        }
    }

    #[inline]
    fn apply(&self, raw: f32) -> f32 {
        (self.offset + raw as f64 * self.scale) as f32
    }
}

/// Sample `raster` into `height_field`, which covers `tile_extents`.
///
/// Returns the number of windows read.
pub(crate) fn read_heights(
    height_field: &mut HeightField,
    tile_extents: &GeospatialExtents,
    raster: &RasterData,
    cs: &CoordinateSystem,
    config: &DataSetConfig,
) -> Result<usize, RasterError> {
    let dataset = raster.dataset();
    let Some(band) = height_band(dataset.as_ref()) else {
        warn!("Elevation source has no bands, skipping");
        return Ok(0);
    };
    let info = dataset.band_info(band);
    let scaling = HeightScaling::new(&info, config);

    let source_extents = raster.spatial_properties(cs).extents;
    let mut windows = 0;

    for &offset in tile_extents.wraparound_offsets(&source_extents) {
        let shifted = source_extents.offset_x(offset);
        let overlap = tile_extents.intersection(&shifted, 0.0);
        if !overlap.valid() {
            continue;
        }

        let read = match config.height_sampling {
            HeightSampling::Bilinear => {
                probe_vertices(height_field, dataset.as_ref(), band, &info, scaling, &shifted, &overlap)?
            }
            HeightSampling::Bulk => bulk_read(
                height_field,
                tile_extents,
                dataset.as_ref(),
                band,
                &info,
                scaling,
                &shifted,
                &overlap,
            )?,
        };
        if read {
            windows += 1;
        }
    }

    Ok(windows)
}

/// Inclusive vertex index range along one axis inside `[lo, hi]`.
fn vertex_range(origin: f64, interval: f64, count: u32, lo: f64, hi: f64) -> Option<(u32, u32)> {
    if count == 0 {
        return None;
    }
    let last = (count - 1) as f64;
    if interval <= 0.0 {
        return (origin >= lo - VERTEX_EPSILON && origin <= hi + VERTEX_EPSILON).then_some((0, 0));
    }
    let first = ((lo - origin) / interval - VERTEX_EPSILON).ceil().max(0.0);
    let end = ((hi - origin) / interval + VERTEX_EPSILON).floor().min(last);
    if end < first {
        return None;
    }
    Some((first as u32, end as u32))
}

/// Probe every vertex inside `overlap` bilinearly in a raw source window.
fn probe_vertices(
    height_field: &mut HeightField,
    dataset: &dyn RasterDataset,
    band: usize,
    info: &BandInfo,
    scaling: HeightScaling,
    source_extents: &GeospatialExtents,
    overlap: &GeospatialExtents,
) -> Result<bool, RasterError> {
    let Some((c0, c1)) = vertex_range(
        height_field.origin.0,
        height_field.x_interval,
        height_field.num_columns(),
        overlap.x_min,
        overlap.x_max,
    ) else {
        return Ok(false);
    };
    let Some((r0, r1)) = vertex_range(
        height_field.origin.1,
        height_field.y_interval,
        height_field.num_rows(),
        overlap.y_min,
        overlap.y_max,
    ) else {
        return Ok(false);
    };

    let (nx, ny) = dataset.size();
    if nx == 0 || ny == 0 || !(source_extents.width() > 0.0) || !(source_extents.height() > 0.0) {
        return Ok(false);
    }
    let pixel_w = source_extents.width() / nx as f64;
    let pixel_h = source_extents.height() / ny as f64;

    // Continuous pixel coordinates, sample centres at whole numbers.
    let to_u = |x: f64| (x - source_extents.x_min) / pixel_w - 0.5;
    let to_v = |y: f64| (source_extents.y_max - y) / pixel_h - 0.5;
    let clamp_x = |p: f64| p.clamp(0.0, (nx - 1) as f64) as u32;
    let clamp_y = |p: f64| p.clamp(0.0, (ny - 1) as f64) as u32;

    let (x_lo, y_lo) = height_field.vertex_position(c0, r0);
    let (x_hi, y_hi) = height_field.vertex_position(c1, r1);
    let wx0 = clamp_x(to_u(x_lo).floor());
    let wx1 = clamp_x(to_u(x_hi).floor() + 1.0);
    let wy0 = clamp_y(to_v(y_hi).floor());
    let wy1 = clamp_y(to_v(y_lo).floor() + 1.0);

    let window = RasterWindow::new(wx0, wy0, wx1 - wx0 + 1, wy1 - wy0 + 1);
    let raw = dataset.read_window(band, window, window.width, window.height)?;

    let mut written = 0usize;
    for r in r0..=r1 {
        for c in c0..=c1 {
            let (x, y) = height_field.vertex_position(c, r);
            let u = to_u(x) - wx0 as f64;
            let v = to_v(y) - wy0 as f64;
            if let Some(h) = probe_bilinear(&raw, window.width, window.height, u, v, info) {
                height_field.set_height(c, r, scaling.apply(h));
                written += 1;
            }
        }
    }

    debug!(
        columns = c1 - c0 + 1,
        rows = r1 - r0 + 1,
        written,
        "Probed height window"
    );
    Ok(true)
}

/// Read the source window resized to the destination window.
#[allow(clippy::too_many_arguments)]
fn bulk_read(
    height_field: &mut HeightField,
    tile_extents: &GeospatialExtents,
    dataset: &dyn RasterDataset,
    band: usize,
    info: &BandInfo,
    scaling: HeightScaling,
    source_extents: &GeospatialExtents,
    overlap: &GeospatialExtents,
) -> Result<bool, RasterError> {
    let dest_size = (height_field.num_columns(), height_field.num_rows());
    let Some(mapping) = map_window(source_extents, dataset.size(), tile_extents, dest_size, overlap) else {
        return Ok(false);
    };

    let values = dataset.read_window(band, mapping.source, mapping.dest_width, mapping.dest_height)?;
    for j in 0..mapping.dest_height {
        // Raster rows run north to south, height field rows south to north.
        let row = mapping.dest_y + mapping.dest_height - 1 - j;
        for i in 0..mapping.dest_width {
            let raw = values[(j * mapping.dest_width + i) as usize];
            if info.is_no_data(raw) {
                continue;
            }
            height_field.set_height(mapping.dest_x + i, row, scaling.apply(raw));
        }
    }

    debug!(
        dest_x = mapping.dest_x,
        dest_y = mapping.dest_y,
        width = mapping.dest_width,
        height = mapping.dest_height,
        "Read height window"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::MemoryRaster;
    use crate::spatial::{GeoTransform, SpatialProperties};
    use std::sync::Arc;

    fn utm() -> CoordinateSystem {
        CoordinateSystem::new("EPSG:32632")
    }

    fn raster_data(raster: MemoryRaster) -> RasterData {
        let (w, h) = raster.size();
        let props = SpatialProperties::new(w, h, raster.geo_transform().unwrap(), Some(utm()));
        RasterData::new(Arc::new(raster), props)
    }

    /// 4x4 DEM over `[0, 4] x [0, 4]`, height = column index.
    fn column_ramp() -> RasterData {
        let heights = (0..16).map(|i| (i % 4) as f32).collect();
        raster_data(MemoryRaster::elevation(4, 4, heights, GeoTransform::north_up(0.0, 4.0, 1.0, 1.0)).unwrap())
    }

    #[test]
    fn test_vertex_range() {
        assert_eq!(vertex_range(0.0, 1.0, 5, 0.0, 4.0), Some((0, 4)));
        assert_eq!(vertex_range(0.0, 1.0, 5, 1.5, 2.5), Some((2, 2)));
        assert_eq!(vertex_range(0.0, 1.0, 5, 1.2, 1.8), None);
        assert_eq!(vertex_range(0.0, 1.0, 5, -3.0, 10.0), Some((0, 4)));
    }

    #[test]
    fn test_bilinear_follows_ramp() {
        let data = column_ramp();
        let tile = GeospatialExtents::new(0.0, 0.0, 4.0, 4.0, false);
        let mut hf = HeightField::new(5, 5, (0.0, 0.0), 1.0, 1.0);
        let config = DataSetConfig::default();

        assert_eq!(read_heights(&mut hf, &tile, &data, &utm(), &config).unwrap(), 1);

        // Vertex x = 2.0 sits between sample centres 1.5 and 2.5.
        assert!((hf.height(2, 2) - 1.5).abs() < 1e-5);
        // Edges clamp to the outermost samples.
        assert_eq!(hf.height(0, 0), 0.0);
        assert_eq!(hf.height(4, 4), 3.0);
    }

    #[test]
    fn test_vertical_scale_and_band_offset() {
        let heights = vec![10.0; 4];
        let raster = MemoryRaster::elevation(2, 2, heights, GeoTransform::north_up(0.0, 2.0, 1.0, 1.0))
            .unwrap()
            .with_band_info(
                0,
                BandInfo {
                    offset: Some(100.0),
                    ..Default::default()
                },
            );
        let data = raster_data(raster);
        let tile = GeospatialExtents::new(0.0, 0.0, 2.0, 2.0, false);
        let mut hf = HeightField::new(2, 2, (0.0, 0.0), 2.0, 2.0);
        let config = DataSetConfig::default().with_vertical_scale(2.0);

        read_heights(&mut hf, &tile, &data, &utm(), &config).unwrap();
        assert_eq!(hf.height(1, 1), 120.0);
    }

    #[test]
    fn test_bilinear_all_no_data_leaves_vertex() {
        let raster = MemoryRaster::elevation(2, 2, vec![-9999.0; 4], GeoTransform::north_up(0.0, 2.0, 1.0, 1.0))
            .unwrap()
            .with_no_data(-9999.0);
        let data = raster_data(raster);
        let tile = GeospatialExtents::new(0.0, 0.0, 2.0, 2.0, false);
        let mut hf = HeightField::new(2, 2, (0.0, 0.0), 2.0, 2.0);
        hf.fill(42.0);

        read_heights(&mut hf, &tile, &data, &utm(), &DataSetConfig::default()).unwrap();
        assert!(hf.heights().iter().all(|&h| h == 42.0));
    }

    #[test]
    fn test_bulk_orients_rows_south_up() {
        // Top raster row 9, bottom row 1.
        let raster =
            MemoryRaster::elevation(2, 2, vec![9.0, 9.0, 1.0, 1.0], GeoTransform::north_up(0.0, 2.0, 1.0, 1.0)).unwrap();
        let data = raster_data(raster);
        let tile = GeospatialExtents::new(0.0, 0.0, 2.0, 2.0, false);
        let mut hf = HeightField::new(2, 2, (0.0, 0.0), 2.0, 2.0);
        let config = DataSetConfig::default().with_height_sampling(HeightSampling::Bulk);

        read_heights(&mut hf, &tile, &data, &utm(), &config).unwrap();
        assert_eq!(hf.height(0, 0), 1.0);
        assert_eq!(hf.height(1, 1), 9.0);
    }

    #[test]
    fn test_bulk_no_data_keeps_existing_height() {
        let raster =
            MemoryRaster::elevation(2, 1, vec![-1.0, 5.0], GeoTransform::north_up(0.0, 1.0, 1.0, 1.0))
                .unwrap()
                .with_no_data(-1.0);
        let data = raster_data(raster);
        let tile = GeospatialExtents::new(0.0, 0.0, 2.0, 1.0, false);
        let mut hf = HeightField::new(2, 1, (0.0, 0.0), 2.0, 1.0);
        hf.fill(7.0);
        let config = DataSetConfig::default().with_height_sampling(HeightSampling::Bulk);

        read_heights(&mut hf, &tile, &data, &utm(), &config).unwrap();
        assert_eq!(hf.height(0, 0), 7.0);
        assert_eq!(hf.height(1, 0), 5.0);
    }

    #[test]
    fn test_no_data_source_keeps_earlier_heights() {
        let tile = GeospatialExtents::new(0.0, 0.0, 2.0, 2.0, false);
        let good = raster_data(
            MemoryRaster::elevation(2, 2, vec![100.0; 4], GeoTransform::north_up(0.0, 2.0, 1.0, 1.0)).unwrap(),
        );
        let empty = raster_data(
            MemoryRaster::elevation(2, 2, vec![-9999.0; 4], GeoTransform::north_up(0.0, 2.0, 1.0, 1.0))
                .unwrap()
                .with_no_data(-9999.0),
        );

        for sampling in [HeightSampling::Bilinear, HeightSampling::Bulk] {
            let config = DataSetConfig::default().with_height_sampling(sampling);
            let mut hf = HeightField::new(2, 2, (0.0, 0.0), 2.0, 2.0);

            read_heights(&mut hf, &tile, &good, &utm(), &config).unwrap();
            read_heights(&mut hf, &tile, &empty, &utm(), &config).unwrap();
            assert!(
                hf.heights().iter().all(|&h| h == 100.0),
                "{sampling}: {:?}",
                hf.heights()
            );
        }
    }

    #[test]
    fn test_geographic_wraparound() {
        // DEM just east of the date line, tile expressed past 180.
        let wgs84 = CoordinateSystem::wgs84();
        let raster = MemoryRaster::elevation(4, 4, vec![12.0; 16], GeoTransform::north_up(-180.0, 4.0, 1.0, 1.0)).unwrap();
        let (w, h) = raster.size();
        let props = SpatialProperties::new(w, h, raster.geo_transform().unwrap(), Some(wgs84.clone()));
        let data = RasterData::new(Arc::new(raster), props);
        let tile = GeospatialExtents::new(180.0, 0.0, 184.0, 4.0, true);

        for sampling in [HeightSampling::Bilinear, HeightSampling::Bulk] {
            let config = DataSetConfig::default().with_height_sampling(sampling);
            let mut hf = HeightField::new(5, 5, (180.0, 0.0), 1.0, 1.0);

            assert_eq!(read_heights(&mut hf, &tile, &data, &wgs84, &config).unwrap(), 1, "{}", sampling);
            assert_eq!(hf.height(0, 0), 12.0, "{}", sampling);
            assert_eq!(hf.height(2, 2), 12.0, "{}", sampling);
            assert_eq!(hf.height(4, 4), 12.0, "{}", sampling);
        }
    }

    #[test]
    fn test_partial_overlap_only_touches_covered_vertices() {
        // DEM over the east half of the tile.
        let raster = MemoryRaster::elevation(2, 4, vec![3.0; 8], GeoTransform::north_up(2.0, 4.0, 1.0, 1.0)).unwrap();
        let data = raster_data(raster);
        let tile = GeospatialExtents::new(0.0, 0.0, 4.0, 4.0, false);
        let mut hf = HeightField::new(5, 5, (0.0, 0.0), 1.0, 1.0);

        read_heights(&mut hf, &tile, &data, &utm(), &DataSetConfig::default()).unwrap();
        assert_eq!(hf.height(0, 2), 0.0);
        assert_eq!(hf.height(1, 2), 0.0);
        assert_eq!(hf.height(2, 2), 3.0);
        assert_eq!(hf.height(4, 4), 3.0);
    }
}

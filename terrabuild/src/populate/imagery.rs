//! Drawing imagery sources into tile images.

use tracing::{debug, warn};

use super::window::{map_window, resample_bilinear, ImageBands};
use super::IMAGE_RESAMPLE_TOLERANCE;
use crate::destination::TileImage;
use crate::extents::GeospatialExtents;
use crate::raster::{RasterError, RasterWindow};
use crate::source::RasterData;
use crate::spatial::CoordinateSystem;

/// Composite `raster` into `image`, which covers `tile_extents`.
///
/// Returns the number of windows read; geographic sources may contribute
/// one window per date line offset.
pub(crate) fn read_image(
    image: &mut TileImage,
    tile_extents: &GeospatialExtents,
    raster: &RasterData,
    cs: &CoordinateSystem,
) -> Result<usize, RasterError> {
    let dataset = raster.dataset();
    let Some(bands) = ImageBands::select(dataset.as_ref()) else {
        warn!("Imagery source has no bands, skipping");
        return Ok(0);
    };
    let infos: Vec<_> = bands.bands().map(|b| dataset.band_info(b)).collect();
    // Without a declared no-data value, pure black is treated as empty.
    let black_is_empty = infos.iter().all(|info| info.no_data.is_none());

    let source_extents = raster.spatial_properties(cs).extents;
    let source_size = dataset.size();
    let dest_size = (image.width(), image.height());
    let mut windows = 0;

    for &offset in tile_extents.wraparound_offsets(&source_extents) {
        let shifted = source_extents.offset_x(offset);
        let overlap = tile_extents.intersection(&shifted, 0.0);
        if !overlap.valid() {
            continue;
        }
        let Some(mapping) = map_window(&shifted, source_size, tile_extents, dest_size, &overlap) else {
            continue;
        };

        let ratio_x = mapping.dest_width as f64 / mapping.source.width as f64;
        let ratio_y = mapping.dest_height as f64 / mapping.source.height as f64;
        let bilinear = ratio_x > IMAGE_RESAMPLE_TOLERANCE || ratio_y > IMAGE_RESAMPLE_TOLERANCE;

        let mut channels = Vec::with_capacity(infos.len());
        for (band, info) in bands.bands().zip(&infos) {
            let values = if bilinear {
                let raw = dataset.read_window(band, mapping.source, mapping.source.width, mapping.source.height)?;
                resample_bilinear(
                    &raw,
                    mapping.source.width,
                    mapping.source.height,
                    mapping.dest_width,
                    mapping.dest_height,
                    info,
                )
            } else {
                dataset.read_window(band, mapping.source, mapping.dest_width, mapping.dest_height)?
            };
            channels.push(values);
        }

        let top = mapping.dest_top_row(dest_size.1);
        for j in 0..mapping.dest_height {
            for i in 0..mapping.dest_width {
                let index = (j * mapping.dest_width + i) as usize;
                if channels.iter().zip(&infos).any(|(c, info)| info.is_no_data(c[index])) {
                    continue;
                }
                let rgb = [
                    to_u8(channels[0][index]),
                    to_u8(channels[1][index]),
                    to_u8(channels[2][index]),
                ];
                if black_is_empty && rgb == [0, 0, 0] {
                    continue;
                }
                let alpha = if bands.alpha.is_some() {
                    to_u8(channels[3][index])
                } else {
                    255
                };
                image.composite(mapping.dest_x + i, top + j, [rgb[0], rgb[1], rgb[2], alpha]);
            }
        }

        debug!(
            window = ?window_summary(&mapping.source),
            dest_x = mapping.dest_x,
            dest_y = mapping.dest_y,
            bilinear,
            "Read image window"
        );
        windows += 1;
    }

    Ok(windows)
}

#[inline]
fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn window_summary(window: &RasterWindow) -> (u32, u32, u32, u32) {
    (window.x, window.y, window.width, window.height)
}

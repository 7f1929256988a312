//! Raster service backed by the `image` crate.
//!
//! Georeferencing comes from sidecar files next to the image:
//!
//! | Image | World file | Projection |
//! |-------|------------|------------|
//! | `tile.png` | `tile.pgw` (or `tile.wld`) | `tile.prj` |
//! | `tile.jpg` | `tile.jgw` (or `tile.wld`) | `tile.prj` |
//! | `tile.tif` | `tile.tfw` (or `tile.wld`) | `tile.prj` |
//!
//! A world file holds six lines: pixel width, row rotation, column rotation,
//! pixel height (negative for north-up), and the world position of the
//! *centre* of the top-left pixel.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ColorType, DynamicImage};
use tracing::debug;

use super::{BandInfo, ColorInterpretation, MemoryRaster, RasterDataset, RasterError, RasterService};
use crate::spatial::GeoTransform;

/// Opens PNG, JPEG and TIFF rasters and their world-file sidecars.
///
/// Grayscale images become a single gray band holding the raw sample values
/// (16-bit PNGs keep their full range, which suits elevation data). Colour
/// images become R, G, B and optionally alpha bands.
#[derive(Debug, Clone, Default)]
pub struct ImageFileService {
    no_data: Option<f64>,
}

impl ImageFileService {
    /// Create a service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every band of every opened raster with a no-data value.
    pub fn with_no_data(mut self, no_data: f64) -> Self {
        self.no_data = Some(no_data);
        self
    }

    fn decode(&self, path: &Path) -> Result<MemoryRaster, RasterError> {
        let img = image::open(path).map_err(|e| RasterError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let (bands, colors) = split_bands(img);
        let width = bands.width;
        let height = bands.height;
        let infos = colors
            .iter()
            .map(|&color| BandInfo {
                color,
                no_data: self.no_data,
                ..Default::default()
            })
            .collect();

        MemoryRaster::new(width, height, bands.values, infos)
    }
}

impl RasterService for ImageFileService {
    fn open(&self, path: &Path) -> Result<Arc<dyn RasterDataset>, RasterError> {
        let mut raster = self.decode(path)?;

        if let Some(world) = world_file_path(path) {
            raster = raster.with_geo_transform(read_world_file(&world)?);
        }

        let prj = path.with_extension("prj");
        if prj.is_file() {
            let definition = fs::read_to_string(&prj)?;
            raster = raster.with_projection(definition.trim());
        }

        debug!(
            path = %path.display(),
            bands = raster.band_count(),
            width = raster.size().0,
            height = raster.size().1,
            "Opened image raster"
        );
        Ok(Arc::new(raster))
    }
}

/// Locate the world-file sidecar of `path`, if one exists.
pub fn world_file_path(path: &Path) -> Option<PathBuf> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)?;

    let specific = match ext.as_str() {
        "png" => Some("pgw"),
        "jpg" | "jpeg" => Some("jgw"),
        "tif" | "tiff" => Some("tfw"),
        _ => None,
    };

    specific
        .into_iter()
        .chain(std::iter::once("wld"))
        .map(|sidecar| path.with_extension(sidecar))
        .find(|candidate| candidate.is_file())
}

/// Parse a six-line world file into a pixel-corner geotransform.
fn read_world_file(path: &Path) -> Result<GeoTransform, RasterError> {
    let text = fs::read_to_string(path)?;
    let values: Vec<f64> = text
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .map_err(|e| RasterError::WorldFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if values.len() != 6 {
        return Err(RasterError::WorldFile {
            path: path.to_path_buf(),
            reason: format!("expected 6 values, found {}", values.len()),
        });
    }

    // a, d, b, e, c, f
    let (a, d, b, e, c, f) = (values[0], values[1], values[2], values[3], values[4], values[5]);
    Ok(GeoTransform([
        c - 0.5 * a - 0.5 * b,
        a,
        b,
        f - 0.5 * d - 0.5 * e,
        d,
        e,
    ]))
}

struct Bands {
    width: u32,
    height: u32,
    values: Vec<Vec<f32>>,
}

/// Split a decoded image into per-band sample vectors.
fn split_bands(img: DynamicImage) -> (Bands, Vec<ColorInterpretation>) {
    use ColorInterpretation::*;

    let width = img.width();
    let height = img.height();

    let (channels, colors, samples): (usize, Vec<ColorInterpretation>, Vec<f32>) = match img.color() {
        ColorType::L16 => (
            1,
            vec![Gray],
            img.into_luma16().into_raw().into_iter().map(f32::from).collect(),
        ),
        ColorType::L8 => (
            1,
            vec![Gray],
            img.into_luma8().into_raw().into_iter().map(f32::from).collect(),
        ),
        ColorType::La8 | ColorType::La16 => (
            2,
            vec![Gray, Alpha],
            img.into_luma_alpha8().into_raw().into_iter().map(f32::from).collect(),
        ),
        ColorType::Rgb32F => (3, vec![Red, Green, Blue], img.into_rgb32f().into_raw()),
        ColorType::Rgba32F => (4, vec![Red, Green, Blue, Alpha], img.into_rgba32f().into_raw()),
        color if color.has_alpha() => (
            4,
            vec![Red, Green, Blue, Alpha],
            img.into_rgba8().into_raw().into_iter().map(f32::from).collect(),
        ),
        _ => (
            3,
            vec![Red, Green, Blue],
            img.into_rgb8().into_raw().into_iter().map(f32::from).collect(),
        ),
    };

    let mut values = vec![Vec::with_capacity(width as usize * height as usize); channels];
    for pixel in samples.chunks_exact(channels) {
        for (band, &sample) in pixel.iter().enumerate() {
            values[band].push(sample);
        }
    }

    (
        Bands {
            width,
            height,
            values,
        },
        colors,
    )
}

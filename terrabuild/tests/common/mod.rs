//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use terrabuild::emit::{EmitError, EmittedGroup, EmittedTile, TileEmitter};
use terrabuild::raster::{MemoryRaster, RasterDataset, RasterError, RasterService};
use terrabuild::spatial::GeoTransform;
use terrabuild::{Source, TileKey};

pub const PROJECTION: &str = "EPSG:32632";

/// What the recorder keeps of one emitted tile.
#[derive(Debug, Clone)]
pub struct RecordedTile {
    pub key: TileKey,
    pub name: String,
    pub image_size: Option<(u32, u32)>,
    pub height_size: Option<(u32, u32)>,
    pub heights: Vec<f32>,
    pub models: Vec<String>,
}

/// Emitter that copies everything it is handed.
#[derive(Debug, Default)]
pub struct Recorder {
    pub tiles: Vec<RecordedTile>,
    pub groups: Vec<EmittedGroup>,
    pub finished: bool,
}

impl Recorder {
    pub fn tile(&self, level: u32, x: u32, y: u32) -> Option<&RecordedTile> {
        self.tiles.iter().find(|t| t.key == TileKey::new(level, x, y))
    }

    pub fn heights_by_key(&self) -> BTreeMap<(u32, u32, u32), Vec<f32>> {
        self.tiles
            .iter()
            .map(|t| ((t.key.level, t.key.x, t.key.y), t.heights.clone()))
            .collect()
    }
}

impl TileEmitter for Recorder {
    fn emit_tile(&mut self, tile: &EmittedTile<'_>) -> Result<(), EmitError> {
        let image = tile.images.first().copied().flatten();
        self.tiles.push(RecordedTile {
            key: tile.key,
            name: tile.name.to_string(),
            image_size: image.map(|i| (i.width(), i.height())),
            height_size: tile.height_field.map(|h| (h.num_columns(), h.num_rows())),
            heights: tile.height_field.map(|h| h.heights().to_vec()).unwrap_or_default(),
            models: tile.models.iter().map(|m| m.name.clone()).collect(),
        });
        Ok(())
    }

    fn emit_group(&mut self, group: &EmittedGroup) -> Result<(), EmitError> {
        self.groups.push(group.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EmitError> {
        self.finished = true;
        Ok(())
    }
}

/// Raster service with no files; every source in these tests is bound in memory.
pub struct NoFiles;

impl RasterService for NoFiles {
    fn open(&self, path: &Path) -> Result<Arc<dyn RasterDataset>, RasterError> {
        Err(RasterError::Open {
            path: path.to_path_buf(),
            reason: "not found".to_string(),
        })
    }
}

/// Solid RGB image of `size` pixels with its north-west corner at `origin`.
pub fn solid_image(path: &str, origin: (f64, f64), size: u32, pixel: f64, rgb: [u8; 3]) -> Source {
    let raster = MemoryRaster::solid_rgb(size, size, rgb, GeoTransform::north_up(origin.0, origin.1, pixel, pixel))
        .unwrap()
        .with_projection(PROJECTION);
    Source::image(path).with_dataset(Arc::new(raster))
}

/// Elevation rising one unit per metre eastwards and half a unit northwards,
/// covering `[0, extent]` on both axes.
pub fn sloped_dem(path: &str, size: u32, extent: f64) -> Source {
    let pixel = extent / size as f64;
    let mut heights = Vec::with_capacity((size * size) as usize);
    for row in 0..size {
        let y = extent - (row as f64 + 0.5) * pixel;
        for column in 0..size {
            let x = (column as f64 + 0.5) * pixel;
            heights.push((x + 0.5 * y) as f32);
        }
    }
    let raster = MemoryRaster::elevation(size, size, heights, GeoTransform::north_up(0.0, extent, pixel, pixel))
        .unwrap()
        .with_projection(PROJECTION);
    Source::height_field(path).with_dataset(Arc::new(raster))
}

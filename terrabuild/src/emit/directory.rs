//! Emitter writing into a directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::{EmitError, EmittedGroup, EmittedTile, TileEmitter};
use crate::destination::{HeightDelta, HeightField};
use crate::extents::GeospatialExtents;
use crate::source::ModelRef;

/// Writes each tile as PNG layers plus a JSON descriptor, and each group as
/// a JSON file named after the group.
///
/// ```text
/// <dir>/<tile>.tile.json
/// <dir>/<tile>_layer<n>.png
/// <dir>/<group file name>
/// ```
#[derive(Debug)]
pub struct DirectoryEmitter {
    directory: PathBuf,
    tiles_written: usize,
    groups_written: usize,
}

#[derive(Serialize)]
struct TileDescriptor<'a> {
    name: &'a str,
    level: u32,
    tile_x: u32,
    tile_y: u32,
    extents: GeospatialExtents,
    /// Image file per layer; `null` for uncovered layers.
    layers: Vec<Option<String>>,
    height_field: Option<&'a HeightField>,
    height_deltas: [Option<HeightDelta>; 8],
    models: &'a [ModelRef],
}

impl DirectoryEmitter {
    /// Create the emitter, creating `directory` if needed.
    pub fn create(directory: impl Into<PathBuf>) -> Result<Self, EmitError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|source| EmitError::Io {
            path: directory.clone(),
            source,
        })?;
        Ok(Self {
            directory,
            tiles_written: 0,
            groups_written: 0,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn tiles_written(&self) -> usize {
        self.tiles_written
    }

    pub fn groups_written(&self) -> usize {
        self.groups_written
    }

    fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<(), EmitError> {
        let path = self.directory.join(file_name);
        let json = serde_json::to_vec_pretty(value)?;
        fs::write(&path, json).map_err(|source| EmitError::Io { path, source })
    }
}

impl TileEmitter for DirectoryEmitter {
    fn emit_tile(&mut self, tile: &EmittedTile<'_>) -> Result<(), EmitError> {
        let mut layers = Vec::with_capacity(tile.images.len());
        for (index, image) in tile.images.iter().enumerate() {
            let Some(image) = image else {
                layers.push(None);
                continue;
            };
            let file_name = format!("{}_layer{}.png", tile.name, index);
            let path = self.directory.join(&file_name);
            image
                .to_dynamic()
                .save_with_format(&path, image::ImageFormat::Png)
                .map_err(|source| EmitError::Encode { path, source })?;
            layers.push(Some(file_name));
        }

        let descriptor = TileDescriptor {
            name: tile.name,
            level: tile.key.level,
            tile_x: tile.key.x,
            tile_y: tile.key.y,
            extents: tile.extents,
            layers,
            height_field: tile.height_field,
            height_deltas: tile.height_deltas,
            models: tile.models,
        };
        self.write_json(&format!("{}.tile.json", tile.name), &descriptor)?;

        self.tiles_written += 1;
        debug!(tile = tile.name, "Wrote tile");
        Ok(())
    }

    fn emit_group(&mut self, group: &EmittedGroup) -> Result<(), EmitError> {
        self.write_json(&group.file_name, group)?;
        self.groups_written += 1;
        debug!(group = %group.file_name, entries = group.entries.len(), "Wrote group");
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EmitError> {
        info!(
            directory = %self.directory.display(),
            tiles = self.tiles_written,
            groups = self.groups_written,
            "Output complete"
        );
        Ok(())
    }
}
